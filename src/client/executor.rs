//! Single HTTP exchanges with the Advertising API.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::auth::AccessToken;
use crate::config::AdvertisingConfig;
use crate::errors::{AdvertisingError, AdvertisingResult};
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError};

/// Maximum number of 307 hops followed by a download.
pub const MAX_REDIRECTS: u8 = 5;

/// Header carrying the Login with Amazon client id.
pub const CLIENT_ID_HEADER: &str = "Amazon-Advertising-API-ClientId";

/// Header carrying the advertiser profile id.
pub const SCOPE_HEADER: &str = "Amazon-Advertising-API-Scope";

/// Result of one exchange, before retry classification.
#[derive(Debug)]
pub enum Exchange {
    /// The server answered, with any status.
    Answered(HttpResponse),
    /// No response was received.
    Failed(TransportError),
}

impl From<Result<HttpResponse, TransportError>> for Exchange {
    fn from(result: Result<HttpResponse, TransportError>) -> Self {
        match result {
            Ok(response) => Exchange::Answered(response),
            Err(err) => Exchange::Failed(err),
        }
    }
}

/// Builds requests with the Advertising API headers and sends them.
pub struct HttpExecutor {
    transport: Arc<dyn HttpTransport>,
    client_id: String,
    profile_id: Option<String>,
    timeout: Duration,
}

impl HttpExecutor {
    /// Creates a new executor.
    pub fn new(config: &AdvertisingConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            client_id: config.client_id.clone(),
            profile_id: config.profile_id.clone(),
            timeout: config.timeout,
        }
    }

    /// Sends an API request.
    #[instrument(skip_all, fields(method = %method, url = %url))]
    pub async fn execute(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<Vec<u8>>,
        token: Option<&AccessToken>,
    ) -> Exchange {
        let mut headers = self.base_headers(token);
        headers.insert(CLIENT_ID_HEADER.to_string(), self.client_id.clone());
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Accept-Encoding".to_string(), "gzip".to_string());

        let request = HttpRequest {
            method,
            url: url.to_string(),
            headers,
            body,
            timeout: Some(self.timeout),
        };

        self.transport.send(request).await.into()
    }

    /// Fetches a job artifact, following 307 redirects.
    ///
    /// `token` is only sent to `location` itself; redirected hops go out
    /// without an `Authorization` header.
    #[instrument(skip_all, fields(location = %location, authorized = token.is_some()))]
    pub async fn download(
        &self,
        location: &str,
        token: Option<&AccessToken>,
    ) -> AdvertisingResult<Exchange> {
        let mut url = location.to_string();
        let mut token = token;
        let mut redirects = 0u8;

        loop {
            let request = HttpRequest {
                method: HttpMethod::Get,
                url: url.clone(),
                headers: self.base_headers(token),
                body: None,
                timeout: Some(self.timeout),
            };

            let response = match self.transport.send(request).await {
                Ok(response) => response,
                Err(err) => return Ok(Exchange::Failed(err)),
            };

            if response.status != 307 {
                return Ok(Exchange::Answered(response));
            }

            if redirects >= MAX_REDIRECTS {
                return Err(AdvertisingError::Http {
                    status: 307,
                    details: Some(format!("Too many redirects (more than {MAX_REDIRECTS})")),
                    body: String::new(),
                });
            }

            let next = response.header("location").ok_or_else(|| AdvertisingError::Http {
                status: 307,
                details: Some("Redirect without a Location header".to_string()),
                body: String::from_utf8_lossy(&response.body).into_owned(),
            })?;

            url = resolve_location(&url, next)?;
            token = None;
            redirects += 1;
            debug!(redirects, "Following download redirect");
        }
    }

    fn base_headers(&self, token: Option<&AccessToken>) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        if let Some(token) = token {
            headers.insert("Authorization".to_string(), token.authorization_header());
        }
        if let Some(profile_id) = &self.profile_id {
            headers.insert(SCOPE_HEADER.to_string(), profile_id.clone());
        }
        headers
    }
}

fn resolve_location(current: &str, location: &str) -> AdvertisingResult<String> {
    let base = Url::parse(current)?;
    Ok(base.join(location)?.to_string())
}

impl std::fmt::Debug for HttpExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpExecutor")
            .field("client_id", &self.client_id)
            .field("profile_id", &self.profile_id)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
