//! Retrying API calls and artifact downloads.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::executor::{Exchange, HttpExecutor};
use crate::auth::TokenStore;
use crate::codec;
use crate::config::Endpoint;
use crate::errors::{AdvertisingError, AdvertisingResult};
use crate::resilience::{Attempt, RetryPolicy, RetryReason};
use crate::transport::{HttpMethod, HttpResponse};
use crate::types::Artifact;

/// Sorts an exchange into success, retryable failure or fatal error.
///
/// Status 200-399 is success. 401, 429, 500 and transport failures are
/// retryable. Anything else is an [`AdvertisingError::Http`].
pub fn classify(exchange: Exchange) -> AdvertisingResult<Attempt<HttpResponse>> {
    let response = match exchange {
        Exchange::Failed(err) => return Ok(Attempt::Retry(RetryReason::Network(err.to_string()))),
        Exchange::Answered(response) => response,
    };

    if let Some(reason) = RetryReason::from_status(response.status) {
        return Ok(Attempt::Retry(reason));
    }

    if (200..400).contains(&response.status) {
        return Ok(Attempt::Complete(response));
    }

    let body = codec::decode_content(&response).unwrap_or_else(|_| response.body.to_vec());
    Err(AdvertisingError::from_response(response.status, &body))
}

/// Issues API calls through the retry policy.
#[derive(Debug)]
pub struct RetryingRequester {
    endpoint: Endpoint,
    executor: HttpExecutor,
    tokens: Arc<TokenStore>,
    policy: RetryPolicy,
}

impl RetryingRequester {
    /// Creates a new requester.
    pub fn new(
        endpoint: Endpoint,
        executor: HttpExecutor,
        tokens: Arc<TokenStore>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            endpoint,
            executor,
            tokens,
            policy,
        }
    }

    /// Calls an API path and decodes the response body.
    ///
    /// `query` is appended verbatim (already encoded). A body that is not
    /// JSON comes back as a JSON string.
    #[instrument(skip(self, method, query, body), fields(method = %method))]
    pub async fn call(
        &self,
        method: HttpMethod,
        path: &str,
        query: Option<&str>,
        body: Option<&Value>,
    ) -> AdvertisingResult<Value> {
        let mut url = self.endpoint.api_url(path)?;
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.set_query(Some(query));
        }
        let url = url.to_string();
        let url = url.as_str();
        let payload = body.map(codec::encode_json).transpose()?;
        let payload = payload.as_deref();

        let response = self
            .policy
            .execute(self.tokens.as_ref(), move |attempt| async move {
                let token = self.tokens.current_or_refresh().await?;
                debug!(attempt, "Sending API request");
                let body = payload.map(<[u8]>::to_vec);
                classify(self.executor.execute(method, url, body, Some(&token)).await)
            })
            .await?;

        codec::decode_api_body(&response)
    }

    /// Downloads a report or snapshot from its `location`.
    ///
    /// The first hop is authorized; redirects are followed without the token.
    /// Every retry starts again from `location`.
    #[instrument(skip(self))]
    pub async fn download(&self, location: &str, always_json: bool) -> AdvertisingResult<Artifact> {
        let response = self
            .policy
            .execute(self.tokens.as_ref(), move |attempt| async move {
                let token = self.tokens.current_or_refresh().await?;
                debug!(attempt, "Downloading artifact");
                classify(self.executor.download(location, Some(&token)).await?)
            })
            .await?;

        codec::decode_artifact(&response, always_json)
    }

    /// The endpoint requests are sent to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The token store used for authorization.
    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdvertisingConfig;
    use crate::mocks::{MockResponse, MockTransport};
    use crate::transport::TransportError;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;

    fn requester(transport: &Arc<MockTransport>, max_retry: u32) -> RetryingRequester {
        let config = AdvertisingConfig::builder()
            .client_id("client-id")
            .client_secret("secret")
            .refresh_token("Atzr|refresh")
            .access_token("Atza|initial")
            .max_retry(max_retry)
            .build()
            .unwrap();
        let tokens = Arc::new(TokenStore::new(&config, transport.clone()));
        RetryingRequester::new(
            config.endpoint.clone(),
            HttpExecutor::new(&config, transport.clone()),
            tokens,
            RetryPolicy::new(crate::resilience::RetryConfig::new(
                config.max_retry,
                config.max_wait_time,
            )),
        )
    }

    fn response(status: u16) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: bytes::Bytes::from_static(br#"{"code":"X","details":"Something broke"}"#),
        }
    }

    #[test]
    fn test_classify() {
        assert!(matches!(
            classify(Exchange::Answered(response(200))),
            Ok(Attempt::Complete(_))
        ));
        assert!(matches!(
            classify(Exchange::Answered(response(302))),
            Ok(Attempt::Complete(_))
        ));
        assert!(matches!(
            classify(Exchange::Answered(response(429))),
            Ok(Attempt::Retry(RetryReason::RateLimited))
        ));
        assert!(matches!(
            classify(Exchange::Answered(response(401))),
            Ok(Attempt::Retry(RetryReason::Unauthorized))
        ));
        assert!(matches!(
            classify(Exchange::Failed(TransportError::Connection {
                message: "refused".to_string()
            })),
            Ok(Attempt::Retry(RetryReason::Network(_)))
        ));

        match classify(Exchange::Answered(response(422))) {
            Err(AdvertisingError::Http { status, details, .. }) => {
                assert_eq!(status, 422);
                assert_eq!(details.as_deref(), Some("Something broke"));
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_call_builds_url_and_decodes() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::raw_json(r#"[{"campaignId":9007199254740993}]"#));
        let requester = requester(&transport, 3);

        let value = requester
            .call(HttpMethod::Get, "v2/sp/campaigns", Some("stateFilter=enabled"), None)
            .await
            .unwrap();

        assert_eq!(value[0]["campaignId"].as_u64(), Some(9_007_199_254_740_993));
        let request = transport.last_request().unwrap();
        assert_eq!(
            request.url,
            "https://advertising-api.amazon.com/v2/sp/campaigns?stateFilter=enabled"
        );
        assert_eq!(request.header("authorization"), Some("Bearer Atza|initial"));
        assert!(request.body.is_none());
    }

    #[tokio::test]
    async fn test_call_serializes_body() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&json!([{"code": "SUCCESS", "keywordId": 1}]));
        let requester = requester(&transport, 3);

        requester
            .call(
                HttpMethod::Post,
                "v2/sp/keywords",
                None,
                Some(&json!([{"keywordId": 9_007_199_254_740_993_u64}])),
            )
            .await
            .unwrap();

        assert_eq!(
            transport.last_request().unwrap().body_text().as_deref(),
            Some(r#"[{"keywordId":9007199254740993}]"#)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_retries_server_errors() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::error(500, "Internal"));
        transport.queue(MockResponse::error(429, "Throttled"));
        transport.queue_json(&json!({"profileId": 1}));
        let requester = requester(&transport, 5);

        let value = requester.call(HttpMethod::Get, "v2/profiles/1", None, None).await.unwrap();

        assert_eq!(value, json!({"profileId": 1}));
        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].at - requests[0].at, Duration::from_millis(200));
        assert_eq!(requests[2].at - requests[1].at, Duration::from_millis(400));
        assert_eq!(transport.token_request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_refreshes_on_unauthorized() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::error(401, "Unauthorized"));
        transport.queue_token("Atza|renewed");
        transport.queue_json(&json!([]));
        let requester = requester(&transport, 5);

        requester.call(HttpMethod::Get, "v2/profiles", None, None).await.unwrap();

        assert_eq!(transport.token_request_count(), 1);
        let api = transport.api_requests();
        assert_eq!(api[0].header("authorization"), Some("Bearer Atza|initial"));
        assert_eq!(api[1].header("authorization"), Some("Bearer Atza|renewed"));
    }

    #[tokio::test]
    async fn test_call_fatal_status() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::error(400, "Invalid targeting clause"));
        let requester = requester(&transport, 5);

        let err = requester.call(HttpMethod::Put, "v2/sp/targets", None, Some(&json!([]))).await.unwrap_err();

        assert_eq!(err.to_string(), "HTTP 400: Invalid targeting clause");
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_retries_from_original_location() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::redirect("https://storage.example.com/r1.json.gz"));
        transport.queue(MockResponse::error(500, "storage hiccup"));
        transport.queue(MockResponse::redirect("https://storage.example.com/r1.json.gz"));
        transport.queue(MockResponse::status(200).with_body(codec::gzip(b"[{\"clicks\":3}]").unwrap()));
        let requester = requester(&transport, 3);

        let artifact = requester
            .download("https://advertising-api.amazon.com/v2/reports/r1/download", true)
            .await
            .unwrap();

        assert_eq!(artifact, Artifact::Json(json!([{"clicks": 3}])));
        let requests = transport.requests();
        assert_eq!(requests.len(), 4);
        assert!(requests[2].header("authorization").is_some());
        assert!(requests[3].header("authorization").is_none());
    }
}
