//! OAuth2 token management for the Advertising API.
//!
//! [`TokenStore`] owns the client credentials and the current access token.
//! Refreshes are single-flight: concurrent callers wait for the refresh in
//! progress and share its result instead of hitting the token endpoint again.

mod refresher;

pub use refresher::TokenRefresher;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument};

use crate::config::AdvertisingConfig;
use crate::errors::{AdvertisingError, AdvertisingResult};
use crate::transport::{HttpRequest, HttpTransport};

/// Content type of the refresh-token grant.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded;charset=UTF-8";

/// Access token with metadata.
#[derive(Clone)]
pub struct AccessToken {
    /// The token string.
    pub token: SecretString,
    /// Token type as reported by the token endpoint.
    pub token_type: String,
    /// When the token was obtained.
    pub obtained_at: DateTime<Utc>,
    /// Expiration time, if the endpoint reported one.
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// Creates a token that does not expire on its own.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::new(token.into()),
            token_type: "bearer".to_string(),
            obtained_at: Utc::now(),
            expires_at: None,
        }
    }

    /// Sets the lifetime reported by the token endpoint.
    pub fn with_expires_in(mut self, seconds: i64) -> Self {
        self.expires_at = Some(self.obtained_at + ChronoDuration::seconds(seconds));
        self
    }

    /// Checks if the token is expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|expires_at| Utc::now() >= expires_at)
    }

    /// Returns the secret token value.
    pub fn secret(&self) -> &str {
        self.token.expose_secret()
    }

    /// Returns the `Authorization` header value.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("obtained_at", &self.obtained_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<i64>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Holds credentials and the current access token.
pub struct TokenStore {
    client_id: String,
    client_secret: SecretString,
    refresh_token: Option<SecretString>,
    token_url: String,
    timeout: Duration,
    transport: Arc<dyn HttpTransport>,
    access_token: RwLock<Option<AccessToken>>,
    refresh_lock: Mutex<()>,
    generation: AtomicU64,
}

impl TokenStore {
    /// Creates a token store from the client configuration.
    pub fn new(config: &AdvertisingConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let initial = config
            .access_token
            .as_ref()
            .map(|token| AccessToken::new(token.expose_secret().to_string()));

        Self {
            client_id: config.client_id.clone(),
            client_secret: SecretString::new(config.client_secret().to_string()),
            refresh_token: config.refresh_token.clone(),
            token_url: config.endpoint.token_url().to_string(),
            timeout: config.timeout,
            transport,
            access_token: RwLock::new(initial),
            refresh_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Returns the current access token.
    pub async fn access_token(&self) -> AdvertisingResult<AccessToken> {
        self.access_token
            .read()
            .await
            .clone()
            .ok_or_else(|| AdvertisingError::auth("No access token; call init() or refresh() first"))
    }

    /// Returns a usable token, refreshing first when none is held or the held
    /// token has expired and a refresh token is available.
    pub async fn current_or_refresh(&self) -> AdvertisingResult<AccessToken> {
        let current = self.access_token.read().await.clone();
        match current {
            Some(token) if !token.is_expired() || self.refresh_token.is_none() => Ok(token),
            _ => self.refresh().await,
        }
    }

    /// Number of refreshes completed so far.
    pub fn refresh_count(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Exchanges the refresh token for a new access token.
    ///
    /// If another refresh is already running, waits for it and returns the
    /// token it produced.
    #[instrument(skip(self), fields(token_url = %self.token_url))]
    pub async fn refresh(&self) -> AdvertisingResult<AccessToken> {
        let refresh_token = self
            .refresh_token
            .as_ref()
            .ok_or_else(|| AdvertisingError::auth("No refresh token"))?;

        let observed = self.generation.load(Ordering::Acquire);
        let _guard = self.refresh_lock.lock().await;

        if self.generation.load(Ordering::Acquire) != observed {
            if let Some(token) = self.access_token.read().await.clone() {
                debug!("Reusing token from concurrent refresh");
                return Ok(token);
            }
        }

        let token = self.exchange(refresh_token).await?;
        *self.access_token.write().await = Some(token.clone());
        self.generation.fetch_add(1, Ordering::AcqRel);
        debug!(expires_at = ?token.expires_at, "Access token refreshed");

        Ok(token)
    }

    async fn exchange(&self, refresh_token: &SecretString) -> AdvertisingResult<AccessToken> {
        let form = serde_urlencoded::to_string(&[
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("refresh_token", refresh_token.expose_secret()),
        ])
        .map_err(|e| AdvertisingError::auth(format!("Failed to encode token request: {e}")))?;

        let request = HttpRequest::post(self.token_url.clone())
            .with_header("Content-Type", FORM_CONTENT_TYPE)
            .with_header("Accept", "application/json")
            .with_body(form.into_bytes())
            .with_timeout(self.timeout);

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| AdvertisingError::auth(format!("Token endpoint unreachable: {e}")))?;

        let parsed: Option<TokenResponse> = serde_json::from_slice(&response.body).ok();

        if let Some(body) = &parsed {
            if body.error.is_some() || !response.is_success() {
                return Err(AdvertisingError::auth(describe_failure(body, response.status)));
            }
        } else if !response.is_success() {
            return Err(AdvertisingError::auth(format!(
                "Token endpoint returned HTTP {}",
                response.status
            )));
        }

        let body = parsed
            .ok_or_else(|| AdvertisingError::auth("Token endpoint returned a non-JSON body"))?;
        let access_token = body
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AdvertisingError::auth("Token response has no access_token"))?;

        let mut token = AccessToken::new(access_token);
        if let Some(token_type) = body.token_type {
            token.token_type = token_type;
        }
        if let Some(expires_in) = body.expires_in {
            token = token.with_expires_in(expires_in);
        }

        Ok(token)
    }
}

fn describe_failure(body: &TokenResponse, status: u16) -> String {
    body.error_description
        .clone()
        .or_else(|| body.error.clone())
        .unwrap_or_else(|| format!("Token endpoint returned HTTP {status}"))
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenStore")
            .field("client_id", &self.client_id)
            .field("token_url", &self.token_url)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("refresh_count", &self.refresh_count())
            .finish_non_exhaustive()
    }
}
