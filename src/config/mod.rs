//! Configuration module for the Amazon Advertising client.
//!
//! Holds OAuth2 credentials, the resolved regional endpoint, and the retry,
//! polling and refresh settings shared by the request pipeline.

mod region;

pub use region::{Endpoint, Environment, Region};

use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use crate::errors::{AdvertisingError, AdvertisingResult};

/// Default request timeout (60 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default maximum attempts per logical request.
pub const DEFAULT_MAX_RETRY: u32 = 10;

/// Default cap on a single backoff or poll wait (2 minutes).
pub const DEFAULT_MAX_WAIT_TIME: Duration = Duration::from_secs(120);

/// Default interval between job status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default interval of the background token refresh.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(120);

/// Configuration for the Amazon Advertising client.
#[derive(Clone)]
pub struct AdvertisingConfig {
    /// Login with Amazon client id.
    pub client_id: String,
    /// Login with Amazon client secret.
    pub(crate) client_secret: SecretString,
    /// Long-lived refresh token.
    pub(crate) refresh_token: Option<SecretString>,
    /// Initial access token, if one was obtained out of band.
    pub(crate) access_token: Option<SecretString>,
    /// Resolved API and token endpoints.
    pub endpoint: Endpoint,
    /// Profile id sent in the scope header.
    pub profile_id: Option<String>,
    /// Maximum attempts per logical request.
    pub max_retry: u32,
    /// Upper bound of a single backoff wait.
    pub max_wait_time: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Interval between job status polls.
    pub poll_interval: Duration,
    /// Give up polling a job after this long. `None` polls until terminal.
    pub poll_timeout: Option<Duration>,
    /// Interval of the background token refresh.
    pub refresh_interval: Duration,
}

impl AdvertisingConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> AdvertisingConfigBuilder {
        AdvertisingConfigBuilder::new()
    }

    /// Creates a configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `AMAZON_CLIENT_ID` (required)
    /// - `AMAZON_CLIENT_SECRET` (required)
    /// - `AMAZON_REFRESH_TOKEN` (optional)
    /// - `AMAZON_ACCESS_TOKEN` (optional)
    /// - `AMAZON_ADVERTISING_REGION` (optional): `na`, `eu` or `fe`
    /// - `AMAZON_ADVERTISING_SANDBOX` (optional): `true` or `1`
    /// - `AMAZON_ADVERTISING_PROFILE_ID` (optional)
    /// - `AMAZON_ADVERTISING_MAX_RETRY` (optional)
    /// - `AMAZON_ADVERTISING_MAX_WAIT_MS` (optional)
    /// - `AMAZON_ADVERTISING_TIMEOUT_SECS` (optional)
    pub fn from_env() -> AdvertisingResult<Self> {
        Self::builder().merge_env()?.build()
    }

    pub(crate) fn client_secret(&self) -> &str {
        self.client_secret.expose_secret()
    }

    /// Returns true if a refresh token is configured.
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Poll wait actually used: the poll interval, capped by `max_wait_time`.
    pub fn effective_poll_interval(&self) -> Duration {
        self.poll_interval.min(self.max_wait_time)
    }
}

impl std::fmt::Debug for AdvertisingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvertisingConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("endpoint", &self.endpoint)
            .field("profile_id", &self.profile_id)
            .field("max_retry", &self.max_retry)
            .field("max_wait_time", &self.max_wait_time)
            .field("timeout", &self.timeout)
            .field("poll_interval", &self.poll_interval)
            .field("poll_timeout", &self.poll_timeout)
            .field("refresh_interval", &self.refresh_interval)
            .finish()
    }
}

/// Builder for `AdvertisingConfig`.
#[derive(Default)]
pub struct AdvertisingConfigBuilder {
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_token: Option<String>,
    access_token: Option<String>,
    region: Option<Region>,
    environment: Option<Environment>,
    base_url: Option<String>,
    token_url: Option<String>,
    profile_id: Option<String>,
    max_retry: Option<u32>,
    max_wait_time: Option<Duration>,
    timeout: Option<Duration>,
    poll_interval: Option<Duration>,
    poll_timeout: Option<Duration>,
    refresh_interval: Option<Duration>,
}

impl AdvertisingConfigBuilder {
    /// Creates a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills unset fields from the `AMAZON_*` environment variables.
    pub fn merge_env(mut self) -> AdvertisingResult<Self> {
        fn var(name: &str) -> Option<String> {
            std::env::var(name).ok().filter(|v| !v.trim().is_empty())
        }

        fn parsed<T: std::str::FromStr>(name: &str) -> AdvertisingResult<Option<T>> {
            var(name)
                .map(|raw| {
                    raw.trim().parse::<T>().map_err(|_| {
                        AdvertisingError::configuration(format!("{name} has an invalid value: {raw}"))
                    })
                })
                .transpose()
        }

        self.client_id = self.client_id.or_else(|| var("AMAZON_CLIENT_ID"));
        self.client_secret = self.client_secret.or_else(|| var("AMAZON_CLIENT_SECRET"));
        self.refresh_token = self.refresh_token.or_else(|| var("AMAZON_REFRESH_TOKEN"));
        self.access_token = self.access_token.or_else(|| var("AMAZON_ACCESS_TOKEN"));
        self.profile_id = self.profile_id.or_else(|| var("AMAZON_ADVERTISING_PROFILE_ID"));

        if self.region.is_none() {
            self.region = parsed::<Region>("AMAZON_ADVERTISING_REGION")?;
        }

        if self.environment.is_none() {
            if let Some(flag) = var("AMAZON_ADVERTISING_SANDBOX") {
                let sandbox = matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
                self.environment = Some(if sandbox {
                    Environment::Sandbox
                } else {
                    Environment::Production
                });
            }
        }

        if self.max_retry.is_none() {
            self.max_retry = parsed::<u32>("AMAZON_ADVERTISING_MAX_RETRY")?;
        }
        if self.max_wait_time.is_none() {
            self.max_wait_time =
                parsed::<u64>("AMAZON_ADVERTISING_MAX_WAIT_MS")?.map(Duration::from_millis);
        }
        if self.timeout.is_none() {
            self.timeout = parsed::<u64>("AMAZON_ADVERTISING_TIMEOUT_SECS")?.map(Duration::from_secs);
        }

        Ok(self)
    }

    /// Sets the client id.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the client secret.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Sets the refresh token.
    pub fn refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Sets an initial access token.
    pub fn access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self
    }

    /// Sets the region.
    pub fn region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    /// Selects the sandbox environment.
    pub fn sandbox(mut self, sandbox: bool) -> Self {
        self.environment = Some(if sandbox {
            Environment::Sandbox
        } else {
            Environment::Production
        });
        self
    }

    /// Overrides the API base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Overrides the token URL.
    pub fn token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = Some(token_url.into());
        self
    }

    /// Sets the profile id sent in the scope header.
    pub fn profile_id(mut self, profile_id: impl ToString) -> Self {
        self.profile_id = Some(profile_id.to_string());
        self
    }

    /// Sets the maximum attempts per logical request.
    pub fn max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = Some(max_retry);
        self
    }

    /// Sets the cap on a single backoff wait.
    pub fn max_wait_time(mut self, max_wait_time: Duration) -> Self {
        self.max_wait_time = Some(max_wait_time);
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the job poll interval.
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = Some(poll_interval);
        self
    }

    /// Sets an upper bound on job polling.
    pub fn poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = Some(poll_timeout);
        self
    }

    /// Sets the background token refresh interval.
    pub fn refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.refresh_interval = Some(refresh_interval);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> AdvertisingResult<AdvertisingConfig> {
        let client_id = self
            .client_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| AdvertisingError::configuration("Client id is required"))?;

        let client_secret = self
            .client_secret
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| AdvertisingError::configuration("Client secret is required"))?;

        let max_retry = self.max_retry.unwrap_or(DEFAULT_MAX_RETRY);
        if max_retry == 0 {
            return Err(AdvertisingError::configuration("max_retry must be at least 1"));
        }

        let max_wait_time = self.max_wait_time.unwrap_or(DEFAULT_MAX_WAIT_TIME);
        if max_wait_time.is_zero() {
            return Err(AdvertisingError::configuration("max_wait_time must be positive"));
        }

        let poll_interval = self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL);
        if poll_interval.is_zero() {
            return Err(AdvertisingError::configuration("poll_interval must be positive"));
        }

        let refresh_interval = self.refresh_interval.unwrap_or(DEFAULT_REFRESH_INTERVAL);
        if refresh_interval.is_zero() {
            return Err(AdvertisingError::configuration("refresh_interval must be positive"));
        }

        let mut endpoint = Endpoint::resolve(
            self.region.unwrap_or_default(),
            self.environment.unwrap_or_default(),
        )?;
        if let Some(base_url) = self.base_url {
            endpoint = endpoint.with_base_url(&base_url)?;
        }
        if let Some(token_url) = self.token_url {
            endpoint = endpoint.with_token_url(&token_url)?;
        }

        if self.refresh_token.is_none() && self.access_token.is_none() {
            tracing::warn!("Neither a refresh token nor an access token is configured");
        }

        Ok(AdvertisingConfig {
            client_id,
            client_secret: SecretString::new(client_secret),
            refresh_token: self.refresh_token.map(SecretString::new),
            access_token: self.access_token.map(SecretString::new),
            endpoint,
            profile_id: self.profile_id,
            max_retry,
            max_wait_time,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            poll_interval,
            poll_timeout: self.poll_timeout,
            refresh_interval,
        })
    }
}
