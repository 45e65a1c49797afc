//! Amazon Advertising API client.
//!
//! [`AdvertisingClient`] wires the token store, the retrying requester, the
//! resource operation table and the job poller together.

pub mod executor;
pub mod requester;

pub use executor::{Exchange, HttpExecutor, CLIENT_ID_HEADER, MAX_REDIRECTS, SCOPE_HEADER};
pub use requester::{classify, RetryingRequester};

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::auth::{TokenRefresher, TokenStore};
use crate::config::{AdvertisingConfig, AdvertisingConfigBuilder, Region};
use crate::errors::{AdvertisingError, AdvertisingResult};
use crate::jobs::{JobPoller, PollConfig};
use crate::resilience::{RetryConfig, RetryPolicy};
use crate::services::ResourceService;
use crate::transport::{HttpTransport, ReqwestTransport};
use crate::types::{Artifact, JobHandle, JobKind};

/// The main Amazon Advertising client.
///
/// # Example
///
/// ```rust,no_run
/// use integrations_amazon_advertising::{AdvertisingClient, Region};
/// use serde_json::json;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = AdvertisingClient::builder()
///         .client_id("amzn1.application-oa2-client.xxx")
///         .client_secret("secret")
///         .refresh_token("Atzr|xxx")
///         .region(Region::Na)
///         .profile_id("1234567890")
///         .build()?;
///
///     client.init().await?;
///
///     let campaigns = client
///         .invoke("list_campaigns", &[], Some(&json!({"stateFilter": "enabled"})), None)
///         .await?;
///     println!("{campaigns}");
///
///     client.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct AdvertisingClient {
    config: AdvertisingConfig,
    tokens: Arc<TokenStore>,
    requester: Arc<RetryingRequester>,
    resources: ResourceService,
    jobs: JobPoller,
    refresher: Mutex<Option<TokenRefresher>>,
}

impl AdvertisingClient {
    /// Creates a new client builder.
    pub fn builder() -> AdvertisingClientBuilder {
        AdvertisingClientBuilder::new()
    }

    /// Creates a client from environment variables.
    ///
    /// See [`AdvertisingConfig::from_env`] for the variables read.
    pub fn from_env() -> AdvertisingResult<Self> {
        AdvertisingClientBuilder::from_config(AdvertisingConfig::from_env()?).build()
    }

    /// Creates a client over the default reqwest transport.
    pub fn new(config: AdvertisingConfig) -> AdvertisingResult<Self> {
        AdvertisingClientBuilder::from_config(config).build()
    }

    /// Obtains a fresh access token and starts the background refresh.
    ///
    /// Without a refresh token the configured access token is used as is and
    /// no background task is started.
    #[instrument(skip(self))]
    pub async fn init(&self) -> AdvertisingResult<()> {
        if !self.config.has_refresh_token() {
            self.tokens.access_token().await?;
            warn!("No refresh token configured, background refresh disabled");
            return Ok(());
        }

        self.tokens.refresh().await?;

        let mut refresher = self.refresher.lock().await;
        if refresher.as_ref().map_or(true, |r| !r.is_running()) {
            *refresher = Some(TokenRefresher::spawn(
                Arc::clone(&self.tokens),
                self.config.refresh_interval,
            ));
        }

        info!("Advertising client initialized");
        Ok(())
    }

    /// Stops the background token refresh, if running.
    pub async fn shutdown(&self) {
        let refresher = self.refresher.lock().await.take();
        if let Some(refresher) = refresher {
            refresher.shutdown().await;
            info!("Background token refresh stopped");
        }
    }

    /// Returns true while the background refresh task is running.
    pub async fn is_refreshing(&self) -> bool {
        self.refresher
            .lock()
            .await
            .as_ref()
            .is_some_and(TokenRefresher::is_running)
    }

    /// Invokes a resource operation by name.
    ///
    /// See [`OPERATIONS`](crate::services::OPERATIONS) for the available names.
    pub async fn invoke(
        &self,
        name: &str,
        path_params: &[(&str, &str)],
        query: Option<&Value>,
        body: Option<&Value>,
    ) -> AdvertisingResult<Value> {
        self.resources.invoke(name, path_params, query, body).await
    }

    /// Registers a sandbox profile for the configured region.
    pub async fn register(&self) -> AdvertisingResult<Value> {
        let body = json!({ "countryCode": self.region().as_str() });
        self.invoke("register", &[], None, Some(&body)).await
    }

    /// Lists the profiles the credentials have access to.
    pub async fn list_profiles(&self) -> AdvertisingResult<Value> {
        self.invoke("list_profiles", &[], None, None).await
    }

    /// Requests a report of `record_type` (e.g. `keywords`) for `campaign_type`.
    pub async fn request_report(
        &self,
        campaign_type: &str,
        record_type: &str,
        payload: &Value,
    ) -> AdvertisingResult<JobHandle> {
        self.jobs
            .submit(JobKind::report(campaign_type), record_type, payload)
            .await
    }

    /// Waits for a report and downloads it.
    pub async fn get_report(&self, report_id: &str) -> AdvertisingResult<Artifact> {
        let handle = JobHandle::new(JobKind::report("sp"), report_id);
        self.jobs.await_result(&handle).await
    }

    /// Requests a snapshot of `record_type` for `campaign_type`.
    pub async fn request_snapshot(
        &self,
        campaign_type: &str,
        record_type: &str,
        payload: &Value,
    ) -> AdvertisingResult<JobHandle> {
        self.jobs
            .submit(JobKind::snapshot(campaign_type), record_type, payload)
            .await
    }

    /// Waits for a snapshot and downloads it.
    pub async fn get_snapshot(
        &self,
        campaign_type: &str,
        snapshot_id: &str,
    ) -> AdvertisingResult<Artifact> {
        let handle = JobHandle::new(JobKind::snapshot(campaign_type), snapshot_id);
        self.jobs.await_result(&handle).await
    }

    /// Returns the resource service.
    pub fn resources(&self) -> &ResourceService {
        &self.resources
    }

    /// Returns the job poller.
    pub fn jobs(&self) -> &JobPoller {
        &self.jobs
    }

    /// Returns the token store.
    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// Returns the requester shared by services and jobs.
    pub fn requester(&self) -> &Arc<RetryingRequester> {
        &self.requester
    }

    /// Returns the configuration.
    pub fn config(&self) -> &AdvertisingConfig {
        &self.config
    }

    /// Region the client talks to.
    pub fn region(&self) -> Region {
        self.config.endpoint.region()
    }
}

impl std::fmt::Debug for AdvertisingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvertisingClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`AdvertisingClient`].
pub struct AdvertisingClientBuilder {
    config_builder: Option<AdvertisingConfigBuilder>,
    config: Option<AdvertisingConfig>,
    transport: Option<Arc<dyn HttpTransport>>,
    setter_after_config: bool,
}

impl AdvertisingClientBuilder {
    /// Creates a new client builder.
    pub fn new() -> Self {
        Self {
            config_builder: Some(AdvertisingConfigBuilder::new()),
            config: None,
            transport: None,
            setter_after_config: false,
        }
    }

    /// Creates a builder from a finished configuration.
    ///
    /// Only [`transport`](Self::transport) may be set afterwards; any
    /// configuration setter makes [`build`](Self::build) fail.
    pub fn from_config(config: AdvertisingConfig) -> Self {
        Self {
            config_builder: None,
            config: Some(config),
            transport: None,
            setter_after_config: false,
        }
    }

    fn with_config(mut self, f: impl FnOnce(AdvertisingConfigBuilder) -> AdvertisingConfigBuilder) -> Self {
        match self.config_builder.take() {
            Some(builder) => self.config_builder = Some(f(builder)),
            None => self.setter_after_config = true,
        }
        self
    }

    /// Sets the client id.
    pub fn client_id(self, client_id: impl Into<String>) -> Self {
        self.with_config(|b| b.client_id(client_id))
    }

    /// Sets the client secret.
    pub fn client_secret(self, client_secret: impl Into<String>) -> Self {
        self.with_config(|b| b.client_secret(client_secret))
    }

    /// Sets the refresh token.
    pub fn refresh_token(self, refresh_token: impl Into<String>) -> Self {
        self.with_config(|b| b.refresh_token(refresh_token))
    }

    /// Sets an initial access token.
    pub fn access_token(self, access_token: impl Into<String>) -> Self {
        self.with_config(|b| b.access_token(access_token))
    }

    /// Sets the region.
    pub fn region(self, region: Region) -> Self {
        self.with_config(|b| b.region(region))
    }

    /// Uses the sandbox environment.
    pub fn sandbox(self, sandbox: bool) -> Self {
        self.with_config(|b| b.sandbox(sandbox))
    }

    /// Overrides the API base URL.
    pub fn base_url(self, base_url: impl Into<String>) -> Self {
        self.with_config(|b| b.base_url(base_url))
    }

    /// Overrides the token URL.
    pub fn token_url(self, token_url: impl Into<String>) -> Self {
        self.with_config(|b| b.token_url(token_url))
    }

    /// Sets the profile id sent in the scope header.
    pub fn profile_id(self, profile_id: impl ToString) -> Self {
        self.with_config(|b| b.profile_id(profile_id))
    }

    /// Sets the maximum attempts per request.
    pub fn max_retry(self, max_retry: u32) -> Self {
        self.with_config(|b| b.max_retry(max_retry))
    }

    /// Sets the upper bound of a single backoff wait.
    pub fn max_wait_time(self, max_wait_time: Duration) -> Self {
        self.with_config(|b| b.max_wait_time(max_wait_time))
    }

    /// Sets the request timeout.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.with_config(|b| b.timeout(timeout))
    }

    /// Sets the job poll interval.
    pub fn poll_interval(self, poll_interval: Duration) -> Self {
        self.with_config(|b| b.poll_interval(poll_interval))
    }

    /// Sets the job poll deadline.
    pub fn poll_timeout(self, poll_timeout: Duration) -> Self {
        self.with_config(|b| b.poll_timeout(poll_timeout))
    }

    /// Sets the background refresh interval.
    pub fn refresh_interval(self, refresh_interval: Duration) -> Self {
        self.with_config(|b| b.refresh_interval(refresh_interval))
    }

    /// Fills unset settings from the environment.
    pub fn merge_env(mut self) -> AdvertisingResult<Self> {
        match self.config_builder.take() {
            Some(builder) => self.config_builder = Some(builder.merge_env()?),
            None => self.setter_after_config = true,
        }
        Ok(self)
    }

    /// Sets a custom transport.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the client.
    pub fn build(self) -> AdvertisingResult<AdvertisingClient> {
        if self.setter_after_config {
            return Err(AdvertisingError::configuration(
                "Configuration setters cannot be used on a builder created from a finished config",
            ));
        }

        let config = match (self.config, self.config_builder) {
            (Some(config), _) => config,
            (None, Some(builder)) => builder.build()?,
            (None, None) => return Err(AdvertisingError::configuration("Missing configuration")),
        };

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(t) => t,
            None => Arc::new(ReqwestTransport::new(config.timeout).map_err(|e| {
                AdvertisingError::Configuration {
                    message: e.to_string(),
                }
            })?),
        };

        let tokens = Arc::new(TokenStore::new(&config, Arc::clone(&transport)));
        let requester = Arc::new(RetryingRequester::new(
            config.endpoint.clone(),
            HttpExecutor::new(&config, Arc::clone(&transport)),
            Arc::clone(&tokens),
            RetryPolicy::new(RetryConfig::new(config.max_retry, config.max_wait_time)),
        ));
        let resources = ResourceService::new(Arc::clone(&requester));
        let jobs = JobPoller::new(Arc::clone(&requester), PollConfig::from(&config));

        Ok(AdvertisingClient {
            config,
            tokens,
            requester,
            resources,
            jobs,
            refresher: Mutex::new(None),
        })
    }
}

impl Default for AdvertisingClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockTransport;
    use pretty_assertions::assert_eq;

    fn client(transport: &Arc<MockTransport>) -> AdvertisingClient {
        AdvertisingClient::builder()
            .client_id("client-id")
            .client_secret("secret")
            .refresh_token("Atzr|refresh")
            .profile_id(42)
            .region(Region::Eu)
            .transport(transport.clone())
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_credentials() {
        let err = AdvertisingClient::builder()
            .transport(Arc::new(MockTransport::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, AdvertisingError::Configuration { .. }));
    }

    #[test]
    fn test_setters_after_from_config_are_rejected() {
        let config = AdvertisingConfig::builder()
            .client_id("client-id")
            .client_secret("secret")
            .refresh_token("Atzr|refresh")
            .build()
            .unwrap();
        let transport: Arc<dyn HttpTransport> = Arc::new(MockTransport::new());

        let client = AdvertisingClientBuilder::from_config(config.clone())
            .transport(transport.clone())
            .build()
            .unwrap();
        assert_eq!(client.config().max_retry, config.max_retry);

        let err = AdvertisingClientBuilder::from_config(config)
            .max_retry(3)
            .transport(transport)
            .build()
            .unwrap_err();
        assert!(matches!(err, AdvertisingError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_init_refreshes_and_starts_refresher() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_token("Atza|fresh");
        let client = client(&transport);

        client.init().await.unwrap();

        assert!(client.is_refreshing().await);
        assert_eq!(client.tokens().access_token().await.unwrap().secret(), "Atza|fresh");
        let request = transport.last_request().unwrap();
        assert_eq!(request.url, "https://api.amazon.co.uk/auth/o2/token");

        client.shutdown().await;
        assert!(!client.is_refreshing().await);
    }

    #[tokio::test]
    async fn test_init_without_refresh_token_uses_access_token() {
        let transport = Arc::new(MockTransport::new());
        let client = AdvertisingClient::builder()
            .client_id("client-id")
            .client_secret("secret")
            .access_token("Atza|static")
            .transport(transport.clone())
            .build()
            .unwrap();

        client.init().await.unwrap();

        assert!(!client.is_refreshing().await);
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_init_without_any_token_fails() {
        let client = AdvertisingClient::builder()
            .client_id("client-id")
            .client_secret("secret")
            .transport(Arc::new(MockTransport::new()))
            .build()
            .unwrap();

        assert!(client.init().await.unwrap_err().is_auth());
    }

    #[tokio::test]
    async fn test_register_sends_region() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_token("Atza|fresh");
        transport.queue_json(&json!({"code": "SUCCESS"}));
        let client = client(&transport);
        client.init().await.unwrap();

        client.register().await.unwrap();

        let request = transport.last_request().unwrap();
        assert_eq!(request.url, "https://advertising-api-eu.amazon.com/profiles/register");
        assert_eq!(request.body_json(), Some(json!({"countryCode": "eu"})));
        assert_eq!(request.header(SCOPE_HEADER), Some("42"));
        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_invoke_unknown_operation() {
        let transport = Arc::new(MockTransport::new());
        let client = client(&transport);

        let err = client.invoke("launch_rocket", &[], None, None).await.unwrap_err();
        assert!(matches!(err, AdvertisingError::Validation { .. }));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_get_report_rejects_empty_id() {
        let transport = Arc::new(MockTransport::new());
        let client = client(&transport);

        let err = client.get_report("").await.unwrap_err();
        assert!(matches!(err, AdvertisingError::Validation { .. }));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_list_profiles() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_token("Atza|lazy");
        transport.queue_json(&json!([{"profileId": 42, "countryCode": "UK"}]));
        let client = client(&transport);

        let profiles = client.list_profiles().await.unwrap();

        assert_eq!(profiles[0]["profileId"], json!(42));
        assert_eq!(transport.token_request_count(), 1);
        assert_eq!(
            transport.last_request().unwrap().header("authorization"),
            Some("Bearer Atza|lazy")
        );
    }
}
