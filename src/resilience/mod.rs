//! Resilience layer for the Amazon Advertising client.
//!
//! Deterministic exponential backoff over the failures the Advertising API
//! expects callers to retry: network errors, throttling (429), transient
//! server errors (500) and expired tokens (401).

mod retry;

pub use retry::{Attempt, Reauthenticate, RetryConfig, RetryPolicy, RetryReason, BASE_DELAY};

use async_trait::async_trait;

use crate::auth::TokenStore;
use crate::errors::AdvertisingResult;

#[async_trait]
impl Reauthenticate for TokenStore {
    async fn reauthenticate(&self) -> AdvertisingResult<()> {
        self.refresh().await.map(|_| ())
    }
}
