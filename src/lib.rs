//! Amazon Advertising API Client Library
//!
//! An async Rust client for the Amazon Advertising API. Every call goes
//! through one request pipeline that handles:
//!
//! - **OAuth2 tokens**: refresh-token grant with single-flight refresh and an
//!   optional background refresh task
//! - **Retries**: deterministic exponential backoff on network errors, 429,
//!   500 and 401 (which re-authenticates first)
//! - **Downloads**: report and snapshot artifacts with manual 307 handling
//!   that never forwards the access token to storage hosts
//! - **Decoding**: gzip bodies and exact 64-bit entity ids
//!
//! Resource endpoints (campaigns, ad groups, keywords, product ads, ...) are
//! rows of a static operation table invoked by name.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use integrations_amazon_advertising::{AdvertisingClient, Region};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AdvertisingClient::builder()
//!         .client_id("amzn1.application-oa2-client.xxx")
//!         .client_secret("secret")
//!         .refresh_token("Atzr|xxx")
//!         .region(Region::Na)
//!         .profile_id("1234567890")
//!         .build()?;
//!     client.init().await?;
//!
//!     let report = client
//!         .request_report("sp", "keywords", &json!({
//!             "reportDate": "20240101",
//!             "metrics": "impressions,clicks,cost"
//!         }))
//!         .await?;
//!     let rows = client.jobs().await_result(&report).await?;
//!     println!("{} rows", rows.record_count().unwrap_or_default());
//!
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod codec;
pub mod config;
pub mod errors;
pub mod jobs;
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
pub mod observability;
pub mod resilience;
pub mod services;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::{AdvertisingClient, AdvertisingClientBuilder};
pub use config::{AdvertisingConfig, AdvertisingConfigBuilder, Endpoint, Environment, Region};
pub use errors::{AdvertisingError, AdvertisingResult};
pub use jobs::{JobPoller, PollConfig};
pub use services::{Operation, Payload, ResourceService, OPERATIONS};
pub use types::{Artifact, EntityId, JobHandle, JobKind, JobState, JobStatus};
