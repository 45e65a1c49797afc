//! Structured logging for the client.
//!
//! Every pipeline stage emits `tracing` events and spans; this module only
//! installs a subscriber for applications that do not bring their own.
//!
//! ```rust,no_run
//! use integrations_amazon_advertising::observability::{LogFormat, LogLevel, LoggingConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! LoggingConfig::new()
//!     .with_level(LogLevel::Debug)
//!     .with_format(LogFormat::Json)
//!     .init()?;
//! # Ok(())
//! # }
//! ```

mod logging;

pub use logging::{LogFormat, LogLevel, LoggingConfig};
