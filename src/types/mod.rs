//! Type definitions for the Amazon Advertising API.
//!
//! The client treats resource payloads as JSON values; the types here cover
//! the parts the request pipeline itself interprets: entity ids, job status
//! and downloaded artifacts.

pub mod artifact;
pub mod ids;
pub mod jobs;

pub use artifact::Artifact;
pub use ids::{EntityId, ID_FIELDS};
pub use jobs::{JobHandle, JobKind, JobState, JobStatus};
