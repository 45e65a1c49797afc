//! Report and snapshot job types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of asynchronous export job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobKind {
    /// A performance report (`v2/{campaignType}/{recordType}/report`).
    Report {
        /// Campaign type, e.g. `sp` or `hsa`.
        campaign_type: String,
    },
    /// An entity snapshot (`v2/{campaignType}/{recordType}/snapshot`).
    Snapshot {
        /// Campaign type, e.g. `sp`.
        campaign_type: String,
    },
}

impl JobKind {
    /// Creates a report job kind.
    pub fn report(campaign_type: impl Into<String>) -> Self {
        JobKind::Report {
            campaign_type: campaign_type.into(),
        }
    }

    /// Creates a snapshot job kind.
    pub fn snapshot(campaign_type: impl Into<String>) -> Self {
        JobKind::Snapshot {
            campaign_type: campaign_type.into(),
        }
    }

    /// Returns the campaign type the job was requested for.
    pub fn campaign_type(&self) -> &str {
        match self {
            JobKind::Report { campaign_type } | JobKind::Snapshot { campaign_type } => {
                campaign_type
            }
        }
    }

    /// Name of the id field in submission responses.
    pub fn id_field(&self) -> &'static str {
        match self {
            JobKind::Report { .. } => "reportId",
            JobKind::Snapshot { .. } => "snapshotId",
        }
    }

    /// Report files are gzipped JSON regardless of the content type the
    /// storage host announces; snapshots follow their content type.
    pub fn always_json(&self) -> bool {
        matches!(self, JobKind::Report { .. })
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Report { campaign_type } => write!(f, "{campaign_type} report"),
            JobKind::Snapshot { campaign_type } => write!(f, "{campaign_type} snapshot"),
        }
    }
}

/// Handle to a submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    /// Job kind.
    pub kind: JobKind,
    /// Report or snapshot id assigned by the API.
    pub id: String,
}

impl JobHandle {
    /// Creates a handle for an already known job id.
    pub fn new(kind: JobKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

/// Status of an asynchronous job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Still being generated.
    InProgress,
    /// Ready for download.
    Success,
    /// Generation failed.
    Failure,
    /// The API reported an error for the job.
    Error,
    /// Any status string this client does not know; treated as in progress.
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// Returns true once the job will not change status again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failure | JobStatus::Error)
    }

    /// Returns true for the failed terminal statuses.
    pub fn is_failed(self) -> bool {
        matches!(self, JobStatus::Failure | JobStatus::Error)
    }

    /// Wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Success => "SUCCESS",
            JobStatus::Failure => "FAILURE",
            JobStatus::Error => "ERROR",
            JobStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status document returned by the report and snapshot status endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobState {
    /// Current status.
    pub status: JobStatus,
    /// Human readable status details.
    #[serde(default)]
    pub status_details: Option<String>,
    /// Download location, present once the job succeeded.
    #[serde(default)]
    pub location: Option<String>,
    /// Size of the artifact in bytes.
    #[serde(default)]
    pub file_size: Option<u64>,
}
