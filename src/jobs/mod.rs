//! Report and snapshot jobs.
//!
//! Reports and snapshots are generated asynchronously: a POST creates the
//! job, its status is polled until it reaches a terminal state, and the
//! finished artifact is downloaded from the returned location.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use crate::client::RetryingRequester;
use crate::config::{AdvertisingConfig, DEFAULT_POLL_INTERVAL};
use crate::errors::{AdvertisingError, AdvertisingResult};
use crate::services::operations::{
    GET_REPORT_STATUS, GET_SNAPSHOT_STATUS, REQUEST_REPORT, REQUEST_SNAPSHOT,
};
use crate::types::{Artifact, JobHandle, JobKind, JobState, JobStatus};

/// Polling settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Fixed wait between status requests.
    pub interval: Duration,
    /// Give up after this long. `None` polls until the job is terminal.
    pub timeout: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
        }
    }
}

impl From<&AdvertisingConfig> for PollConfig {
    fn from(config: &AdvertisingConfig) -> Self {
        Self {
            interval: config.effective_poll_interval(),
            timeout: config.poll_timeout,
        }
    }
}

/// Submits jobs and waits for their artifacts.
#[derive(Debug, Clone)]
pub struct JobPoller {
    requester: Arc<RetryingRequester>,
    config: PollConfig,
}

impl JobPoller {
    /// Creates a new poller.
    pub fn new(requester: Arc<RetryingRequester>, config: PollConfig) -> Self {
        Self { requester, config }
    }

    /// Polling settings.
    pub fn config(&self) -> PollConfig {
        self.config
    }

    /// Requests a report or snapshot for `record_type` (e.g. `keywords`).
    #[instrument(skip(self, kind, payload), fields(kind = %kind))]
    pub async fn submit(
        &self,
        kind: JobKind,
        record_type: &str,
        payload: &Value,
    ) -> AdvertisingResult<JobHandle> {
        let operation = match kind {
            JobKind::Report { .. } => &REQUEST_REPORT,
            JobKind::Snapshot { .. } => &REQUEST_SNAPSHOT,
        };
        let path = operation.render_path(&[
            ("campaignType", kind.campaign_type()),
            ("recordType", record_type),
        ])?;

        let response = self
            .requester
            .call(operation.method, &path, None, Some(payload))
            .await?;

        let id = match response.get(kind.id_field()) {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => {
                return Err(AdvertisingError::decode(format!(
                    "Job submission response has no {}: {response}",
                    kind.id_field()
                )))
            }
        };

        info!(job_id = %id, "Job submitted");
        Ok(JobHandle::new(kind, id))
    }

    /// Fetches the current status of a job.
    #[instrument(skip(self), fields(job_id = %handle.id))]
    pub async fn status(&self, handle: &JobHandle) -> AdvertisingResult<JobState> {
        let (operation, path) = match &handle.kind {
            JobKind::Report { .. } => (
                &GET_REPORT_STATUS,
                GET_REPORT_STATUS.render_path(&[("reportId", handle.id.as_str())])?,
            ),
            JobKind::Snapshot { campaign_type } => (
                &GET_SNAPSHOT_STATUS,
                GET_SNAPSHOT_STATUS.render_path(&[
                    ("campaignType", campaign_type.as_str()),
                    ("snapshotId", handle.id.as_str()),
                ])?,
            ),
        };

        let value = self.requester.call(operation.method, &path, None, None).await?;
        let state: JobState = serde_json::from_value(value)?;
        debug!(status = %state.status, "Polled job status");
        Ok(state)
    }

    /// Polls until the job is terminal, then downloads its artifact.
    ///
    /// FAILURE and ERROR end polling immediately with
    /// [`AdvertisingError::JobFailed`].
    #[instrument(skip(self), fields(job_id = %handle.id, kind = %handle.kind))]
    pub async fn await_result(&self, handle: &JobHandle) -> AdvertisingResult<Artifact> {
        if handle.id.trim().is_empty() {
            return Err(AdvertisingError::validation(format!(
                "No valid {} for {}",
                handle.kind.id_field(),
                handle.kind
            )));
        }

        let started = Instant::now();

        loop {
            let state = self.status(handle).await?;

            match state.status {
                JobStatus::Success => {
                    let location = state.location.ok_or_else(|| AdvertisingError::JobFailed {
                        job_id: handle.id.clone(),
                        status: JobStatus::Success,
                        details: Some("Job succeeded without a download location".to_string()),
                    })?;
                    info!(file_size = ?state.file_size, "Job finished, downloading artifact");
                    return self
                        .requester
                        .download(&location, handle.kind.always_json())
                        .await;
                }
                status if status.is_failed() => {
                    return Err(AdvertisingError::JobFailed {
                        job_id: handle.id.clone(),
                        status,
                        details: state.status_details,
                    });
                }
                _ => {}
            }

            if let Some(timeout) = self.config.timeout {
                let elapsed = started.elapsed();
                if elapsed >= timeout {
                    return Err(AdvertisingError::JobTimeout {
                        job_id: handle.id.clone(),
                        elapsed,
                    });
                }
            }

            tokio::time::sleep(self.config.interval).await;
        }
    }

    /// Submits a job and waits for its artifact.
    pub async fn run(
        &self,
        kind: JobKind,
        record_type: &str,
        payload: &Value,
    ) -> AdvertisingResult<Artifact> {
        let handle = self.submit(kind, record_type, payload).await?;
        self.await_result(&handle).await
    }
}
