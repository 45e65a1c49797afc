//! Periodic background token refresh.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::TokenStore;

/// Handle to the background task that keeps the access token fresh.
///
/// The task refreshes every `interval`, logging failures and carrying on.
/// It stops when [`shutdown`](Self::shutdown) is called or the handle is
/// dropped.
pub struct TokenRefresher {
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
    interval: Duration,
}

impl TokenRefresher {
    /// Spawns the refresh task on the current tokio runtime.
    pub fn spawn(tokens: Arc<TokenStore>, interval: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Token refresher shutdown requested");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = tokens.refresh().await {
                            warn!(error = %e, "Background token refresh failed");
                        }
                    }
                }
            }
        });

        info!(interval = ?interval, "Started background token refresh");

        Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
            interval,
        }
    }

    /// Refresh interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true while the task is running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Stops the task and waits for it to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TokenRefresher {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
