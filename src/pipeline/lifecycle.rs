//! Idle waiting and shutdown coordination.

use crate::error::Result;
use crate::types::{Event, PipelineState, RunReport};
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::ScanPipeline;

/// Extra time beyond the download cancel timeout for a run to wind down
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

impl ScanPipeline {
    /// Wait until no run is active
    ///
    /// Returns the report of the most recently finished run, which is the
    /// run active at the time of the call if there was one.
    pub async fn wait_idle(&self) -> Option<RunReport> {
        let mut state_rx = self.runs.state_tx.subscribe();
        // The sender lives as long as `self`, so this only ends at Idle
        let _ = state_rx
            .wait_for(|state| *state == PipelineState::Idle)
            .await;
        self.last_report()
    }

    /// Gracefully shut down the pipeline
    ///
    /// 1. Stops accepting triggers
    /// 2. Cancels the active run, if any
    /// 3. Waits for it to report (bounded by the download cancel timeout plus a grace period)
    /// 4. Emits [`Event::Shutdown`]
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.runs.accepting.store(false, Ordering::SeqCst);
        let active = self.active_run();
        self.runs.shutdown_token.cancel();

        let timeout = self.config.download.cancel_timeout + SHUTDOWN_GRACE;
        match tokio::time::timeout(timeout, self.wait_idle()).await {
            Ok(_) => match active {
                Some(run_id) => tracing::info!(run_id = %run_id, "Active run wound down"),
                None => tracing::debug!("No run was active"),
            },
            Err(_) => {
                tracing::warn!(
                    timeout_secs = timeout.as_secs(),
                    "Timeout waiting for active run, proceeding with shutdown"
                );
            }
        }

        self.emit_event(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_shutting_down(&self) -> bool {
        !self.runs.accepting.load(Ordering::SeqCst)
    }
}
