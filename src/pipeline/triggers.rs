//! Trigger intake: start a run when idle, drop the trigger otherwise.

use crate::error::{Error, Result};
use crate::types::{Event, PipelineState, RunId, Trigger, TriggerOutcome};
use std::sync::atomic::Ordering;

use super::{ActiveRun, ScanPipeline};

impl ScanPipeline {
    /// Offer a trigger to the pipeline
    ///
    /// When idle, a new run starts in its own task and moves to
    /// `SourceEnabling` before this returns. While a run is active the trigger
    /// is dropped: the active run is unaffected and a
    /// [`Event::TriggerDropped`] is emitted. Must be called from within a
    /// tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShuttingDown`] once [`shutdown`](Self::shutdown) has
    /// started.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use drone_scan::*;
    /// # async fn example(pipeline: ScanPipeline) -> Result<()> {
    /// match pipeline.trigger(Trigger::UsbAttached)? {
    ///     TriggerOutcome::Started(run_id) => println!("run {run_id} started"),
    ///     TriggerOutcome::Dropped { active, .. } => println!("run {active} still busy"),
    /// }
    /// let report = pipeline.wait_idle().await;
    /// # Ok(())
    /// # }
    /// ```
    pub fn trigger(&self, trigger: Trigger) -> Result<TriggerOutcome> {
        if !self.runs.accepting.load(Ordering::SeqCst) {
            tracing::debug!(trigger = %trigger, "Rejecting trigger during shutdown");
            return Err(Error::ShuttingDown);
        }

        let mut slot = self.lock_slot();

        if let Some(active) = slot.current.as_ref() {
            let (active_id, state) = (active.run_id, active.state);
            drop(slot);
            tracing::info!(
                trigger = %trigger,
                active = %active_id,
                state = %state,
                "Run already active, dropping trigger"
            );
            self.emit_event(Event::TriggerDropped {
                trigger,
                active: active_id,
                state,
            });
            return Ok(TriggerOutcome::Dropped {
                active: active_id,
                state,
            });
        }

        let run_id = RunId::new(self.runs.next_run_id.fetch_add(1, Ordering::SeqCst));
        let cancel_token = self.runs.shutdown_token.child_token();
        slot.current = Some(ActiveRun {
            run_id,
            state: PipelineState::Idle,
            cancel_token: cancel_token.clone(),
        });
        // Published before the lock drops so no waiter sees the new run as Idle
        self.transition_locked(&mut slot, run_id, PipelineState::SourceEnabling, None);
        drop(slot);

        tracing::info!(run_id = %run_id, trigger = %trigger, "Starting scan run");

        let pipeline = self.clone();
        tokio::spawn(async move {
            pipeline.execute_run(run_id, trigger, cancel_token).await;
        });

        Ok(TriggerOutcome::Started(run_id))
    }
}
