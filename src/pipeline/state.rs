//! Run-token checked state transitions.

use crate::types::{Event, PipelineState, RunId, RunReport};

use super::{RunSlot, ScanPipeline};

impl ScanPipeline {
    /// Move run `run_id` to `to`
    ///
    /// Returns `false` and changes nothing when `run_id` is not the current
    /// run (a stale request) or the state machine has no such edge.
    pub(crate) fn transition(&self, run_id: RunId, to: PipelineState) -> bool {
        self.apply_transition(run_id, to, None)
    }

    /// Record `report` and return run `run_id` to `Idle`
    pub(crate) fn complete_run(&self, run_id: RunId, report: RunReport) -> bool {
        self.apply_transition(run_id, PipelineState::Idle, Some(report))
    }

    fn apply_transition(
        &self,
        run_id: RunId,
        to: PipelineState,
        report: Option<RunReport>,
    ) -> bool {
        let mut slot = self.lock_slot();
        let Some(from) = self.transition_locked(&mut slot, run_id, to, report) else {
            return false;
        };
        drop(slot);

        tracing::info!(run_id = %run_id, from = %from, to = %to, "Pipeline state changed");
        true
    }

    /// Apply a transition on an already locked slot, returning the prior state
    ///
    /// The new state is published to watchers and subscribers before the
    /// caller releases the lock, so observers see transitions in order.
    pub(super) fn transition_locked(
        &self,
        slot: &mut RunSlot,
        run_id: RunId,
        to: PipelineState,
        report: Option<RunReport>,
    ) -> Option<PipelineState> {
        let Some(run) = slot.current.as_mut() else {
            tracing::debug!(run_id = %run_id, to = %to, "Discarding stale transition, no active run");
            return None;
        };
        if run.run_id != run_id {
            tracing::debug!(
                run_id = %run_id,
                current = %run.run_id,
                to = %to,
                "Discarding stale transition"
            );
            return None;
        }

        let from = run.state;
        if !from.can_transition_to(to) {
            tracing::warn!(run_id = %run_id, from = %from, to = %to, "Rejected invalid transition");
            return None;
        }
        run.state = to;

        if to == PipelineState::Idle {
            slot.current = None;
            if report.is_some() {
                slot.last_report = report;
            }
        }

        self.runs.state_tx.send_replace(to);
        self.emit_event(Event::StateChanged { run_id, from, to });
        Some(from)
    }
}
