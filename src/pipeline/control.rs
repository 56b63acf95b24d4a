//! Run cancellation.

use super::ScanPipeline;

impl ScanPipeline {
    /// Cancel the active run
    ///
    /// The run cancels its download (waiting up to `download.cancel_timeout`
    /// for it to stop), disables the media source, and reports
    /// `Aborted(Cancelled)`. Returns whether a run was active.
    pub fn cancel(&self) -> bool {
        let slot = self.lock_slot();
        match slot.current.as_ref() {
            Some(run) => {
                tracing::info!(run_id = %run.run_id, state = %run.state, "Cancelling active run");
                run.cancel_token.cancel();
                true
            }
            None => {
                tracing::debug!("Cancel requested with no active run");
                false
            }
        }
    }

    /// The drone was detached; cancels the active run like [`cancel`](Self::cancel)
    pub fn usb_detached(&self) -> bool {
        tracing::info!("USB device detached");
        self.cancel()
    }
}
