//! Single-flight download control
//!
//! [`DownloadController`] owns the one download that may be in progress at a
//! time. Each started task runs in its own tokio task and reports through its
//! [`DownloadHandle`]: zero or more progress events, then exactly one terminal
//! event (`Succeeded`, `Failed`, or `Cancelled`).
//!
//! - [`transfer`] - streaming from the media source into the destination file

mod transfer;


use crate::error::{DownloadError, Result};
use crate::media::MediaSource;
use crate::types::{DownloadEvent, DownloadState, DownloadTask, MediaItem};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// The task currently holding the single download slot
#[derive(Debug)]
pub(crate) struct ActiveDownload {
    pub(crate) task_id: u64,
    pub(crate) task: DownloadTask,
    pub(crate) cancel_token: CancellationToken,
}

/// Shared slot for the single in-flight download
pub(crate) type ActiveSlot = Arc<Mutex<Option<ActiveDownload>>>;

pub(crate) fn lock_slot(slot: &ActiveSlot) -> MutexGuard<'_, Option<ActiveDownload>> {
    // A panic while holding the lock leaves plain data behind, still usable
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Manages the single in-flight download
pub struct DownloadController {
    source: Arc<dyn MediaSource>,
    active: ActiveSlot,
    next_task_id: AtomicU64,
    event_buffer: usize,
}

impl DownloadController {
    /// Create a controller downloading from `source`
    ///
    /// `event_buffer` bounds how many undelivered events a task may queue
    /// before it waits for the consumer.
    pub fn new(source: Arc<dyn MediaSource>, event_buffer: usize) -> Self {
        Self {
            source,
            active: Arc::new(Mutex::new(None)),
            next_task_id: AtomicU64::new(1),
            event_buffer: event_buffer.max(1),
        }
    }

    /// Start downloading `item` into `destination` from offset 0
    ///
    /// The task holds the slot as `InProgress` from the moment this returns.
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::AlreadyInProgress`] if another download holds
    /// the slot; that download is not affected. Every other failure is
    /// delivered as the task's `Failed` terminal event.
    pub fn start(&self, item: &MediaItem, destination: impl Into<PathBuf>) -> Result<DownloadHandle> {
        let destination = destination.into();
        let cancel_token = CancellationToken::new();
        let task_id = {
            let mut slot = lock_slot(&self.active);
            if let Some(active) = slot.as_ref() {
                tracing::warn!(
                    active = %active.task.item.name,
                    requested = %item.name,
                    "Download already in progress, refusing to start another"
                );
                return Err(DownloadError::AlreadyInProgress {
                    active: active.task.item.name.clone(),
                }
                .into());
            }

            let task_id = self.next_task_id.fetch_add(1, Ordering::SeqCst);
            *slot = Some(ActiveDownload {
                task_id,
                task: DownloadTask {
                    item: item.clone(),
                    destination: destination.clone(),
                    state: DownloadState::InProgress,
                    progress: 0.0,
                },
                cancel_token: cancel_token.clone(),
            });
            task_id
        };

        let (tx, rx) = mpsc::channel(self.event_buffer);
        tracing::info!(
            task_id,
            item = %item.name,
            destination = %destination.display(),
            "Starting download"
        );

        tokio::spawn(transfer::run_transfer(transfer::TransferContext {
            task_id,
            item: item.clone(),
            destination,
            source: self.source.clone(),
            active: self.active.clone(),
            events: tx,
            cancel_token: cancel_token.clone(),
        }));

        Ok(DownloadHandle {
            task_id,
            item: item.clone(),
            events: rx,
            cancel_token,
        })
    }

    /// Whether a download holds the slot
    pub fn is_busy(&self) -> bool {
        lock_slot(&self.active).is_some()
    }

    /// Snapshot of the in-flight task, if any
    pub fn current(&self) -> Option<DownloadTask> {
        lock_slot(&self.active).as_ref().map(|a| a.task.clone())
    }

    /// Request cancellation of the in-flight task, if any
    ///
    /// Returns whether a task was signalled. Its `Cancelled` event is still
    /// delivered through its handle.
    pub fn cancel_active(&self) -> bool {
        match lock_slot(&self.active).as_ref() {
            Some(active) => {
                active.cancel_token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Caller's end of a started download
pub struct DownloadHandle {
    task_id: u64,
    item: MediaItem,
    events: mpsc::Receiver<DownloadEvent>,
    cancel_token: CancellationToken,
}

impl DownloadHandle {
    /// Controller-assigned task number
    pub fn task_id(&self) -> u64 {
        self.task_id
    }

    /// The item being downloaded
    pub fn item(&self) -> &MediaItem {
        &self.item
    }

    /// Request cancellation; a `Cancelled` terminal event follows
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Next event in issuance order; `None` after the terminal event
    pub async fn next_event(&mut self) -> Option<DownloadEvent> {
        self.events.recv().await
    }

    /// Skip progress events and return the terminal event
    pub async fn wait_terminal(&mut self) -> DownloadEvent {
        while let Some(event) = self.next_event().await {
            if event.is_terminal() {
                return event;
            }
        }
        // Sender dropped without a terminal event, only possible if the task panicked
        DownloadEvent::Failed {
            error: "download task ended without a result".to_string(),
        }
    }
}
