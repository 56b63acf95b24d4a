//! Streaming one item from the media source into its destination file.

use super::{ActiveSlot, lock_slot};
use crate::error::DownloadError;
use crate::media::{MediaSource, TransferEvent};
use crate::types::{DownloadEvent, DownloadState, MediaItem};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Everything one transfer task needs.
pub(super) struct TransferContext {
    pub(super) task_id: u64,
    pub(super) item: MediaItem,
    pub(super) destination: PathBuf,
    pub(super) source: Arc<dyn MediaSource>,
    pub(super) active: ActiveSlot,
    pub(super) events: mpsc::Sender<DownloadEvent>,
    pub(super) cancel_token: CancellationToken,
}

impl TransferContext {
    fn update_slot(&self, state: DownloadState, progress: Option<f32>) {
        let mut slot = lock_slot(&self.active);
        if let Some(active) = slot.as_mut().filter(|a| a.task_id == self.task_id) {
            active.task.state = state;
            if let Some(progress) = progress {
                active.task.progress = progress;
            }
        }
    }

    /// Task-private file the source writes into until the transfer succeeds
    fn partial_path(&self) -> PathBuf {
        let name = self
            .destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "download".to_string());
        self.destination
            .with_file_name(format!(".{name}.{}.part", self.task_id))
    }

    fn release_slot(&self) {
        let mut slot = lock_slot(&self.active);
        if slot.as_ref().is_some_and(|a| a.task_id == self.task_id) {
            *slot = None;
        }
    }
}

/// Runs one download task to its single terminal event.
///
/// Phases:
/// 1. Stream from the source into a task-private partial file, racing the
///    cancellation token
/// 2. Move the partial file onto the destination on success, remove it otherwise
/// 3. Free the slot, then deliver the terminal event
///
/// A file already at the destination is only replaced by a completed
/// transfer, never removed.
pub(super) async fn run_transfer(ctx: TransferContext) {
    let partial = ctx.partial_path();

    let streamed = tokio::select! {
        biased;
        _ = ctx.cancel_token.cancelled() => DownloadEvent::Cancelled,
        event = stream_item(&ctx, &partial) => event,
    };

    let terminal = match streamed {
        DownloadEvent::Succeeded { path } => publish(&path, &ctx.destination).await,
        other => other,
    };

    let final_state = match &terminal {
        DownloadEvent::Succeeded { path } => {
            tracing::info!(task_id = ctx.task_id, path = %path.display(), "Download complete");
            DownloadState::Succeeded
        }
        DownloadEvent::Failed { error } => {
            tracing::warn!(task_id = ctx.task_id, item = %ctx.item.name, error = %error, "Download failed");
            DownloadState::Failed
        }
        DownloadEvent::Cancelled => {
            tracing::info!(task_id = ctx.task_id, item = %ctx.item.name, "Download cancelled");
            DownloadState::Cancelled
        }
        DownloadEvent::Progress { .. } => DownloadState::Failed,
    };

    if final_state != DownloadState::Succeeded {
        remove_partial(&partial).await;
    }

    ctx.update_slot(final_state, None);
    ctx.release_slot();

    // Receiver gone means nobody is waiting for the result
    let _ = ctx.events.send(terminal).await;
}

/// Streams the item into `partial`, forwarding progress, and returns the terminal event.
async fn stream_item(ctx: &TransferContext, partial: &Path) -> DownloadEvent {
    if let Some(parent) = partial.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            return DownloadEvent::Failed {
                error: DownloadError::Destination {
                    path: parent.to_path_buf(),
                    reason: e.to_string(),
                }
                .to_string(),
            };
        }
    }

    let mut stream = match ctx.source.download(&ctx.item, 0, partial).await {
        Ok(stream) => stream,
        Err(e) => {
            return DownloadEvent::Failed {
                error: e.to_string(),
            };
        }
    };

    let mut last_fraction = 0.0f32;
    while let Some(event) = stream.next().await {
        match event {
            TransferEvent::Progress { current, total } => {
                let fraction = progress_fraction(current, total).max(last_fraction);
                if fraction > last_fraction {
                    last_fraction = fraction;
                    ctx.update_slot(DownloadState::InProgress, Some(fraction));
                    let _ = ctx.events.send(DownloadEvent::Progress { fraction }).await;
                }
            }
            TransferEvent::Completed { path } => {
                if last_fraction < 1.0 {
                    ctx.update_slot(DownloadState::InProgress, Some(1.0));
                    let _ = ctx
                        .events
                        .send(DownloadEvent::Progress { fraction: 1.0 })
                        .await;
                }
                return DownloadEvent::Succeeded { path };
            }
            TransferEvent::Failed { error } => return DownloadEvent::Failed { error },
        }
    }

    DownloadEvent::Failed {
        error: "transfer ended without completion".to_string(),
    }
}

/// Fraction of `total` reached by `current`, clamped to [0, 1]; 0 when `total` is unknown.
pub(super) fn progress_fraction(current: u64, total: u64) -> f32 {
    if total == 0 {
        return 0.0;
    }
    (current as f64 / total as f64).clamp(0.0, 1.0) as f32
}

/// Move a completed transfer onto its destination
async fn publish(completed: &Path, destination: &Path) -> DownloadEvent {
    match tokio::fs::rename(completed, destination).await {
        Ok(()) => DownloadEvent::Succeeded {
            path: destination.to_path_buf(),
        },
        Err(e) => DownloadEvent::Failed {
            error: DownloadError::Destination {
                path: destination.to_path_buf(),
                reason: e.to_string(),
            }
            .to_string(),
        },
    }
}

async fn remove_partial(partial: &Path) {
    match tokio::fs::remove_file(partial).await {
        Ok(()) => {
            tracing::debug!(path = %partial.display(), "Removed partial download");
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %partial.display(), error = %e, "Failed to remove partial download");
        }
    }
}
