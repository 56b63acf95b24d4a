//! One pipeline run: the stage sequence from source enable to finalization.
//!
//! Each stage either yields the value the next stage needs or ends the run
//! with its terminal [`RunOutcome`]. Every await on an external capability
//! races the run's cancellation token.

use crate::decode::decode_with_timeout;
use crate::error::SourceError;
use crate::selection::{Selection, select_latest_photo};
use crate::types::{
    AbortReason, DecodeResult, DownloadEvent, Event, ListingSnapshot, MediaItem, PipelineState,
    RunId, RunOutcome, RunReport, Trigger,
};
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use super::ScanPipeline;

/// A stage's value, or the outcome that ends the run
type StageResult<T> = std::result::Result<T, RunOutcome>;

/// Await `fut` unless `token` is cancelled first
async fn until_cancelled<F: Future>(token: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        output = fut => Some(output),
    }
}

fn cancelled(source_path: Option<&Path>) -> RunOutcome {
    RunOutcome::Aborted {
        reason: AbortReason::Cancelled,
        detail: None,
        source_path: source_path.map(Path::to_path_buf),
    }
}

impl ScanPipeline {
    /// Drive run `run_id` to its outcome, release the source, and report
    pub(super) async fn execute_run(
        self,
        run_id: RunId,
        trigger: Trigger,
        cancel_token: CancellationToken,
    ) {
        let outcome = self
            .run_stages(run_id, &trigger, &cancel_token)
            .await
            .unwrap_or_else(|outcome| outcome);

        self.release_source(run_id).await;
        self.finish_run(run_id, outcome);
    }

    async fn run_stages(
        &self,
        run_id: RunId,
        trigger: &Trigger,
        token: &CancellationToken,
    ) -> StageResult<RunOutcome> {
        self.enable_source(token).await?;

        self.advance(run_id, PipelineState::ListingRefreshing)?;
        let snapshot = self.fetch_listing(run_id, trigger, token).await?;

        self.advance(run_id, PipelineState::Selecting)?;
        let item = self.select_item(run_id, &snapshot)?;

        self.advance(run_id, PipelineState::Downloading)?;
        let artifact = self.download_item(run_id, &item, token).await?;

        self.advance(run_id, PipelineState::Decoding)?;
        let decoded = self.decode_artifact(&artifact, token).await?;
        if decoded.is_empty() {
            tracing::info!(run_id = %run_id, artifact = %artifact.display(), "No codes found in photo");
            return Ok(RunOutcome::ScanEmpty {
                source_path: artifact,
            });
        }
        self.emit_event(Event::PayloadsDecoded {
            run_id,
            count: decoded.payloads.len(),
        });

        self.advance(run_id, PipelineState::Finalizing)?;
        let export_path = until_cancelled(
            token,
            self.finalize(run_id, &decoded.payloads, &artifact),
        )
        .await
        .ok_or_else(|| cancelled(Some(&artifact)))?;

        Ok(RunOutcome::SucceededWithPayloads {
            payloads: decoded.payloads,
            source_path: artifact,
            export_path,
        })
    }

    /// Transition or stop the run if it is no longer current
    fn advance(&self, run_id: RunId, to: PipelineState) -> StageResult<()> {
        if self.transition(run_id, to) {
            Ok(())
        } else {
            Err(RunOutcome::aborted(
                AbortReason::Cancelled,
                Some("run superseded".to_string()),
            ))
        }
    }

    async fn enable_source(&self, token: &CancellationToken) -> StageResult<()> {
        let config = &self.config.source;
        let enable = async {
            self.source.set_data_source(&config.data_source).await?;
            self.source.enable().await
        };

        match until_cancelled(token, tokio::time::timeout(config.enable_timeout, enable)).await {
            None => Err(cancelled(None)),
            Some(Ok(Ok(()))) => {
                tracing::debug!(source = self.source.name(), "Media source enabled");
                Ok(())
            }
            Some(Ok(Err(e))) => Err(RunOutcome::aborted(
                AbortReason::SourceUnavailable,
                Some(e.to_string()),
            )),
            Some(Err(_)) => {
                let e = SourceError::Unavailable {
                    reason: format!("enable timed out after {:?}", config.enable_timeout),
                };
                Err(RunOutcome::aborted(
                    AbortReason::SourceUnavailable,
                    Some(e.to_string()),
                ))
            }
        }
    }

    async fn fetch_listing(
        &self,
        run_id: RunId,
        trigger: &Trigger,
        token: &CancellationToken,
    ) -> StageResult<ListingSnapshot> {
        if let Trigger::MediaGenerated { item } = trigger {
            tracing::debug!(run_id = %run_id, item = %item.name, "Using announced media item, skipping listing refresh");
            return Ok(ListingSnapshot::new(vec![item.clone()]));
        }

        let timeout = self.config.source.listing_timeout;
        match until_cancelled(token, tokio::time::timeout(timeout, self.source.refresh_listing()))
            .await
        {
            None => Err(cancelled(None)),
            Some(Ok(Ok(snapshot))) => {
                tracing::debug!(run_id = %run_id, items = snapshot.len(), "Listing refreshed");
                Ok(snapshot)
            }
            Some(Ok(Err(e))) => Err(RunOutcome::aborted(
                AbortReason::SourceUnavailable,
                Some(e.to_string()),
            )),
            Some(Err(_)) => Err(RunOutcome::aborted(
                AbortReason::SourceUnavailable,
                Some(SourceError::ListingTimedOut { timeout }.to_string()),
            )),
        }
    }

    fn select_item(&self, run_id: RunId, snapshot: &ListingSnapshot) -> StageResult<MediaItem> {
        match select_latest_photo(snapshot) {
            Selection::Match(item) => {
                tracing::info!(
                    run_id = %run_id,
                    item = %item.name,
                    created_at = item.created_at,
                    "Selected newest photo"
                );
                self.emit_event(Event::Selected {
                    run_id,
                    item: item.clone(),
                });
                Ok(item)
            }
            Selection::NoMatch { listed } => {
                tracing::info!(run_id = %run_id, listed, "No photo on media source");
                Err(RunOutcome::aborted(AbortReason::NoNewMedia, None))
            }
        }
    }

    /// Where `item` is written inside the download directory
    pub(crate) fn destination_for(&self, run_id: RunId, item: &MediaItem) -> PathBuf {
        let file_name = Path::new(&item.name)
            .file_name()
            .or_else(|| Path::new(&item.id).file_name())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(format!("run-{run_id}")));
        self.config.download_dir().join(file_name)
    }

    async fn download_item(
        &self,
        run_id: RunId,
        item: &MediaItem,
        token: &CancellationToken,
    ) -> StageResult<PathBuf> {
        let destination = self.destination_for(run_id, item);
        let mut handle = self
            .downloads
            .start(item, destination)
            .map_err(|e| RunOutcome::aborted(AbortReason::DownloadFailed, Some(e.to_string())))?;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    handle.cancel();
                    let cancel_timeout = self.config.download.cancel_timeout;
                    if tokio::time::timeout(cancel_timeout, handle.wait_terminal()).await.is_err() {
                        tracing::warn!(
                            run_id = %run_id,
                            timeout_secs = cancel_timeout.as_secs(),
                            "Download did not acknowledge cancellation in time"
                        );
                    }
                    return Err(cancelled(None));
                }
                event = handle.next_event() => match event {
                    Some(DownloadEvent::Progress { fraction }) => {
                        self.emit_event(Event::DownloadProgress {
                            run_id,
                            percent: fraction * 100.0,
                        });
                    }
                    Some(DownloadEvent::Succeeded { path }) => return Ok(path),
                    Some(DownloadEvent::Failed { error }) => {
                        return Err(RunOutcome::aborted(AbortReason::DownloadFailed, Some(error)));
                    }
                    Some(DownloadEvent::Cancelled) => {
                        return Err(RunOutcome::aborted(
                            AbortReason::DownloadFailed,
                            Some("transfer cancelled".to_string()),
                        ));
                    }
                    None => {
                        return Err(RunOutcome::aborted(
                            AbortReason::DownloadFailed,
                            Some("download ended without a result".to_string()),
                        ));
                    }
                },
            }
        }
    }

    async fn decode_artifact(
        &self,
        artifact: &Path,
        token: &CancellationToken,
    ) -> StageResult<DecodeResult> {
        let decode = decode_with_timeout(self.decoder.as_ref(), artifact, self.config.decode.timeout);
        match until_cancelled(token, decode).await {
            None => Err(cancelled(Some(artifact))),
            Some(Ok(result)) => Ok(result),
            Some(Err(e)) => Err(RunOutcome::Aborted {
                reason: AbortReason::DecodeFailed,
                detail: Some(e.to_string()),
                source_path: Some(artifact.to_path_buf()),
            }),
        }
    }

    /// Disable the source; failures are logged, never reported
    async fn release_source(&self, run_id: RunId) {
        let timeout = self.config.source.enable_timeout;
        match tokio::time::timeout(timeout, self.source.disable()).await {
            Ok(Ok(())) => tracing::debug!(run_id = %run_id, "Media source released"),
            Ok(Err(e)) => {
                tracing::warn!(run_id = %run_id, error = %e, "Failed to disable media source");
            }
            Err(_) => {
                tracing::warn!(run_id = %run_id, "Timed out disabling media source");
            }
        }
    }

    /// Report the outcome, passing through `Aborted` when the run ended early
    fn finish_run(&self, run_id: RunId, outcome: RunOutcome) {
        if outcome.abort_reason().is_some() {
            self.transition(run_id, PipelineState::Aborted);
        }

        let report = RunReport::new(run_id, outcome);
        let message = report.outcome.status_message();
        match report.outcome.abort_reason() {
            Some(reason) if reason.is_error() => {
                tracing::warn!(run_id = %run_id, reason = ?reason, "{}", message);
            }
            _ => tracing::info!(run_id = %run_id, success = report.success, "{}", message),
        }

        self.emit_event(Event::RunFinished {
            report: report.clone(),
            message,
            finished_at: chrono::Utc::now(),
        });

        if !self.complete_run(run_id, report) {
            tracing::warn!(run_id = %run_id, "Run finished after losing ownership of the pipeline");
        }
    }
}
