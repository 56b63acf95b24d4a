//! Scan pipeline orchestration split into focused submodules.
//!
//! The `ScanPipeline` struct and its methods are organized by concern:
//! - [`triggers`] - Accepting or dropping triggers, starting runs
//! - [`run`] - The stage sequence of one run
//! - [`state`] - Run-token checked state transitions
//! - [`finalization`] - Export and share of decoded payloads
//! - [`control`] - Cancellation (explicit cancel, USB detach)
//! - [`lifecycle`] - Idle waiting and shutdown

mod control;
mod finalization;
mod lifecycle;
mod run;
mod state;
mod triggers;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::decode::{Decoder, NoOpDecoder};
use crate::download::DownloadController;
use crate::error::{Error, Result};
use crate::export::{CsvExporter, Exporter, NoOpSharer, Sharer};
use crate::media::MediaSource;
use crate::types::{Event, PipelineState, RunId, RunReport};
use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64};
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

/// External capabilities the pipeline drives
///
/// Every capability is an injected handle; hosts substitute their own
/// implementations (vendor SDK, barcode library, platform share sheet).
#[derive(Clone)]
pub struct Services {
    /// Camera storage
    pub source: Arc<dyn MediaSource>,
    /// Barcode/QR decoder
    pub decoder: Arc<dyn Decoder>,
    /// Export of decoded payloads; `None` uses a [`CsvExporter`] built from config
    pub exporter: Option<Arc<dyn Exporter>>,
    /// Share action for the export file
    pub sharer: Arc<dyn Sharer>,
}

impl Services {
    /// Services around `source` with placeholder decoder and sharer and CSV export
    pub fn new(source: Arc<dyn MediaSource>) -> Self {
        Self {
            source,
            decoder: Arc::new(NoOpDecoder),
            exporter: None,
            sharer: Arc::new(NoOpSharer),
        }
    }

    /// Replace the decoder
    pub fn with_decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Replace the exporter
    pub fn with_exporter(mut self, exporter: Arc<dyn Exporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    /// Replace the sharer
    pub fn with_sharer(mut self, sharer: Arc<dyn Sharer>) -> Self {
        self.sharer = sharer;
        self
    }
}

/// The run currently owning the pipeline
#[derive(Debug)]
pub(crate) struct ActiveRun {
    pub(crate) run_id: RunId,
    pub(crate) state: PipelineState,
    pub(crate) cancel_token: CancellationToken,
}

/// Mutable run bookkeeping, guarded by one lock
#[derive(Debug, Default)]
pub(crate) struct RunSlot {
    pub(crate) current: Option<ActiveRun>,
    pub(crate) last_report: Option<RunReport>,
}

/// Run bookkeeping shared by every clone of the pipeline
#[derive(Clone)]
pub(crate) struct RunState {
    /// Active run and last report
    pub(crate) slot: Arc<std::sync::Mutex<RunSlot>>,
    /// Current state, observable by waiters
    pub(crate) state_tx: Arc<watch::Sender<PipelineState>>,
    /// Next run number
    pub(crate) next_run_id: Arc<AtomicU64>,
    /// Cleared once shutdown starts
    pub(crate) accepting: Arc<AtomicBool>,
    /// Parent of every run's cancellation token
    pub(crate) shutdown_token: CancellationToken,
}

/// Trigger-driven scan pipeline (cloneable - all fields are Arc-wrapped)
///
/// One run at a time goes trigger → enable source → refresh listing → select
/// the newest photo → download → decode → export/share, then reports a
/// [`RunReport`] and returns to idle.
#[derive(Clone)]
pub struct ScanPipeline {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Camera storage
    pub(crate) source: Arc<dyn MediaSource>,
    /// Barcode/QR decoder
    pub(crate) decoder: Arc<dyn Decoder>,
    /// Export of decoded payloads
    pub(crate) exporter: Arc<dyn Exporter>,
    /// Share action
    pub(crate) sharer: Arc<dyn Sharer>,
    /// Single-flight download control
    pub(crate) downloads: Arc<DownloadController>,
    /// Run bookkeeping
    pub(crate) runs: RunState,
}

impl ScanPipeline {
    /// Create a pipeline
    ///
    /// Validates the configuration and creates the download and export
    /// directories.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for invalid settings and [`Error::Io`] if a
    /// working directory cannot be created.
    pub async fn new(config: Config, services: Services) -> Result<Self> {
        config.validate()?;

        for dir in [config.download_dir(), config.export_dir()] {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create directory '{}': {}", dir.display(), e),
                ))
            })?;
        }

        let (event_tx, _rx) = broadcast::channel(config.event_capacity);
        let (state_tx, _state_rx) = watch::channel(PipelineState::Idle);

        let exporter = services
            .exporter
            .unwrap_or_else(|| Arc::new(CsvExporter::new(&config.export)));
        let downloads = Arc::new(DownloadController::new(
            services.source.clone(),
            config.download.event_buffer,
        ));

        tracing::info!(
            source = services.source.name(),
            decoder = services.decoder.name(),
            exporter = exporter.name(),
            sharer = services.sharer.name(),
            "Scan pipeline initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            event_tx,
            source: services.source,
            decoder: services.decoder,
            exporter,
            sharer: services.sharer,
            downloads,
            runs: RunState {
                slot: Arc::new(std::sync::Mutex::new(RunSlot::default())),
                state_tx: Arc::new(state_tx),
                next_run_id: Arc::new(AtomicU64::new(1)),
                accepting: Arc::new(AtomicBool::new(true)),
                shutdown_token: CancellationToken::new(),
            },
        })
    }

    /// Subscribe to pipeline events
    ///
    /// Each subscriber receives all events independently. A subscriber that
    /// falls more than `event_capacity` events behind receives
    /// `RecvError::Lagged`.
    ///
    /// ```no_run
    /// # use drone_scan::{Config, ScanPipeline, Services, NoOpMediaSource};
    /// # use std::sync::Arc;
    /// # async fn example() -> drone_scan::Result<()> {
    /// let pipeline = ScanPipeline::new(
    ///     Config::default(),
    ///     Services::new(Arc::new(NoOpMediaSource)),
    /// )
    /// .await?;
    ///
    /// let mut events = pipeline.subscribe();
    /// tokio::spawn(async move {
    ///     while let Ok(event) = events.recv().await {
    ///         tracing::info!(?event, "pipeline event");
    ///     }
    /// });
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Pipeline events as a stream; lagged gaps are skipped
    pub fn event_stream(&self) -> impl Stream<Item = Event> + Send + 'static {
        BroadcastStream::new(self.subscribe()).filter_map(|event| async move { event.ok() })
    }

    /// Current state machine state
    pub fn state(&self) -> PipelineState {
        *self.runs.state_tx.borrow()
    }

    /// The active run, if any
    pub fn active_run(&self) -> Option<RunId> {
        self.lock_slot().current.as_ref().map(|run| run.run_id)
    }

    /// Report of the most recently finished run
    pub fn last_report(&self) -> Option<RunReport> {
        self.lock_slot().last_report.clone()
    }

    /// Current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Emit an event to all subscribers
    ///
    /// With no subscribers the event is dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    pub(crate) fn lock_slot(&self) -> std::sync::MutexGuard<'_, RunSlot> {
        self.runs
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
