//! # drone-scan
//!
//! Pipeline library that pulls the newest photo off a drone camera and scans
//! it for barcodes and QR codes.
//!
//! ## Design Philosophy
//!
//! drone-scan is designed to be:
//! - **Single-flight** - One run at a time; triggers during a run are dropped, never queued
//! - **Hardware-agnostic** - Camera storage, decoder, exporter and share action are injected traits
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! A run goes trigger → enable the media source → refresh its listing →
//! select the newest photo → download it → decode it → export/share the
//! payloads, and ends with one [`RunReport`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use drone_scan::{Config, DirectoryMediaSource, ScanPipeline, Services, Trigger};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = Arc::new(DirectoryMediaSource::new("/media/drone/DCIM"));
//!     let pipeline = ScanPipeline::new(Config::default(), Services::new(source)).await?;
//!
//!     // Subscribe to events
//!     let mut events = pipeline.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     pipeline.trigger(Trigger::ScanRequested)?;
//!     if let Some(report) = pipeline.wait_idle().await {
//!         println!("{}", report.outcome.status_message());
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Barcode/QR decoding stage
pub mod decode;
/// Single-flight download control
pub mod download;
/// Error types
pub mod error;
/// CSV export and share hooks
pub mod export;
/// Remote media sources
pub mod media;
/// Pipeline orchestration (decomposed into focused submodules)
pub mod pipeline;
/// Newest-item selection
pub mod selection;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, DataSourceConfig};
pub use decode::{Decoder, NoOpDecoder};
pub use download::{DownloadController, DownloadHandle};
pub use error::{DecodeError, DownloadError, Error, ExportError, Result, SourceError};
pub use export::{CsvExporter, Exporter, NoOpSharer, Sharer};
pub use media::{DirectoryMediaSource, MediaSource, NoOpMediaSource, TransferEvent};
pub use pipeline::{ScanPipeline, Services};
pub use types::{
    AbortReason, Event, MediaItem, MediaKind, PipelineState, RunId, RunOutcome, RunReport,
    Trigger, TriggerOutcome,
};

/// Run the pipeline until a termination signal, then shut it down.
///
/// - **Unix:** listens for SIGTERM and SIGINT, falling back to Ctrl+C if a
///   handler cannot be registered.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use drone_scan::{Config, NoOpMediaSource, ScanPipeline, Services, run_with_shutdown};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let services = Services::new(Arc::new(NoOpMediaSource));
///     let pipeline = ScanPipeline::new(Config::default(), services).await?;
///
///     // Triggers arrive from the host (USB attach, permission grant, ...)
///     run_with_shutdown(pipeline).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(pipeline: ScanPipeline) -> Result<()> {
    wait_for_signal().await;
    pipeline.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
