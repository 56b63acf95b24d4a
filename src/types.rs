//! Core types for drone-scan

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for a pipeline run
///
/// Every state transition and event carries the run that produced it, so work
/// finishing after its run was cancelled or superseded can be recognized as stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub u64);

impl RunId {
    /// Create a new RunId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for RunId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<RunId> for u64 {
    fn from(id: RunId) -> Self {
        id.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of a remote media file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still image (JPEG, DNG, ...) - the only kind the pipeline processes
    Photo,
    /// Video recording
    Video,
    /// Anything else the camera stores (logs, panorama sidecars, ...)
    Other,
}

impl MediaKind {
    /// Classify a file by its extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "dng" | "png" | "tif" | "tiff" | "heic" => MediaKind::Photo,
            "mp4" | "mov" | "avi" | "mkv" => MediaKind::Video,
            _ => MediaKind::Other,
        }
    }
}

/// A file listed by the media source
///
/// Immutable once listed; the pipeline only ever holds clones.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Source-specific identifier (file index, object handle, relative path)
    pub id: String,
    /// Display name, e.g. "DJI_0042.JPG"
    pub name: String,
    /// Media kind
    pub kind: MediaKind,
    /// Capture time reported by the device, in milliseconds
    ///
    /// This is the device's monotonic capture clock, not wall-clock time, and
    /// is only meaningful for ordering items from the same device.
    pub created_at: u64,
    /// Size in bytes
    pub size_bytes: u64,
}

impl MediaItem {
    /// Create a new media item
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: MediaKind,
        created_at: u64,
        size_bytes: u64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            created_at,
            size_bytes,
        }
    }

    /// Whether this item is a photo
    pub fn is_photo(&self) -> bool {
        self.kind == MediaKind::Photo
    }
}

/// The media listing valid at one refresh instant
///
/// Items keep the order the source reported them in. A snapshot is never
/// mutated; a new refresh produces a new snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingSnapshot {
    items: Vec<MediaItem>,
    taken_at: Option<DateTime<Utc>>,
}

impl ListingSnapshot {
    /// Create a snapshot from items in source order
    pub fn new(items: Vec<MediaItem>) -> Self {
        Self {
            items,
            taken_at: Some(Utc::now()),
        }
    }

    /// Items in insertion order
    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// When the snapshot was taken (None for a default-constructed snapshot)
    pub fn taken_at(&self) -> Option<DateTime<Utc>> {
        self.taken_at
    }
}

impl From<Vec<MediaItem>> for ListingSnapshot {
    fn from(items: Vec<MediaItem>) -> Self {
        Self::new(items)
    }
}

/// Download task state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    /// Created, not yet streaming; `start` hands tasks out already in progress
    Pending,
    /// Streaming from the source
    InProgress,
    /// Artifact persisted at the destination
    Succeeded,
    /// Transport or I/O failure
    Failed,
    /// Cancelled by the caller
    Cancelled,
}

impl DownloadState {
    /// Whether no further transitions can happen
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadState::Succeeded | DownloadState::Failed | DownloadState::Cancelled
        )
    }
}

/// Snapshot of the single download task
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadTask {
    /// Item being downloaded
    pub item: MediaItem,
    /// Where the artifact is written
    pub destination: PathBuf,
    /// Current state
    pub state: DownloadState,
    /// Progress fraction in [0, 1]
    pub progress: f32,
}

/// Event delivered for a started download, in issuance order
///
/// Zero or more `Progress` events are followed by exactly one terminal event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DownloadEvent {
    /// Progress fraction, non-decreasing, in [0, 1]
    Progress {
        /// Fraction transferred
        fraction: f32,
    },
    /// The artifact is complete at this path; the caller now owns it
    Succeeded {
        /// Artifact path
        path: PathBuf,
    },
    /// The transfer failed; no retry is attempted
    Failed {
        /// Error message
        error: String,
    },
    /// The transfer was cancelled
    Cancelled,
}

impl DownloadEvent {
    /// Whether this event ends the task
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DownloadEvent::Progress { .. })
    }
}

/// Payloads decoded from one artifact
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeResult {
    /// The decoded artifact
    pub artifact: PathBuf,
    /// Decoded payload strings (possibly empty)
    pub payloads: Vec<String>,
}

impl DecodeResult {
    /// Create a result for an artifact
    pub fn new(artifact: impl Into<PathBuf>, payloads: Vec<String>) -> Self {
        Self {
            artifact: artifact.into(),
            payloads,
        }
    }

    /// Whether nothing was decoded
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}

/// Pipeline state machine state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Waiting for a trigger
    #[default]
    Idle,
    /// Configuring and enabling the media source
    SourceEnabling,
    /// Waiting for an up-to-date listing
    ListingRefreshing,
    /// Choosing the newest photo
    Selecting,
    /// Downloading the chosen photo
    Downloading,
    /// Decoding the downloaded artifact
    Decoding,
    /// Exporting and sharing decoded payloads
    Finalizing,
    /// Run ended early; reported then left for Idle
    Aborted,
}

impl PipelineState {
    /// Whether a transition from `self` to `to` is part of the state machine
    pub fn can_transition_to(&self, to: PipelineState) -> bool {
        use PipelineState::*;
        match (self, to) {
            (_, Aborted) => *self != Idle && *self != Aborted,
            (Idle, SourceEnabling)
            | (SourceEnabling, ListingRefreshing)
            | (ListingRefreshing, Selecting)
            | (Selecting, Downloading)
            | (Downloading, Decoding)
            | (Decoding, Finalizing)
            | (Decoding, Idle)
            | (Finalizing, Idle)
            | (Aborted, Idle) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::SourceEnabling => "source_enabling",
            PipelineState::ListingRefreshing => "listing_refreshing",
            PipelineState::Selecting => "selecting",
            PipelineState::Downloading => "downloading",
            PipelineState::Decoding => "decoding",
            PipelineState::Finalizing => "finalizing",
            PipelineState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Event that starts a pipeline run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// A drone was attached over USB
    UsbAttached,
    /// Storage/media read permission was granted
    PermissionGranted,
    /// The user asked for a scan
    ScanRequested,
    /// The camera announced a newly captured file
    ///
    /// The run skips the remote listing refresh and selects from this item alone.
    MediaGenerated {
        /// The new file
        item: MediaItem,
    },
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::UsbAttached => f.write_str("usb_attached"),
            Trigger::PermissionGranted => f.write_str("permission_granted"),
            Trigger::ScanRequested => f.write_str("scan_requested"),
            Trigger::MediaGenerated { item } => write!(f, "media_generated({})", item.name),
        }
    }
}

/// Result of offering a trigger to the pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A new run was started
    Started(RunId),
    /// A run is already active; the trigger was dropped
    Dropped {
        /// The run that is still active
        active: RunId,
        /// Its state when the trigger arrived
        state: PipelineState,
    },
}

/// Why a run ended in `Aborted`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// The media source could not be enabled or listed
    SourceUnavailable,
    /// No photo on the source (a normal empty outcome)
    NoNewMedia,
    /// The download failed or was cancelled by the transport
    DownloadFailed,
    /// The decoder rejected the artifact
    DecodeFailed,
    /// The run was cancelled (USB detach, explicit cancel, shutdown)
    Cancelled,
}

impl AbortReason {
    /// Whether this abort is an error rather than an empty outcome
    pub fn is_error(&self) -> bool {
        !matches!(self, AbortReason::NoNewMedia | AbortReason::Cancelled)
    }
}

/// Terminal outcome of a pipeline run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Payloads were decoded and handed to export/share
    SucceededWithPayloads {
        /// Decoded payloads
        payloads: Vec<String>,
        /// The downloaded photo
        source_path: PathBuf,
        /// The export file, if export succeeded
        export_path: Option<PathBuf>,
    },
    /// The photo was valid but held no payload
    ScanEmpty {
        /// The downloaded photo
        source_path: PathBuf,
    },
    /// The run ended early
    Aborted {
        /// Why
        reason: AbortReason,
        /// Underlying error message, if any
        detail: Option<String>,
        /// The downloaded photo, if the run got that far
        source_path: Option<PathBuf>,
    },
}

impl RunOutcome {
    /// Build an abort outcome
    pub fn aborted(reason: AbortReason, detail: Option<String>) -> Self {
        RunOutcome::Aborted {
            reason,
            detail,
            source_path: None,
        }
    }

    /// Whether payloads were found
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::SucceededWithPayloads { .. })
    }

    /// The abort reason, if the run aborted
    pub fn abort_reason(&self) -> Option<AbortReason> {
        match self {
            RunOutcome::Aborted { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// The downloaded photo, if any
    pub fn source_path(&self) -> Option<&PathBuf> {
        match self {
            RunOutcome::SucceededWithPayloads { source_path, .. }
            | RunOutcome::ScanEmpty { source_path } => Some(source_path),
            RunOutcome::Aborted { source_path, .. } => source_path.as_ref(),
        }
    }

    /// The one human-readable status line for this outcome
    pub fn status_message(&self) -> String {
        match self {
            RunOutcome::SucceededWithPayloads { payloads, .. } => {
                format!("Scan successful: {} code(s) found", payloads.len())
            }
            RunOutcome::ScanEmpty { .. } => "Scan found no codes, no CSV generated".to_string(),
            RunOutcome::Aborted { reason, detail, .. } => {
                let base = match reason {
                    AbortReason::SourceUnavailable => "Media source unavailable",
                    AbortReason::NoNewMedia => "No new photos found",
                    AbortReason::DownloadFailed => "Photo download failed",
                    AbortReason::DecodeFailed => "Could not read downloaded photo",
                    AbortReason::Cancelled => "Scan cancelled",
                };
                match detail {
                    Some(detail) => format!("{base}: {detail}"),
                    None => base.to_string(),
                }
            }
        }
    }
}

/// What a run reports to whatever triggered it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// The run
    pub run_id: RunId,
    /// Whether payloads were found
    pub success: bool,
    /// The downloaded photo, if any
    pub source_path: Option<PathBuf>,
    /// Full outcome
    pub outcome: RunOutcome,
}

impl RunReport {
    /// Build a report from an outcome
    pub fn new(run_id: RunId, outcome: RunOutcome) -> Self {
        Self {
            run_id,
            success: outcome.is_success(),
            source_path: outcome.source_path().cloned(),
            outcome,
        }
    }
}

/// Event emitted during the pipeline lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A trigger arrived while a run was active and was dropped
    TriggerDropped {
        /// The dropped trigger
        trigger: Trigger,
        /// The run that is still active
        active: RunId,
        /// Its state
        state: PipelineState,
    },

    /// The state machine moved
    StateChanged {
        /// Run ID
        run_id: RunId,
        /// Previous state
        from: PipelineState,
        /// New state
        to: PipelineState,
    },

    /// An item was chosen for download
    Selected {
        /// Run ID
        run_id: RunId,
        /// The chosen item
        item: MediaItem,
    },

    /// Download progress update
    DownloadProgress {
        /// Run ID
        run_id: RunId,
        /// Progress percentage (0.0 to 100.0)
        percent: f32,
    },

    /// Decoding produced payloads
    PayloadsDecoded {
        /// Run ID
        run_id: RunId,
        /// Number of payloads
        count: usize,
    },

    /// Payloads were exported
    Exported {
        /// Run ID
        run_id: RunId,
        /// The export file
        path: PathBuf,
    },

    /// Export or share failed (secondary warning, outcome unchanged)
    ExportFailed {
        /// Run ID
        run_id: RunId,
        /// Error message
        error: String,
    },

    /// A run reached its terminal outcome
    RunFinished {
        /// The report
        report: RunReport,
        /// Human-readable status line
        message: String,
        /// When the run finished
        finished_at: DateTime<Utc>,
    },

    /// Graceful shutdown initiated
    Shutdown,
}
