//! Error types for drone-scan
//!
//! This module provides the error handling for the library, including:
//! - Domain-specific error types (Source, Download, Decode, Export)
//! - Machine-readable error codes for hosts that surface errors to users
//! - Context information (item id, file path, configuration key)

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for drone-scan operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for drone-scan
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "export.export_dir")
        key: Option<String>,
    },

    /// Media source could not be configured, enabled, or listed
    #[error("media source error: {0}")]
    Source(#[from] SourceError),

    /// Download-related error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// Decoder rejected the artifact
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Export or share failed
    #[error("export error: {0}")]
    Export(#[from] ExportError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shutdown in progress - not accepting new triggers
    #[error("shutdown in progress: not accepting new triggers")]
    ShuttingDown,
}

/// Media source errors
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source refused to enable (device missing, not connected, no permission)
    #[error("media source unavailable: {reason}")]
    Unavailable {
        /// Why the source could not be enabled
        reason: String,
    },

    /// An operation was attempted before the source was enabled
    #[error("media source is not enabled")]
    NotEnabled,

    /// Listing refresh failed
    #[error("failed to refresh media listing: {reason}")]
    ListingFailed {
        /// The reason the refresh failed
        reason: String,
    },

    /// Listing refresh did not complete in time
    #[error("media listing refresh timed out after {timeout:?}")]
    ListingTimedOut {
        /// The timeout that expired
        timeout: Duration,
    },

    /// The requested item is not known to the source
    #[error("media item {id} not found on source")]
    ItemNotFound {
        /// The item identifier
        id: String,
    },
}

/// Download-related errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Another download is already running
    #[error("download of {active} is already in progress")]
    AlreadyInProgress {
        /// Identifier of the item currently being downloaded
        active: String,
    },

    /// Destination could not be prepared
    #[error("cannot prepare destination {path}: {reason}")]
    Destination {
        /// The destination path
        path: PathBuf,
        /// The reason the destination could not be prepared
        reason: String,
    },
}

/// Decoder errors
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The artifact does not exist or cannot be opened
    #[error("cannot read artifact {path}: {reason}")]
    Unreadable {
        /// The artifact path
        path: PathBuf,
        /// The reason the file could not be read
        reason: String,
    },

    /// The artifact was read but is not a valid image
    #[error("artifact {path} is corrupt: {reason}")]
    Corrupt {
        /// The artifact path
        path: PathBuf,
        /// The decoder's diagnosis
        reason: String,
    },

    /// The decoder did not produce a result in time
    #[error("decoding {path} timed out after {timeout:?}")]
    TimedOut {
        /// The artifact path
        path: PathBuf,
        /// The timeout that expired
        timeout: Duration,
    },
}

/// Export and share errors (secondary, never fatal to a run)
#[derive(Debug, Error)]
pub enum ExportError {
    /// Nothing to export
    #[error("no payloads to export")]
    NothingToExport,

    /// Writing the export file failed
    #[error("failed to write export file {path}: {reason}")]
    WriteFailed {
        /// The export file path
        path: PathBuf,
        /// The reason the write failed
        reason: String,
    },

    /// The share action failed
    #[error("failed to share {path}: {reason}")]
    ShareFailed {
        /// The file that was being shared
        path: PathBuf,
        /// The reason sharing failed
        reason: String,
    },
}

impl Error {
    /// Machine-readable error code
    ///
    /// Stable identifiers hosts can map to localized status strings.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Source(SourceError::Unavailable { .. }) => "source_unavailable",
            Error::Source(SourceError::NotEnabled) => "source_not_enabled",
            Error::Source(SourceError::ListingFailed { .. })
            | Error::Source(SourceError::ListingTimedOut { .. }) => "listing_failed",
            Error::Source(SourceError::ItemNotFound { .. }) => "item_not_found",
            Error::Download(DownloadError::AlreadyInProgress { .. }) => "already_in_progress",
            Error::Download(DownloadError::Destination { .. }) => "download_failed",
            Error::Decode(_) => "decode_failed",
            Error::Export(_) => "export_failed",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ShuttingDown => "shutting_down",
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_in_progress_message_names_active_item() {
        let err = Error::from(DownloadError::AlreadyInProgress {
            active: "DJI_0042.JPG".to_string(),
        });
        assert_eq!(err.error_code(), "already_in_progress");
        assert!(
            err.to_string().contains("DJI_0042.JPG"),
            "message should name the active item, got: {err}"
        );
    }

    #[test]
    fn listing_errors_share_one_code() {
        let failed = Error::from(SourceError::ListingFailed {
            reason: "usb reset".into(),
        });
        let timed_out = Error::from(SourceError::ListingTimedOut {
            timeout: Duration::from_secs(10),
        });
        assert_eq!(failed.error_code(), "listing_failed");
        assert_eq!(timed_out.error_code(), "listing_failed");
    }

    #[test]
    fn io_error_converts_via_from() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.error_code(), "io_error");
    }

    #[test]
    fn destination_error_is_a_download_failure() {
        let err = Error::from(DownloadError::Destination {
            path: PathBuf::from("/downloads"),
            reason: "read-only file system".into(),
        });
        assert_eq!(err.error_code(), "download_failed");
        assert_eq!(
            err.to_string(),
            "download error: cannot prepare destination /downloads: read-only file system"
        );
    }

    #[test]
    fn decode_timeout_reports_seconds() {
        let err = DecodeError::TimedOut {
            path: PathBuf::from("/tmp/a.jpg"),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "decoding /tmp/a.jpg timed out after 30s");
    }
}
