//! Traits and types for remote media sources

use crate::config::DataSourceConfig;
use crate::types::{ListingSnapshot, MediaItem};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Event reported by a media source while transferring one file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransferEvent {
    /// Bytes transferred so far (including the start offset) out of `total`
    Progress {
        /// Bytes transferred
        current: u64,
        /// Total bytes, 0 if unknown
        total: u64,
    },
    /// The file is complete at `path`
    Completed {
        /// Where the file was written
        path: PathBuf,
    },
    /// The transfer failed
    Failed {
        /// Transport error message
        error: String,
    },
}

/// Stream of transfer events for one file
///
/// Dropping the stream abandons the transfer.
pub type TransferStream = BoxStream<'static, TransferEvent>;

/// Remote media capability (camera storage reached over USB, PTP/MTP, or a vendor SDK)
///
/// The pipeline holds one handle, injected at construction. All operations are
/// asynchronous and must not block the calling task while waiting on hardware.
///
/// Lifecycle: [`set_data_source`](Self::set_data_source) →
/// [`enable`](Self::enable) → any number of
/// [`refresh_listing`](Self::refresh_listing) / [`download`](Self::download) →
/// [`disable`](Self::disable).
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Choose which storage and camera component to read from
    async fn set_data_source(&self, config: &DataSourceConfig) -> crate::Result<()>;

    /// Enter file-management mode
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Unavailable`](crate::error::SourceError::Unavailable)
    /// if the device is missing or refuses.
    async fn enable(&self) -> crate::Result<()>;

    /// Leave file-management mode and drop listing subscriptions
    ///
    /// Must be safe to call when not enabled.
    async fn disable(&self) -> crate::Result<()>;

    /// Fetch an up-to-date listing
    ///
    /// Resolves once the source reports its listing is current.
    async fn refresh_listing(&self) -> crate::Result<ListingSnapshot>;

    /// Stream `item` into `destination`, starting at byte `offset`
    ///
    /// The returned stream yields zero or more `Progress` events followed by
    /// exactly one `Completed` or `Failed`.
    async fn download(
        &self,
        item: &MediaItem,
        offset: u64,
        destination: &Path,
    ) -> crate::Result<TransferStream>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
