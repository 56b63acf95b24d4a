//! Media source used when no device integration is available

use super::traits::{MediaSource, TransferStream};
use crate::config::DataSourceConfig;
use crate::error::SourceError;
use crate::types::{ListingSnapshot, MediaItem};
use async_trait::async_trait;
use std::path::Path;

/// Media source that is never available
///
/// Every run started against it aborts with `SourceUnavailable`, which keeps
/// a host without a device integration functional (it reports instead of crashing).
///
/// # Examples
///
/// ```
/// use drone_scan::media::{MediaSource, NoOpMediaSource};
///
/// # #[tokio::main]
/// # async fn main() {
/// let source = NoOpMediaSource;
/// assert!(source.enable().await.is_err());
/// # }
/// ```
pub struct NoOpMediaSource;

#[async_trait]
impl MediaSource for NoOpMediaSource {
    async fn set_data_source(&self, _config: &DataSourceConfig) -> crate::Result<()> {
        Ok(())
    }

    async fn enable(&self) -> crate::Result<()> {
        Err(SourceError::Unavailable {
            reason: "no media source integration configured".into(),
        }
        .into())
    }

    async fn disable(&self) -> crate::Result<()> {
        Ok(())
    }

    async fn refresh_listing(&self) -> crate::Result<ListingSnapshot> {
        Err(SourceError::NotEnabled.into())
    }

    async fn download(
        &self,
        _item: &MediaItem,
        _offset: u64,
        _destination: &Path,
    ) -> crate::Result<TransferStream> {
        Err(SourceError::NotEnabled.into())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
