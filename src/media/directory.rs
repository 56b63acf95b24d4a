//! Media source backed by a mounted camera storage directory
//!
//! Covers cameras exposed as a filesystem: a PTP/MTP mount point (gphoto2fs,
//! jmtpfs, a desktop file manager's mount) or an SD card in a reader.

use super::traits::{MediaSource, TransferEvent, TransferStream};
use crate::config::DataSourceConfig;
use crate::error::{DownloadError, SourceError};
use crate::types::{ListingSnapshot, MediaItem, MediaKind};
use async_trait::async_trait;
use futures::StreamExt;
use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::UNIX_EPOCH;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{RwLock, mpsc};
use tokio_stream::wrappers::ReceiverStream;

/// Default transfer chunk size (256 KiB)
const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Capacity of the transfer event channel
const TRANSFER_CHANNEL_CAPACITY: usize = 16;

/// Media source reading a directory tree
///
/// - Items are every regular file under the root, identified by their path
///   relative to the root (with `/` separators)
/// - The listing is ordered by that path, so camera numbering (`DJI_0042`
///   before `DJI_0043`) decides ties between equal capture times
/// - The file modification time stands in for the device capture time
pub struct DirectoryMediaSource {
    root: PathBuf,
    chunk_size: usize,
    enabled: AtomicBool,
    data_source: RwLock<DataSourceConfig>,
}

impl DirectoryMediaSource {
    /// Create a source rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            enabled: AtomicBool::new(false),
            data_source: RwLock::new(DataSourceConfig::default()),
        }
    }

    /// Override the transfer chunk size (minimum 1 byte)
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Data source last set by the pipeline
    pub async fn data_source(&self) -> DataSourceConfig {
        self.data_source.read().await.clone()
    }

    fn ensure_enabled(&self) -> crate::Result<()> {
        if self.enabled.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SourceError::NotEnabled.into())
        }
    }

    /// Map an item id back to a file, refusing ids that escape the root
    fn resolve(&self, item: &MediaItem) -> crate::Result<PathBuf> {
        let relative = Path::new(&item.id);
        let contained = !item.id.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !contained {
            return Err(SourceError::ItemNotFound {
                id: item.id.clone(),
            }
            .into());
        }
        Ok(self.root.join(relative))
    }

    async fn scan(&self) -> std::io::Result<Vec<MediaItem>> {
        let mut items = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                if !file_type.is_file() {
                    continue;
                }

                let metadata = entry.metadata().await?;
                let relative = path.strip_prefix(&self.root).unwrap_or(&path);
                let id = relative.to_string_lossy().replace('\\', "/");
                let kind = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(MediaKind::from_extension)
                    .unwrap_or(MediaKind::Other);
                let created_at = metadata
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
                    .unwrap_or(0);

                items.push(MediaItem::new(
                    id,
                    entry.file_name().to_string_lossy().into_owned(),
                    kind,
                    created_at,
                    metadata.len(),
                ));
            }
        }

        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }
}

#[async_trait]
impl MediaSource for DirectoryMediaSource {
    async fn set_data_source(&self, config: &DataSourceConfig) -> crate::Result<()> {
        tracing::debug!(
            root = %self.root.display(),
            location = ?config.location,
            component = ?config.component,
            "Directory source ignores storage selection, reading root"
        );
        *self.data_source.write().await = config.clone();
        Ok(())
    }

    async fn enable(&self) -> crate::Result<()> {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => {
                self.enabled.store(true, Ordering::SeqCst);
                tracing::info!(root = %self.root.display(), "Directory media source enabled");
                Ok(())
            }
            Ok(_) => Err(SourceError::Unavailable {
                reason: format!("{} is not a directory", self.root.display()),
            }
            .into()),
            Err(e) => Err(SourceError::Unavailable {
                reason: format!("{}: {}", self.root.display(), e),
            }
            .into()),
        }
    }

    async fn disable(&self) -> crate::Result<()> {
        if self.enabled.swap(false, Ordering::SeqCst) {
            tracing::info!(root = %self.root.display(), "Directory media source disabled");
        }
        Ok(())
    }

    async fn refresh_listing(&self) -> crate::Result<ListingSnapshot> {
        self.ensure_enabled()?;
        let items = self.scan().await.map_err(|e| SourceError::ListingFailed {
            reason: e.to_string(),
        })?;
        tracing::debug!(root = %self.root.display(), items = items.len(), "Listing refreshed");
        Ok(ListingSnapshot::new(items))
    }

    async fn download(
        &self,
        item: &MediaItem,
        offset: u64,
        destination: &Path,
    ) -> crate::Result<TransferStream> {
        self.ensure_enabled()?;
        let source_path = self.resolve(item)?;

        let mut input = tokio::fs::File::open(&source_path).await.map_err(|_| {
            SourceError::ItemNotFound {
                id: item.id.clone(),
            }
        })?;
        let total = input.metadata().await?.len();
        if offset > 0 {
            input.seek(SeekFrom::Start(offset)).await?;
        }

        let output = if offset > 0 {
            tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(destination)
                .await
        } else {
            tokio::fs::File::create(destination).await
        };
        let output = output.map_err(|e| DownloadError::Destination {
            path: destination.to_path_buf(),
            reason: e.to_string(),
        })?;

        let (tx, rx) = mpsc::channel(TRANSFER_CHANNEL_CAPACITY);
        let chunk_size = self.chunk_size;
        let destination = destination.to_path_buf();
        tokio::spawn(async move {
            let terminal = match copy_chunks(input, output, offset, total, chunk_size, &tx).await
            {
                Ok(()) => TransferEvent::Completed { path: destination },
                Err(e) => TransferEvent::Failed {
                    error: e.to_string(),
                },
            };
            // Receiver gone means the transfer was abandoned
            let _ = tx.send(terminal).await;
        });

        Ok(ReceiverStream::new(rx).boxed())
    }

    fn name(&self) -> &'static str {
        "directory"
    }
}

async fn copy_chunks(
    mut input: tokio::fs::File,
    mut output: tokio::fs::File,
    offset: u64,
    total: u64,
    chunk_size: usize,
    tx: &mpsc::Sender<TransferEvent>,
) -> std::io::Result<()> {
    let mut buf = vec![0u8; chunk_size];
    let mut current = offset;
    loop {
        let n = input.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        output.write_all(&buf[..n]).await?;
        current += n as u64;
        if tx
            .send(TransferEvent::Progress { current, total })
            .await
            .is_err()
        {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Interrupted,
                "transfer abandoned",
            ));
        }
    }
    output.flush().await?;
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn write(root: &Path, relative: &str, contents: &[u8]) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn enable_fails_for_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectoryMediaSource::new(dir.path().join("not-mounted"));
        assert!(matches!(
            source.enable().await,
            Err(Error::Source(SourceError::Unavailable { .. }))
        ));
    }

    #[tokio::test]
    async fn listing_requires_enable() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectoryMediaSource::new(dir.path());
        assert!(matches!(
            source.refresh_listing().await,
            Err(Error::Source(SourceError::NotEnabled))
        ));
    }

    #[tokio::test]
    async fn listing_walks_tree_and_classifies_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "DCIM/100MEDIA/DJI_0002.MP4", b"video");
        write(dir.path(), "DCIM/100MEDIA/DJI_0001.JPG", b"photo");
        write(dir.path(), "MISC/log.txt", b"log");

        let source = DirectoryMediaSource::new(dir.path());
        source.enable().await.unwrap();
        let snapshot = source.refresh_listing().await.unwrap();

        let ids: Vec<&str> = snapshot.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "DCIM/100MEDIA/DJI_0001.JPG",
                "DCIM/100MEDIA/DJI_0002.MP4",
                "MISC/log.txt"
            ]
        );
        assert_eq!(snapshot.items()[0].kind, MediaKind::Photo);
        assert_eq!(snapshot.items()[0].name, "DJI_0001.JPG");
        assert_eq!(snapshot.items()[0].size_bytes, 5);
        assert_eq!(snapshot.items()[1].kind, MediaKind::Video);
        assert_eq!(snapshot.items()[2].kind, MediaKind::Other);
    }

    #[tokio::test]
    async fn download_copies_file_and_reports_progress() {
        let dir = tempfile::tempdir().unwrap();
        let contents: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        write(dir.path(), "DCIM/DJI_0001.JPG", &contents);
        let out_dir = tempfile::tempdir().unwrap();
        let destination = out_dir.path().join("DJI_0001.JPG");

        let source = DirectoryMediaSource::new(dir.path()).with_chunk_size(4096);
        source.enable().await.unwrap();
        let item = source.refresh_listing().await.unwrap().items()[0].clone();

        let events: Vec<TransferEvent> = source
            .download(&item, 0, &destination)
            .await
            .unwrap()
            .collect()
            .await;

        let progress: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                TransferEvent::Progress { current, total } => {
                    assert_eq!(*total, 10_000);
                    Some(*current)
                }
                _ => None,
            })
            .collect();
        assert!(progress.len() >= 3, "expected chunked progress, got {progress:?}");
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(progress.last(), Some(&10_000));
        assert_eq!(
            events.last(),
            Some(&TransferEvent::Completed {
                path: destination.clone()
            })
        );
        assert_eq!(std::fs::read(&destination).unwrap(), contents);
    }

    #[tokio::test]
    async fn download_rejects_ids_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectoryMediaSource::new(dir.path());
        source.enable().await.unwrap();

        let item = MediaItem::new("../secret.jpg", "secret.jpg", MediaKind::Photo, 0, 0);
        let result = source
            .download(&item, 0, &dir.path().join("out.jpg"))
            .await;
        assert!(matches!(
            result,
            Err(Error::Source(SourceError::ItemNotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn disable_blocks_further_listing() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectoryMediaSource::new(dir.path());
        source.enable().await.unwrap();
        source.disable().await.unwrap();
        assert!(source.refresh_listing().await.is_err());
    }
}
