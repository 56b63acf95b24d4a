//! Scripted fakes and a pipeline harness for tests.

use crate::config::{Config, DataSourceConfig};
use crate::decode::Decoder;
use crate::error::{DecodeError, ExportError, SourceError};
use crate::export::{Exporter, Sharer};
use crate::media::{MediaSource, TransferEvent, TransferStream};
use crate::pipeline::{ScanPipeline, Services};
use crate::types::{DecodeResult, Event, ListingSnapshot, MediaItem, MediaKind};
use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, broadcast, mpsc};
use tokio_stream::wrappers::ReceiverStream;

pub(crate) fn photo(id: &str, created_at: u64) -> MediaItem {
    MediaItem::new(id, format!("{id}.JPG"), MediaKind::Photo, created_at, 1024)
}

pub(crate) fn video(id: &str, created_at: u64) -> MediaItem {
    MediaItem::new(id, format!("{id}.MP4"), MediaKind::Video, created_at, 4096)
}

/// How a fake transfer plays out
#[derive(Clone)]
pub(crate) enum TransferScript {
    /// `steps` progress events, then the file is written and completed
    Complete { contents: Vec<u8>, steps: u64 },
    /// A partial file and `after_steps` progress events, then failure
    Fail { after_steps: u64, error: String },
    /// One progress event, then waits for `gate` before completing
    Gated { contents: Vec<u8>, gate: Arc<Notify> },
    /// A partial file and one progress event, then nothing until dropped
    Hang,
}

impl TransferScript {
    pub(crate) fn complete() -> Self {
        TransferScript::Complete {
            contents: b"jpeg-bytes".to_vec(),
            steps: 4,
        }
    }

    async fn play(self, tx: mpsc::Sender<TransferEvent>, destination: PathBuf) {
        match self {
            TransferScript::Complete { contents, steps } => {
                let total = contents.len() as u64;
                for step in 1..=steps {
                    let current = total * step / steps;
                    let _ = tx.send(TransferEvent::Progress { current, total }).await;
                }
                finish(&tx, &destination, &contents).await;
            }
            TransferScript::Fail { after_steps, error } => {
                let _ = tokio::fs::write(&destination, b"partial").await;
                for step in 1..=after_steps {
                    let current = step * 10;
                    let _ = tx
                        .send(TransferEvent::Progress {
                            current,
                            total: 100,
                        })
                        .await;
                }
                let _ = tx.send(TransferEvent::Failed { error }).await;
            }
            TransferScript::Gated { contents, gate } => {
                let _ = tx
                    .send(TransferEvent::Progress {
                        current: 1,
                        total: 2,
                    })
                    .await;
                gate.notified().await;
                finish(&tx, &destination, &contents).await;
            }
            TransferScript::Hang => {
                let _ = tokio::fs::write(&destination, b"partial").await;
                let _ = tx
                    .send(TransferEvent::Progress {
                        current: 1,
                        total: 10,
                    })
                    .await;
                tx.closed().await;
            }
        }
    }
}

async fn finish(tx: &mpsc::Sender<TransferEvent>, destination: &Path, contents: &[u8]) {
    let event = match tokio::fs::write(destination, contents).await {
        Ok(()) => TransferEvent::Completed {
            path: destination.to_path_buf(),
        },
        Err(e) => TransferEvent::Failed {
            error: e.to_string(),
        },
    };
    let _ = tx.send(event).await;
}

/// Media source driven by a script, recording every call
pub(crate) struct FakeMediaSource {
    listing: Mutex<Vec<MediaItem>>,
    enable_error: Mutex<Option<String>>,
    listing_error: Mutex<Option<String>>,
    transfer: Mutex<TransferScript>,
    stall_enable: AtomicBool,
    stall_listing: AtomicBool,
    enabled: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl FakeMediaSource {
    pub(crate) fn with_listing(items: Vec<MediaItem>) -> Self {
        Self {
            listing: Mutex::new(items),
            enable_error: Mutex::new(None),
            listing_error: Mutex::new(None),
            transfer: Mutex::new(TransferScript::complete()),
            stall_enable: AtomicBool::new(false),
            stall_listing: AtomicBool::new(false),
            enabled: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn unavailable(reason: &str) -> Self {
        let source = Self::with_listing(Vec::new());
        *source.enable_error.lock().unwrap() = Some(reason.to_string());
        source
    }

    pub(crate) fn set_transfer(&self, script: TransferScript) {
        *self.transfer.lock().unwrap() = script;
    }

    /// `enable` never returns
    pub(crate) fn stall_enable(&self) {
        self.stall_enable.store(true, Ordering::SeqCst);
    }

    /// `refresh_listing` never returns
    pub(crate) fn stall_listing(&self) {
        self.stall_listing.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_listing(&self, reason: &str) {
        *self.listing_error.lock().unwrap() = Some(reason.to_string());
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(call)).count()
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl MediaSource for FakeMediaSource {
    async fn set_data_source(&self, _config: &DataSourceConfig) -> crate::Result<()> {
        self.record("set_data_source");
        Ok(())
    }

    async fn enable(&self) -> crate::Result<()> {
        self.record("enable");
        if self.stall_enable.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if let Some(reason) = self.enable_error.lock().unwrap().clone() {
            return Err(SourceError::Unavailable { reason }.into());
        }
        self.enabled.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disable(&self) -> crate::Result<()> {
        self.record("disable");
        self.enabled.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn refresh_listing(&self) -> crate::Result<ListingSnapshot> {
        self.record("refresh_listing");
        if !self.is_enabled() {
            return Err(SourceError::NotEnabled.into());
        }
        if self.stall_listing.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if let Some(reason) = self.listing_error.lock().unwrap().clone() {
            return Err(SourceError::ListingFailed { reason }.into());
        }
        Ok(ListingSnapshot::new(self.listing.lock().unwrap().clone()))
    }

    async fn download(
        &self,
        item: &MediaItem,
        _offset: u64,
        destination: &Path,
    ) -> crate::Result<TransferStream> {
        self.record(format!("download:{}", item.id));
        if !self.is_enabled() {
            return Err(SourceError::NotEnabled.into());
        }

        let script = self.transfer.lock().unwrap().clone();
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(script.play(tx, destination.to_path_buf()));
        Ok(ReceiverStream::new(rx).boxed())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// How a fake decode plays out
#[derive(Clone)]
pub(crate) enum DecodeScript {
    Payloads(Vec<String>),
    Corrupt,
    Hang,
}

pub(crate) struct FakeDecoder {
    script: DecodeScript,
    calls: AtomicUsize,
}

impl FakeDecoder {
    pub(crate) fn new(script: DecodeScript) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn payloads(payloads: &[&str]) -> Self {
        Self::new(DecodeScript::Payloads(
            payloads.iter().map(|p| p.to_string()).collect(),
        ))
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Decoder for FakeDecoder {
    async fn decode(&self, artifact: &Path) -> Result<DecodeResult, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            DecodeScript::Payloads(payloads) => Ok(DecodeResult::new(artifact, payloads.clone())),
            DecodeScript::Corrupt => Err(DecodeError::Corrupt {
                path: artifact.to_path_buf(),
                reason: "not a JPEG".to_string(),
            }),
            DecodeScript::Hang => std::future::pending().await,
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Exporter that records calls instead of writing files
#[derive(Default)]
pub(crate) struct RecordingExporter {
    fail: bool,
    stall: bool,
    attempts: AtomicUsize,
    exports: Mutex<Vec<(Vec<String>, PathBuf)>>,
}

impl RecordingExporter {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// An exporter whose `export` never returns
    pub(crate) fn stalled() -> Self {
        Self {
            stall: true,
            ..Default::default()
        }
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn exports(&self) -> Vec<(Vec<String>, PathBuf)> {
        self.exports.lock().unwrap().clone()
    }
}

#[async_trait]
impl Exporter for RecordingExporter {
    async fn export(
        &self,
        payloads: &[String],
        source_image: &Path,
    ) -> Result<PathBuf, ExportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.stall {
            std::future::pending::<()>().await;
        }
        let path = PathBuf::from("/exports/codes.csv");
        if self.fail {
            return Err(ExportError::WriteFailed {
                path,
                reason: "disk full".to_string(),
            });
        }
        self.exports
            .lock()
            .unwrap()
            .push((payloads.to_vec(), source_image.to_path_buf()));
        Ok(path)
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Sharer that records what it was asked to share
#[derive(Default)]
pub(crate) struct RecordingSharer {
    shared: Mutex<Vec<(PathBuf, String)>>,
}

impl RecordingSharer {
    pub(crate) fn shared(&self) -> Vec<(PathBuf, String)> {
        self.shared.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sharer for RecordingSharer {
    async fn share(&self, file: &Path, mime_type: &str) -> Result<(), ExportError> {
        self.shared
            .lock()
            .unwrap()
            .push((file.to_path_buf(), mime_type.to_string()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// A pipeline wired to fakes, with handles to inspect them
pub(crate) struct Harness {
    pub(crate) pipeline: ScanPipeline,
    pub(crate) source: Arc<FakeMediaSource>,
    pub(crate) decoder: Arc<FakeDecoder>,
    pub(crate) exporter: Arc<RecordingExporter>,
    pub(crate) sharer: Arc<RecordingSharer>,
    pub(crate) events: broadcast::Receiver<Event>,
    pub(crate) _temp_dir: tempfile::TempDir,
}

impl Harness {
    pub(crate) async fn new(source: FakeMediaSource, decoder: FakeDecoder) -> Self {
        Self::with(source, decoder, RecordingExporter::default(), |_| {}).await
    }

    pub(crate) async fn with(
        source: FakeMediaSource,
        decoder: FakeDecoder,
        exporter: RecordingExporter,
        configure: impl FnOnce(&mut Config),
    ) -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.download.download_dir = temp_dir.path().join("downloads");
        config.export.export_dir = temp_dir.path().join("exports");
        config.download.cancel_timeout = Duration::from_secs(2);
        configure(&mut config);

        let source = Arc::new(source);
        let decoder = Arc::new(decoder);
        let exporter = Arc::new(exporter);
        let sharer = Arc::new(RecordingSharer::default());

        let services = Services::new(source.clone())
            .with_decoder(decoder.clone())
            .with_exporter(exporter.clone())
            .with_sharer(sharer.clone());
        let pipeline = ScanPipeline::new(config, services).await.unwrap();
        let events = pipeline.subscribe();

        Self {
            pipeline,
            source,
            decoder,
            exporter,
            sharer,
            events,
            _temp_dir: temp_dir,
        }
    }

    /// Events received so far, without waiting
    pub(crate) fn drain_events(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// Wait (bounded) for the first event matching `predicate`
    pub(crate) async fn wait_for_event<F>(&mut self, predicate: F) -> Event
    where
        F: Fn(&Event) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let event = self.events.recv().await.unwrap();
                if predicate(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }
}
