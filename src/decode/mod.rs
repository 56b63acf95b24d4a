//! Barcode/QR decoding stage
//!
//! Decoding itself is an external capability behind the [`Decoder`] trait.
//! This module adds the contract the pipeline relies on: a decode call always
//! finishes, either with a result or a [`DecodeError`].

mod noop;

pub use noop::NoOpDecoder;

use crate::error::DecodeError;
use crate::types::DecodeResult;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// Decoder for barcodes and QR codes in a downloaded photo
///
/// # Contract
///
/// - A readable image with no code yields `Ok` with empty payloads, not an error
/// - `Err` is reserved for unreadable or corrupt input
#[async_trait]
pub trait Decoder: Send + Sync {
    /// Decode every code found in the image at `artifact`
    async fn decode(&self, artifact: &Path) -> Result<DecodeResult, DecodeError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Run `decoder` on `artifact`, failing with [`DecodeError::TimedOut`] after `timeout`
pub async fn decode_with_timeout(
    decoder: &dyn Decoder,
    artifact: &Path,
    timeout: Duration,
) -> Result<DecodeResult, DecodeError> {
    match tokio::time::timeout(timeout, decoder.decode(artifact)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                decoder = decoder.name(),
                artifact = %artifact.display(),
                timeout_ms = timeout.as_millis() as u64,
                "Decoder did not finish in time"
            );
            Err(DecodeError::TimedOut {
                path: artifact.to_path_buf(),
                timeout,
            })
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    struct StuckDecoder;

    #[async_trait]
    impl Decoder for StuckDecoder {
        async fn decode(&self, _artifact: &Path) -> Result<DecodeResult, DecodeError> {
            std::future::pending().await
        }

        fn name(&self) -> &'static str {
            "stuck"
        }
    }

    #[tokio::test]
    async fn stuck_decoder_times_out() {
        let timeout = Duration::from_millis(50);
        let result = decode_with_timeout(&StuckDecoder, Path::new("/tmp/a.jpg"), timeout).await;
        match result {
            Err(DecodeError::TimedOut { timeout: t, .. }) => assert_eq!(t, timeout),
            other => panic!("expected timeout, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn fast_decoder_result_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        std::fs::write(&path, b"jpeg").unwrap();

        let result = decode_with_timeout(&NoOpDecoder, &path, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(result.artifact, path);
    }
}
