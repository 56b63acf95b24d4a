//! Placeholder decoder for hosts without a barcode library

use super::Decoder;
use crate::error::DecodeError;
use crate::types::DecodeResult;
use async_trait::async_trait;
use std::path::Path;

/// Decoder that finds nothing
///
/// Any readable file yields an empty result, so runs end as `ScanEmpty`.
/// A missing or unreadable file is still reported as [`DecodeError::Unreadable`].
pub struct NoOpDecoder;

#[async_trait]
impl Decoder for NoOpDecoder {
    async fn decode(&self, artifact: &Path) -> Result<DecodeResult, DecodeError> {
        match tokio::fs::metadata(artifact).await {
            Ok(meta) if meta.is_file() => Ok(DecodeResult::new(artifact, Vec::new())),
            Ok(_) => Err(DecodeError::Unreadable {
                path: artifact.to_path_buf(),
                reason: "not a regular file".into(),
            }),
            Err(e) => Err(DecodeError::Unreadable {
                path: artifact.to_path_buf(),
                reason: e.to_string(),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let result = NoOpDecoder.decode(&dir.path().join("gone.jpg")).await;
        assert!(matches!(result, Err(DecodeError::Unreadable { .. })));
    }

    #[tokio::test]
    async fn directory_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let result = NoOpDecoder.decode(dir.path()).await;
        match result {
            Err(DecodeError::Unreadable { reason, .. }) => {
                assert!(reason.contains("regular file"));
            }
            other => panic!("expected Unreadable, got: {other:?}"),
        }
    }
}
