//! Share hook for hosts without a platform share action

use super::Sharer;
use crate::error::ExportError;
use async_trait::async_trait;
use std::path::Path;

/// Sharer that only logs what would have been shared
pub struct NoOpSharer;

#[async_trait]
impl Sharer for NoOpSharer {
    async fn share(&self, file: &Path, mime_type: &str) -> Result<(), ExportError> {
        tracing::info!(
            file = %file.display(),
            mime_type,
            "Share requested, no share integration configured"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
