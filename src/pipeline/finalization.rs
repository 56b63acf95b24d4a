//! Export and share of decoded payloads.
//!
//! Both are best effort: a failure is emitted as [`Event::ExportFailed`] and
//! logged, and the run still succeeds with its payloads.

use crate::types::{Event, RunId};
use std::path::{Path, PathBuf};

use super::ScanPipeline;

impl ScanPipeline {
    /// Export `payloads` decoded from `artifact`, then share the export file
    ///
    /// Returns the export file if export succeeded (share failures do not
    /// affect the return value).
    pub(crate) async fn finalize(
        &self,
        run_id: RunId,
        payloads: &[String],
        artifact: &Path,
    ) -> Option<PathBuf> {
        let export_path = match self.exporter.export(payloads, artifact).await {
            Ok(path) => {
                tracing::info!(
                    run_id = %run_id,
                    exporter = self.exporter.name(),
                    path = %path.display(),
                    count = payloads.len(),
                    "Exported decoded payloads"
                );
                self.emit_event(Event::Exported {
                    run_id,
                    path: path.clone(),
                });
                path
            }
            Err(e) => {
                tracing::warn!(run_id = %run_id, exporter = self.exporter.name(), error = %e, "Export failed");
                self.emit_event(Event::ExportFailed {
                    run_id,
                    error: e.to_string(),
                });
                return None;
            }
        };

        if self.config.export.share {
            let mime_type = &self.config.export.share_mime_type;
            if let Err(e) = self.sharer.share(&export_path, mime_type).await {
                tracing::warn!(run_id = %run_id, sharer = self.sharer.name(), error = %e, "Share failed");
                self.emit_event(Event::ExportFailed {
                    run_id,
                    error: e.to_string(),
                });
            }
        }

        Some(export_path)
    }
}
