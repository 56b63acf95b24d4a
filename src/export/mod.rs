//! Export and share hooks for decoded payloads
//!
//! Both are side effects at the end of a successful run. Their failures are
//! reported as warnings and never change the run outcome.
//!
//! - [`Exporter`] turns payloads into a file; [`CsvExporter`] appends CSV rows
//! - [`Sharer`] hands a file to the platform share action; [`NoOpSharer`] only logs

mod csv;
mod share;

pub use csv::{CodeClassifier, CsvExporter, write_csv_rows};
pub use share::NoOpSharer;

use crate::error::ExportError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Export capability
#[async_trait]
pub trait Exporter: Send + Sync {
    /// Export `payloads` decoded from the photo at `source_image`
    ///
    /// Returns the location of the written file.
    async fn export(
        &self,
        payloads: &[String],
        source_image: &Path,
    ) -> Result<PathBuf, ExportError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Share capability (platform "send to" action)
#[async_trait]
pub trait Sharer: Send + Sync {
    /// Offer `file` of type `mime_type` to the user
    async fn share(&self, file: &Path, mime_type: &str) -> Result<(), ExportError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
