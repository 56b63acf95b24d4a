//! CSV export of decoded payloads
//!
//! Rows are plain comma-joined strings: no header, no quoting, no escaping.
//! A payload containing a comma or newline produces a malformed row; callers
//! that cannot rule this out must sanitize payloads first.

use super::Exporter;
use crate::config::{CodeTypeRule, ExportConfig};
use crate::error::ExportError;
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Timestamp format of the first CSV column
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Placeholder for the optional latitude/longitude/altitude columns
const UNKNOWN_COORDINATE: &str = "0.0";

/// Size limit for compiled classification regexes
const REGEX_SIZE_LIMIT: usize = 1024 * 1024;

/// Classifies decoded payloads (URL, e-mail, EAN-13, ...) with ordered regex rules
#[derive(Clone, Debug)]
pub struct CodeClassifier {
    rules: Vec<(String, Regex)>,
    fallback: String,
}

impl CodeClassifier {
    /// Compile `rules`; invalid patterns are logged and skipped
    pub fn new(rules: &[CodeTypeRule], fallback: impl Into<String>) -> Self {
        let rules = rules
            .iter()
            .filter_map(|rule| {
                regex::RegexBuilder::new(&rule.pattern)
                    .size_limit(REGEX_SIZE_LIMIT)
                    .build()
                    .map(|re| (rule.name.clone(), re))
                    .map_err(|e| {
                        warn!(
                            "Invalid code type pattern '{}' for {}: {}",
                            rule.pattern, rule.name, e
                        );
                    })
                    .ok()
            })
            .collect();
        Self {
            rules,
            fallback: fallback.into(),
        }
    }

    /// Name of the first rule matching `payload`, or the fallback
    pub fn classify(&self, payload: &str) -> &str {
        self.rules
            .iter()
            .find(|(_, re)| re.is_match(payload))
            .map(|(name, _)| name.as_str())
            .unwrap_or(self.fallback.as_str())
    }
}

impl Default for CodeClassifier {
    fn default() -> Self {
        let config = ExportConfig::default();
        Self::new(&config.code_types, config.fallback_code_type)
    }
}

/// Write rows of strings to `path`, one comma-joined line per row
///
/// Creates parent directories as needed. With `append` the rows are added to
/// an existing file; otherwise the file is replaced.
pub async fn write_csv_rows(
    rows: &[Vec<String>],
    path: &Path,
    append: bool,
) -> Result<(), ExportError> {
    let write_failed = |e: std::io::Error| ExportError::WriteFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(write_failed)?;
    }

    let mut contents = String::new();
    for row in rows {
        contents.push_str(&row.join(","));
        contents.push('\n');
    }

    let mut options = tokio::fs::OpenOptions::new();
    options.create(true);
    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    let mut file = options.open(path).await.map_err(write_failed)?;
    file.write_all(contents.as_bytes())
        .await
        .map_err(write_failed)?;
    file.flush().await.map_err(write_failed)?;
    Ok(())
}

/// Exporter appending one CSV row per decoded payload
///
/// Row layout: `timestamp,source_image_path,code_type,payload`, followed by
/// `latitude,longitude,altitude` when location columns are enabled.
pub struct CsvExporter {
    csv_path: PathBuf,
    append: bool,
    location_columns: bool,
    classifier: CodeClassifier,
}

impl CsvExporter {
    /// Create an exporter from the export configuration
    pub fn new(config: &ExportConfig) -> Self {
        Self {
            csv_path: config.csv_path(),
            append: config.append,
            location_columns: config.location_columns,
            classifier: CodeClassifier::new(&config.code_types, config.fallback_code_type.clone()),
        }
    }

    /// Where rows are written
    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    fn rows(&self, payloads: &[String], source_image: &Path, timestamp: &str) -> Vec<Vec<String>> {
        let image = source_image.to_string_lossy();
        payloads
            .iter()
            .map(|payload| {
                let mut row = vec![
                    timestamp.to_string(),
                    image.to_string(),
                    self.classifier.classify(payload).to_string(),
                    payload.clone(),
                ];
                if self.location_columns {
                    row.extend(std::iter::repeat_n(UNKNOWN_COORDINATE.to_string(), 3));
                }
                row
            })
            .collect()
    }
}

#[async_trait]
impl Exporter for CsvExporter {
    async fn export(
        &self,
        payloads: &[String],
        source_image: &Path,
    ) -> Result<PathBuf, ExportError> {
        if payloads.is_empty() {
            return Err(ExportError::NothingToExport);
        }

        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        let rows = self.rows(payloads, source_image, &timestamp);
        write_csv_rows(&rows, &self.csv_path, self.append).await?;

        debug!(
            csv = %self.csv_path.display(),
            rows = rows.len(),
            "Exported decoded payloads"
        );
        Ok(self.csv_path.clone())
    }

    fn name(&self) -> &'static str {
        "csv"
    }
}
