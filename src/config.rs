//! Configuration types for drone-scan

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Camera storage the media listing is read from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageLocation {
    /// Removable SD card (default)
    #[default]
    Sdcard,
    /// Camera internal storage
    Internal,
}

/// Which camera component to read from on multi-camera aircraft
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentIndex {
    /// Left or main camera (default)
    #[default]
    LeftOrMain,
    /// Right camera
    Right,
    /// Upper camera
    Up,
}

/// Data source selection handed to the media source before enabling it
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceConfig {
    /// Storage location
    #[serde(default)]
    pub location: StorageLocation,

    /// Camera component
    #[serde(default)]
    pub component: ComponentIndex,
}

/// Media source behavior
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Data source selection
    #[serde(default)]
    pub data_source: DataSourceConfig,

    /// Maximum time to wait for the source to enable (default: 15 seconds)
    #[serde(default = "default_enable_timeout", with = "duration_serde")]
    pub enable_timeout: Duration,

    /// Maximum time to wait for an up-to-date listing (default: 30 seconds)
    #[serde(default = "default_listing_timeout", with = "duration_serde")]
    pub listing_timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            data_source: DataSourceConfig::default(),
            enable_timeout: default_enable_timeout(),
            listing_timeout: default_listing_timeout(),
        }
    }
}

/// Download behavior
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory downloaded photos are written to (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// How long a cancelled run waits for the download's terminal event (default: 5 seconds)
    #[serde(default = "default_cancel_timeout", with = "duration_serde")]
    pub cancel_timeout: Duration,

    /// Capacity of the per-download event channel (default: 64)
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            cancel_timeout: default_cancel_timeout(),
            event_buffer: default_event_buffer(),
        }
    }
}

/// Decoder behavior
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecodeConfig {
    /// Upper bound on a single decode call (default: 30 seconds)
    #[serde(default = "default_decode_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            timeout: default_decode_timeout(),
        }
    }
}

/// CSV export and share behavior
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory the CSV is written to (default: "./exports")
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,

    /// CSV file name (default: "DroneScan_Codes.csv")
    #[serde(default = "default_csv_file_name")]
    pub csv_file_name: String,

    /// Append to an existing CSV instead of replacing it (default: true)
    #[serde(default = "default_true")]
    pub append: bool,

    /// Offer the CSV to the share capability after export (default: true)
    #[serde(default = "default_true")]
    pub share: bool,

    /// MIME type passed to the share capability (default: "text/csv")
    #[serde(default = "default_share_mime_type")]
    pub share_mime_type: String,

    /// Rules classifying decoded payloads for the CSV `code_type` column
    ///
    /// Tried in order; the first matching rule names the code type.
    #[serde(default = "default_code_types")]
    pub code_types: Vec<CodeTypeRule>,

    /// Code type used when no rule matches (default: "QR_TEXT")
    #[serde(default = "default_fallback_code_type")]
    pub fallback_code_type: String,

    /// Add `latitude,longitude,altitude` columns to each row (default: false)
    ///
    /// No position source is wired in yet, so every value is `0.0`.
    #[serde(default)]
    pub location_columns: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            export_dir: default_export_dir(),
            csv_file_name: default_csv_file_name(),
            append: true,
            share: true,
            share_mime_type: default_share_mime_type(),
            code_types: default_code_types(),
            fallback_code_type: default_fallback_code_type(),
            location_columns: false,
        }
    }
}

/// Named regex rule for classifying a decoded payload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeTypeRule {
    /// Code type written to the CSV, e.g. "EAN13"
    pub name: String,
    /// Regex the payload must match
    pub pattern: String,
}

impl CodeTypeRule {
    /// Create a rule
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
        }
    }
}

impl ExportConfig {
    /// Full path of the CSV file
    pub fn csv_path(&self) -> PathBuf {
        self.export_dir.join(&self.csv_file_name)
    }
}

/// Main configuration for [`ScanPipeline`](crate::ScanPipeline)
///
/// Fields are organized into logical sub-configs:
/// - [`source`](SourceConfig) - data source selection and source timeouts
/// - [`download`](DownloadConfig) - download directory and cancellation
/// - [`decode`](DecodeConfig) - decoder timeout
/// - [`export`](ExportConfig) - CSV location and sharing
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Media source settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Download settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Decode settings
    #[serde(default)]
    pub decode: DecodeConfig,

    /// Export settings
    #[serde(default)]
    pub export: ExportConfig,

    /// Capacity of the pipeline event broadcast channel (default: 1000)
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            download: DownloadConfig::default(),
            decode: DecodeConfig::default(),
            export: ExportConfig::default(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl Config {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {}", path.display(), e),
            key: None,
        })?;
        Self::from_json_str(&contents)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.event_capacity == 0 {
            return Err(config_error("must be greater than zero", "event_capacity"));
        }
        if self.download.event_buffer == 0 {
            return Err(config_error(
                "must be greater than zero",
                "download.event_buffer",
            ));
        }
        if self.decode.timeout.is_zero() {
            return Err(config_error("must be greater than zero", "decode.timeout"));
        }
        let name = self.export.csv_file_name.trim();
        if name.is_empty() || name.contains('/') || name.contains('\\') {
            return Err(config_error(
                "must be a plain file name",
                "export.csv_file_name",
            ));
        }
        Ok(())
    }

    /// Download directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }

    /// Export directory
    pub fn export_dir(&self) -> &PathBuf {
        &self.export.export_dir
    }
}

fn config_error(message: &str, key: &str) -> Error {
    Error::Config {
        message: format!("{key} {message}"),
        key: Some(key.to_string()),
    }
}

// Default value functions
fn default_enable_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_listing_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_cancel_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_event_buffer() -> usize {
    64
}

fn default_decode_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("exports")
}

fn default_csv_file_name() -> String {
    "DroneScan_Codes.csv".to_string()
}

fn default_share_mime_type() -> String {
    "text/csv".to_string()
}

fn default_code_types() -> Vec<CodeTypeRule> {
    vec![
        CodeTypeRule::new("QR_URL", r"^http"),
        CodeTypeRule::new("QR_EMAIL", r"@"),
        CodeTypeRule::new("EAN13", r"^\d{13}$"),
        CodeTypeRule::new("UPC", r"^\d{12}$"),
        CodeTypeRule::new("BARCODE_NUMERIC", r"^\d+$"),
    ]
}

fn default_fallback_code_type() -> String {
    "QR_TEXT".to_string()
}

fn default_true() -> bool {
    true
}

fn default_event_capacity() -> usize {
    1000
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
