//! Flat record files
//!
//! A record file holds `{id, parent_id, name}` entries, either as a JSON array
//! or as `[[records]]` tables in TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::util::path::ensure_file_exists;

/// One flat, parent-referencing record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    pub name: String,
}

impl Record {
    pub fn new(id: i64, parent_id: Option<i64>, name: impl Into<String>) -> Self {
        Self {
            id,
            parent_id,
            name: name.into(),
        }
    }
}

/// Supported record file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Json,
    Toml,
}

impl RecordFormat {
    /// Pick the format from the file extension.
    pub fn from_path(path: &Path) -> ApplicationResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            _ => Err(ApplicationError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TomlRecords {
    #[serde(default)]
    records: Vec<Record>,
}

/// Parse records from file content.
pub fn parse_records(content: &str, format: RecordFormat) -> Result<Vec<Record>, String> {
    match format {
        RecordFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        RecordFormat::Toml => toml::from_str::<TomlRecords>(content)
            .map(|file| file.records)
            .map_err(|e| e.to_string()),
    }
}

/// Load records from `path`, detecting the format from its extension.
#[instrument(level = "debug")]
pub fn load_records(path: &Path) -> ApplicationResult<Vec<Record>> {
    let format = RecordFormat::from_path(path)?;
    ensure_file_exists(path)?;

    let content = std::fs::read_to_string(path).with_path_context("read records", path)?;
    let records = parse_records(&content, format).map_err(|message| ApplicationError::Parse {
        path: path.to_path_buf(),
        message,
    })?;
    debug!(records = records.len(), ?format, "records loaded");
    Ok(records)
}
