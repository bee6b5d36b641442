// Timestamped JSON and CSV snapshots of accepted records
use crate::config::OutputConfig;
use crate::error::{Result, VidsiftError};
use crate::filtering::EnhancedRecord;
use crate::sink::{csv_line, row_for, COLUMNS, TIMESTAMP_FORMAT};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

/// Paths written by one snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SavedFiles {
    pub json: Option<PathBuf>,
    pub csv: Option<PathBuf>,
}

impl SavedFiles {
    pub fn is_empty(&self) -> bool {
        self.json.is_none() && self.csv.is_none()
    }
}

pub struct SnapshotWriter {
    dir: PathBuf,
    prefix: String,
    json: bool,
    csv: bool,
}

impl SnapshotWriter {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, json: bool, csv: bool) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            json,
            csv,
        }
    }

    pub fn from_config(config: &OutputConfig, dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, config.file_prefix.clone(), config.json_output, config.csv_output)
    }

    /// `<prefix>_<YYYYmmdd_HHMMSS>`
    pub fn base_name(&self, at: DateTime<Utc>) -> String {
        format!("{}_{}", self.prefix, at.format("%Y%m%d_%H%M%S"))
    }

    /// Write the enabled formats. Files are write-once: an existing snapshot
    /// with the same name is an error.
    pub fn save(&self, records: &[EnhancedRecord], at: DateTime<Utc>) -> Result<SavedFiles> {
        fs::create_dir_all(&self.dir).map_err(|e| VidsiftError::Io {
            source: e,
            context: format!("Failed to create output directory: {:?}", self.dir),
        })?;

        let base = self.base_name(at);
        let mut saved = SavedFiles::default();

        if self.csv {
            let path = self.dir.join(format!("{}.csv", base));
            let collected_at = at.format(TIMESTAMP_FORMAT).to_string();
            // UTF-8 BOM for spreadsheet tools
            let mut content = format!("\u{feff}{}\n", csv_line(&COLUMNS));
            for record in records {
                content.push_str(&csv_line(&row_for(record, &collected_at)));
                content.push('\n');
            }
            write_new(&path, &content)?;
            tracing::info!(path = %path.display(), rows = records.len(), "CSV snapshot saved");
            saved.csv = Some(path);
        }

        if self.json {
            let path = self.dir.join(format!("{}.json", base));
            let content = serde_json::to_string_pretty(records).map_err(|e| VidsiftError::Json {
                source: e,
                context: "Failed to serialize snapshot".to_string(),
            })?;
            write_new(&path, &content)?;
            tracing::info!(path = %path.display(), records = records.len(), "JSON snapshot saved");
            saved.json = Some(path);
        }

        Ok(saved)
    }
}

fn write_new(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        return Err(VidsiftError::Io {
            source: std::io::Error::new(std::io::ErrorKind::AlreadyExists, "snapshot exists"),
            context: format!("Refusing to overwrite {:?}", path),
        });
    }
    fs::write(path, content).map_err(|e| VidsiftError::Io {
        source: e,
        context: format!("Failed to write snapshot: {:?}", path),
    })
}
