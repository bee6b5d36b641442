// Directory-backed workbook: one CSV file per sheet
use super::{
    csv_line, row_for, SummaryReceipt, SummaryStats, TabularSink, UploadReceipt, COLUMNS,
    TIMESTAMP_FORMAT,
};
use crate::error::{Result, VidsiftError};
use crate::filtering::EnhancedRecord;
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct CsvWorkbook {
    dir: PathBuf,
    summary_sheet: String,
}

impl CsvWorkbook {
    /// Open (creating if needed) the workbook directory
    pub fn open(dir: impl Into<PathBuf>, summary_sheet: impl Into<String>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            VidsiftError::Sink(format!("Cannot create workbook directory {:?}: {}", dir, e))
        })?;

        Ok(Self {
            dir,
            summary_sheet: summary_sheet.into(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the CSV file backing `sheet`
    pub fn sheet_path(&self, sheet: &str) -> Result<PathBuf> {
        let sheet = sheet.trim();
        if sheet.is_empty() || sheet.contains(['/', '\\']) || sheet.starts_with('.') {
            return Err(VidsiftError::Sink(format!("Invalid sheet name: {:?}", sheet)));
        }
        Ok(self.dir.join(format!("{}.csv", sheet)))
    }

    fn write_file(path: &Path, content: &str) -> Result<()> {
        fs::write(path, content)
            .map_err(|e| VidsiftError::Sink(format!("Cannot write {:?}: {}", path, e)))
    }
}

impl TabularSink for CsvWorkbook {
    fn upload(
        &self,
        records: &[EnhancedRecord],
        sheet: &str,
        clear_existing: bool,
    ) -> Result<UploadReceipt> {
        let path = self.sheet_path(sheet)?;
        let collected_at = Utc::now().format(TIMESTAMP_FORMAT).to_string();

        let existing_rows = if clear_existing || !path.exists() {
            0
        } else {
            let content = fs::read_to_string(&path)
                .map_err(|e| VidsiftError::Sink(format!("Cannot read {:?}: {}", path, e)))?;
            count_rows(&content)
        };
        if existing_rows == 0 {
            Self::write_file(&path, &format!("{}\n", csv_line(&COLUMNS)))?;
        }

        let mut body = String::new();
        for record in records {
            body.push_str(&csv_line(&row_for(record, &collected_at)));
            body.push('\n');
        }

        let mut file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|e| VidsiftError::Sink(format!("Cannot open {:?}: {}", path, e)))?;
        file.write_all(body.as_bytes())
            .map_err(|e| VidsiftError::Sink(format!("Cannot append to {:?}: {}", path, e)))?;

        tracing::info!(sheet, rows = records.len(), path = %path.display(), "Rows uploaded");

        Ok(UploadReceipt {
            count: records.len(),
            start_row: existing_rows.max(1) + 1,
            url: file_url(&path),
        })
    }

    fn write_summary(&self, records: &[EnhancedRecord]) -> Result<SummaryReceipt> {
        let path = self.sheet_path(&self.summary_sheet)?;
        let stats = SummaryStats::from_records(records, Utc::now());

        let mut content = format!("{}\n", csv_line(&["metric", "value"]));
        for (label, value) in stats.rows() {
            content.push_str(&csv_line(&[label, value.as_str()]));
            content.push('\n');
        }
        Self::write_file(&path, &content)?;

        tracing::info!(sheet = %self.summary_sheet, total = stats.total, "Summary written");

        Ok(SummaryReceipt {
            stats,
            url: file_url(&path),
        })
    }
}

/// Number of CSV records in `content`; newlines inside quoted fields do not count
fn count_rows(content: &str) -> usize {
    let mut rows = 0;
    let mut in_quotes = false;
    let mut pending = false;

    for c in content.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                pending = true;
            }
            '\n' if !in_quotes => {
                rows += 1;
                pending = false;
            }
            _ => pending = true,
        }
    }

    rows + usize::from(pending)
}

fn file_url(path: &Path) -> String {
    let absolute = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    format!("file://{}", absolute.display())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_rows() {
        assert_eq!(count_rows(""), 0);
        assert_eq!(count_rows("a,b\n"), 1);
        assert_eq!(count_rows("a,b\n1,2"), 2);
        assert_eq!(count_rows("a,b\n\"x\ny\",2\n"), 2);
    }

    #[test]
    fn test_sheet_names() {
        let dir = tempfile::tempdir().unwrap();
        let workbook = CsvWorkbook::open(dir.path(), "summary").unwrap();
        assert!(workbook.sheet_path("viral_videos").is_ok());
        assert!(workbook.sheet_path("../escape").is_err());
        assert!(workbook.sheet_path("  ").is_err());
    }
}
