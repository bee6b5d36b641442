//! Tabular output of accepted records
//!
//! A sink receives enhanced records as rows of a fixed column schema plus a
//! separate summary table. [`CsvWorkbook`] is the local implementation: one
//! CSV file per sheet inside a directory.

mod workbook;

pub use workbook::CsvWorkbook;

use crate::error::Result;
use crate::filtering::{EnhancedRecord, UNKNOWN_LANGUAGE};
use crate::filtering::time;
use crate::record::{RawCount, RawTimestamp};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Column schema shared by every sheet and CSV snapshot
pub const COLUMNS: [&str; 20] = [
    "video_id",
    "author_username",
    "author_nickname",
    "description",
    "view_count",
    "like_count",
    "comment_count",
    "share_count",
    "create_time",
    "video_url",
    "music_title",
    "music_author",
    "hashtags",
    "is_verified",
    "follower_count",
    "following_count",
    "duration",
    "region",
    "language",
    "collected_at",
];

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Result of a row upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub count: usize,
    /// 1-based row of the first written record (row 1 is the header)
    pub start_row: usize,
    pub url: String,
}

/// Result of a summary write
#[derive(Debug, Clone)]
pub struct SummaryReceipt {
    pub stats: SummaryStats,
    pub url: String,
}

/// Aggregate table written to the summary sheet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub total: usize,
    pub collected_at: String,
    pub mean_views: f64,
    pub max_views: u64,
    pub min_views: u64,
    pub mean_likes: f64,
    pub max_likes: u64,
    pub verified_count: usize,
    pub dominant_language: String,
}

impl SummaryStats {
    pub fn from_records(records: &[EnhancedRecord], collected_at: DateTime<Utc>) -> Self {
        let views: Vec<u64> = records.iter().map(|r| count(&r.record.view_count)).collect();
        let likes: Vec<u64> = records.iter().map(|r| count(&r.record.like_count)).collect();

        Self {
            total: records.len(),
            collected_at: collected_at.format(TIMESTAMP_FORMAT).to_string(),
            mean_views: mean(&views),
            max_views: views.iter().copied().max().unwrap_or(0),
            min_views: views.iter().copied().min().unwrap_or(0),
            mean_likes: mean(&likes),
            max_likes: likes.iter().copied().max().unwrap_or(0),
            verified_count: records.iter().filter(|r| r.record.is_verified).count(),
            dominant_language: dominant_language(records),
        }
    }

    /// Label/value rows as written to the summary sheet
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("total_videos", self.total.to_string()),
            ("collected_at", self.collected_at.clone()),
            ("mean_views", thousands(self.mean_views.round() as u64)),
            ("max_views", thousands(self.max_views)),
            ("min_views", thousands(self.min_views)),
            ("mean_likes", thousands(self.mean_likes.round() as u64)),
            ("max_likes", thousands(self.max_likes)),
            ("verified_accounts", self.verified_count.to_string()),
            ("dominant_language", self.dominant_language.clone()),
        ]
    }
}

/// Destination for accepted records
pub trait TabularSink {
    /// Append rows after existing content, or replace it when `clear_existing`
    fn upload(
        &self,
        records: &[EnhancedRecord],
        sheet: &str,
        clear_existing: bool,
    ) -> Result<UploadReceipt>;

    /// Replace the summary sheet with aggregates over `records`
    fn write_summary(&self, records: &[EnhancedRecord]) -> Result<SummaryReceipt>;
}

/// One row in [`COLUMNS`] order. Missing fields become empty cells and
/// malformed counts become 0.
pub fn row_for(record: &EnhancedRecord, collected_at: &str) -> Vec<String> {
    let r = &record.record;
    let language = if r.language.is_empty() && record.detected_language != UNKNOWN_LANGUAGE {
        record.detected_language.clone()
    } else {
        r.language.clone()
    };

    vec![
        r.id.clone(),
        r.author_username.clone(),
        r.author_nickname.clone(),
        r.description.clone(),
        count(&r.view_count).to_string(),
        count(&r.like_count).to_string(),
        count(&r.comment_count).to_string(),
        count(&r.share_count).to_string(),
        timestamp_cell(&r.create_time),
        r.video_url.clone(),
        r.music_title.clone(),
        r.music_author.clone(),
        r.hashtags
            .iter()
            .map(|tag| format!("#{}", tag))
            .collect::<Vec<_>>()
            .join(", "),
        if r.is_verified { "✓" } else { "" }.to_string(),
        count(&r.follower_count).to_string(),
        count(&r.following_count).to_string(),
        count(&r.duration).to_string(),
        r.region.clone(),
        language,
        collected_at.to_string(),
    ]
}

/// Serialize one CSV line (without terminator), quoting where needed
pub fn csv_line<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|field| {
            let field = field.as_ref();
            if field.contains([',', '"', '\n', '\r']) {
                format!("\"{}\"", field.replace('"', "\"\""))
            } else {
                field.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn count(raw: &RawCount) -> u64 {
    raw.parse().ok().flatten().unwrap_or(0)
}

fn timestamp_cell(raw: &RawTimestamp) -> String {
    time::parse_timestamp(raw)
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default()
}

fn mean(values: &[u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| *v as f64).sum::<f64>() / values.len() as f64
}

/// Most frequent detected language; ties go to the alphabetically first code
fn dominant_language(records: &[EnhancedRecord]) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        *counts.entry(record.detected_language.as_str()).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .max_by(|(a_lang, a), (b_lang, b)| a.cmp(b).then_with(|| b_lang.cmp(a_lang)))
        .map(|(lang, _)| lang.to_string())
        .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string())
}

fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
