// Diagnostic fields attached to accepted records
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::Result;
use crate::filtering::language::LanguageDetector;
use crate::filtering::text;
use crate::filtering::time;
use crate::patterns::PatternRegistry;
use crate::record::VideoRecord;

/// Keys written by the enhancer; stripped from the carried payload so the
/// serialized record never holds two copies
const COMPUTED_KEYS: &[&str] = &[
    "filtered_at",
    "japanese_score",
    "keyword_score",
    "detected_language",
    "engagement_rate",
    "hours_since_post",
];

/// Accepted record: original payload plus computed diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct EnhancedRecord {
    #[serde(flatten)]
    pub source: Map<String, Value>,
    pub filtered_at: String,
    pub japanese_score: f64,
    pub keyword_score: f64,
    pub detected_language: String,
    pub engagement_rate: f64,
    pub hours_since_post: Option<f64>,
    /// Normalized view of `source`, used by the sink and exporters
    #[serde(skip)]
    pub record: VideoRecord,
}

pub struct ResultEnhancer {
    patterns: Arc<PatternRegistry>,
    detector: Arc<dyn LanguageDetector>,
}

impl ResultEnhancer {
    pub fn new(patterns: Arc<PatternRegistry>, detector: Arc<dyn LanguageDetector>) -> Self {
        Self { patterns, detector }
    }

    /// Build the enhanced copy of `record`; the input is left untouched.
    /// Language is detected afresh rather than reused from the gate.
    pub fn enhance(&self, record: &VideoRecord, now: DateTime<Utc>) -> EnhancedRecord {
        let content = text::extract_text(record);

        let mut source = record.source.clone();
        for key in COMPUTED_KEYS {
            source.remove(*key);
        }

        EnhancedRecord {
            source,
            filtered_at: now.to_rfc3339_opts(SecondsFormat::Micros, true),
            japanese_score: text::script_ratio(&self.patterns, &content),
            keyword_score: text::keyword_density(&self.patterns, &content),
            detected_language: self.detector.detect(&content),
            engagement_rate: engagement_rate(record),
            hours_since_post: time::parse_iso8601(&record.create_time)
                .map(|posted| time::hours_between(posted, now)),
            record: record.clone(),
        }
    }
}

/// (likes + comments) / views; 0 when views are zero or any count is malformed
pub fn engagement_rate(record: &VideoRecord) -> f64 {
    match engagement_counts(record) {
        Ok((views, engaged)) if views > 0 => engaged as f64 / views as f64,
        _ => 0.0,
    }
}

fn engagement_counts(record: &VideoRecord) -> Result<(u64, u64)> {
    let views = record.view_count.parse_or_zero()?;
    let engaged = record
        .like_count
        .parse_or_zero()?
        .saturating_add(record.comment_count.parse_or_zero()?);
    Ok((views, engaged))
}
