//! Filter stages
//!
//! Each stage answers pass/fail for one record. A stage that cannot reach a
//! decision returns an error, and its [`FailurePolicy`] decides the verdict.

use chrono::{DateTime, Utc};
use std::cell::OnceCell;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::{FilterConfig, ScoringConfig};
use crate::error::Result;
use crate::filtering::language::LanguageDetector;
use crate::filtering::text;
use crate::filtering::time;
use crate::filtering::types::RejectionReason;
use crate::patterns::PatternRegistry;
use crate::record::VideoRecord;

/// Decision of a single stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageVerdict {
    Pass,
    Fail,
}

impl StageVerdict {
    fn from_bool(pass: bool) -> Self {
        if pass {
            Self::Pass
        } else {
            Self::Fail
        }
    }
}

/// Verdict applied when a stage errors out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    FailOpen,
    FailClosed,
}

impl FailurePolicy {
    pub fn on_error(self) -> StageVerdict {
        match self {
            Self::FailOpen => StageVerdict::Pass,
            Self::FailClosed => StageVerdict::Fail,
        }
    }
}

/// Per-record evaluation state shared by the stages
pub struct EvalContext<'a> {
    pub record: &'a VideoRecord,
    pub now: DateTime<Utc>,
    text: OnceCell<String>,
}

impl<'a> EvalContext<'a> {
    pub fn new(record: &'a VideoRecord, now: DateTime<Utc>) -> Self {
        Self {
            record,
            now,
            text: OnceCell::new(),
        }
    }

    /// Extracted, lower-cased text; computed on first use
    pub fn text(&self) -> &str {
        self.text.get_or_init(|| text::extract_text(self.record))
    }
}

/// One step of the filter pipeline
pub trait Stage: Send + Sync {
    /// Tag recorded when this stage rejects a record
    fn reason(&self) -> RejectionReason;

    fn policy(&self) -> FailurePolicy;

    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<StageVerdict>;

    fn name(&self) -> &'static str {
        self.reason().as_str()
    }
}

/// Recency check against the configured window
pub struct TimeWindowStage {
    hours: i64,
}

impl TimeWindowStage {
    pub fn new(hours: i64) -> Self {
        Self { hours }
    }
}

impl Stage for TimeWindowStage {
    fn reason(&self) -> RejectionReason {
        RejectionReason::TimeRange
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::FailClosed
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<StageVerdict> {
        let posted = time::parse_timestamp(&ctx.record.create_time)?;
        Ok(StageVerdict::from_bool(time::within_window(
            posted, ctx.now, self.hours,
        )))
    }
}

/// Minimum view count
pub struct ViewCountStage {
    min_views: u64,
}

impl ViewCountStage {
    pub fn new(min_views: u64) -> Self {
        Self { min_views }
    }
}

impl Stage for ViewCountStage {
    fn reason(&self) -> RejectionReason {
        RejectionReason::ViewCount
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::FailClosed
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<StageVerdict> {
        Ok(match ctx.record.view_count.parse()? {
            Some(views) => StageVerdict::from_bool(views >= self.min_views),
            None => StageVerdict::Fail,
        })
    }
}

/// Excludes verified (corporate / celebrity) accounts when enabled
pub struct VerifiedStage {
    exclude_verified: bool,
}

impl VerifiedStage {
    pub fn new(exclude_verified: bool) -> Self {
        Self { exclude_verified }
    }
}

impl Stage for VerifiedStage {
    fn reason(&self) -> RejectionReason {
        RejectionReason::VerifiedAccount
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::FailClosed
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<StageVerdict> {
        Ok(StageVerdict::from_bool(
            !self.exclude_verified || !ctx.record.is_verified,
        ))
    }
}

/// Passes when any of script ratio, detected language or keyword density
/// indicates target-language content
pub struct LanguageStage {
    patterns: Arc<PatternRegistry>,
    detector: Arc<dyn LanguageDetector>,
    target_languages: HashSet<String>,
    script_ratio_threshold: f64,
    keyword_density_threshold: f64,
}

impl LanguageStage {
    pub fn new(
        patterns: Arc<PatternRegistry>,
        detector: Arc<dyn LanguageDetector>,
        target_languages: &[String],
        scoring: &ScoringConfig,
    ) -> Self {
        Self {
            patterns,
            detector,
            target_languages: target_languages.iter().map(|l| l.to_lowercase()).collect(),
            script_ratio_threshold: scoring.script_ratio_threshold,
            keyword_density_threshold: scoring.keyword_density_threshold,
        }
    }
}

impl Stage for LanguageStage {
    fn reason(&self) -> RejectionReason {
        RejectionReason::Language
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::FailClosed
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<StageVerdict> {
        let text = ctx.text();
        if text.is_empty() {
            return Ok(StageVerdict::Fail);
        }

        if text::script_ratio(&self.patterns, text) > self.script_ratio_threshold {
            return Ok(StageVerdict::Pass);
        }

        let detected = self.detector.detect(text);
        if self.target_languages.contains(&detected.to_lowercase()) {
            return Ok(StageVerdict::Pass);
        }

        Ok(StageVerdict::from_bool(
            text::keyword_density(&self.patterns, text) > self.keyword_density_threshold,
        ))
    }
}

/// Regional authenticity: explicit region, tourist-content exclusion, then a
/// weighted authenticity score
pub struct RegionStage {
    patterns: Arc<PatternRegistry>,
    target_region: String,
    scoring: ScoringConfig,
}

impl RegionStage {
    pub fn new(patterns: Arc<PatternRegistry>, target_region: &str, scoring: &ScoringConfig) -> Self {
        Self {
            patterns,
            target_region: target_region.to_string(),
            scoring: scoring.clone(),
        }
    }

    /// Weighted score; errors when the follower count is malformed
    pub fn authenticity(&self, ctx: &EvalContext<'_>) -> Result<f64> {
        let text = ctx.text();
        let followers = ctx.record.follower_count.parse_or_zero()?;
        let audience_bonus = if followers < self.scoring.regular_user_max_followers {
            self.scoring.regular_user_bonus
        } else {
            self.scoring.established_user_bonus
        };

        Ok(text::script_ratio(&self.patterns, text) * self.scoring.script_weight
            + text::keyword_density(&self.patterns, text) * self.scoring.keyword_weight
            + audience_bonus)
    }
}

impl Stage for RegionStage {
    fn reason(&self) -> RejectionReason {
        RejectionReason::Region
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::FailOpen
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<StageVerdict> {
        if ctx.record.region.trim().eq_ignore_ascii_case(self.target_region.trim()) {
            return Ok(StageVerdict::Pass);
        }

        if let Some(keyword) = self.patterns.find_exclusion(ctx.text()) {
            tracing::debug!(id = %ctx.record.id, keyword, "Exclusion keyword found");
            return Ok(StageVerdict::Fail);
        }

        let score = self.authenticity(ctx)?;
        Ok(StageVerdict::from_bool(
            score > self.scoring.authenticity_threshold,
        ))
    }
}

/// Spam and low-engagement rejection
pub struct QualityStage {
    patterns: Arc<PatternRegistry>,
    min_description_chars: usize,
    min_engagement_rate: f64,
}

impl QualityStage {
    pub fn new(patterns: Arc<PatternRegistry>, scoring: &ScoringConfig) -> Self {
        Self {
            patterns,
            min_description_chars: scoring.min_description_chars,
            min_engagement_rate: scoring.min_engagement_rate,
        }
    }
}

impl Stage for QualityStage {
    fn reason(&self) -> RejectionReason {
        RejectionReason::Quality
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::FailOpen
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<StageVerdict> {
        let record = ctx.record;
        if record.description.chars().count() < self.min_description_chars {
            return Ok(StageVerdict::Fail);
        }

        let views = record.view_count.parse_or_zero()?;
        if views > 0 {
            let engaged = record
                .like_count
                .parse_or_zero()?
                .saturating_add(record.comment_count.parse_or_zero()?);
            if (engaged as f64 / views as f64) < self.min_engagement_rate {
                return Ok(StageVerdict::Fail);
            }
        }

        if let Some(pattern) = self.patterns.find_spam(&record.description) {
            tracing::debug!(id = %record.id, pattern, "Spam pattern matched");
            return Ok(StageVerdict::Fail);
        }

        Ok(StageVerdict::Pass)
    }
}

/// The six stages in evaluation order
pub fn default_stages(
    filter: &FilterConfig,
    scoring: &ScoringConfig,
    patterns: Arc<PatternRegistry>,
    detector: Arc<dyn LanguageDetector>,
) -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(TimeWindowStage::new(filter.time_range_hours)),
        Box::new(ViewCountStage::new(filter.min_views)),
        Box::new(VerifiedStage::new(filter.exclude_verified)),
        Box::new(LanguageStage::new(
            patterns.clone(),
            detector,
            &filter.target_languages,
            scoring,
        )),
        Box::new(RegionStage::new(
            patterns.clone(),
            &filter.target_region,
            scoring,
        )),
        Box::new(QualityStage::new(patterns, scoring)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filtering::language::NullDetector;
    use chrono::{Duration, TimeZone};
    use serde_json::{json, Value};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 5, 12, 0, 0).unwrap()
    }

    fn patterns() -> Arc<PatternRegistry> {
        Arc::new(PatternRegistry::builtin().unwrap())
    }

    fn verdict(stage: &dyn Stage, value: Value) -> Result<StageVerdict> {
        let record = VideoRecord::from_value(&value).unwrap();
        let ctx = EvalContext::new(&record, now());
        stage.evaluate(&ctx)
    }

    #[test]
    fn test_time_window() {
        let stage = TimeWindowStage::new(24);
        let fresh = (now() - Duration::hours(2)).format("%Y-%m-%d %H:%M:%S").to_string();
        let stale = (now() - Duration::hours(30)).format("%Y-%m-%dT%H:%M:%S").to_string();

        assert_eq!(verdict(&stage, json!({ "createTime": fresh })).unwrap(), StageVerdict::Pass);
        assert_eq!(verdict(&stage, json!({ "createTime": stale })).unwrap(), StageVerdict::Fail);
        assert!(verdict(&stage, json!({})).is_err());
        assert_eq!(stage.policy().on_error(), StageVerdict::Fail);
    }

    #[test]
    fn test_time_window_wider_than_duration() {
        let stage = TimeWindowStage::new(i64::MAX / 1000);
        let posted = (now() - Duration::hours(1)).format("%Y-%m-%d %H:%M:%S").to_string();
        assert_eq!(verdict(&stage, json!({ "createTime": posted })).unwrap(), StageVerdict::Pass);
    }

    #[test]
    fn test_view_count() {
        let stage = ViewCountStage::new(500_000);
        assert_eq!(verdict(&stage, json!({ "viewCount": "1.2M" })).unwrap(), StageVerdict::Pass);
        assert_eq!(verdict(&stage, json!({ "viewCount": 500000 })).unwrap(), StageVerdict::Pass);
        assert_eq!(verdict(&stage, json!({ "viewCount": 499999 })).unwrap(), StageVerdict::Fail);
        assert_eq!(verdict(&stage, json!({})).unwrap(), StageVerdict::Fail);
        assert!(verdict(&stage, json!({ "viewCount": "many" })).is_err());
    }

    #[test]
    fn test_verified_toggle() {
        let record = json!({ "isVerified": true });
        assert_eq!(
            verdict(&VerifiedStage::new(true), record.clone()).unwrap(),
            StageVerdict::Fail
        );
        assert_eq!(
            verdict(&VerifiedStage::new(false), record).unwrap(),
            StageVerdict::Pass
        );
        assert_eq!(
            verdict(&VerifiedStage::new(true), json!({ "author": { "verified": false } })).unwrap(),
            StageVerdict::Pass
        );
    }

    struct FixedDetector(&'static str);

    impl LanguageDetector for FixedDetector {
        fn detect(&self, _text: &str) -> String {
            self.0.to_string()
        }
    }

    fn language_stage(detector: Arc<dyn LanguageDetector>) -> LanguageStage {
        LanguageStage::new(
            patterns(),
            detector,
            &["ja".to_string(), "jp".to_string()],
            &ScoringConfig::default(),
        )
    }

    #[test]
    fn test_language_signals() {
        let stage = language_stage(Arc::new(NullDetector));
        // script ratio
        assert_eq!(
            verdict(&stage, json!({ "description": "今日の東京は暑い" })).unwrap(),
            StageVerdict::Pass
        );
        // keyword density: "jr" over 3 tokens
        assert_eq!(
            verdict(&stage, json!({ "description": "riding jr today" })).unwrap(),
            StageVerdict::Pass
        );
        assert_eq!(
            verdict(&stage, json!({ "description": "a plain english caption here" })).unwrap(),
            StageVerdict::Fail
        );
        assert_eq!(verdict(&stage, json!({})).unwrap(), StageVerdict::Fail);
    }

    #[test]
    fn test_language_detector_signal() {
        let stage = language_stage(Arc::new(FixedDetector("JA")));
        assert_eq!(
            verdict(&stage, json!({ "description": "romaji caption desu yo" })).unwrap(),
            StageVerdict::Pass
        );
    }

    fn region_stage() -> RegionStage {
        RegionStage::new(patterns(), "JP", &ScoringConfig::default())
    }

    #[test]
    fn test_region_explicit_match() {
        let stage = region_stage();
        assert_eq!(
            verdict(&stage, json!({ "region": "jp", "description": "tourist trip" })).unwrap(),
            StageVerdict::Pass
        );
    }

    #[test]
    fn test_region_exclusion_keyword() {
        let stage = region_stage();
        assert_eq!(
            verdict(&stage, json!({ "description": "東京 travel vlog" })).unwrap(),
            StageVerdict::Fail
        );
    }

    #[test]
    fn test_region_authenticity_score() {
        let stage = region_stage();
        // all-Japanese text from a small account: 0.4 + keyword term + 0.3
        assert_eq!(
            verdict(&stage, json!({ "description": "渋谷の夜", "followerCount": 1200 })).unwrap(),
            StageVerdict::Pass
        );
        // latin text from a large account: 0 + 0 + 0.1
        assert_eq!(
            verdict(&stage, json!({ "description": "night walk", "followerCount": "2.5M" })).unwrap(),
            StageVerdict::Fail
        );
        // latin text from a small account: 0.3 is not above 0.4
        assert_eq!(
            verdict(&stage, json!({ "description": "night walk", "followerCount": 10 })).unwrap(),
            StageVerdict::Fail
        );
    }

    #[test]
    fn test_region_malformed_followers_errors() {
        let stage = region_stage();
        assert!(verdict(&stage, json!({ "description": "night walk", "followerCount": "a lot" })).is_err());
        assert_eq!(stage.policy().on_error(), StageVerdict::Pass);
    }

    fn quality_stage() -> QualityStage {
        QualityStage::new(patterns(), &ScoringConfig::default())
    }

    #[test]
    fn test_quality_description_length() {
        let stage = quality_stage();
        assert_eq!(verdict(&stage, json!({ "description": "短い" })).unwrap(), StageVerdict::Fail);
        assert_eq!(verdict(&stage, json!({ "description": "五文字です" })).unwrap(), StageVerdict::Pass);
    }

    #[test]
    fn test_quality_engagement() {
        let stage = quality_stage();
        let low = json!({ "description": "普通の動画です", "viewCount": 1000000, "likeCount": 500, "commentCount": 400 });
        let ok = json!({ "description": "普通の動画です", "viewCount": 1000000, "likeCount": 900, "commentCount": 100 });
        assert_eq!(verdict(&stage, low).unwrap(), StageVerdict::Fail);
        assert_eq!(verdict(&stage, ok).unwrap(), StageVerdict::Pass);
    }

    #[test]
    fn test_quality_spam() {
        let stage = quality_stage();
        assert_eq!(
            verdict(&stage, json!({ "description": "見てね!!!!!" })).unwrap(),
            StageVerdict::Fail
        );
        assert_eq!(
            verdict(&stage, json!({ "description": "詳細は https://example.com" })).unwrap(),
            StageVerdict::Fail
        );
    }

    #[test]
    fn test_quality_malformed_counts_error() {
        let stage = quality_stage();
        assert!(verdict(&stage, json!({ "description": "普通の動画です", "viewCount": 1000, "likeCount": "n/a" })).is_err());
        assert_eq!(stage.policy(), FailurePolicy::FailOpen);
    }

    #[test]
    fn test_quality_huge_counts_saturate() {
        let stage = quality_stage();
        let viral = json!({
            "description": "普通の動画です",
            "viewCount": 1000000,
            "likeCount": "9999999999B",
            "commentCount": "9999999999B",
        });
        assert_eq!(verdict(&stage, viral).unwrap(), StageVerdict::Pass);
    }

    #[test]
    fn test_default_stage_order() {
        let stages = default_stages(
            &FilterConfig::default(),
            &ScoringConfig::default(),
            patterns(),
            Arc::new(NullDetector),
        );
        let names: Vec<_> = stages.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec!["time_range", "view_count", "verified_account", "language", "region", "quality"]
        );
    }
}
