// Multi-stage filtering pipeline for collected video records
//
// Stages run in fixed order and the first failing stage rejects the record:
// time window -> view count -> verified -> language -> region -> quality.
// Accepted records are enhanced with diagnostic scores.

pub mod enhance;
pub mod language;
pub mod stages;
pub mod text;
pub mod time;
mod types;

pub use enhance::{engagement_rate, EnhancedRecord, ResultEnhancer};
pub use language::{LanguageDetector, NullDetector, WhatlangDetector, UNKNOWN_LANGUAGE};
pub use stages::{default_stages, EvalContext, FailurePolicy, Stage, StageVerdict};
pub use types::{FilterOutcome, FilterReport, FilterStatistics, RejectionReason};

use crate::config::{expand_tilde, Config, FilterConfig, ScoringConfig};
use crate::error::Result;
use crate::patterns::PatternRegistry;
use crate::record::VideoRecord;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::Span;

/// Minimum whatlang confidence before a detected language is trusted
const DETECTION_CONFIDENCE: f64 = 0.5;

/// Main filtering pipeline orchestrator
/// Owns the ordered stages and the enhancer; holds no per-run state
pub struct FilterPipeline {
    stages: Vec<Box<dyn Stage>>,
    enhancer: ResultEnhancer,
    span: Span,
}

impl FilterPipeline {
    /// Create pipeline with the default six stages
    ///
    /// # Arguments
    /// * `span` - Span all run and record events are emitted in
    pub fn new(
        filter: &FilterConfig,
        scoring: &ScoringConfig,
        patterns: Arc<PatternRegistry>,
        detector: Arc<dyn LanguageDetector>,
        span: Span,
    ) -> Self {
        let stages = default_stages(filter, scoring, patterns.clone(), detector.clone());
        Self::with_stages(stages, ResultEnhancer::new(patterns, detector), span)
    }

    /// Create pipeline from loaded configuration, with whatlang detection
    pub fn from_config(config: &Config, span: Span) -> Result<Self> {
        let patterns_file = config.patterns.patterns_file.as_deref().map(expand_tilde);
        let patterns = Arc::new(PatternRegistry::load(patterns_file.as_deref())?);
        let detector: Arc<dyn LanguageDetector> = Arc::new(WhatlangDetector::new(
            config.scoring.min_detection_chars,
            DETECTION_CONFIDENCE,
        ));

        Ok(Self::new(
            &config.filter,
            &config.scoring,
            patterns,
            detector,
            span,
        ))
    }

    /// Create pipeline from an explicit stage list
    pub fn with_stages(stages: Vec<Box<dyn Stage>>, enhancer: ResultEnhancer, span: Span) -> Self {
        Self {
            stages,
            enhancer,
            span,
        }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Filter a batch against the current wall clock
    pub fn run(&self, records: &[Value]) -> FilterReport {
        self.run_at(records, Utc::now())
    }

    /// Filter a batch with a fixed reference time.
    ///
    /// Never fails: records that cannot be normalized, or whose evaluation
    /// panics, are rejected with `processing_error` and the batch continues.
    pub fn run_at(&self, records: &[Value], now: DateTime<Utc>) -> FilterReport {
        let _enter = self.span.enter();
        let start = Instant::now();

        let mut stats = FilterStatistics::default();
        let mut accepted = Vec::new();
        let mut outcomes = Vec::with_capacity(records.len());

        tracing::info!(records = records.len(), %now, "Filtering batch");

        for (index, value) in records.iter().enumerate() {
            let evaluated = panic::catch_unwind(AssertUnwindSafe(|| -> Result<_> {
                let record = VideoRecord::from_value(value)?;
                let outcome = self.evaluate(&record, now);
                let enhanced = outcome
                    .is_accepted()
                    .then(|| self.enhancer.enhance(&record, now));
                Ok((outcome, enhanced))
            }));

            let (outcome, enhanced) = match evaluated {
                Ok(Ok(pair)) => pair,
                Ok(Err(e)) => {
                    tracing::warn!(index, error = %e, "Record could not be normalized");
                    (FilterOutcome::Rejected(RejectionReason::ProcessingError), None)
                }
                Err(_) => {
                    tracing::warn!(index, "Record evaluation panicked");
                    (FilterOutcome::Rejected(RejectionReason::ProcessingError), None)
                }
            };

            self.record_passes(&mut stats, outcome);
            stats.record_outcome(outcome);
            accepted.extend(enhanced);
            outcomes.push(outcome);
        }

        stats.processing_time_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            total = stats.total_input,
            accepted = stats.final_output,
            rate = stats.filter_rate(),
            elapsed_ms = stats.processing_time_ms,
            "Filtering complete"
        );
        for (reason, count) in &stats.rejection_histogram {
            tracing::debug!(%reason, count, "Rejections");
        }

        FilterReport {
            accepted,
            outcomes,
            stats,
        }
    }

    /// Run the stages over one normalized record, stopping at the first failure
    pub fn evaluate(&self, record: &VideoRecord, now: DateTime<Utc>) -> FilterOutcome {
        let ctx = EvalContext::new(record, now);

        for stage in &self.stages {
            let verdict = stage.evaluate(&ctx).unwrap_or_else(|e| {
                let verdict = stage.policy().on_error();
                tracing::warn!(
                    id = %record.id,
                    stage = stage.name(),
                    policy = ?stage.policy(),
                    ?verdict,
                    error = %e,
                    "Stage failed, applying failure policy"
                );
                verdict
            });

            if verdict == StageVerdict::Fail {
                tracing::debug!(id = %record.id, reason = %stage.reason(), "Record rejected");
                return FilterOutcome::Rejected(stage.reason());
            }
        }

        FilterOutcome::Accepted
    }

    /// Count the stages a record got through before its outcome was decided
    fn record_passes(&self, stats: &mut FilterStatistics, outcome: FilterOutcome) {
        if outcome == FilterOutcome::Rejected(RejectionReason::ProcessingError) {
            return;
        }
        for stage in &self.stages {
            if outcome.reason() == Some(stage.reason()) {
                break;
            }
            stats.record_pass(stage.reason());
        }
    }
}
