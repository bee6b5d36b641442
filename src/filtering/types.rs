// Shared types for the filtering pipeline
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::filtering::enhance::EnhancedRecord;

/// Why a record was rejected. Exactly one reason is recorded per rejected record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    TimeRange,
    ViewCount,
    VerifiedAccount,
    Language,
    Region,
    Quality,
    ProcessingError,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TimeRange => "time_range",
            Self::ViewCount => "view_count",
            Self::VerifiedAccount => "verified_account",
            Self::Language => "language",
            Self::Region => "region",
            Self::Quality => "quality",
            Self::ProcessingError => "processing_error",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum FilterOutcome {
    Accepted,
    Rejected(RejectionReason),
}

impl FilterOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    pub fn reason(&self) -> Option<RejectionReason> {
        match self {
            Self::Accepted => None,
            Self::Rejected(reason) => Some(*reason),
        }
    }
}

/// Statistics from one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterStatistics {
    /// Number of input records
    pub total_input: usize,
    /// Records that passed each stage
    pub passed_time: usize,
    pub passed_views: usize,
    pub passed_verified: usize,
    pub passed_language: usize,
    pub passed_region: usize,
    pub passed_quality: usize,
    /// Number of accepted records
    pub final_output: usize,
    /// Rejections grouped by first failing stage
    pub rejection_histogram: BTreeMap<RejectionReason, usize>,
    /// Total processing time in milliseconds
    #[serde(skip)]
    pub processing_time_ms: u64,
}

impl FilterStatistics {
    /// Percentage of input that was accepted; 0 for an empty batch
    pub fn filter_rate(&self) -> f64 {
        if self.total_input == 0 {
            return 0.0;
        }
        self.final_output as f64 / self.total_input as f64 * 100.0
    }

    pub fn total_rejected(&self) -> usize {
        self.rejection_histogram.values().sum()
    }

    pub(crate) fn record_pass(&mut self, stage: RejectionReason) {
        let counter = match stage {
            RejectionReason::TimeRange => &mut self.passed_time,
            RejectionReason::ViewCount => &mut self.passed_views,
            RejectionReason::VerifiedAccount => &mut self.passed_verified,
            RejectionReason::Language => &mut self.passed_language,
            RejectionReason::Region => &mut self.passed_region,
            RejectionReason::Quality => &mut self.passed_quality,
            RejectionReason::ProcessingError => return,
        };
        *counter += 1;
    }

    pub(crate) fn record_outcome(&mut self, outcome: FilterOutcome) {
        self.total_input += 1;
        match outcome {
            FilterOutcome::Accepted => self.final_output += 1,
            FilterOutcome::Rejected(reason) => {
                *self.rejection_histogram.entry(reason).or_insert(0) += 1;
            }
        }
    }

    /// Fold another batch's statistics into this one. Order-independent.
    pub fn merge(&mut self, other: &FilterStatistics) {
        self.total_input += other.total_input;
        self.passed_time += other.passed_time;
        self.passed_views += other.passed_views;
        self.passed_verified += other.passed_verified;
        self.passed_language += other.passed_language;
        self.passed_region += other.passed_region;
        self.passed_quality += other.passed_quality;
        self.final_output += other.final_output;
        for (reason, count) in &other.rejection_histogram {
            *self.rejection_histogram.entry(*reason).or_insert(0) += count;
        }
        self.processing_time_ms += other.processing_time_ms;
    }
}

/// Result of a pipeline run
#[derive(Debug, Clone)]
pub struct FilterReport {
    /// Accepted records in input order
    pub accepted: Vec<EnhancedRecord>,
    /// One outcome per input record, in input order
    pub outcomes: Vec<FilterOutcome>,
    pub stats: FilterStatistics,
}
