//! Report payloads handed over by the aggregation side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SubmissionError};

/// Summary of one subject's measurements over one reporting period.
///
/// Built off-core by an `Aggregator`; validated once at the submission
/// boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportCandidate {
    pub subject_id: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total_output_kwh: f64,
    pub data_completeness_percent: f64,
    pub reading_count: u64,
    /// Content hash of the aggregated readings
    pub data_hash: String,
    pub peak_output_w: Option<f64>,
    pub average_output_w: Option<f64>,
    pub capacity_factor: Option<f64>,
}

impl ReportCandidate {
    pub fn validate(&self) -> Result<()> {
        if self.subject_id.trim().is_empty() {
            return Err(SubmissionError::ValidationError(
                "subject_id must not be empty".to_string(),
            ));
        }
        if self.period_end <= self.period_start {
            return Err(SubmissionError::ValidationError(format!(
                "period_end {} is not after period_start {}",
                self.period_end, self.period_start
            )));
        }
        if !self.total_output_kwh.is_finite() || self.total_output_kwh < 0.0 {
            return Err(SubmissionError::ValidationError(format!(
                "total_output_kwh must be a non-negative number, got {}",
                self.total_output_kwh
            )));
        }
        if !(0.0..=100.0).contains(&self.data_completeness_percent) {
            return Err(SubmissionError::ValidationError(format!(
                "data_completeness_percent must be within 0-100, got {}",
                self.data_completeness_percent
            )));
        }
        if self.data_hash.trim().is_empty() {
            return Err(SubmissionError::ValidationError(
                "data_hash must not be empty".to_string(),
            ));
        }
        for (field, value) in [
            ("peak_output_w", self.peak_output_w),
            ("average_output_w", self.average_output_w),
            ("capacity_factor", self.capacity_factor),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(SubmissionError::ValidationError(format!(
                        "{field} must be a non-negative number, got {v}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Verdict of the readiness gate for one candidate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    pub eligible: bool,
    pub reasons: Vec<String>,
}

impl GateDecision {
    pub fn eligible() -> Self {
        Self {
            eligible: true,
            reasons: Vec::new(),
        }
    }

    pub fn ineligible(reasons: Vec<String>) -> Self {
        Self {
            eligible: false,
            reasons,
        }
    }
}
