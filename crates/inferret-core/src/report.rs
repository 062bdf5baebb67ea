//! Per-inference records and the aggregate run report.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::OracleError;
use crate::executor::ExecutionOutcome;

/// Identity of one inference within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InferenceId {
    /// File path as declared in the Inferfile.
    pub file: String,
    pub tag: String,
    /// Zero-based position of the inference within its tag.
    pub index: usize,
    pub assertion: String,
}

impl fmt::Display for InferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.file, self.tag, self.assertion)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    /// Success rate met the threshold.
    Passed,
    /// Success rate fell below the threshold.
    Failed,
    /// An oracle call failed, or the unit never completed.
    Errored,
}

/// What happened to one inference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceRecord {
    pub id: InferenceId,
    pub status: UnitStatus,
    /// Present unless the unit errored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ExecutionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InferenceRecord {
    pub fn from_outcome(id: InferenceId, outcome: ExecutionOutcome) -> Self {
        Self {
            id,
            status: if outcome.passed {
                UnitStatus::Passed
            } else {
                UnitStatus::Failed
            },
            outcome: Some(outcome),
            error: None,
        }
    }

    pub fn from_oracle_error(id: InferenceId, error: &OracleError) -> Self {
        Self::errored(id, error.to_string())
    }

    pub fn errored(id: InferenceId, error: String) -> Self {
        Self {
            id,
            status: UnitStatus::Errored,
            outcome: None,
            error: Some(error),
        }
    }

    pub fn is_passed(&self) -> bool {
        self.status == UnitStatus::Passed
    }
}

impl fmt::Display for InferenceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.status, &self.outcome) {
            (UnitStatus::Errored, _) | (_, None) => write!(
                f,
                "Inference error: {}: {}",
                self.id.assertion,
                self.error.as_deref().unwrap_or("unknown error")
            ),
            (status, Some(outcome)) => {
                let verdict = if status == UnitStatus::Passed {
                    "successful"
                } else {
                    "failed"
                };
                write!(
                    f,
                    "Inference {verdict}: {}. Success rate: {:.2}% (Threshold: {:.2}%)",
                    self.id.assertion,
                    outcome.success_rate * 100.0,
                    outcome.threshold * 100.0
                )
            }
        }
    }
}

/// Result of one full run.
///
/// Records are kept in Inferfile declaration order regardless of the order
/// in which units completed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub parallelism: usize,
    pub records: Vec<InferenceRecord>,
}

impl AggregateReport {
    /// True when no inference failed or errored.
    pub fn is_clean(&self) -> bool {
        self.records.iter().all(InferenceRecord::is_passed)
    }

    /// Failed and errored records, in declaration order.
    pub fn failures(&self) -> impl Iterator<Item = &InferenceRecord> {
        self.records.iter().filter(|r| !r.is_passed())
    }

    pub fn passed_count(&self) -> usize {
        self.count(UnitStatus::Passed)
    }

    pub fn failed_count(&self) -> usize {
        self.count(UnitStatus::Failed)
    }

    pub fn errored_count(&self) -> usize {
        self.count(UnitStatus::Errored)
    }

    fn count(&self, status: UnitStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    /// One-line tally, e.g. `3 inferences: 2 passed, 1 failed, 0 errored (120ms)`.
    pub fn summary(&self) -> String {
        format!(
            "{} inferences: {} passed, {} failed, {} errored ({}ms)",
            self.records.len(),
            self.passed_count(),
            self.failed_count(),
            self.errored_count(),
            self.duration_ms
        )
    }
}
