//! Repeated-sampling threshold test for a single inference.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::InferenceSpec;
use crate::error::OracleError;
use crate::oracle::{Oracle, OracleRequest};

/// Result of sampling one inference `count` times.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExecutionOutcome {
    pub passed: bool,
    /// `successes / samples`.
    pub success_rate: f64,
    pub successes: u32,
    pub samples: u32,
    pub threshold: f64,
}

// Infer: threshold reduction
impl ExecutionOutcome {
    /// Reduce `successes` out of `samples` against `threshold`.
    ///
    /// The threshold is inclusive: a rate equal to it passes.
    pub fn from_counts(successes: u32, samples: u32, threshold: f64) -> Self {
        let success_rate = if samples == 0 {
            0.0
        } else {
            f64::from(successes) / f64::from(samples)
        };
        Self {
            passed: success_rate >= threshold,
            success_rate,
            successes,
            samples,
            threshold,
        }
    }
}
// EndInfer: threshold reduction

/// Runs inferences against an [`Oracle`].
#[derive(Clone)]
pub struct InferenceExecutor {
    oracle: Arc<dyn Oracle>,
}

impl InferenceExecutor {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self { oracle }
    }

    /// Ask the oracle `spec.count` times and compare the success rate with
    /// `spec.threshold`.
    ///
    /// The first failed oracle call aborts the inference; no rate is computed
    /// from a partial set of samples.
    #[instrument(skip_all, fields(tag = %spec.tag, assertion = %spec.assertion, count = spec.count))]
    pub async fn execute(
        &self,
        spec: &InferenceSpec,
        code: &str,
    ) -> Result<ExecutionOutcome, OracleError> {
        let request = OracleRequest::new(spec, code);
        let mut successes = 0u32;

        for sample in 1..=spec.count {
            let verdict = self.oracle.ask(&request).await?;
            debug!(sample, verdict, "oracle answered");
            if verdict {
                successes += 1;
            }
        }

        let outcome = ExecutionOutcome::from_counts(successes, spec.count, spec.threshold);
        debug!(
            success_rate = outcome.success_rate,
            threshold = spec.threshold,
            passed = outcome.passed,
            "inference reduced"
        );
        Ok(outcome)
    }
}
