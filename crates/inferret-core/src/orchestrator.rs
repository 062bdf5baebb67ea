//! Concurrent execution of every inference in a resolved configuration.
//!
//! One task is spawned per inference up front. A semaphore with
//! `parallelism` permits gates entry to the executor, so at most that many
//! inferences talk to the oracle at once. Failures never cancel siblings:
//! the run always waits for every task before building the report.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::InferenceSpec;
use crate::error::{InferError, Result};
use crate::executor::InferenceExecutor;
use crate::extract::ResolvedConfiguration;
use crate::oracle::Oracle;
use crate::report::{AggregateReport, InferenceId, InferenceRecord};

/// Admission slots used when none are configured.
pub const DEFAULT_PARALLELISM: usize = 1;

/// Fans inferences out across tokio tasks and collects an [`AggregateReport`].
#[derive(Clone)]
pub struct Orchestrator {
    executor: InferenceExecutor,
    parallelism: usize,
}

/// One schedulable inference with its region text.
struct Unit {
    id: InferenceId,
    spec: InferenceSpec,
    code: Arc<str>,
}

impl Orchestrator {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self {
            executor: InferenceExecutor::new(oracle),
            parallelism: DEFAULT_PARALLELISM,
        }
    }

    /// Maximum number of inferences inside an oracle call at once.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Run every inference in `config` and report on all of them.
    ///
    /// Only configuration problems are returned as errors. Oracle failures
    /// and below-threshold results are recorded in the report.
    #[instrument(skip_all, fields(parallelism = self.parallelism))]
    pub async fn run(&self, config: &ResolvedConfiguration) -> Result<AggregateReport> {
        if self.parallelism == 0 {
            return Err(InferError::InvalidParallelism);
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();

        let units = enumerate_units(config);
        info!(%run_id, inferences = units.len(), "starting inference run");

        let gate = Arc::new(Semaphore::new(self.parallelism));
        let mut tasks: Vec<(InferenceId, JoinHandle<InferenceRecord>)> =
            Vec::with_capacity(units.len());

        for unit in units {
            let gate = Arc::clone(&gate);
            let executor = self.executor.clone();
            let id = unit.id.clone();

            let task = tokio::spawn(async move {
                let result = {
                    let _permit = match gate.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(e) => {
                            return InferenceRecord::errored(unit.id, format!("admission gate closed: {e}"))
                        }
                    };
                    debug!(id = %unit.id, "inferring");
                    executor.execute(&unit.spec, &unit.code).await
                };

                match result {
                    Ok(outcome) => {
                        let record = InferenceRecord::from_outcome(unit.id, outcome);
                        if record.is_passed() {
                            debug!(id = %record.id, success_rate = outcome.success_rate, "inference passed");
                        } else {
                            warn!(id = %record.id, success_rate = outcome.success_rate, threshold = outcome.threshold, "inference failed");
                        }
                        record
                    }
                    Err(e) => {
                        warn!(id = %unit.id, error = %e, "inference errored");
                        InferenceRecord::from_oracle_error(unit.id, &e)
                    }
                }
            });

            tasks.push((id, task));
        }

        let mut records = Vec::with_capacity(tasks.len());
        for (id, task) in tasks {
            let record = match task.await {
                Ok(record) => record,
                Err(e) => {
                    warn!(%id, error = %e, "inference task did not complete");
                    InferenceRecord::errored(id, format!("inference task did not complete: {e}"))
                }
            };
            records.push(record);
        }

        let report = AggregateReport {
            run_id,
            started_at,
            duration_ms: elapsed_ms(start.elapsed()),
            parallelism: self.parallelism,
            records,
        };

        info!(
            %run_id,
            passed = report.passed_count(),
            failed = report.failed_count(),
            errored = report.errored_count(),
            duration_ms = report.duration_ms,
            "inference run finished"
        );
        Ok(report)
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Flatten file × tag × inference in declaration order.
fn enumerate_units(config: &ResolvedConfiguration) -> Vec<Unit> {
    let mut units = Vec::with_capacity(config.inference_count());
    for file in &config.files {
        for tag in &file.tags {
            for (index, spec) in tag.inferences.iter().enumerate() {
                units.push(Unit {
                    id: InferenceId {
                        file: file.path.clone(),
                        tag: tag.name.clone(),
                        index,
                        assertion: spec.assertion.clone(),
                    },
                    spec: spec.clone(),
                    code: Arc::clone(&tag.code),
                });
            }
        }
    }
    units
}
