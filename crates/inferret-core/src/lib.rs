//! Inferret Core
//!
//! Natural-language assertions about tagged source regions, answered by a
//! probabilistic oracle and judged against a success-rate threshold.
//!
//! The pipeline runs in two strictly sequential phases:
//!
//! 1. [`config::load`] parses the Inferfile and checks referenced files exist,
//!    then [`extract::resolve`] reads each file once and cuts out the tagged
//!    regions.
//! 2. [`Orchestrator::run`] executes every inference concurrently under a
//!    bounded admission gate and aggregates the results.

pub mod config;
pub mod error;
pub mod executor;
pub mod extract;
pub mod fakes;
pub mod oracle;
pub mod orchestrator;
pub mod report;
pub mod telemetry;

pub use config::{load, Configuration, FileSpec, InferenceSpec, TagSpec};
pub use error::{InferError, OracleError, Result};
pub use executor::{ExecutionOutcome, InferenceExecutor};
pub use extract::{
    extract_file, extract_region, resolve, Region, RegionStatus, ResolvedConfiguration,
    ResolvedFile, ResolvedTag,
};
pub use oracle::{parse_verdict, Oracle, OracleRequest, PromptMessage, Role};
pub use orchestrator::{Orchestrator, DEFAULT_PARALLELISM};
pub use report::{AggregateReport, InferenceId, InferenceRecord, UnitStatus};
pub use telemetry::{init_tracing, verbosity_level};
