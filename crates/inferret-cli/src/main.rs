//! Inferret CLI
//!
//! The `infer` command checks natural-language assertions about tagged code
//! regions listed in an Inferfile.
//!
//! ## Commands
//!
//! - `validate`: Parse the Inferfile and check that every referenced file exists
//! - `infer`: Run every inference against the oracle (default)

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inferret_core::{load, resolve, AggregateReport, Orchestrator};
use inferret_openai::{OpenAiConfig, OpenAiOracle, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "infer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Check natural-language assertions about tagged code with an LLM", long_about = None)]
struct Cli {
    /// Path to the Inferfile
    #[arg(short = 'f', long = "file", default_value = "Inferfile", global = true)]
    inferfile: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Number of inferences allowed to query the oracle at once
    #[arg(
        long,
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..),
        global = true
    )]
    parallel_threads: u32,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    openai_api_key: Option<String>,

    /// OpenAI API URL
    #[arg(long, env = "OPENAI_API_URL", default_value = DEFAULT_BASE_URL, global = true)]
    openai_api_url: String,

    /// Per-request oracle timeout in seconds (0 disables)
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, global = true)]
    timeout_secs: u64,

    /// Write the aggregate report as JSON to this path
    #[arg(long, global = true)]
    report: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Validate the syntax of the Inferfile
    Validate,

    /// Run inference tests (default)
    Infer,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    inferret_core::init_tracing(cli.json, inferret_core::verbosity_level(cli.verbose));

    match cli.command.unwrap_or(Commands::Infer) {
        Commands::Validate => cmd_validate(&cli.inferfile),
        Commands::Infer => cmd_infer(&cli).await,
    }
}

/// Load the Inferfile and check referenced files without running anything
fn cmd_validate(inferfile: &Path) -> Result<ExitCode> {
    let config = load(inferfile).context("Validation error")?;
    info!(
        files = config.files.len(),
        inferences = config.inference_count(),
        "Inferfile is valid"
    );
    println!("Validation successful.");
    Ok(ExitCode::SUCCESS)
}

/// Run the full pipeline: load, extract, execute, report
async fn cmd_infer(cli: &Cli) -> Result<ExitCode> {
    let config = load(&cli.inferfile).context("Inference error")?;
    let resolved = resolve(&config).context("Inference error")?;

    let api_key = cli.openai_api_key.clone().unwrap_or_default();
    let oracle = OpenAiOracle::new(
        OpenAiConfig::new(&api_key, &cli.openai_api_url).with_timeout(cli.timeout_secs),
    )
    .context("Failed to configure OpenAI client (set --openai-api-key or OPENAI_API_KEY)")?;

    let report = Orchestrator::new(Arc::new(oracle))
        .with_parallelism(cli.parallel_threads as usize)
        .run(&resolved)
        .await
        .context("Inference error")?;

    if let Some(path) = &cli.report {
        write_report(&report, path)?;
    }

    for line in failure_lines(&report) {
        eprintln!("{line}");
    }

    if report.is_clean() {
        info!("{}", report.summary());
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("Inference completed with errors: {}", report.summary());
        Ok(ExitCode::FAILURE)
    }
}

/// One line per failed or errored inference, in Inferfile order
fn failure_lines(report: &AggregateReport) -> Vec<String> {
    report.failures().map(ToString::to_string).collect()
}

fn write_report(report: &AggregateReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).context(format!("Failed to write report: {:?}", path))?;
    info!(path = %path.display(), "report written");
    Ok(())
}
