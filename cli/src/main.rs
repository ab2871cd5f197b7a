//! csv2opensearch — import a CSV file into an OpenSearch index.
//!
//! Usage:
//! ```bash
//! # index people.csv into people_<timestamp>, 500 docs per bulk request
//! csv2opensearch --csv people.csv --batch 500
//!
//! # read stdin, throttle to 1000 docs/s
//! cat people.csv | csv2opensearch --index people --rate 1000
//! ```
//!
//! Ctrl-C stops reading, flushes the in-progress batch and exits cleanly.

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use std::process::ExitCode;

use bulkflow_core::{CancellationToken, PipelineError};

mod logging;
mod pipeline;

#[derive(Parser, Debug)]
#[command(
    name = "csv2opensearch",
    about = "Import CSV rows into OpenSearch as JSON documents",
    long_about = "
Import CSV rows into OpenSearch as JSON documents, one bulk request per batch.
Each row becomes a document keyed by the CSV header row.

ENVIRONMENT VARIABLES:
  OS_USER        Basic auth user
  OS_PASSWORD    Basic auth password
  RUST_LOG       Log filter (overrides --log-level)
",
    version
)]
pub struct Cli {
    /// Path to the CSV file. If missing, the data is read from stdin
    #[arg(long)]
    csv: Option<PathBuf>,

    /// URL of the OpenSearch cluster
    #[arg(long, default_value = "https://localhost:9200")]
    host: String,

    /// Target index. Defaults to the CSV file name plus the current timestamp;
    /// required when reading stdin
    #[arg(long)]
    index: Option<String>,

    /// Number of records indexed in a single bulk request
    #[arg(long, default_value_t = 100)]
    batch: usize,

    /// Maximum records indexed per second (<= 0 or absent: unthrottled)
    #[arg(long, allow_negative_numbers = true)]
    rate: Option<f64>,

    /// Token bucket capacity in records (default: the batch size)
    #[arg(long)]
    burst: Option<usize>,

    /// Verify the cluster's TLS certificate
    #[arg(long)]
    verify_certs: bool,

    /// Basic auth user
    #[arg(long, env = "OS_USER")]
    user: Option<String>,

    /// Basic auth password
    #[arg(long, env = "OS_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Log level: trace | debug | info | warn | error
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Per-crate log level override, e.g. bulkflow_opensearch=debug (repeatable)
    #[arg(long = "log-component", value_name = "CRATE=LEVEL", value_parser = parse_component)]
    log_components: Vec<(String, String)>,

    /// Emit JSON log lines
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    /// Checks clap cannot express.
    fn validate(&self) -> Result<(), clap::Error> {
        if self.csv.is_none() && self.index.is_none() {
            return Err(Cli::command().error(
                ErrorKind::MissingRequiredArgument,
                "--index is required when data is read from stdin",
            ));
        }
        Ok(())
    }

    fn log_config(&self) -> logging::LogConfig {
        logging::LogConfig {
            level: self.log_level.clone(),
            components: self.log_components.iter().cloned().collect(),
            json: self.log_json,
        }
    }
}

fn parse_component(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((component, level)) if !component.is_empty() && !level.is_empty() => {
            Ok((component.to_string(), level.to_string()))
        }
        _ => Err(format!("expected CRATE=LEVEL, got '{s}'")),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = cli.validate() {
        let _ = e.print();
        return ExitCode::FAILURE;
    }
    logging::init_tracing(&cli.log_config());

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_interrupt(cancel.clone()));

    match pipeline::run(&cli, &cancel).await {
        Ok(summary) => {
            tracing::info!(
                batches = summary.batches,
                records = summary.records,
                outcome = %summary.outcome,
                "import finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            let stage = err
                .downcast_ref::<PipelineError>()
                .map_or("setup", PipelineError::stage);
            tracing::error!(stage, error = format!("{err:#}"), "import failed");
            ExitCode::FAILURE
        }
    }
}

/// Cancel `cancel` on the first Ctrl-C. The import loop notices it between
/// records and performs its final flush before `main` returns.
async fn cancel_on_interrupt(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::warn!("interrupt received, flushing in-progress batch before exit");
            cancel.cancel();
        }
        Err(e) => tracing::warn!(error = %e, "failed to listen for interrupts"),
    }
}
