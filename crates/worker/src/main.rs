//! `comfyrun-worker` -- runs one render job against a local ComfyUI.
//!
//! Reads a job envelope (`{"id": ..., "input": {...}}`) from `--job` or
//! stdin, runs it to completion, and prints the result JSON on stdout.
//! Logs go to stderr. See `WorkerConfig::from_env` for the
//! environment variables.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use comfyrun_core::config::WorkerConfig;
use comfyrun_core::job::JobEnvelope;
use comfyrun_worker::JobHandler;

/// Used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "comfyrun_worker=info,comfyrun_comfyui=info,comfyrun_storage=info";

#[derive(Debug, Parser)]
#[command(name = "comfyrun-worker", version, about = "Run one ComfyUI render job")]
struct Args {
    /// Path to the job envelope JSON. Reads stdin when omitted.
    #[arg(long)]
    job: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let config = WorkerConfig::from_env().context("invalid worker configuration")?;
    tracing::info!(
        engine = %config.engine_host,
        output_dir = %config.output_dir.display(),
        storage = config.storage.is_some(),
        refresh_worker = config.refresh_worker,
        "Loaded worker configuration",
    );

    let raw = read_job(args.job.as_deref())?;
    let envelope: JobEnvelope =
        serde_json::from_str(&raw).context("job envelope is not valid JSON")?;

    let handler = JobHandler::from_config(Arc::new(config));
    let output = handler.handle(&envelope).await;

    println!("{}", serde_json::to_string(&output)?);

    Ok(if output.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Human-readable logs by default, JSON lines with `LOG_FORMAT=json`.
fn init_tracing() {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

fn read_job(path: Option<&std::path::Path>) -> anyhow::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read job file {}", path.display())),
        None => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("failed to read job from stdin")?;
            Ok(raw)
        }
    }
}
