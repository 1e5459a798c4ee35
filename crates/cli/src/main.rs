use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scei_cli::render::{outcome, Outcome, ProgressRenderer};
use scei_cli::CliArgs;
use scei_jobs::config::ClientConfig;
use scei_jobs::{GenerationTracker, HttpBackend, JobManager, PollConfig};

/// Conventional exit status after SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    dotenvy::dotenv().ok();
    init_tracing();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Generation run failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "scei_cli=info,scei_jobs=info".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(args: CliArgs) -> anyhow::Result<ExitCode> {
    // --- Configuration ---
    let client_config = ClientConfig::from_env().context("Invalid client configuration")?;
    let poll_config = PollConfig::from_env().context("Invalid polling configuration")?;
    tracing::info!(api_url = %client_config.api_url, "Loaded client configuration");

    // --- Job manager ---
    let backend = HttpBackend::from_config(&client_config).context("Failed to build HTTP client")?;
    let manager = Arc::new(JobManager::new(Arc::new(backend), poll_config));
    let polling = manager.poll_config();
    tracing::debug!(
        base_interval_ms = polling.base_interval.as_millis() as u64,
        max_interval_ms = polling.max_interval.as_millis() as u64,
        timeout_secs = polling.timeout.as_secs(),
        "Polling configuration",
    );
    let tracker = GenerationTracker::new(Arc::clone(&manager));
    let mut state = tracker.watch();

    // --- Submission ---
    let options = args.to_options();
    let handle = tokio::select! {
        started = tracker.start(args.kind, &args.unit_id, &options) => {
            started.context("Failed to start generation")?
        }
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Interrupted before the job was accepted");
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
    };
    eprintln!(
        "Started {} job {} for unit {} (estimated {})",
        handle.kind,
        handle.job_id,
        handle.subject_id,
        handle.estimated_duration.as_deref().unwrap_or("unknown"),
    );

    // --- Follow progress ---
    let mut renderer = ProgressRenderer::default();
    loop {
        tokio::select! {
            changed = state.changed() => {
                changed.context("Generation tracker stopped unexpectedly")?;
                let current = state.borrow_and_update().clone();
                if let Some(line) = renderer.next_line(&current) {
                    eprintln!("{line}");
                }

                match outcome(&current) {
                    Some(Outcome::Completed(result)) => {
                        write_output(args.output.as_deref(), &result.content).await?;
                        if !result.validation_issues.is_empty() {
                            eprintln!("{} validation issue(s) reported", result.validation_issues.len());
                        }
                        return Ok(ExitCode::SUCCESS);
                    }
                    Some(Outcome::Failed(message)) => {
                        eprintln!("Generation failed: {message}");
                        return Ok(ExitCode::FAILURE);
                    }
                    None => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracker.cancel();
                eprintln!("Cancelled job {}", handle.job_id);
                return Ok(ExitCode::from(EXIT_INTERRUPTED));
            }
        }
    }
}

async fn write_output(path: Option<&Path>, content: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            tokio::fs::write(path, content)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(content.as_bytes()).await?;
            if !content.ends_with('\n') {
                stdout.write_all(b"\n").await?;
            }
            stdout.flush().await?;
        }
    }
    Ok(())
}
