//! Bench Logger Application
//!
//! Wires the acquisition pipeline together: configuration, logging, the
//! log file, the two loop threads, and shutdown.

pub mod config;
mod pipeline;

pub use config::{BenchConfig, ConfigError};
pub use pipeline::{Pipeline, PipelineSummary};

use anyhow::Context;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use transducer::mock::SimulatedBench;

/// Initialize logging
pub fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

/// Run a full acquisition: startup collaborators first (fatal on failure),
/// then both loops until Ctrl-C or the configured run limit.
pub async fn run(config: BenchConfig) -> anyhow::Result<()> {
    let path = storage::next_log_path(&config.storage.log_dir, &config.storage.log_prefix)
        .context("selecting a log file name")?;
    let log = storage::LogFile::create(&path).context("creating the log file")?;

    // Desk-run front end; hardware drivers implement SampleSource out of
    // tree and slot in here.
    let source = SimulatedBench::new(0);
    let pipeline = Pipeline::launch(source, &config, log).context("spawning pipeline threads")?;

    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
            _ = ticker.tick() => {
                let handoff = pipeline.monitor().stats();
                info!(
                    samples = pipeline.sampler_stats().samples(),
                    read_failures = pipeline.sampler_stats().read_failures(),
                    buffers_flushed = pipeline.writer_stats().buffers_flushed(),
                    write_failures = pipeline.writer_stats().write_failures(),
                    overruns = handoff.overruns,
                    "acquisition running"
                );
            }
            _ = tokio::time::sleep(Duration::from_millis(200)) => {}
        }
        if pipeline.is_done() {
            break;
        }
    }

    pipeline.request_stop();
    let summary = tokio::task::spawn_blocking(move || pipeline.join()).await?;

    info!(
        samples = summary.samples,
        records_written = summary.records_written,
        write_failures = summary.write_failures,
        overruns = summary.overruns,
        log = %summary.log_path.display(),
        "acquisition finished"
    );
    if let Some(e) = summary.sampler_error {
        anyhow::bail!("sampler failed: {e}");
    }
    Ok(())
}
