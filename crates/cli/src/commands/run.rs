//! `run` command implementation.

use std::time::Instant;

use anyhow::{Context, Result};
use config_loader::{ConfigWatcher, SectionPath};
use contracts::LogLevel;
use dispatcher::root::{root_log_path, set_root_log_path};
use dispatcher::GrandOutput;
use observability::OutputMetricsAggregator;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;

/// Execute the `run` command
///
/// Every stdin line becomes an Info line of one monitor, until EOF or a
/// shutdown signal. Configuration changes are applied as they come.
pub async fn run_output(args: &RunArgs) -> Result<()> {
    if let Some(ref root) = args.root {
        set_root_log_path(root).map_err(CliError::from)?;
    }
    let root = root_log_path();
    info!(config = %args.config.display(), root = %root.display(), "Starting GrandOutput");

    let output = GrandOutput::builder()
        .root_log_path(root)
        .handle_critical_errors(args.critical_errors)
        .build();

    let (watcher, mut snapshots) = ConfigWatcher::new(SectionPath::new(&args.section));
    let file_watcher = watcher
        .watch_file(&args.config)
        .with_context(|| format!("Failed to watch {}", args.config.display()))?;

    let monitor = output.create_monitor();
    let mut aggregator = OutputMetricsAggregator::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(config) = snapshots.recv() => {
                let started = Instant::now();
                let report = output.apply_configuration(config).await?;
                aggregator.record_reconfiguration(
                    report.failed.len(),
                    started.elapsed().as_secs_f64() * 1000.0,
                );
                for (name, error) in &report.failed {
                    warn!(sink = %name, error = %error, "Sink not activated");
                }
                info!(sinks = ?output.sink_names(), "Configuration applied");
            }
            line = lines.next_line() => {
                match line.context("Failed to read stdin")? {
                    Some(text) => {
                        if monitor.info(text) {
                            aggregator.record_line(LogLevel::Info);
                        }
                    }
                    None => {
                        info!("End of input");
                        break;
                    }
                }
            }
            _ = &mut shutdown => {
                warn!("Received shutdown signal, stopping...");
                break;
            }
        }
    }

    monitor.close(None);
    drop(file_watcher);
    drop(watcher);

    for (name, metrics) in output.metrics() {
        info!(
            sink = %name,
            written = metrics.lines_written,
            dropped = metrics.lines_dropped,
            flushes = metrics.flushes,
            faulted = metrics.faulted,
            "Sink metrics"
        );
    }
    output.dispose().await;

    println!("{}", aggregator.summary());
    info!("GrandOutput finished");
    Ok(())
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
