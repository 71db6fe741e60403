use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use linkpulse::monitor::{init_logging_with_config, Monitor, MonitorCli, STATUS_TICK_INTERVAL_MS};
use linkpulse::report::LiveStatus;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;
use tracing::{error, info};

fn main() {
    // Parse CLI arguments
    let cli = MonitorCli::parse();

    // Initialize structured logging with config options
    init_logging_with_config(&cli.log_level, cli.is_json_format());

    // Validate configuration
    if let Err(e) = cli.validate() {
        error!(error = %e, "Invalid configuration");
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli) {
        error!(error = %e, "Monitor failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: MonitorCli) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(());
    })
    .context("Failed to install Ctrl-C handler")?;

    let mut monitor = Monitor::with_system_tools();
    // Subscribe before starting so the first ping is not missed
    let snapshots = (!cli.quiet).then(|| monitor.subscribe());
    monitor
        .start(&cli.monitor)
        .with_context(|| format!("Failed to start monitoring {}", cli.monitor.target_host))?;

    let status = match snapshots {
        Some(_) => Some(LiveStatus::new(&cli.monitor.target_host)?),
        None => {
            info!("Running in quiet mode (live status disabled)");
            None
        }
    };
    if let Some(status) = &status {
        status.println(format!(
            "{} {} every {}s, speedtest every {} min (Ctrl-C to stop)",
            "Monitoring".cyan().bold(),
            cli.monitor.target_host,
            cli.monitor.ping_interval_secs,
            cli.monitor.throughput_interval_mins
        ));
    }

    let tick = Duration::from_millis(STATUS_TICK_INTERVAL_MS);
    loop {
        match shutdown_rx.recv_timeout(tick) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
        if let (Some(status), Some(snapshots)) = (&status, &snapshots) {
            if let Some(latest) = snapshots.try_iter().last() {
                status.update(&latest);
            }
        }
    }

    info!("Shutdown requested");
    monitor.stop();
    if let Some(status) = &status {
        status.finish();
    }
    monitor.join();

    if let Some(path) = monitor.latency_log_path() {
        println!("Latency log:   {}", path.display());
    }
    if let Some(path) = monitor.throughput_log_path() {
        println!("Speedtest log: {}", path.display());
    }
    Ok(())
}
