use anyhow::{Context, Result};
use clap::Parser;
use linkpulse::monitor::{init_logging_with_config, HistoryCli, Recorder};
use linkpulse::report::{
    read_latency_history, read_throughput_history, Reporter, Statistics, ThroughputSummary,
};
use tracing::{debug, error};

fn main() {
    let cli = HistoryCli::parse();
    init_logging_with_config(&cli.log_level, cli.is_json_format());

    if let Err(e) = cli.validate() {
        error!(error = %e, "Invalid configuration");
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli) {
        error!(error = %e, "History report failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: HistoryCli) -> Result<()> {
    let recorder = Recorder::new(&cli.log_directory);
    debug!(log_dir = %cli.log_directory.display(), "Reading monitor logs");

    let records = read_latency_history(recorder.latency_log_path())
        .context("Failed to read latency log")?;
    let throughput = read_throughput_history(recorder.throughput_log_path())
        .context("Failed to read speedtest log")?;

    let stats = Statistics::new(&records)?;
    let summary = ThroughputSummary::from_results(&throughput);
    Reporter.print_history(&stats, &records, &summary)?;
    Ok(())
}
