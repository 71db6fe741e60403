use crate::monitor::constants::*;
use crate::monitor::error::{MonitorError, Result};
use crate::monitor::snapshot::Snapshot;
use crate::probe::Latency;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Single-line live readout driven by published snapshots
pub struct LiveStatus {
    pb: ProgressBar,
}

impl LiveStatus {
    pub fn new(host: &str) -> Result<Self> {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold} {msg} [{elapsed_precise}]")
                .map_err(|e| MonitorError::Measurement(format!("Failed to create status style: {}", e)))?
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "),
        );
        pb.set_prefix(host.to_string());
        pb.set_message("waiting for first ping");
        pb.enable_steady_tick(Duration::from_millis(STATUS_TICK_INTERVAL_MS));
        Ok(Self { pb })
    }

    pub fn update(&self, snapshot: &Snapshot) {
        self.pb.set_message(render_status(snapshot));
    }

    /// Print a line above the status without tearing it
    pub fn println(&self, line: impl AsRef<str>) {
        self.pb.println(line);
    }

    pub fn finish(&self) {
        self.pb.finish_with_message("stopped");
    }
}

/// Colored `Latency | Jitter | Loss | Down | Up` line for a snapshot
pub fn render_status(snapshot: &Snapshot) -> String {
    let latency = snapshot.latency_display();
    let latency = match snapshot.latency {
        Some(Latency::Lost) => latency.red().bold(),
        Some(Latency::Measured(ms)) if ms < GOOD_LATENCY_MS => latency.green(),
        Some(Latency::Measured(_)) => latency.yellow(),
        None => latency.normal(),
    };

    let loss = snapshot.packet_loss_display();
    let loss = match snapshot.packet_loss_pct {
        Some(pct) if pct > BAD_PACKET_LOSS_PCT => loss.red(),
        Some(pct) if pct > 0.0 => loss.yellow(),
        Some(_) => loss.green(),
        None => loss.normal(),
    };

    let mut line = format!(
        "Latency: {} ms | Jitter: {} ms | Loss: {} % | Down: {} Mbit/s | Up: {} Mbit/s",
        latency,
        snapshot.jitter_display(),
        loss,
        snapshot.download_display(),
        snapshot.upload_display()
    );
    if let Some(error) = &snapshot.throughput_error {
        line.push_str(&format!(" | {}", format!("speedtest: {}", error).red()));
    }
    line
}
