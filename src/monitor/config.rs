//! Monitor configuration module
//!
//! Provides CLI argument parsing and validation for a monitoring session.

use crate::monitor::constants::{DEFAULT_PROBE_TIMEOUT_MS, DEFAULT_WINDOW_CAPACITY, TRIGGER_SAMPLE_COUNT};
use crate::monitor::error::{MonitorError, Result};
use crate::monitor::window::JitterPolicy;
use clap::{Args, Parser};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Settings of one monitoring session. Read-only once the session starts.
#[derive(Args, Debug, Clone)]
pub struct MonitorConfig {
    /// Host to ping
    #[arg(long = "host", default_value = "8.8.8.8")]
    pub target_host: String,

    /// Seconds between two pings
    #[arg(long = "ping-interval", default_value_t = 2.0)]
    pub ping_interval_secs: f64,

    /// Minutes between two periodic speedtests
    #[arg(long = "speedtest-interval", default_value_t = 10.0)]
    pub throughput_interval_mins: f64,

    /// Average latency (ms) over the last 5 pings that triggers an extra speedtest
    #[arg(long = "latency-threshold", default_value_t = 100.0)]
    pub latency_threshold_ms: f64,

    /// Speedtest server id (optional)
    #[arg(long = "server-id")]
    pub throughput_server_id: Option<String>,

    /// Directory receiving the latency and speedtest logs
    #[arg(long = "log-dir", default_value = "connection_logs")]
    pub log_directory: PathBuf,

    /// Echo request timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_PROBE_TIMEOUT_MS)]
    pub probe_timeout_ms: u64,

    /// Number of recent pings used for jitter and packet loss
    #[arg(long, default_value_t = DEFAULT_WINDOW_CAPACITY)]
    pub window_capacity: usize,

    /// How lost pings enter the jitter figure
    #[arg(long, value_enum, default_value_t = JitterPolicy::IncludeSentinel)]
    pub jitter_policy: JitterPolicy,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            target_host: "8.8.8.8".into(),
            ping_interval_secs: 2.0,
            throughput_interval_mins: 10.0,
            latency_threshold_ms: 100.0,
            throughput_server_id: None,
            log_directory: PathBuf::from("connection_logs"),
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            jitter_policy: JitterPolicy::default(),
        }
    }
}

impl MonitorConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.ping_interval_secs).unwrap_or_default()
    }

    pub fn throughput_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.throughput_interval_mins * 60.0).unwrap_or_default()
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Server id with surrounding whitespace removed; empty counts as absent.
    pub fn server_id(&self) -> Option<&str> {
        self.throughput_server_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Validates the configuration values
    pub fn validate(&self) -> Result<()> {
        debug!("Validating monitor configuration");

        let host = self.target_host.trim();
        if host.is_empty() {
            return Err(MonitorError::Config("host must not be empty".into()));
        }
        if host.starts_with('-') || host.chars().any(char::is_whitespace) {
            return Err(MonitorError::Config(format!("invalid host: {:?}", self.target_host)));
        }
        positive("ping interval", self.ping_interval_secs)?;
        positive("speedtest interval", self.throughput_interval_mins)?;
        positive("latency threshold", self.latency_threshold_ms)?;
        if self.probe_timeout_ms == 0 {
            return Err(MonitorError::Config("probe timeout must be > 0".into()));
        }
        if self.window_capacity < TRIGGER_SAMPLE_COUNT {
            return Err(MonitorError::Config(format!(
                "window capacity must be at least {}",
                TRIGGER_SAMPLE_COUNT
            )));
        }
        if let Some(id) = self.server_id() {
            if id.starts_with('-') || id.chars().any(char::is_whitespace) {
                return Err(MonitorError::Config(format!("invalid server id: {:?}", id)));
            }
        }
        if self.log_directory.as_os_str().is_empty() {
            return Err(MonitorError::Config("log directory must not be empty".into()));
        }

        debug!("Monitor configuration validated successfully");
        Ok(())
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(MonitorError::Config(format!("{} must be a positive number, got {}", name, value)))
    }
}

/// Command line of the `monitor` binary
#[derive(Parser, Debug, Clone)]
#[command(name = "linkpulse-monitor")]
#[command(about = "Continuous latency, jitter, packet loss and throughput monitor")]
pub struct MonitorCli {
    #[command(flatten)]
    pub monitor: MonitorConfig,

    /// Disable the live status line (useful for systemd/non-interactive environments)
    #[arg(long)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log format (text or json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub log_format: String,
}

impl MonitorCli {
    /// Validates the logging options and the session settings
    pub fn validate(&self) -> Result<()> {
        validate_log_level(&self.log_level)?;
        self.monitor.validate()
    }

    /// Returns true if JSON format logging is enabled
    pub fn is_json_format(&self) -> bool {
        self.log_format.to_lowercase() == "json"
    }
}

/// Command line of the `history` binary
#[derive(Parser, Debug, Clone)]
#[command(name = "linkpulse-history")]
#[command(about = "Summarize the latency and speedtest logs of past sessions")]
pub struct HistoryCli {
    /// Directory holding the latency and speedtest logs
    #[arg(long = "log-dir", default_value = "connection_logs")]
    pub log_directory: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Log format (text or json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub log_format: String,
}

impl HistoryCli {
    pub fn validate(&self) -> Result<()> {
        validate_log_level(&self.log_level)?;
        if self.log_directory.as_os_str().is_empty() {
            return Err(MonitorError::Config("log directory must not be empty".into()));
        }
        Ok(())
    }

    pub fn is_json_format(&self) -> bool {
        self.log_format.to_lowercase() == "json"
    }
}

fn validate_log_level(level: &str) -> Result<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&level.to_lowercase().as_str()) {
        return Err(MonitorError::Config(format!(
            "log_level must be one of: {}",
            valid_levels.join(", ")
        )));
    }
    Ok(())
}
