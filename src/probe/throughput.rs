use crate::monitor::constants::BITS_PER_MEGABIT;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Result of one throughput measurement, as written to the throughput log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThroughputResult {
    #[serde(with = "crate::timestamp::serde_format")]
    pub timestamp: DateTime<Local>,
    #[serde(flatten)]
    pub outcome: ThroughputOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThroughputOutcome {
    Measured {
        #[serde(rename = "download")]
        download_bps: f64,
        #[serde(rename = "upload")]
        upload_bps: f64,
        #[serde(rename = "ping", default, skip_serializing_if = "Option::is_none")]
        ping_ms: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        server: Option<String>,
    },
    Failed {
        error: String,
    },
}

impl ThroughputResult {
    pub fn measured(download_bps: f64, upload_bps: f64) -> Self {
        Self {
            timestamp: Local::now(),
            outcome: ThroughputOutcome::Measured {
                download_bps,
                upload_bps,
                ping_ms: None,
                server: None,
            },
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            outcome: ThroughputOutcome::Failed {
                error: error.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ThroughputOutcome::Measured { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            ThroughputOutcome::Failed { error } => Some(error),
            ThroughputOutcome::Measured { .. } => None,
        }
    }

    /// Download rate in Mbit/s
    pub fn download_mbps(&self) -> Option<f64> {
        match self.outcome {
            ThroughputOutcome::Measured { download_bps, .. } => Some(download_bps / BITS_PER_MEGABIT),
            ThroughputOutcome::Failed { .. } => None,
        }
    }

    /// Upload rate in Mbit/s
    pub fn upload_mbps(&self) -> Option<f64> {
        match self.outcome {
            ThroughputOutcome::Measured { upload_bps, .. } => Some(upload_bps / BITS_PER_MEGABIT),
            ThroughputOutcome::Failed { .. } => None,
        }
    }
}

/// Trait for running one throughput benchmark over the monitored link.
///
/// Like [`crate::probe::LatencyProber`], implementations report failures
/// inside the result instead of returning an error.
pub trait ThroughputProbe: Send + Sync {
    fn measure(&self, server_id: Option<&str>) -> ThroughputResult;
}

/// Subset of the `speedtest --json` report that the monitor keeps
#[derive(Debug, Deserialize)]
struct SpeedtestReport {
    download: f64,
    upload: f64,
    #[serde(default)]
    ping: Option<f64>,
    #[serde(default)]
    server: Option<SpeedtestServer>,
}

#[derive(Debug, Deserialize)]
struct SpeedtestServer {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    sponsor: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl SpeedtestServer {
    fn describe(&self) -> Option<String> {
        let label = match (&self.sponsor, &self.name) {
            (Some(sponsor), Some(name)) => Some(format!("{} ({})", sponsor, name)),
            (Some(one), None) | (None, Some(one)) => Some(one.clone()),
            (None, None) => None,
        };
        let id = self.id.as_ref().map(|id| match id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        });
        match (label, id) {
            (Some(label), Some(id)) => Some(format!("{} #{}", label, id)),
            (label, id) => label.or(id),
        }
    }
}

/// Parse the JSON printed by `speedtest --json`.
pub fn parse_speedtest_report(json: &str) -> ThroughputResult {
    match serde_json::from_str::<SpeedtestReport>(json) {
        Ok(report) => ThroughputResult {
            timestamp: Local::now(),
            outcome: ThroughputOutcome::Measured {
                download_bps: report.download,
                upload_bps: report.upload,
                ping_ms: report.ping,
                server: report.server.as_ref().and_then(SpeedtestServer::describe),
            },
        },
        Err(e) => ThroughputResult::failed(format!("unreadable speedtest report: {}", e)),
    }
}

/// Throughput probe backed by the `speedtest-cli` command
#[derive(Debug, Clone)]
pub struct SpeedtestCli {
    program: String,
}

impl Default for SpeedtestCli {
    fn default() -> Self {
        Self::new("speedtest")
    }
}

impl SpeedtestCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn args(server_id: Option<&str>) -> Vec<String> {
        let mut args = vec!["--json".to_string()];
        if let Some(id) = server_id {
            args.push("--server".into());
            args.push(id.into());
        }
        args
    }
}

impl ThroughputProbe for SpeedtestCli {
    fn measure(&self, server_id: Option<&str>) -> ThroughputResult {
        debug!(program = %self.program, server_id = ?server_id, "Running speedtest");
        let output = Command::new(&self.program)
            .args(Self::args(server_id))
            .stdin(Stdio::null())
            .output();

        match output {
            Ok(out) if out.status.success() => parse_speedtest_report(&String::from_utf8_lossy(&out.stdout)),
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                let detail = stderr.trim().lines().last().unwrap_or_default();
                warn!(status = %out.status, detail = detail, "speedtest exited with failure");
                ThroughputResult::failed(format!("{} exited with {}: {}", self.program, out.status, detail))
            }
            Err(e) => {
                warn!(program = %self.program, error = %e, "Failed to run speedtest");
                ThroughputResult::failed(format!("failed to run {}: {}", self.program, e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"{"download": 50000000.0, "upload": 10000000.0, "ping": 18.25,
        "server": {"id": "4302", "sponsor": "Vodafone IT", "name": "Milan"},
        "timestamp": "2024-03-09T14:05:07.000000Z", "bytes_sent": 12, "bytes_received": 34}"#;

    #[test]
    fn test_parse_speedtest_report() {
        let result = parse_speedtest_report(REPORT);
        assert!(result.is_success());
        assert_eq!(result.download_mbps(), Some(50.0));
        assert_eq!(result.upload_mbps(), Some(10.0));
        match result.outcome {
            ThroughputOutcome::Measured { ping_ms, server, .. } => {
                assert_eq!(ping_ms, Some(18.25));
                assert_eq!(server.as_deref(), Some("Vodafone IT (Milan) #4302"));
            }
            ThroughputOutcome::Failed { .. } => panic!("expected a measurement"),
        }
    }

    #[test]
    fn test_parse_garbage_is_failure() {
        let result = parse_speedtest_report("Retrieving speedtest.net configuration...");
        assert!(!result.is_success());
        assert!(result.error().is_some());
        assert_eq!(result.download_mbps(), None);
    }

    #[test]
    fn test_log_line_shapes() -> serde_json::Result<()> {
        let ok = serde_json::to_value(ThroughputResult::measured(1e6, 2e6))?;
        assert_eq!(ok["download"], 1e6);
        assert_eq!(ok["upload"], 2e6);
        assert!(ok.get("error").is_none());
        assert!(ok["timestamp"].is_string());

        let failed = serde_json::to_value(ThroughputResult::failed("boom"))?;
        assert_eq!(failed["error"], "boom");
        assert!(failed.get("download").is_none());
        Ok(())
    }

    #[test]
    fn test_log_line_parses_back() -> serde_json::Result<()> {
        let line = r#"{"timestamp":"2024-03-09 14:05:07","error":"no route"}"#;
        let result: ThroughputResult = serde_json::from_str(line)?;
        assert_eq!(result.error(), Some("no route"));
        Ok(())
    }

    #[test]
    fn test_args() {
        assert_eq!(SpeedtestCli::args(None), vec!["--json"]);
        assert_eq!(SpeedtestCli::args(Some("4302")), vec!["--json", "--server", "4302"]);
    }

    #[test]
    fn test_missing_program_is_failure() {
        let probe = SpeedtestCli::new("linkpulse-no-such-speedtest");
        let result = probe.measure(None);
        assert!(result.error().is_some_and(|e| e.contains("failed to run")));
    }
}
