use crate::monitor::constants::{LOST_SENTINEL, PROBE_GRACE_MS, PROBE_POLL_INTERVAL_MS};
use crate::probe::parser::parse_round_trip;
use chrono::{DateTime, Local};
use std::fmt;
use std::io::{self, Read};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Outcome of one echo request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Latency {
    /// Round-trip time in milliseconds
    Measured(f64),
    /// No reply, tool failure, or unreadable output
    Lost,
}

impl Latency {
    /// Round-trip time in milliseconds, `None` when lost
    pub fn as_millis(&self) -> Option<f64> {
        match self {
            Latency::Measured(ms) => Some(*ms),
            Latency::Lost => None,
        }
    }

    pub fn is_lost(&self) -> bool {
        matches!(self, Latency::Lost)
    }

    /// Numeric encoding used in the latency log, `-1` for a lost probe.
    pub fn encoded(&self) -> f64 {
        self.as_millis().unwrap_or(LOST_SENTINEL)
    }

    /// Inverse of [`Latency::encoded`]. Any negative value decodes as lost.
    pub fn decode(value: f64) -> Self {
        if value < 0.0 {
            Latency::Lost
        } else {
            Latency::Measured(value)
        }
    }
}

impl fmt::Display for Latency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Latency::Measured(ms) => write!(f, "{:.1}", ms),
            Latency::Lost => write!(f, "Lost"),
        }
    }
}

/// A single latency measurement
#[derive(Debug, Clone, PartialEq)]
pub struct LatencySample {
    pub timestamp: DateTime<Local>,
    pub latency: Latency,
}

impl LatencySample {
    pub fn new(timestamp: DateTime<Local>, latency: Latency) -> Self {
        Self { timestamp, latency }
    }

    /// A measured sample stamped now
    pub fn measured(ms: f64) -> Self {
        Self::new(Local::now(), Latency::Measured(ms))
    }

    /// A lost sample stamped now
    pub fn lost() -> Self {
        Self::new(Local::now(), Latency::Lost)
    }

    pub fn is_lost(&self) -> bool {
        self.latency.is_lost()
    }
}

/// Trait for issuing one latency measurement against a host.
///
/// Implementations never fail: anything that goes wrong is reported as
/// [`Latency::Lost`] so a single bad probe cannot stop the latency loop.
pub trait LatencyProber: Send + Sync {
    fn probe(&self, host: &str, timeout: Duration) -> LatencySample;
}

/// Prober backed by the system `ping` command
#[derive(Debug, Clone)]
pub struct SystemPing {
    program: String,
}

impl Default for SystemPing {
    fn default() -> Self {
        Self::new("ping")
    }
}

impl SystemPing {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments for a single echo request with the platform's timeout flag.
    pub fn args(host: &str, timeout: Duration) -> Vec<String> {
        let millis = timeout.as_millis().max(1);
        if cfg!(windows) {
            vec!["-n".into(), "1".into(), "-w".into(), millis.to_string(), host.into()]
        } else if cfg!(target_os = "macos") {
            vec!["-c".into(), "1".into(), "-W".into(), millis.to_string(), host.into()]
        } else {
            // iputils takes whole seconds
            let secs = millis.div_ceil(1000);
            vec!["-c".into(), "1".into(), "-W".into(), secs.to_string(), host.into()]
        }
    }
}

impl SystemPing {
    /// Run the tool and collect its stdout, killing it once `timeout` plus
    /// [`PROBE_GRACE_MS`] has elapsed.
    ///
    /// # Returns
    /// `Ok(None)` when the tool had to be killed.
    fn run(&self, host: &str, timeout: Duration) -> io::Result<Option<String>> {
        let mut child = Command::new(&self.program)
            .args(Self::args(host, timeout))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let deadline = Instant::now() + timeout + Duration::from_millis(PROBE_GRACE_MS);
        loop {
            match child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Ok(None);
                }
                Ok(None) => thread::sleep(Duration::from_millis(PROBE_POLL_INTERVAL_MS)),
                Err(e) => {
                    let _ = child.kill();
                    return Err(e);
                }
            }
        }

        let mut out = Vec::new();
        if let Some(mut stdout) = child.stdout.take() {
            stdout.read_to_end(&mut out)?;
        }
        Ok(Some(String::from_utf8_lossy(&out).into_owned()))
    }
}

impl LatencyProber for SystemPing {
    fn probe(&self, host: &str, timeout: Duration) -> LatencySample {
        let timestamp = Local::now();

        let latency = match self.run(host, timeout) {
            Ok(Some(stdout)) => match parse_round_trip(&stdout) {
                Some(ms) => Latency::Measured(ms),
                None => {
                    debug!(host = host, "No round-trip time in ping output");
                    Latency::Lost
                }
            },
            Ok(None) => {
                debug!(host = host, timeout_ms = timeout.as_millis() as u64, "Ping overran its timeout and was killed");
                Latency::Lost
            }
            Err(e) => {
                warn!(program = %self.program, error = %e, "Failed to run ping");
                Latency::Lost
            }
        };

        LatencySample::new(timestamp, latency)
    }
}


#[cfg(test)]
pub use tests::MockLatencyProber;
