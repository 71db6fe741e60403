//! Append-only persistence of latency samples and throughput results.
//!
//! Every record is rendered in memory first and handed to the OS in a single
//! `write_all` on an append-mode handle, under a per-file lock, so the two
//! sampling loops can never interleave partial rows.

use crate::monitor::constants::{LATENCY_LOG_FILE, LATENCY_LOG_HEADER, THROUGHPUT_LOG_FILE};
use crate::monitor::error::{MonitorError, Result};
use crate::probe::{LatencySample, ThroughputResult};
use crate::timestamp::format_timestamp;
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug)]
pub struct Recorder {
    latency_path: PathBuf,
    throughput_path: PathBuf,
    latency_lock: Mutex<()>,
    throughput_lock: Mutex<()>,
}

impl Recorder {
    /// Recorder writing into `log_dir`. Files are created on first write.
    pub fn new(log_dir: &Path) -> Self {
        Self {
            latency_path: log_dir.join(LATENCY_LOG_FILE),
            throughput_path: log_dir.join(THROUGHPUT_LOG_FILE),
            latency_lock: Mutex::new(()),
            throughput_lock: Mutex::new(()),
        }
    }

    pub fn latency_log_path(&self) -> &Path {
        &self.latency_path
    }

    pub fn throughput_log_path(&self) -> &Path {
        &self.throughput_path
    }

    /// Open both logs for appending, creating them empty if missing.
    ///
    /// Lets a session fail up front instead of dropping every record later.
    /// An empty latency log still receives its header on the first row.
    pub fn ensure_writable(&self) -> Result<()> {
        for path in [&self.latency_path, &self.throughput_path] {
            OpenOptions::new().create(true).append(true).open(path).map_err(|e| {
                debug!(path = %path.display(), error = %e, "Log file is not writable");
                e
            })?;
        }
        Ok(())
    }

    /// Append one row to the latency log, writing the header if the file is new.
    ///
    /// # Arguments
    ///
    /// * `sample` - The probe outcome and when it was taken
    /// * `jitter_ms` - Window jitter after `sample` was pushed
    /// * `packet_loss_pct` - Window packet loss after `sample` was pushed
    pub fn record_latency(&self, sample: &LatencySample, jitter_ms: f64, packet_loss_pct: f64) -> Result<()> {
        let row = format_latency_row(sample, jitter_ms, packet_loss_pct);
        append(&self.latency_path, &self.latency_lock, &row, Some(LATENCY_LOG_HEADER))
    }

    /// Append one JSON line to the throughput log.
    pub fn record_throughput(&self, result: &ThroughputResult) -> Result<()> {
        let mut line = serde_json::to_string(result)
            .map_err(|e| MonitorError::Measurement(format!("Failed to encode throughput result: {}", e)))?;
        line.push('\n');
        append(&self.throughput_path, &self.throughput_lock, &line, None)
    }
}

/// `Timestamp,Latency (ms),Jitter (ms),Packet Loss (%)` row, newline included.
///
/// Lost probes keep their `-1` encoding in the latency column.
pub fn format_latency_row(sample: &LatencySample, jitter_ms: f64, packet_loss_pct: f64) -> String {
    format!(
        "{},{},{},{}\n",
        format_timestamp(&sample.timestamp),
        sample.latency.encoded(),
        jitter_ms,
        packet_loss_pct
    )
}

fn append(path: &Path, lock: &Mutex<()>, record: &str, header: Option<&str>) -> Result<()> {
    let _guard = lock.lock();
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;

    let needs_header = header.is_some() && file.metadata()?.len() == 0;
    let buf = match header {
        Some(header) if needs_header => {
            debug!(path = %path.display(), "Creating log file with header");
            format!("{}\n{}", header, record)
        }
        _ => record.to_string(),
    };

    file.write_all(buf.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::Latency;
    use chrono::{Local, TimeZone};
    use std::fs;
    use std::sync::Arc;
    use std::thread;

    fn sample_at(latency: Latency) -> LatencySample {
        let ts = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).earliest().unwrap();
        LatencySample::new(ts, latency)
    }

    #[test]
    fn test_latency_row_format() {
        assert_eq!(
            format_latency_row(&sample_at(Latency::Measured(12.0)), 1.5, 0.0),
            "2024-03-09 14:05:07,12,1.5,0\n"
        );
        assert_eq!(
            format_latency_row(&sample_at(Latency::Lost), 10.0, 25.0),
            "2024-03-09 14:05:07,-1,10,25\n"
        );
    }

    #[test]
    fn test_header_written_once() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let recorder = Recorder::new(dir.path());

        recorder.record_latency(&sample_at(Latency::Measured(10.0)), 0.0, 0.0)?;
        recorder.record_latency(&sample_at(Latency::Lost), 11.0, 50.0)?;

        // A second recorder on the same directory must not repeat the header
        Recorder::new(dir.path()).record_latency(&sample_at(Latency::Measured(12.0)), 7.0, 33.3)?;

        let content = fs::read_to_string(recorder.latency_log_path())?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], LATENCY_LOG_HEADER);
        assert_eq!(content.matches("Timestamp").count(), 1);
        assert_eq!(lines[2], "2024-03-09 14:05:07,-1,11,50");
        Ok(())
    }

    #[test]
    fn test_throughput_lines() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let recorder = Recorder::new(dir.path());

        recorder.record_throughput(&ThroughputResult::measured(50_000_000.0, 10_000_000.0))?;
        recorder.record_throughput(&ThroughputResult::failed("speedtest not installed"))?;

        let content = fs::read_to_string(recorder.throughput_log_path())?;
        let parsed: Vec<serde_json::Value> = content
            .lines()
            .map(serde_json::from_str)
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| MonitorError::History(e.to_string()))?;
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0]["download"], 50_000_000.0);
        assert_eq!(parsed[1]["error"], "speedtest not installed");
        Ok(())
    }

    #[test]
    fn test_ensure_writable_keeps_header_logic() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let recorder = Recorder::new(dir.path());
        recorder.ensure_writable()?;
        assert_eq!(fs::metadata(recorder.latency_log_path())?.len(), 0);
        assert_eq!(fs::metadata(recorder.throughput_log_path())?.len(), 0);

        recorder.record_latency(&sample_at(Latency::Measured(10.0)), 0.0, 0.0)?;
        let content = fs::read_to_string(recorder.latency_log_path())?;
        assert_eq!(content.lines().next(), Some(LATENCY_LOG_HEADER));
        Ok(())
    }

    #[test]
    fn test_ensure_writable_rejects_directory_in_place_of_log() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir(dir.path().join(THROUGHPUT_LOG_FILE))?;
        let recorder = Recorder::new(dir.path());
        assert!(matches!(recorder.ensure_writable(), Err(MonitorError::Io(_))));
        Ok(())
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(&dir.path().join("absent"));
        let result = recorder.record_latency(&sample_at(Latency::Lost), 0.0, 100.0);
        assert!(matches!(result, Err(MonitorError::Io(_))));
    }

    #[test]
    fn test_concurrent_appends_do_not_interleave() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let recorder = Arc::new(Recorder::new(dir.path()));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let recorder = Arc::clone(&recorder);
                thread::spawn(move || {
                    for i in 0..50 {
                        let latency = Latency::Measured((t * 1000 + i) as f64);
                        recorder.record_latency(&sample_at(latency), 0.25, 12.5).unwrap();
                        recorder.record_throughput(&ThroughputResult::failed(format!("run {}-{}", t, i))).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let csv = fs::read_to_string(recorder.latency_log_path())?;
        let rows: Vec<&str> = csv.lines().skip(1).collect();
        assert_eq!(rows.len(), 200);
        assert!(rows.iter().all(|row| row.split(',').count() == 4 && row.ends_with(",0.25,12.5")));

        let json = fs::read_to_string(recorder.throughput_log_path())?;
        assert_eq!(json.lines().count(), 200);
        assert!(json.lines().all(|line| serde_json::from_str::<serde_json::Value>(line).is_ok()));
        Ok(())
    }
}
