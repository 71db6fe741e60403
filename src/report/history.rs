//! Reading back the latency and throughput logs for historical views

use crate::monitor::constants::LATENCY_LOG_HEADER;
use crate::monitor::error::{MonitorError, Result};
use crate::probe::{Latency, ThroughputResult};
use crate::timestamp::parse_timestamp;
use chrono::{DateTime, Local};
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

/// One row of the latency log
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Local>,
    pub latency: Latency,
    pub jitter_ms: f64,
    pub packet_loss_pct: f64,
}

/// Parse one latency log row (without trailing newline).
pub fn parse_latency_row(row: &str) -> Option<HistoryRecord> {
    let mut fields = row.split(',');
    let timestamp = parse_timestamp(fields.next()?)?;
    let latency = Latency::decode(fields.next()?.trim().parse().ok()?);
    let jitter_ms = fields.next()?.trim().parse().ok()?;
    let packet_loss_pct = fields.next()?.trim().parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some(HistoryRecord {
        timestamp,
        latency,
        jitter_ms,
        packet_loss_pct,
    })
}

/// Read the whole latency log. A missing file is an empty history.
pub fn read_latency_history(path: &Path) -> Result<Vec<HistoryRecord>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut records = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line == LATENCY_LOG_HEADER {
            continue;
        }
        let record = parse_latency_row(line).ok_or_else(|| {
            MonitorError::History(format!("{}:{}: malformed row {:?}", path.display(), index + 1, line))
        })?;
        records.push(record);
    }
    debug!(path = %path.display(), rows = records.len(), "Latency history loaded");
    Ok(records)
}

/// Read the whole throughput log. A missing file is an empty history.
pub fn read_throughput_history(path: &Path) -> Result<Vec<ThroughputResult>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|e| {
                MonitorError::History(format!("{}:{}: {}", path.display(), index + 1, e))
            })
        })
        .collect()
}

/// Aggregate of the throughput log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThroughputSummary {
    pub runs: usize,
    pub failures: usize,
    pub mean_download_mbps: Option<f64>,
    pub mean_upload_mbps: Option<f64>,
    pub last_error: Option<String>,
}

impl ThroughputSummary {
    pub fn from_results(results: &[ThroughputResult]) -> Self {
        let downloads: Vec<f64> = results.iter().filter_map(ThroughputResult::download_mbps).collect();
        let uploads: Vec<f64> = results.iter().filter_map(ThroughputResult::upload_mbps).collect();
        let mean = |values: &[f64]| {
            (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
        };
        Self {
            runs: results.len(),
            failures: results.iter().filter(|r| !r.is_success()).count(),
            mean_download_mbps: mean(&downloads),
            mean_upload_mbps: mean(&uploads),
            last_error: results.iter().rev().find_map(|r| r.error().map(str::to_string)),
        }
    }
}
