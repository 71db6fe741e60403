//! Latest readings published for the display layer.
//!
//! Readers always get an owned copy; nothing hands out references into the
//! sampling loops' state.

use crate::probe::{Latency, LatencySample, ThroughputResult};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};

/// Point-in-time copy of the most recent latency and throughput figures
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub latency: Option<Latency>,
    pub latency_at: Option<DateTime<Local>>,
    pub jitter_ms: Option<f64>,
    pub packet_loss_pct: Option<f64>,
    pub download_mbps: Option<f64>,
    pub upload_mbps: Option<f64>,
    pub throughput_at: Option<DateTime<Local>>,
    pub throughput_error: Option<String>,
}

impl Snapshot {
    /// `12.3`, `Lost`, or `-` before the first probe
    pub fn latency_display(&self) -> String {
        self.latency.map_or_else(|| "-".into(), |l| l.to_string())
    }

    pub fn jitter_display(&self) -> String {
        one_decimal(self.jitter_ms)
    }

    pub fn packet_loss_display(&self) -> String {
        one_decimal(self.packet_loss_pct)
    }

    /// Download rate in Mbit/s with two decimals, `-` when unknown or failed
    pub fn download_display(&self) -> String {
        two_decimals(self.download_mbps)
    }

    pub fn upload_display(&self) -> String {
        two_decimals(self.upload_mbps)
    }
}

fn one_decimal(value: Option<f64>) -> String {
    value.map_or_else(|| "-".into(), |v| format!("{:.1}", v))
}

fn two_decimals(value: Option<f64>) -> String {
    value.map_or_else(|| "-".into(), |v| format!("{:.2}", v))
}

/// Holder of the current [`Snapshot`] with push notification to subscribers
#[derive(Debug, Default)]
pub struct Publisher {
    current: Mutex<Snapshot>,
    subscribers: Mutex<Vec<Sender<Snapshot>>>,
}

impl Publisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.current.lock().clone()
    }

    /// Receive a copy of every snapshot published from now on.
    pub fn subscribe(&self) -> Receiver<Snapshot> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn publish_latency(&self, sample: &LatencySample, jitter_ms: f64, packet_loss_pct: f64) {
        self.update(|s| {
            s.latency = Some(sample.latency);
            s.latency_at = Some(sample.timestamp);
            s.jitter_ms = Some(jitter_ms);
            s.packet_loss_pct = Some(packet_loss_pct);
        });
    }

    /// A failed run clears the rates, so the display shows `-` again.
    pub fn publish_throughput(&self, result: &ThroughputResult) {
        self.update(|s| {
            s.download_mbps = result.download_mbps();
            s.upload_mbps = result.upload_mbps();
            s.throughput_at = Some(result.timestamp);
            s.throughput_error = result.error().map(str::to_string);
        });
    }

    /// Apply a change and fan it out. `current` stays locked while sending,
    /// so subscribers receive snapshots in the order they were applied.
    fn update(&self, apply: impl FnOnce(&mut Snapshot)) {
        let mut current = self.current.lock();
        apply(&mut current);
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(current.clone()).is_ok());
    }
}
