//! Linkpulse - continuous network path monitor
//!
//! This library pings a target host on a fixed cadence, keeps a sliding
//! window of recent round-trip samples to derive jitter and packet loss, and
//! runs bandwidth measurements periodically or when latency degrades. Every
//! sample is appended to on-disk logs and published as a snapshot for
//! display.

pub mod monitor;
pub mod probe;
pub mod report;
pub mod timestamp;
