//! Measurements against the outside world: echo requests and throughput benchmarks

pub mod parser;
pub mod ping;
pub mod throughput;

pub use parser::{parse_round_trip, AVERAGE_LABELS};
pub use ping::{Latency, LatencyProber, LatencySample, SystemPing};
pub use throughput::{
    parse_speedtest_report, SpeedtestCli, ThroughputOutcome, ThroughputProbe, ThroughputResult,
};

#[cfg(test)]
pub use ping::MockLatencyProber;
