//! Presentation: the live status line and the history summary

pub mod history;
pub mod live;
pub mod reporter;
pub mod statistics;

pub use history::{
    parse_latency_row, read_latency_history, read_throughput_history, HistoryRecord,
    ThroughputSummary,
};
pub use live::{render_status, LiveStatus};
pub use reporter::Reporter;
pub use statistics::Statistics;
