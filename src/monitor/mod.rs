//! Sampling engine: sliding-window statistics, the two sampling loops,
//! persistence, and the session lifecycle

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod recorder;
pub mod scheduler;
pub mod session;
pub mod snapshot;
pub mod window;

pub use config::{HistoryCli, MonitorCli, MonitorConfig};
pub use constants::*;
pub use error::{MonitorError, Result};
pub use logging::{init_logging, init_logging_with_config};
pub use recorder::{format_latency_row, Recorder};
pub use scheduler::{should_trigger, Scheduler, StopSignal, ThroughputGate, ThroughputRunner, Trigger};
pub use session::{Monitor, MonitorState};
pub use snapshot::{Publisher, Snapshot};
pub use window::{loss_as_zero, JitterPolicy, SlidingWindow};
