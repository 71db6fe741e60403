//! Constants used throughout the monitor

/// Default number of latency samples kept in the sliding window
pub const DEFAULT_WINDOW_CAPACITY: usize = 10;

/// Number of most recent samples averaged for the threshold trigger
pub const TRIGGER_SAMPLE_COUNT: usize = 5;

/// Default echo request timeout in milliseconds
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 1000;

/// Extra time a ping process gets past its timeout before it is killed
pub const PROBE_GRACE_MS: u64 = 500;
pub const PROBE_POLL_INTERVAL_MS: u64 = 5;

/// Numeric encoding of a lost probe in the latency log
pub const LOST_SENTINEL: f64 = -1.0;

/// Bits per second in one Mbit/s
pub const BITS_PER_MEGABIT: f64 = 1e6;

/// File name of the latency log inside the log directory
pub const LATENCY_LOG_FILE: &str = "ping_results.csv";

/// File name of the throughput log inside the log directory
pub const THROUGHPUT_LOG_FILE: &str = "speedtest_results.json";

/// Header row of the latency log
pub const LATENCY_LOG_HEADER: &str = "Timestamp,Latency (ms),Jitter (ms),Packet Loss (%)";

/// Timestamp format used in both logs
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Histogram lower bound in microseconds
pub const HISTOGRAM_LOW_BOUND_US: u64 = 1;

/// Histogram upper bound in microseconds (one minute)
pub const HISTOGRAM_HIGH_BOUND_US: u64 = 60_000_000;

/// Histogram significant digits for precision
pub const HISTOGRAM_SIGNIFICANT_DIGITS: u8 = 3;

/// Latency below this is shown in green on the live line
pub const GOOD_LATENCY_MS: f64 = 50.0;

/// Packet loss above this is shown in red on the live line
pub const BAD_PACKET_LOSS_PCT: f64 = 10.0;

/// Spinner tick interval for the live status line in milliseconds
pub const STATUS_TICK_INTERVAL_MS: u64 = 120;
