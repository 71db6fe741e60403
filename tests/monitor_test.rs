use linkpulse::monitor::{JitterPolicy, Monitor, MonitorConfig, MonitorState, LATENCY_LOG_HEADER};
use linkpulse::probe::{Latency, LatencyProber, LatencySample, ThroughputProbe, ThroughputResult};
use linkpulse::report::{read_latency_history, read_throughput_history};
use linkpulse::timestamp::format_timestamp;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Test helper: prober replaying a script, repeating its last entry
struct ScriptedProber {
    script: Vec<Option<f64>>,
    calls: AtomicUsize,
    returned: Mutex<Vec<LatencySample>>,
}

impl ScriptedProber {
    fn new(script: &[Option<f64>]) -> Arc<Self> {
        Arc::new(Self {
            script: script.to_vec(),
            calls: AtomicUsize::new(0),
            returned: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LatencyProber for ScriptedProber {
    fn probe(&self, _host: &str, _timeout: Duration) -> LatencySample {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let entry = self.script.get(index).or(self.script.last()).copied().flatten();
        let sample = match entry {
            Some(ms) => LatencySample::measured(ms),
            None => LatencySample::lost(),
        };
        self.returned.lock().unwrap().push(sample.clone());
        sample
    }
}

/// Test helper: throughput probe that takes `delay` and tracks overlapping runs
struct SlowThroughput {
    delay: Duration,
    runs: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl SlowThroughput {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            runs: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        })
    }
}

impl ThroughputProbe for SlowThroughput {
    fn measure(&self, _server_id: Option<&str>) -> ThroughputResult {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        thread::sleep(self.delay);
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.active.fetch_sub(1, Ordering::SeqCst);
        ThroughputResult::measured(50_000_000.0, 10_000_000.0)
    }
}

/// Test helper: poll `condition` until it holds or `timeout` expires
fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

fn fast_config(log_dir: &Path) -> MonitorConfig {
    MonitorConfig {
        ping_interval_secs: 0.01,
        throughput_interval_mins: 60.0,
        log_directory: log_dir.to_path_buf(),
        ..MonitorConfig::default()
    }
}

#[test]
fn test_session_writes_one_row_per_probe() {
    let dir = tempfile::tempdir().expect("tempdir");
    let prober = ScriptedProber::new(&[Some(10.0), Some(12.0), None, Some(14.0)]);
    let throughput = SlowThroughput::new(Duration::ZERO);
    let mut monitor = Monitor::new(prober.clone(), throughput.clone());

    monitor.start(&fast_config(dir.path())).expect("start");
    assert_eq!(monitor.state(), MonitorState::Running);
    assert!(wait_until(Duration::from_secs(5), || prober.calls() >= 6));
    monitor.stop();
    monitor.join();
    assert_eq!(monitor.state(), MonitorState::Idle);

    let log = monitor.latency_log_path().expect("log path");
    let content = fs::read_to_string(&log).expect("read log");
    assert_eq!(content.lines().next(), Some(LATENCY_LOG_HEADER));
    assert_eq!(content.matches(LATENCY_LOG_HEADER).count(), 1);

    let rows = read_latency_history(&log).expect("parse log");
    let returned = prober.returned.lock().unwrap().clone();
    assert_eq!(rows.len(), returned.len());
    for (row, sample) in rows.iter().zip(&returned) {
        assert_eq!(format_timestamp(&row.timestamp), format_timestamp(&sample.timestamp));
        assert_eq!(row.latency, sample.latency);
    }
    assert_eq!(rows[0].latency, Latency::Measured(10.0));
    assert_eq!((rows[0].jitter_ms, rows[0].packet_loss_pct), (0.0, 0.0));
    assert_eq!(rows[2].latency, Latency::Lost);
    // [10, 12, -1, 14] -> |2| + |13| + |15| over 3
    assert_eq!(rows[3].jitter_ms, 10.0);
    assert_eq!(rows[3].packet_loss_pct, 25.0);

    // The periodic speedtest runs once right at start
    assert_eq!(throughput.runs.load(Ordering::SeqCst), 1);
    let results = read_throughput_history(&monitor.throughput_log_path().expect("path")).expect("parse");
    assert_eq!(results.len(), 1);

    let snapshot = monitor.snapshot();
    assert_eq!(snapshot.download_display(), "50.00");
    assert_eq!(snapshot.upload_display(), "10.00");
    assert_eq!(snapshot.latency, Some(Latency::Measured(14.0)));
}

#[test]
fn test_high_latency_triggers_single_flight_speedtests() {
    let dir = tempfile::tempdir().expect("tempdir");
    let prober = ScriptedProber::new(&[Some(200.0)]);
    let throughput = SlowThroughput::new(Duration::from_millis(40));
    let mut monitor = Monitor::new(prober.clone(), throughput.clone());

    let config = MonitorConfig {
        ping_interval_secs: 0.005,
        ..fast_config(dir.path())
    };
    monitor.start(&config).expect("start");
    assert!(wait_until(Duration::from_secs(10), || {
        throughput.runs.load(Ordering::SeqCst) >= 3
    }));
    monitor.stop();
    monitor.join();
    assert!(wait_until(Duration::from_secs(5), || !monitor.throughput_in_flight()));

    let runs = throughput.runs.load(Ordering::SeqCst);
    assert_eq!(throughput.max_active.load(Ordering::SeqCst), 1);
    let results = read_throughput_history(&monitor.throughput_log_path().expect("path")).expect("parse");
    assert_eq!(results.len(), runs);
    assert!(results.iter().all(|r| r.is_success()));
}

#[test]
fn test_low_latency_never_triggers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let prober = ScriptedProber::new(&[Some(20.0)]);
    let throughput = SlowThroughput::new(Duration::ZERO);
    let mut monitor = Monitor::new(prober.clone(), throughput.clone());

    monitor.start(&fast_config(dir.path())).expect("start");
    assert!(wait_until(Duration::from_secs(5), || prober.calls() >= 12));
    monitor.stop();
    monitor.join();

    assert_eq!(throughput.runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_restart_begins_with_empty_window() {
    let dir = tempfile::tempdir().expect("tempdir");
    let prober = ScriptedProber::new(&[None]);
    let throughput = SlowThroughput::new(Duration::ZERO);
    let mut monitor = Monitor::new(prober.clone(), throughput);

    monitor.start(&fast_config(dir.path())).expect("start");
    assert!(wait_until(Duration::from_secs(5), || prober.calls() >= 12));
    assert_eq!(monitor.window().len(), MonitorConfig::default().window_capacity);
    monitor.stop();
    monitor.join();
    assert!(monitor.window().is_empty());

    let first_session = prober.calls();
    let config = MonitorConfig {
        ping_interval_secs: 60.0,
        jitter_policy: JitterPolicy::SkipLost,
        ..fast_config(dir.path())
    };
    monitor.start(&config).expect("restart");
    assert!(wait_until(Duration::from_secs(5), || prober.calls() > first_session));
    assert!(wait_until(Duration::from_secs(5), || monitor.window().len() == 1));

    monitor.stop();
    monitor.join();

    let rows = read_latency_history(&monitor.latency_log_path().expect("path")).expect("parse");
    assert_eq!(rows.len(), first_session + 1);
    let last = rows.last().expect("row");
    // A fresh window of one lost probe
    assert_eq!(last.packet_loss_pct, 100.0);
    assert_eq!(last.jitter_ms, 0.0);
    assert!(rows[first_session - 1].packet_loss_pct == 100.0);
}

#[test]
fn test_stop_is_idempotent() {
    let prober = ScriptedProber::new(&[Some(1.0)]);
    let throughput = SlowThroughput::new(Duration::ZERO);
    let mut monitor = Monitor::new(prober.clone(), throughput);

    monitor.stop();
    assert_eq!(monitor.state(), MonitorState::Idle);
    assert_eq!(prober.calls(), 0);
    assert_eq!(monitor.snapshot().latency_display(), "-");

    let dir = tempfile::tempdir().expect("tempdir");
    monitor.start(&fast_config(dir.path())).expect("start");
    monitor.stop();
    monitor.stop();
    monitor.join();
    assert_eq!(monitor.state(), MonitorState::Idle);
}

#[test]
fn test_subscriber_sees_published_snapshots() {
    let dir = tempfile::tempdir().expect("tempdir");
    let prober = ScriptedProber::new(&[Some(33.0)]);
    let throughput = SlowThroughput::new(Duration::ZERO);
    let mut monitor = Monitor::new(prober, throughput);
    let updates = monitor.subscribe();

    monitor.start(&fast_config(dir.path())).expect("start");
    let seen = Mutex::new(Vec::new());
    assert!(wait_until(Duration::from_secs(5), || {
        let mut seen = seen.lock().unwrap();
        seen.extend(updates.try_iter());
        seen.iter().any(|s| s.latency.is_some()) && seen.iter().any(|s| s.download_mbps.is_some())
    }));
    monitor.stop();
    monitor.join();

    let seen = seen.into_inner().unwrap();
    assert!(seen.iter().any(|s| s.latency_display() == "33.0"));
}
