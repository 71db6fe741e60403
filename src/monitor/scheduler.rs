//! The two sampling loops and the gate that serializes throughput runs.
//!
//! Each session runs a latency loop (every ping interval) and a throughput
//! loop (every speedtest interval) on their own threads. The latency loop can
//! also request an out-of-cycle throughput run when the recent average
//! latency crosses the threshold. Both request paths go through
//! [`ThroughputGate`]: a speedtest saturates the link it measures, so a
//! request that finds one already running is dropped, never queued.

use crate::monitor::constants::TRIGGER_SAMPLE_COUNT;
use crate::monitor::recorder::Recorder;
use crate::monitor::snapshot::Publisher;
use crate::monitor::window::SlidingWindow;
use crate::probe::{LatencyProber, ThroughputProbe};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cooperative stop flag for one session.
///
/// Loops check it at iteration boundaries and sleep on it between
/// iterations, so `stop()` wakes them without interrupting a probe.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: Mutex<bool>,
    cv: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        let mut stopped = self.stopped.lock();
        *stopped = true;
        self.cv.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.lock()
    }

    /// Sleep for `timeout` or until stopped. Returns true if stopped.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut stopped = self.stopped.lock();
        if !*stopped {
            // Spurious wakeups only shorten one interval
            self.cv.wait_for(&mut stopped, timeout);
        }
        *stopped
    }
}

/// Capacity-one, drop-on-contention gate around throughput measurements
#[derive(Debug, Default)]
pub struct ThroughputGate {
    in_flight: AtomicBool,
}

impl ThroughputGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate. `None` if a measurement is already in flight.
    pub fn try_acquire(self: &Arc<Self>) -> Option<GatePermit> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GatePermit {
                gate: Arc::clone(self),
            })
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Proof of holding the [`ThroughputGate`]; releases it on drop.
#[derive(Debug)]
pub struct GatePermit {
    gate: Arc<ThroughputGate>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.gate.in_flight.store(false, Ordering::Release);
    }
}

/// Why a throughput measurement was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Periodic,
    Threshold,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Periodic => write!(f, "periodic"),
            Trigger::Threshold => write!(f, "threshold"),
        }
    }
}

/// True when the window holds enough samples and their recent average
/// (lost probes counted as 0 ms) is above `threshold_ms`.
pub fn should_trigger(window: &SlidingWindow, threshold_ms: f64) -> bool {
    window.len() >= TRIGGER_SAMPLE_COUNT && window.recent_average(TRIGGER_SAMPLE_COUNT) > threshold_ms
}

/// The single entry point for running a throughput measurement
pub struct ThroughputRunner {
    probe: Arc<dyn ThroughputProbe>,
    gate: Arc<ThroughputGate>,
    recorder: Arc<Recorder>,
    publisher: Arc<Publisher>,
    server_id: Option<String>,
}

impl ThroughputRunner {
    pub fn new(
        probe: Arc<dyn ThroughputProbe>,
        gate: Arc<ThroughputGate>,
        recorder: Arc<Recorder>,
        publisher: Arc<Publisher>,
        server_id: Option<String>,
    ) -> Self {
        Self {
            probe,
            gate,
            recorder,
            publisher,
            server_id,
        }
    }

    /// Run a measurement on the calling thread if the gate is free.
    ///
    /// Returns false when the request was dropped.
    pub fn request(&self, trigger: Trigger) -> bool {
        match self.gate.try_acquire() {
            Some(permit) => {
                self.run(permit, trigger);
                true
            }
            None => {
                debug!(trigger = %trigger, "Throughput measurement already in flight, request dropped");
                false
            }
        }
    }

    /// Claim the gate on the calling thread, then measure on a worker thread.
    ///
    /// Returns false when the request was dropped or the worker could not start.
    pub fn request_detached(self: &Arc<Self>, trigger: Trigger) -> bool {
        let Some(permit) = self.gate.try_acquire() else {
            debug!(trigger = %trigger, "Throughput measurement already in flight, request dropped");
            return false;
        };
        let runner = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("throughput-trigger".into())
            .spawn(move || runner.run(permit, trigger));
        match spawned {
            Ok(_) => true,
            Err(e) => {
                // The permit went down with the closure, the gate is free again
                warn!(error = %e, "Failed to spawn triggered throughput measurement");
                false
            }
        }
    }

    fn run(&self, _permit: GatePermit, trigger: Trigger) {
        info!(trigger = %trigger, server_id = ?self.server_id, "Starting throughput measurement");
        let result = self.probe.measure(self.server_id.as_deref());

        match (result.download_mbps(), result.upload_mbps(), result.error()) {
            (Some(down), Some(up), _) => info!(
                trigger = %trigger,
                download_mbps = down,
                upload_mbps = up,
                "Throughput measured"
            ),
            (_, _, error) => warn!(trigger = %trigger, error = ?error, "Throughput measurement failed"),
        }

        if let Err(e) = self.recorder.record_throughput(&result) {
            warn!(error = %e, path = %self.recorder.throughput_log_path().display(), "Dropped throughput log record");
        }
        self.publisher.publish_throughput(&result);
    }
}

/// Everything the latency loop needs for one session
pub struct LatencyLoop {
    pub host: String,
    pub timeout: Duration,
    pub interval: Duration,
    pub threshold_ms: f64,
    pub prober: Arc<dyn LatencyProber>,
    pub window: Arc<Mutex<SlidingWindow>>,
    pub recorder: Arc<Recorder>,
    pub publisher: Arc<Publisher>,
    pub runner: Arc<ThroughputRunner>,
    pub stop: Arc<StopSignal>,
}

impl LatencyLoop {
    /// One probe: sample, update the window, log, publish, maybe trigger.
    pub fn tick(&self) {
        let sample = self.prober.probe(&self.host, self.timeout);

        let (jitter, packet_loss, trigger) = {
            let mut window = self.window.lock();
            window.push(sample.clone());
            (
                window.jitter(),
                window.packet_loss_pct(),
                should_trigger(&window, self.threshold_ms),
            )
        };

        info!(
            host = %self.host,
            latency_ms = %sample.latency,
            jitter_ms = jitter,
            packet_loss_pct = packet_loss,
            "Ping"
        );

        if let Err(e) = self.recorder.record_latency(&sample, jitter, packet_loss) {
            warn!(error = %e, path = %self.recorder.latency_log_path().display(), "Dropped latency log record");
        }
        self.publisher.publish_latency(&sample, jitter, packet_loss);

        if trigger {
            debug!(threshold_ms = self.threshold_ms, "Recent latency above threshold");
            self.runner.request_detached(Trigger::Threshold);
        }
    }

    pub fn run(&self) {
        debug!(host = %self.host, interval_ms = self.interval.as_millis(), "Latency loop started");
        while !self.stop.is_stopped() {
            self.tick();
            if self.stop.wait_timeout(self.interval) {
                break;
            }
        }
        debug!("Latency loop stopped");
    }
}

/// The periodic throughput loop. The first run happens right at start.
pub struct ThroughputLoop {
    pub interval: Duration,
    pub runner: Arc<ThroughputRunner>,
    pub stop: Arc<StopSignal>,
}

impl ThroughputLoop {
    pub fn run(&self) {
        debug!(interval_secs = self.interval.as_secs_f64(), "Throughput loop started");
        while !self.stop.is_stopped() {
            self.runner.request(Trigger::Periodic);
            if self.stop.wait_timeout(self.interval) {
                break;
            }
        }
        debug!("Throughput loop stopped");
    }
}

/// Owner of a session's two loops
pub struct Scheduler {
    pub latency: LatencyLoop,
    pub throughput: ThroughputLoop,
}

impl Scheduler {
    /// Start both loops on named threads.
    ///
    /// If the second thread cannot be spawned the session's stop signal is
    /// raised so the first one winds down.
    pub fn spawn(self) -> io::Result<Vec<JoinHandle<()>>> {
        let stop = Arc::clone(&self.latency.stop);
        let latency = self.latency;
        let throughput = self.throughput;

        let latency_handle = thread::Builder::new()
            .name("latency-loop".into())
            .spawn(move || latency.run())?;

        match thread::Builder::new()
            .name("throughput-loop".into())
            .spawn(move || throughput.run())
        {
            Ok(throughput_handle) => Ok(vec![latency_handle, throughput_handle]),
            Err(e) => {
                stop.stop();
                Err(e)
            }
        }
    }
}
