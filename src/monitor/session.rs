//! Monitor lifecycle: `Idle → Running → Idle`.
//!
//! The monitor owns the pieces shared across sessions (probes, throughput
//! gate, published snapshot) and creates the per-session state (window,
//! recorder, stop signal) on every `start`.

use crate::monitor::config::MonitorConfig;
use crate::monitor::error::{MonitorError, Result};
use crate::monitor::recorder::Recorder;
use crate::monitor::scheduler::{
    LatencyLoop, Scheduler, StopSignal, ThroughputGate, ThroughputLoop, ThroughputRunner,
};
use crate::monitor::snapshot::{Publisher, Snapshot};
use crate::monitor::window::SlidingWindow;
use crate::probe::{LatencyProber, LatencySample, SpeedtestCli, SystemPing, ThroughputProbe};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Running,
}

/// State of one running session
struct Session {
    stop: Arc<StopSignal>,
    window: Arc<Mutex<SlidingWindow>>,
    handles: Vec<JoinHandle<()>>,
}

pub struct Monitor {
    prober: Arc<dyn LatencyProber>,
    throughput: Arc<dyn ThroughputProbe>,
    gate: Arc<ThroughputGate>,
    publisher: Arc<Publisher>,
    session: Option<Session>,
    /// Threads of stopped sessions that may still be finishing a measurement
    stopping: Vec<JoinHandle<()>>,
    log_dir: Option<PathBuf>,
}

impl Monitor {
    pub fn new(prober: Arc<dyn LatencyProber>, throughput: Arc<dyn ThroughputProbe>) -> Self {
        Self {
            prober,
            throughput,
            gate: Arc::new(ThroughputGate::new()),
            publisher: Arc::new(Publisher::new()),
            session: None,
            stopping: Vec::new(),
            log_dir: None,
        }
    }

    /// Monitor using the system `ping` and `speedtest` commands
    pub fn with_system_tools() -> Self {
        Self::new(Arc::new(SystemPing::default()), Arc::new(SpeedtestCli::default()))
    }

    pub fn state(&self) -> MonitorState {
        if self.session.is_some() {
            MonitorState::Running
        } else {
            MonitorState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == MonitorState::Running
    }

    /// Validate `config`, prepare the log directory and start both loops.
    ///
    /// # Arguments
    ///
    /// * `config` - Session settings, read-only until the next `start`
    ///
    /// # Returns
    ///
    /// `AlreadyRunning` while a session is active, `Config` for invalid
    /// settings and `Io` when the log directory or its files cannot be
    /// created or opened for appending. The monitor stays idle on error.
    pub fn start(&mut self, config: &MonitorConfig) -> Result<()> {
        if self.is_running() {
            return Err(MonitorError::AlreadyRunning);
        }
        config.validate()?;

        fs::create_dir_all(&config.log_directory).map_err(|e| {
            warn!(error = %e, path = %config.log_directory.display(), "Failed to create log directory");
            e
        })?;
        let recorder = Arc::new(Recorder::new(&config.log_directory));
        recorder.ensure_writable().map_err(|e| {
            warn!(error = %e, path = %config.log_directory.display(), "Log files are not writable");
            e
        })?;
        self.reap_stopped();

        let stop = Arc::new(StopSignal::new());
        let window = Arc::new(Mutex::new(SlidingWindow::new(
            config.window_capacity,
            config.jitter_policy,
        )));
        let runner = Arc::new(ThroughputRunner::new(
            Arc::clone(&self.throughput),
            Arc::clone(&self.gate),
            Arc::clone(&recorder),
            Arc::clone(&self.publisher),
            config.server_id().map(str::to_string),
        ));

        let scheduler = Scheduler {
            latency: LatencyLoop {
                host: config.target_host.trim().to_string(),
                timeout: config.probe_timeout(),
                interval: config.ping_interval(),
                threshold_ms: config.latency_threshold_ms,
                prober: Arc::clone(&self.prober),
                window: Arc::clone(&window),
                recorder,
                publisher: Arc::clone(&self.publisher),
                runner: Arc::clone(&runner),
                stop: Arc::clone(&stop),
            },
            throughput: ThroughputLoop {
                interval: config.throughput_interval(),
                runner,
                stop: Arc::clone(&stop),
            },
        };
        let handles = scheduler.spawn()?;

        info!(
            host = %config.target_host,
            ping_interval_secs = config.ping_interval_secs,
            speedtest_interval_mins = config.throughput_interval_mins,
            latency_threshold_ms = config.latency_threshold_ms,
            log_dir = %config.log_directory.display(),
            "Monitoring started"
        );

        self.log_dir = Some(config.log_directory.clone());
        self.session = Some(Session {
            stop,
            window,
            handles,
        });
        Ok(())
    }

    /// Ask both loops to exit at their next iteration boundary.
    ///
    /// Returns immediately; an in-flight probe or speedtest is left to finish.
    /// Calling it while idle does nothing.
    pub fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            debug!("Stop requested while idle");
            return;
        };
        session.stop.stop();
        self.stopping.extend(session.handles);
        info!("Monitoring stopped");
    }

    /// Wait for the loops of stopped sessions to exit.
    pub fn join(&mut self) {
        for handle in self.stopping.drain(..) {
            if handle.join().is_err() {
                warn!("Sampling loop panicked");
            }
        }
    }

    fn reap_stopped(&mut self) {
        self.stopping.retain(|handle| !handle.is_finished());
    }

    /// Copy of the latest published readings
    pub fn snapshot(&self) -> Snapshot {
        self.publisher.snapshot()
    }

    /// Receive every snapshot published from now on
    pub fn subscribe(&self) -> Receiver<Snapshot> {
        self.publisher.subscribe()
    }

    /// Consistent copy of the current session's window, oldest first
    pub fn window(&self) -> Vec<LatencySample> {
        self.session
            .as_ref()
            .map(|s| s.window.lock().iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn throughput_in_flight(&self) -> bool {
        self.gate.is_in_flight()
    }

    /// Log directory of the current or last session
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }

    pub fn latency_log_path(&self) -> Option<PathBuf> {
        self.log_dir.as_deref().map(|dir| Recorder::new(dir).latency_log_path().to_path_buf())
    }

    pub fn throughput_log_path(&self) -> Option<PathBuf> {
        self.log_dir.as_deref().map(|dir| Recorder::new(dir).throughput_log_path().to_path_buf())
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}
