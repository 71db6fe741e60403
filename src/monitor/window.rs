//! Bounded history of recent latency samples and the statistics derived from it

use crate::probe::{Latency, LatencySample};
use clap::ValueEnum;
use std::collections::VecDeque;

/// How lost probes take part in the jitter computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum JitterPolicy {
    /// Lost probes count with their log encoding (`-1`), so every loss shows
    /// up as a large swing. Matches the historical logs.
    #[default]
    IncludeSentinel,
    /// Lost probes are dropped and jitter is taken over the remaining
    /// measurements in order.
    SkipLost,
}

/// Latency contribution of a sample to the rolling average.
///
/// A lost probe counts as 0 ms. This lowers the average during loss and can
/// delay the threshold trigger; historical behavior, kept on purpose.
pub fn loss_as_zero(latency: &Latency) -> f64 {
    latency.as_millis().unwrap_or(0.0)
}

/// Mean absolute difference between consecutive values.
fn mean_abs_successive_diff(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let total: f64 = values.windows(2).map(|pair| (pair[1] - pair[0]).abs()).sum();
    total / (values.len() - 1) as f64
}

/// FIFO window of the last `capacity` latency samples
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    samples: VecDeque<LatencySample>,
    capacity: usize,
    policy: JitterPolicy,
}

impl SlidingWindow {
    /// Create an empty window. A zero capacity is raised to one.
    pub fn new(capacity: usize, policy: JitterPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
            policy,
        }
    }

    /// Append a sample, evicting the oldest one when the window is full.
    pub fn push(&mut self, sample: LatencySample) {
        self.samples.push_back(sample);
        if self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> JitterPolicy {
        self.policy
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &LatencySample> {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&LatencySample> {
        self.samples.back()
    }

    /// Jitter in milliseconds under the window's [`JitterPolicy`]; 0 with fewer than 2 samples.
    pub fn jitter(&self) -> f64 {
        let values: Vec<f64> = match self.policy {
            JitterPolicy::IncludeSentinel => self.samples.iter().map(|s| s.latency.encoded()).collect(),
            JitterPolicy::SkipLost => self
                .samples
                .iter()
                .filter_map(|s| s.latency.as_millis())
                .collect(),
        };
        mean_abs_successive_diff(&values)
    }

    /// Share of lost samples in percent. An empty window reports 100.
    pub fn packet_loss_pct(&self) -> f64 {
        if self.samples.is_empty() {
            return 100.0;
        }
        let lost = self.samples.iter().filter(|s| s.is_lost()).count();
        100.0 * lost as f64 / self.samples.len() as f64
    }

    /// Mean latency of the last `k` samples (fewer if the window is shorter),
    /// with lost samples counted through [`loss_as_zero`]. 0 when empty.
    pub fn recent_average(&self, k: usize) -> f64 {
        let take = k.min(self.samples.len());
        if take == 0 {
            return 0.0;
        }
        let sum: f64 = self
            .samples
            .iter()
            .rev()
            .take(take)
            .map(|s| loss_as_zero(&s.latency))
            .sum();
        sum / take as f64
    }
}

impl Default for SlidingWindow {
    fn default() -> Self {
        Self::new(crate::monitor::constants::DEFAULT_WINDOW_CAPACITY, JitterPolicy::default())
    }
}
