use crate::monitor::constants::*;
use crate::monitor::error::{MonitorError, Result};
use crate::report::history::HistoryRecord;
use hdrhistogram::Histogram;
use tracing::{debug, warn};

/// Latency distribution of a history, built on an HDR histogram.
///
/// Values are recorded in microseconds; accessors return milliseconds.
/// Lost probes are counted separately and never enter the histogram.
pub struct Statistics {
    hist: Histogram<u64>,
    real_min_us: u64,
    real_max_us: u64,
    clamped_count: usize,
    lost_count: usize,
}

impl Statistics {
    /// Create a new Statistics instance from latency log rows
    ///
    /// # Arguments
    ///
    /// * `records` - Rows of the latency log; lost rows are only counted
    ///
    /// # Returns
    ///
    /// `History` error if the histogram cannot be built or recorded into
    pub fn new(records: &[HistoryRecord]) -> Result<Self> {
        debug!(row_count = records.len(), "Creating statistics from latency history");
        let mut hist = Histogram::<u64>::new_with_bounds(
            HISTOGRAM_LOW_BOUND_US,
            HISTOGRAM_HIGH_BOUND_US,
            HISTOGRAM_SIGNIFICANT_DIGITS,
        )
        .map_err(|e| MonitorError::History(format!("Failed to create histogram: {}", e)))?;

        let mut real_min_us = u64::MAX;
        let mut real_max_us = 0;
        let mut clamped_count = 0;
        let mut lost_count = 0;

        for record in records {
            let Some(ms) = record.latency.as_millis() else {
                lost_count += 1;
                continue;
            };
            let latency_us = (ms * 1000.0).round() as u64;
            real_min_us = real_min_us.min(latency_us);
            real_max_us = real_max_us.max(latency_us);

            let clamped = latency_us.clamp(HISTOGRAM_LOW_BOUND_US, HISTOGRAM_HIGH_BOUND_US);
            if latency_us != clamped {
                clamped_count += 1;
            }

            hist.record(clamped).map_err(|e| {
                warn!(latency_us = latency_us, error = %e, "Failed to record latency");
                MonitorError::History(format!("Failed to record latency: {}", e))
            })?;
        }

        let result = Self {
            hist,
            real_min_us: if real_min_us == u64::MAX { 0 } else { real_min_us },
            real_max_us,
            clamped_count,
            lost_count,
        };

        if clamped_count > 0 {
            warn!(
                clamped_count = clamped_count,
                total_count = records.len(),
                "Some latency values were clamped to histogram bounds"
            );
        }

        debug!(
            min_ms = result.min(),
            max_ms = result.max(),
            mean_ms = result.mean(),
            lost_count = lost_count,
            "Statistics calculated successfully"
        );

        Ok(result)
    }

    /// Mean latency of answered probes in milliseconds
    pub fn mean(&self) -> f64 {
        self.hist.mean() / 1000.0
    }

    /// Minimum latency in milliseconds (unclamped)
    pub fn min(&self) -> f64 {
        self.real_min_us as f64 / 1000.0
    }

    /// Maximum latency in milliseconds (unclamped)
    pub fn max(&self) -> f64 {
        self.real_max_us as f64 / 1000.0
    }

    /// Latency at `quantile` (0.0..=1.0) in milliseconds
    pub fn percentile(&self, quantile: f64) -> f64 {
        self.hist.value_at_quantile(quantile) as f64 / 1000.0
    }

    pub fn clamped_count(&self) -> usize {
        self.clamped_count
    }

    /// Number of answered probes
    pub fn count(&self) -> u64 {
        self.hist.len()
    }

    pub fn lost_count(&self) -> usize {
        self.lost_count
    }

    /// Lost probes over all probes in percent; 100 when there were none
    pub fn loss_pct(&self) -> f64 {
        let total = self.count() as usize + self.lost_count;
        if total == 0 {
            return 100.0;
        }
        100.0 * self.lost_count as f64 / total as f64
    }
}
