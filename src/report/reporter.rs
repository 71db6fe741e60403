use crate::monitor::error::Result;
use crate::report::history::{HistoryRecord, ThroughputSummary};
use crate::report::statistics::Statistics;
use crate::timestamp::format_timestamp;
use colored::*;
use tracing::{debug, info, warn};

/// Reporter for printing a summary of the monitor's logs
pub struct Reporter;

const BAR_WIDTH: usize = 30;
const SLOW_PING_MS: f64 = 1000.0;
/// Buckets past this index are hidden while empty
const ALWAYS_SHOWN_BUCKETS: usize = 5;
const LABEL_WIDTH: usize = 12;

/// Latency buckets in milliseconds
const BUCKETS: [(f64, f64, &str); 7] = [
    (0.0, 10.0, "0-10 ms"),
    (10.0, 20.0, "10-20 ms"),
    (20.0, 50.0, "20-50 ms"),
    (50.0, 100.0, "50-100 ms"),
    (100.0, 200.0, "100-200 ms"),
    (200.0, 500.0, "200-500 ms"),
    (500.0, 1000.0, "500ms-1s"),
];

/// Left-to-right eighth blocks, index = eighths filled
const EIGHTHS: [&str; 8] = ["", "▏", "▎", "▍", "▌", "▋", "▊", "▉"];

/// Bar for a bucket holding `share` percent of all pings.
///
/// # Arguments
///
/// * `share` - Percentage of pings in the bucket
/// * `widest` - Largest share of any bucket; it gets the full width
///
/// # Returns
///
/// Whole blocks plus one eighth-block for the remainder. A non-empty bucket
/// always shows at least `▏`.
fn bar(share: f64, widest: f64) -> String {
    if share <= 0.0 || widest <= 0.0 {
        return String::new();
    }
    let eighths = ((share / widest).min(1.0) * (BAR_WIDTH * 8) as f64) as usize;
    let drawn = format!("{}{}", "█".repeat(eighths / 8), EIGHTHS[eighths % 8]);
    if drawn.is_empty() {
        EIGHTHS[1].to_string()
    } else {
        drawn
    }
}

/// Percentage with three, two or one decimals depending on its size
fn percent(share: f64) -> String {
    let decimals = match share {
        s if s < 0.1 => 3,
        s if s < 1.0 => 2,
        _ => 1,
    };
    format!("{:5.*}%", decimals, share)
}

/// Ping count, right-aligned, thousands as `1.5k`
fn ping_count(count: usize) -> String {
    if count < 1000 {
        format!("{:>7}", count)
    } else {
        format!("{:>7}", format!("{:.1}k", count as f64 / 1000.0))
    }
}

/// Bucket label, padded before coloring so escape codes keep columns aligned
fn bucket_label(label: &str, share: f64) -> ColoredString {
    let padded = format!("{:>width$}", label, width = LABEL_WIDTH);
    match share {
        s if s > 50.0 => padded.green(),
        s if s > 10.0 => padded.cyan(),
        _ => padded.normal(),
    }
}

impl Reporter {
    /// Print the complete history summary
    pub fn print_history(
        &self,
        stats: &Statistics,
        records: &[HistoryRecord],
        throughput: &ThroughputSummary,
    ) -> Result<()> {
        debug!(
            answered = stats.count(),
            lost = stats.lost_count(),
            speedtests = throughput.runs,
            "Printing history summary"
        );

        println!("\n{}", "┌─────────────────────────────┐".cyan());
        println!("{}", "│  Connection History         │".cyan());
        println!("{}", "└─────────────────────────────┘".cyan());
        println!();

        if records.is_empty() {
            warn!("No historical ping data");
            println!("{}", "No historical ping data to show.".yellow());
        } else {
            self.print_latency_section(stats, records)?;
        }
        println!();
        self.print_throughput_section(throughput);

        info!(
            answered = stats.count(),
            loss_pct = stats.loss_pct(),
            speedtests = throughput.runs,
            "History reported"
        );
        Ok(())
    }

    fn print_latency_section(&self, stats: &Statistics, records: &[HistoryRecord]) -> Result<()> {
        let total = records.len();
        if let (Some(first), Some(last)) = (records.first(), records.last()) {
            println!(
                "Period:   {} → {}",
                format_timestamp(&first.timestamp),
                format_timestamp(&last.timestamp)
            );
        }
        let loss = stats.loss_pct();
        let loss_str = format!("{:.2}%", loss);
        let loss_colored = if loss == 0.0 { loss_str.green() } else { loss_str.red() };
        println!("Pings:    {} sent, {} lost ({})", total, stats.lost_count(), loss_colored);
        println!();

        if stats.count() == 0 {
            println!("{}", "Every ping in the log was lost.".red().bold());
            return Ok(());
        }

        println!("Latency Statistics (round-trip time):");
        println!("  Mean:      {:>8.1} ms  ← Average latency", stats.mean());
        println!("  Min:       {:>8.1} ms  ← Fastest reply", stats.min());
        println!("  Max:       {:>8.1} ms  ← Slowest reply", stats.max());
        println!("  P50:       {:>8.1} ms  ← Median", stats.percentile(0.5));
        println!("  P90:       {:>8.1} ms", stats.percentile(0.9));
        println!("  P99:       {:>8.1} ms", stats.percentile(0.99));

        let jitters: Vec<f64> = records.iter().map(|r| r.jitter_ms).collect();
        let mean_jitter = jitters.iter().sum::<f64>() / jitters.len() as f64;
        println!("  Jitter:    {:>8.1} ms  ← Mean of the logged window jitter", mean_jitter);

        if stats.clamped_count() > 0 {
            println!();
            println!(
                "  ⚠ Note: {} measurement(s) exceeded histogram bounds and were clamped",
                stats.clamped_count()
            );
        }
        println!();

        let latencies: Vec<f64> = records.iter().filter_map(|r| r.latency.as_millis()).collect();
        self.print_bucket_distribution(&latencies, total)
    }

    fn print_throughput_section(&self, summary: &ThroughputSummary) {
        println!("Speedtests: {} run(s), {} failed", summary.runs, summary.failures);
        match (summary.mean_download_mbps, summary.mean_upload_mbps) {
            (Some(down), Some(up)) => {
                println!("  Download:  {:>8.2} Mbit/s  ← Mean of successful runs", down);
                println!("  Upload:    {:>8.2} Mbit/s", up);
            }
            _ => println!("  {}", "No successful speedtest recorded.".yellow()),
        }
        if let Some(error) = &summary.last_error {
            println!("  Last error: {}", error.as_str().red());
        }
    }

    /// Print how answered pings spread over the latency buckets.
    ///
    /// # Arguments
    ///
    /// * `latencies` - Round-trip times of answered pings in milliseconds
    /// * `total_pings` - All pings including lost ones; shares are relative to it
    pub fn print_bucket_distribution(&self, latencies: &[f64], total_pings: usize) -> Result<()> {
        println!("Latency Distribution (ping count by range):");
        println!();

        let spread = Spread::of(latencies);
        let share = |count: usize| 100.0 * count as f64 / total_pings.max(1) as f64;
        let widest = spread.counts.iter().map(|&c| share(c)).fold(0.0, f64::max);

        let rows = BUCKETS.iter().zip(spread.counts).enumerate();
        for (i, (&(_, _, label), count)) in rows {
            if count == 0 && i >= ALWAYS_SHOWN_BUCKETS {
                continue;
            }
            println!(
                "  {}:  {:30} {} ({} pings)",
                bucket_label(label, share(count)),
                bar(share(count), widest),
                percent(share(count)),
                ping_count(count)
            );
        }

        if spread.slow > 0 {
            println!(
                "  {}:  {:30} {} ({} pings) ← MAX: {:.1}ms",
                format!("{:>width$}", ">1 s", width = LABEL_WIDTH).red().bold(),
                bar(share(spread.slow), widest),
                percent(share(spread.slow)),
                ping_count(spread.slow),
                spread.max_ms
            );
        }

        Ok(())
    }
}

/// Answered pings sorted into [`BUCKETS`], plus those of a second or more
struct Spread {
    counts: [usize; BUCKETS.len()],
    slow: usize,
    max_ms: f64,
}

impl Spread {
    fn of(latencies: &[f64]) -> Self {
        let mut spread = Spread {
            counts: [0; BUCKETS.len()],
            slow: 0,
            max_ms: 0.0,
        };
        for &ms in latencies {
            spread.max_ms = spread.max_ms.max(ms);
            if ms >= SLOW_PING_MS {
                spread.slow += 1;
            } else if let Some(i) = BUCKETS.iter().position(|&(lo, hi, _)| ms >= lo && ms < hi) {
                spread.counts[i] += 1;
            }
        }
        spread
    }
}
