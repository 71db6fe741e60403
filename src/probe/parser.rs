//! Extraction of the round-trip time from `ping` output.
//!
//! Windows `ping` prints a localized summary such as
//! `Minimum = 10ms, Maximum = 12ms, Average = 11ms` (English) or
//! `Minimo = 10ms, Massimo = 12ms, Medio = 11ms` (Italian), while Unix
//! implementations print `rtt min/avg/max/mdev = 0.045/0.046/0.047/0.001 ms`.

use tracing::debug;

/// Labels that introduce the average round-trip time in the Windows summary
pub const AVERAGE_LABELS: &[&str] = &["Average", "Media", "Medio", "Moyenne", "Mittelwert"];

/// Prefixes of the Unix summary line
const UNIX_SUMMARY_PREFIXES: &[&str] = &["rtt ", "round-trip "];

/// Returns the average round-trip time in milliseconds, if the output has one.
pub fn parse_round_trip(output: &str) -> Option<f64> {
    for line in output.lines() {
        let line = line.trim();

        if AVERAGE_LABELS.iter().any(|label| line.contains(label)) {
            match parse_labelled_average(line) {
                Some(ms) => return Some(ms),
                None => {
                    debug!(line = line, "Average label without a readable figure");
                    continue;
                }
            }
        }

        if UNIX_SUMMARY_PREFIXES.iter().any(|p| line.starts_with(p)) {
            if let Some(ms) = parse_unix_summary(line) {
                return Some(ms);
            }
        }
    }
    None
}

/// `... Average = 11ms` → 11.0. The figure follows the last `=`.
fn parse_labelled_average(line: &str) -> Option<f64> {
    let figure = line.rsplit('=').next()?;
    let cleaned: String = figure
        .trim()
        .trim_end_matches("ms")
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    parse_millis(&cleaned)
}

/// `rtt min/avg/max/mdev = 0.045/0.046/0.047/0.001 ms` → 0.046
fn parse_unix_summary(line: &str) -> Option<f64> {
    let (names, values) = line.split_once('=')?;
    let names = names.split_whitespace().last()?;
    let avg_index = names.split('/').position(|name| name == "avg")?;
    let values = values.trim().trim_end_matches("ms").trim();
    let figure = values.split('/').nth(avg_index)?;
    parse_millis(figure.trim())
}

fn parse_millis(text: &str) -> Option<f64> {
    text.parse::<f64>()
        .ok()
        .filter(|ms| ms.is_finite() && *ms >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOWS_EN: &str = "\
Pinging 8.8.8.8 with 32 bytes of data:
Reply from 8.8.8.8: bytes=32 time=14ms TTL=117

Ping statistics for 8.8.8.8:
    Packets: Sent = 1, Received = 1, Lost = 0 (0% loss),
Approximate round trip times in milli-seconds:
    Minimum = 14ms, Maximum = 14ms, Average = 14ms
";

    const WINDOWS_IT: &str = "\
Esecuzione di Ping 8.8.8.8 con 32 byte di dati:
Risposta da 8.8.8.8: byte=32 durata=23ms TTL=117

Statistiche Ping per 8.8.8.8:
    Pacchetti: Trasmessi = 1, Ricevuti = 1,
    Persi = 0 (0% persi),
Tempo approssimativo percorsi andata/ritorno in millisecondi:
    Minimo = 23ms, Massimo = 23ms, Medio = 23ms
";

    const LINUX: &str = "\
PING 8.8.8.8 (8.8.8.8) 56(84) bytes of data.
64 bytes from 8.8.8.8: icmp_seq=1 ttl=117 time=12.4 ms

--- 8.8.8.8 ping statistics ---
1 packets transmitted, 1 received, 0% packet loss, time 0ms
rtt min/avg/max/mdev = 12.412/12.412/12.412/0.000 ms
";

    const MACOS: &str = "\
--- 8.8.8.8 ping statistics ---
1 packets transmitted, 1 packets received, 0.0% packet loss
round-trip min/avg/max/stddev = 9.871/9.871/9.871/0.000 ms
";

    #[test]
    fn test_windows_english() {
        assert_eq!(parse_round_trip(WINDOWS_EN), Some(14.0));
    }

    #[test]
    fn test_windows_italian() {
        assert_eq!(parse_round_trip(WINDOWS_IT), Some(23.0));
    }

    #[test]
    fn test_spanish_media_label_with_decimal_comma() {
        let out = "    Mínimo = 3,5ms, Máximo = 4ms, Media = 3,5ms";
        assert_eq!(parse_round_trip(out), Some(3.5));
    }

    #[test]
    fn test_unix_summaries() {
        assert_eq!(parse_round_trip(LINUX), Some(12.412));
        assert_eq!(parse_round_trip(MACOS), Some(9.871));
    }

    #[test]
    fn test_timeout_output_has_no_figure() {
        let out = "\
Pinging 10.255.255.1 with 32 bytes of data:
Request timed out.

Ping statistics for 10.255.255.1:
    Packets: Sent = 1, Received = 0, Lost = 1 (100% loss),
";
        assert_eq!(parse_round_trip(out), None);
        assert_eq!(parse_round_trip(""), None);
    }

    #[test]
    fn test_label_with_garbage_is_skipped() {
        let out = "Average = n/a\n    Minimum = 5ms, Maximum = 7ms, Average = 6ms";
        assert_eq!(parse_round_trip(out), Some(6.0));
    }

    #[test]
    fn test_negative_figure_rejected() {
        assert_eq!(parse_round_trip("Average = -1ms"), None);
    }
}
