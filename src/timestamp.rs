//! Wall-clock timestamps as written to the logs (`YYYY-MM-DD HH:MM:SS`, local time)

use crate::monitor::constants::TIMESTAMP_FORMAT;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

/// Format a timestamp for the logs.
pub fn format_timestamp(ts: &DateTime<Local>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a log timestamp back into local time.
///
/// Ambiguous local times (DST fold) resolve to the earlier instant.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Local>> {
    let naive = NaiveDateTime::parse_from_str(text.trim(), TIMESTAMP_FORMAT).ok()?;
    Local.from_local_datetime(&naive).earliest()
}

/// Serde adapter for `DateTime<Local>` fields in the throughput log
pub mod serde_format {
    use super::{format_timestamp, parse_timestamp};
    use chrono::{DateTime, Local};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Local>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Local>, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_timestamp(&text)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {}", text)))
    }
}
