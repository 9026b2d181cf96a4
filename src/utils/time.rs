//! Time helpers.

use chrono::{SecondsFormat, Utc};

pub fn now_timestamp_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Reduce a capture time-of-day column (`10:01:02.1234567 AM`) to whole seconds.
pub fn truncate_to_seconds(time_of_day: &str) -> String {
    let token = time_of_day.split_whitespace().next().unwrap_or_default();
    token.split('.').next().unwrap_or_default().to_string()
}
