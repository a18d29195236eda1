//! Time and timestamp helpers.

use chrono::{DateTime, Duration, DurationRound, Utc};

/// UTC timestamp used for server start time and heartbeat alignment.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Return the first whole minute strictly after `ts`.
#[must_use]
pub fn next_whole_minute(ts: Timestamp) -> Timestamp {
    let truncated = ts.duration_trunc(Duration::minutes(1)).unwrap_or(ts);
    truncated + Duration::minutes(1)
}

/// Render an elapsed duration as `"<d> days <h> hours <m> minutes"`,
/// leaving out zero days and zero hours.
#[must_use]
pub fn format_uptime(elapsed: Duration) -> String {
    let days = elapsed.num_days();
    let hours = elapsed.num_hours() - days * 24;
    let minutes = elapsed.num_minutes() - elapsed.num_hours() * 60;
    let mut result = String::new();
    if days != 0 {
        result.push_str(&format!("{days} days "));
    }
    if hours != 0 {
        result.push_str(&format!("{hours} hours "));
    }
    result.push_str(&format!("{minutes} minutes"));
    result
}
