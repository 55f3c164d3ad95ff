use std::time::Duration;

use chrono::{DateTime, Utc};

/// Current wall-clock time in milliseconds since the unix epoch.
pub fn time_millis() -> i64 {
    let time: DateTime<chrono::Utc> = Utc::now();
    time.timestamp_millis()
}

/// Epoch millis `timeout` after `from`, saturating.
pub fn deadline(
    from: i64,
    timeout: Duration,
) -> i64 {
    from.saturating_add(i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX))
}

/// Time left until an epoch-millis deadline, zero once it passed.
pub fn until(deadline: i64) -> Duration {
    Duration::from_millis(u64::try_from(deadline.saturating_sub(time_millis())).unwrap_or_default())
}
