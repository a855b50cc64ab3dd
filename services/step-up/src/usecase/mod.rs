pub mod assert;
pub mod send;
pub mod status;
pub mod verify;

use chrono::{DateTime, Duration, Utc};

use crate::domain::policy::RoutePolicy;
use crate::domain::types::SEND_WINDOW_HOURS;

/// Start of the rolling send-count window ending at `now`.
pub(crate) fn send_window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::hours(SEND_WINDOW_HOURS)
}

/// Sends left in the window after `sent` challenges, floored at zero.
pub(crate) fn remaining_sends(policy: &RoutePolicy, sent: u64) -> i64 {
    let sent = i64::try_from(sent).unwrap_or(i64::MAX);
    policy.max_sends_per_24_hours.saturating_sub(sent).max(0)
}
