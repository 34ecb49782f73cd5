use embassy_time::{Duration, Instant};

/// Time elapsed between `since` and `now`, clamped to zero if the samples
/// arrive out of order.
pub fn elapsed(now: Instant, since: Instant) -> Duration {
    now.checked_duration_since(since).unwrap_or(Duration::from_ticks(0))
}

/// Whole seconds elapsed, for log lines.
pub(crate) fn elapsed_secs(now: Instant, since: Instant) -> u64 {
    elapsed(now, since).as_secs()
}
