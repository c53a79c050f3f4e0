//! Retry delay helpers.

use std::time::Duration;

/// Upper bound for any computed retry delay.
const MAX_DELAY: Duration = Duration::from_secs(60);

/// Linear backoff: `base * attempt`, capped at one minute.
pub fn linear_backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt).min(MAX_DELAY)
}
