//! Exponential backoff for HTTP retries.

use std::time::Duration;

/// Upper bound on a single retry delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Delay before retry number `retry` (1-based): `initial * 2^(retry - 1)`,
/// capped at [`MAX_BACKOFF`].
pub fn backoff_delay(initial: Duration, retry: u32) -> Duration {
    let factor = 2u32.saturating_pow(retry.saturating_sub(1));
    initial
        .checked_mul(factor)
        .map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
}
