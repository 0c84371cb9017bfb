//! Spacing between fetch retries.

use std::time::Duration;

use rand::Rng;

/// Delay before retry number `retry` (1-based): `base * 2^(retry-1)`,
/// capped at `max`, plus up to a tenth of that as jitter.
///
/// `retry == 0` is the first attempt and never waits.
pub fn backoff_delay(retry: u32, base: Duration, max: Duration) -> Duration {
    let Some(exponent) = retry.checked_sub(1) else {
        return Duration::ZERO;
    };
    let capped = base
        .checked_mul(2u32.saturating_pow(exponent))
        .map_or(max, |delay| delay.min(max));

    let spread = capped / 10;
    if spread.is_zero() {
        return capped;
    }
    let jitter = rand::thread_rng().gen_range(Duration::ZERO..spread);
    capped.saturating_add(jitter)
}
