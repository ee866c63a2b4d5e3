//! Retry delay computation.

use crate::config::RetryPolicy;
use rand::Rng;
use std::time::Duration;

/// Un-jittered delay before attempt `attempt` (1-based): `min(base * 2^n, max)`.
pub fn base_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    policy
        .base_delay
        .checked_mul(factor)
        .map_or(policy.max_delay, |delay| delay.min(policy.max_delay))
}

/// Delay before attempt `attempt`, with uniform jitter applied.
pub fn retry_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let base = base_delay(policy, attempt);
    if policy.jitter <= 0.0 {
        return base;
    }
    let offset = rand::thread_rng().gen_range(-policy.jitter..=policy.jitter);
    base.mul_f64(1.0 + offset)
}
