// ── Reconnect backoff ──
//
// Exponential delay with deterministic jitter, shared by every retry
// loop in the crate.

use std::time::Duration;

use crate::config::ReconnectPolicy;

/// Delay to wait before retry number `attempt` (0-based: the delay after
/// the first failure is `attempt = 0`).
///
/// `base * 2^attempt`, capped at `max_delay`, then spread by up to ±25%.
/// The result never exceeds `max_delay`.
pub fn delay_for(attempt: u32, policy: &ReconnectPolicy) -> Duration {
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = policy.base_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let cap = policy.max_delay.as_secs_f64();
    let capped = base.min(cap);

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).clamp(0.0, cap);

    Duration::from_secs_f64(with_jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }

    #[test]
    fn first_delay_is_base() {
        // sin(0) == 0, so no jitter on the first retry.
        assert_eq!(delay_for(0, &policy()), Duration::from_secs(1));
    }

    #[test]
    fn delays_grow_and_stay_capped() {
        let p = policy();
        assert!(delay_for(3, &p) > delay_for(0, &p));
        for attempt in 0..40 {
            assert!(delay_for(attempt, &p) <= p.max_delay);
        }
    }

    #[test]
    fn zero_base_means_no_wait() {
        let p = ReconnectPolicy {
            base_delay: Duration::ZERO,
            ..policy()
        };
        assert_eq!(delay_for(4, &p), Duration::ZERO);
    }
}
