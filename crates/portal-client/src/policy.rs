//! Retry policies and backoff calculation.

use std::collections::BTreeSet;
use std::time::Duration;

use rand::Rng;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

/// Statuses retried by the default policy.
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Retries used by best-effort telemetry calls.
pub const TELEMETRY_MAX_RETRIES: u32 = 5;

/// Retry policy for one logical call.
///
/// Chosen by the caller and never mutated while a call is in flight.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OperationPolicy {
    pub max_retries: u32,
    pub retryable_statuses: BTreeSet<u16>,
    pub base_delay_ms: u64,
    /// Whether a 401 may be retried with backoff once the single refresh
    /// for the call has been spent.
    pub include_auth_in_retry: bool,
}

impl Default for OperationPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.into_iter().collect(),
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            include_auth_in_retry: false,
        }
    }
}

impl OperationPolicy {
    /// Policy for best-effort telemetry: more retries, and 401 is retryable
    /// to force the refresh-and-retry path.
    pub fn telemetry() -> Self {
        Self::default()
            .with_max_retries(TELEMETRY_MAX_RETRIES)
            .with_retryable_status(401)
    }

    /// Policy for connectivity probes: a single attempt.
    pub fn probe() -> Self {
        Self::default().with_max_retries(0)
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    pub fn with_retryable_status(mut self, status: u16) -> Self {
        self.retryable_statuses.insert(status);
        if status == 401 {
            self.include_auth_in_retry = true;
        }
        self
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// Delay before retry number `attempt` (1-based).
    ///
    /// `base_delay_ms * 2^(attempt-1) * (0.5 + random() * 0.5)`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 0.5 + rand::thread_rng().gen::<f64>() * 0.5;
        self.backoff_with_factor(attempt, factor)
    }

    fn backoff_with_factor(&self, attempt: u32, factor: f64) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponential = 2u64.saturating_pow(attempt - 1);
        let delay_ms = self.base_delay_ms.saturating_mul(exponential) as f64 * factor;
        Duration::from_millis(delay_ms as u64)
    }

    /// Upper bound on the total time spent sleeping across all retries.
    pub fn max_total_backoff(&self) -> Duration {
        (1..=self.max_retries)
            .map(|attempt| self.backoff_with_factor(attempt, 1.0))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_matches_wire_defaults() {
        let policy = OperationPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay_ms, 1000);
        assert_eq!(
            policy.retryable_statuses.iter().copied().collect::<Vec<_>>(),
            vec![429, 500, 502, 503, 504]
        );
        assert!(!policy.include_auth_in_retry);
    }

    #[test]
    fn test_telemetry_policy_adds_auth_status() {
        let policy = OperationPolicy::telemetry();
        assert_eq!(policy.max_retries, 5);
        assert!(policy.is_retryable_status(401));
        assert!(policy.is_retryable_status(503));
        assert!(policy.include_auth_in_retry);
    }

    #[test]
    fn test_backoff_stays_within_jitter_bounds() {
        let policy = OperationPolicy::default();
        for attempt in 1..=4 {
            let ceiling = 1000u64 * 2u64.pow(attempt - 1);
            for _ in 0..50 {
                let delay = policy.backoff_delay(attempt).as_millis() as u64;
                assert!(delay >= ceiling / 2, "attempt {} delay {}", attempt, delay);
                assert!(delay <= ceiling, "attempt {} delay {}", attempt, delay);
            }
        }
    }

    #[test]
    fn test_backoff_zero_for_first_attempt() {
        assert_eq!(OperationPolicy::default().backoff_delay(0), Duration::ZERO);
    }

    #[test]
    fn test_max_total_backoff() {
        let policy = OperationPolicy::default();
        assert_eq!(policy.max_total_backoff(), Duration::from_millis(7000));
        assert_eq!(OperationPolicy::probe().max_total_backoff(), Duration::ZERO);

        // Large budgets saturate instead of overflowing
        let huge = OperationPolicy::default().with_max_retries(200);
        assert!(huge.max_total_backoff() >= Duration::from_millis(u64::MAX / 2));
    }
}
