use std::time::Duration;

use crate::{ApiError, Result};

/// Number of resends after the initial attempt when the server answers 429.
pub const MAX_RETRIES: usize = 3;

/// Smallest accepted (and default) first backoff delay, in milliseconds.
pub const MIN_BASE_DELAY_MS: u64 = 2_000;

/// Multiplier applied to the delay after each retry.
pub const BACKOFF_FACTOR: u64 = 2;

/// Rate-limit retry behavior of a transport.
///
/// Only HTTP 429 triggers a retry. Delays grow `base`, `2 * base`, `4 * base`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    enabled: bool,
    base_delay_ms: u64,
}

impl RetryPolicy {
    /// Creates an enabled policy with the given first delay.
    ///
    /// Fails with [`ApiError::Config`] when `base_delay_ms` is below
    /// [`MIN_BASE_DELAY_MS`].
    pub fn new(base_delay_ms: u64) -> Result<Self> {
        let mut policy = Self::default();
        policy.set_base_delay_ms(base_delay_ms)?;
        Ok(policy)
    }

    /// Policy that never retries.
    pub fn disabled() -> Self {
        Self::default().with_enabled(false)
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Changes the first delay. Out-of-range values are rejected, not clamped,
    /// and leave the policy untouched.
    pub fn set_base_delay_ms(&mut self, base_delay_ms: u64) -> Result<()> {
        if base_delay_ms < MIN_BASE_DELAY_MS {
            return Err(ApiError::Config(format!(
                "retry base delay must be at least {MIN_BASE_DELAY_MS} ms, got {base_delay_ms} ms"
            )));
        }
        self.base_delay_ms = base_delay_ms;
        Ok(())
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn base_delay_ms(&self) -> u64 {
        self.base_delay_ms
    }

    pub fn max_retries(&self) -> usize {
        MAX_RETRIES
    }

    /// Delay before retry number `retry` (zero-based).
    pub fn delay_for_retry(&self, retry: usize) -> Duration {
        let exp = retry.min(16) as u32;
        let multiplier = BACKOFF_FACTOR.saturating_pow(exp);
        Duration::from_millis(self.base_delay_ms.saturating_mul(multiplier))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            base_delay_ms: MIN_BASE_DELAY_MS,
        }
    }
}

/// Configures timeout, retry behavior and static headers of a client.
///
/// Options are consumed when the client is built; they cannot change while
/// requests are in flight.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Rate-limit retry policy.
    pub retry: RetryPolicy,
    /// Extra headers sent with every request, as `(name, value)`.
    pub headers: Vec<(String, String)>,
}

impl ClientOptions {
    /// Registers an additional static header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            retry: RetryPolicy::default(),
            headers: Vec::new(),
        }
    }
}
