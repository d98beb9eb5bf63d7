//! Retry policy for model invocations.
//!
//! [`RetryPolicy`] bounds how many times the model client retries and how
//! long it waits in between. The default is a constant delay; exponential
//! growth and jitter are opt-in for deployments sharing a quota.

use std::time::Duration;

/// Retry budget, delay schedule, and credential-error statuses.
///
/// # Example
///
/// ```
/// use llm_relay::backend::RetryPolicy;
/// use std::time::Duration;
///
/// let fixed = RetryPolicy::fixed(3, Duration::from_secs(1));
/// assert_eq!(fixed.delay_for_attempt(0), fixed.delay_for_attempt(4));
///
/// let growing = RetryPolicy::standard().with_exponential(2.0, Duration::from_secs(30));
/// assert_eq!(growing.delay_for_attempt(2), Duration::from_secs(4));
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Failure budget per counter. Always at least 1.
    pub max_retries: u32,

    /// Delay before the first retry. Default: 1 second.
    pub initial_delay: Duration,

    /// Multiplier applied per retry. Default: 1.0 (constant delay).
    pub multiplier: f64,

    /// Upper bound on any single delay. Default: 60 seconds.
    pub max_delay: Duration,

    /// Jitter strategy. Default: None.
    pub jitter: JitterStrategy,

    /// HTTP statuses treated as credential/quota rejections.
    /// Default: `[400, 401, 403, 429]`.
    pub credential_statuses: Vec<u16>,

    /// Upper bound on one backend call. `None` leaves it to the HTTP client.
    pub call_timeout: Option<Duration>,

    /// Use the provider's `Retry-After` hint (capped at `max_delay`) instead
    /// of the computed delay when the next attempt reuses the same
    /// credential. Default: true.
    pub respect_retry_after: bool,
}

/// Jitter strategy to spread retries from concurrent requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitterStrategy {
    /// No jitter. Delay is exactly the calculated value.
    None,

    /// Full jitter: random value in `[0, calculated_delay]`.
    Full,

    /// Equal jitter: `calculated_delay/2 + random in [0, calculated_delay/2]`.
    Equal,
}

impl RetryPolicy {
    /// Constant delay between retries.
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            initial_delay: delay,
            multiplier: 1.0,
            max_delay: Duration::from_secs(60),
            jitter: JitterStrategy::None,
            credential_statuses: vec![400, 401, 403, 429],
            call_timeout: None,
            respect_retry_after: true,
        }
    }

    /// 3 attempts per counter, 1 second apart.
    pub fn standard() -> Self {
        Self::fixed(3, Duration::from_secs(1))
    }

    /// No delay between retries. Useful with scripted backends.
    pub fn immediate(max_retries: u32) -> Self {
        Self::fixed(max_retries, Duration::ZERO)
    }

    /// Grow the delay by `multiplier` per retry, capped at `max_delay`.
    pub fn with_exponential(mut self, multiplier: f64, max_delay: Duration) -> Self {
        self.multiplier = multiplier.max(1.0);
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_credential_statuses(mut self, statuses: Vec<u16>) -> Self {
        self.credential_statuses = statuses;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn with_respect_retry_after(mut self, respect: bool) -> Self {
        self.respect_retry_after = respect;
        self
    }

    /// Delay before retry N, honoring a `Retry-After` hint when enabled.
    pub fn delay_for_retry(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) if self.respect_retry_after => hint.min(self.max_delay),
            _ => self.delay_for_attempt(attempt),
        }
    }

    /// Calculate the delay before retry N (0-indexed).
    ///
    /// The base delay is `initial_delay * multiplier^attempt`, capped at
    /// `max_delay`. Jitter is then applied according to the configured strategy.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        let jittered = match self.jitter {
            JitterStrategy::None => capped,
            JitterStrategy::Full => fastrand::f64() * capped,
            JitterStrategy::Equal => capped / 2.0 + fastrand::f64() * (capped / 2.0),
        };

        Duration::from_secs_f64(jittered)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}
