/// Bounded retry policy for calls against rate-limited upstreams.
///
/// Failures are sorted into three classes:
///
/// - **Rate limited**: the upstream asked us to slow down. The delay doubles on every attempt.
/// - **Pending**: the thing we are looking for does not exist yet. The delay grows by `pending_multiplier`.
/// - **Fatal**: retrying cannot help. The caller gives up immediately.
///
/// Delays are capped at `max_backoff` and never decrease from one attempt to the next.
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    RateLimited,
    Pending,
    Fatal,
}

/// Errors that know whether they are worth retrying.
pub trait Retryable {
    fn retry_class(&self) -> RetryClass;

    fn is_rate_limited(&self) -> bool {
        self.retry_class() == RetryClass::RateLimited
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total number of calls, the first one included.
    pub max_attempts: u32,
    /// First wait after a rate limited call.
    pub rate_limit_delay: Duration,
    /// First wait after a pending call.
    pub pending_delay: Duration,
    pub pending_multiplier: f64,
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_delay: Duration::from_secs(1),
            pending_delay: Duration::from_secs(1),
            pending_multiplier: 1.5,
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry(Duration),
    GiveUp,
}

#[derive(Debug)]
pub struct RetryState {
    config: RetryConfig,
    attempts: u32,
    last_delay: Duration,
    total_delay: Duration,
    start_time: Instant,
}

impl RetryState {
    pub fn new(config: RetryConfig) -> Self {
        Self { config, attempts: 0, last_delay: Duration::ZERO, total_delay: Duration::ZERO, start_time: Instant::now() }
    }

    /// Records a failed call of the given class and decides what happens next.
    pub fn next(&mut self, class: RetryClass) -> RetryDecision {
        self.attempts += 1;
        if self.attempts >= self.config.max_attempts {
            return RetryDecision::GiveUp;
        }

        let exponent = self.attempts.saturating_sub(1).min(16);
        let delay = match class {
            RetryClass::RateLimited => self.config.rate_limit_delay.saturating_mul(2_u32.saturating_pow(exponent)),
            RetryClass::Pending => {
                self.config.pending_delay.mul_f64(self.config.pending_multiplier.max(1.0).powi(exponent as i32))
            }
            RetryClass::Fatal => return RetryDecision::GiveUp,
        };
        let delay = delay.min(self.config.max_backoff).max(self.last_delay);

        self.last_delay = delay;
        self.total_delay += delay;
        RetryDecision::Retry(delay)
    }

    /// Number of failed calls recorded so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    pub fn total_delay(&self) -> Duration {
        self.total_delay
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Runs `call` until it succeeds, fails fatally, or the attempt budget is spent.
///
/// The closure receives the zero-based attempt index. On exhaustion the last error is returned.
pub async fn retry_async<T, E, F, Fut>(config: &RetryConfig, operation: &str, mut call: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let mut state = RetryState::new(config.clone());
    loop {
        match call(state.attempts()).await {
            Ok(value) => return Ok(value),
            Err(error) => match state.next(error.retry_class()) {
                RetryDecision::Retry(delay) => {
                    tracing::warn!(
                        operation,
                        attempt = state.attempts(),
                        max_attempts = state.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        "Retrying after error: {error}"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => return Err(error),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::cell::Cell;

    #[derive(Debug)]
    struct TestError(RetryClass);

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self.0)
        }
    }

    impl Retryable for TestError {
        fn retry_class(&self) -> RetryClass {
            self.0
        }
    }

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.rate_limit_delay, Duration::from_secs(1));
        assert_eq!(config.pending_multiplier, 1.5);
    }

    #[test]
    fn rate_limit_delay_doubles() {
        let mut state = RetryState::new(RetryConfig::default().with_max_attempts(5));
        assert_eq!(state.next(RetryClass::RateLimited), RetryDecision::Retry(Duration::from_secs(1)));
        assert_eq!(state.next(RetryClass::RateLimited), RetryDecision::Retry(Duration::from_secs(2)));
        assert_eq!(state.next(RetryClass::RateLimited), RetryDecision::Retry(Duration::from_secs(4)));
        assert_eq!(state.next(RetryClass::RateLimited), RetryDecision::Retry(Duration::from_secs(8)));
        assert_eq!(state.next(RetryClass::RateLimited), RetryDecision::GiveUp);
        assert_eq!(state.total_delay(), Duration::from_secs(15));
    }

    #[test]
    fn pending_delay_grows_by_multiplier() {
        let mut state = RetryState::new(RetryConfig::default().with_max_attempts(4));
        assert_eq!(state.next(RetryClass::Pending), RetryDecision::Retry(Duration::from_millis(1000)));
        assert_eq!(state.next(RetryClass::Pending), RetryDecision::Retry(Duration::from_millis(1500)));
        assert_eq!(state.next(RetryClass::Pending), RetryDecision::Retry(Duration::from_millis(2250)));
    }

    #[test]
    fn fatal_gives_up_immediately() {
        let mut state = RetryState::new(RetryConfig::default());
        assert_eq!(state.next(RetryClass::Fatal), RetryDecision::GiveUp);
        assert_eq!(state.attempts(), 1);
    }

    #[rstest]
    #[case::rate_limited_only(&[RetryClass::RateLimited; 8])]
    #[case::pending_only(&[RetryClass::Pending; 8])]
    #[case::mixed(&[
        RetryClass::RateLimited,
        RetryClass::Pending,
        RetryClass::RateLimited,
        RetryClass::Pending,
        RetryClass::Pending,
        RetryClass::RateLimited,
        RetryClass::Pending,
        RetryClass::Pending,
    ])]
    fn delays_are_bounded_and_non_decreasing(#[case] failures: &[RetryClass]) {
        let cap = 6;
        let mut state = RetryState::new(RetryConfig::default().with_max_attempts(cap));
        let mut delays = Vec::new();
        let mut calls = 0;
        for class in failures {
            calls += 1;
            match state.next(*class) {
                RetryDecision::Retry(delay) => delays.push(delay),
                RetryDecision::GiveUp => break,
            }
        }
        assert!(calls <= cap);
        assert_eq!(delays.len() as u32, cap - 1);
        assert!(delays.windows(2).all(|w| w[0] <= w[1]), "delays decreased: {delays:?}");
        assert!(delays.iter().all(|d| *d <= RetryConfig::default().max_backoff));
    }

    #[tokio::test(start_paused = true)]
    async fn two_rate_limits_then_success_waits_both_backoffs() {
        let calls = Cell::new(0);
        let start = Instant::now();

        let result = retry_async(&RetryConfig::default(), "test", |_| {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n <= 2 {
                    Err(TestError(RetryClass::RateLimited))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.get(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_last_error() {
        let calls = Cell::new(0);
        let result: Result<(), TestError> = retry_async(&RetryConfig::default(), "test", |_| {
            calls.set(calls.get() + 1);
            async { Err(TestError(RetryClass::RateLimited)) }
        })
        .await;

        assert!(result.unwrap_err().is_rate_limited());
        assert_eq!(calls.get(), 3);
    }
}
