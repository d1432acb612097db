/// Resilience primitives shared by every bazar network client.
///
/// - **Retry policy**: bounded attempt counter with per-class backoff (rate limited vs. not yet available)
/// - **Clock**: injectable time source so TTL expiry can be driven from tests
/// - **TTL cache**: concurrent keyed cache with an owned time-to-live
///
/// # Example
///
/// ```rust,ignore
/// use bp_resilience::{retry_async, RetryConfig};
///
/// let config = RetryConfig::default();
/// let value = retry_async(&config, "fetch_results", |_attempt| async { fetch().await }).await?;
/// ```
pub mod cache;
pub mod clock;
pub mod retry;

pub use cache::TtlCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use retry::{retry_async, RetryClass, RetryConfig, RetryDecision, RetryState, Retryable};
