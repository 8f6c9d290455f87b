//! Per-call execution options and retry policy
//!
//! Every resilience feature is opt-in. `ExecutionOptions::default()` means a
//! single attempt, no cache, and the executor's default timeout.

use crate::capability::{ErrorCode, InvocationError};
use crate::config::ExecutorConfig;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Custom retry predicate
pub type RetryPredicate = Arc<dyn Fn(&InvocationError) -> bool + Send + Sync>;

/// Callback fired before each backoff wait: `(attempt, error, delay)`
///
/// `attempt` is the 1-based number of the attempt that just failed.
pub type RetryCallback = Arc<dyn Fn(u32, &InvocationError, Duration) + Send + Sync>;

/// Which failures are eligible for retry
///
/// Fatal codes (`ToolNotFound`, `ValidationFailed`, `Cancelled`) are never
/// retried regardless of the condition.
#[derive(Clone, Default)]
pub enum RetryCondition {
    /// Any retryable failure
    #[default]
    Any,

    /// Only timeout-classified failures
    Timeout,

    /// Only failures raised by the capability's own logic
    Execution,

    /// Only the listed codes
    Codes(Vec<ErrorCode>),

    /// Custom predicate
    Predicate(RetryPredicate),
}

impl RetryCondition {
    /// Build a condition from a predicate
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&InvocationError) -> bool + Send + Sync + 'static,
    {
        RetryCondition::Predicate(Arc::new(f))
    }

    /// Check whether a failure should be retried
    pub fn allows(&self, error: &InvocationError) -> bool {
        if error.code.is_fatal() {
            return false;
        }
        match self {
            RetryCondition::Any => true,
            RetryCondition::Timeout => error.code == ErrorCode::Timeout,
            RetryCondition::Execution => error.code == ErrorCode::ExecutionError,
            RetryCondition::Codes(codes) => codes.contains(&error.code),
            RetryCondition::Predicate(predicate) => predicate(error),
        }
    }
}

impl std::fmt::Debug for RetryCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryCondition::Any => f.write_str("Any"),
            RetryCondition::Timeout => f.write_str("Timeout"),
            RetryCondition::Execution => f.write_str("Execution"),
            RetryCondition::Codes(codes) => f.debug_tuple("Codes").field(codes).finish(),
            RetryCondition::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl FromStr for RetryCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "any" | "all" => Ok(RetryCondition::Any),
            "timeout" => Ok(RetryCondition::Timeout),
            "execution" | "error" => Ok(RetryCondition::Execution),
            other => Err(format!("Unknown retry condition: {}", other)),
        }
    }
}

/// Resolved retry schedule for one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts after the first
    pub retries: u32,
    /// Delay before the first retry
    pub retry_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Hard cap on any computed delay
    pub max_retry_delay: Option<Duration>,
}

impl RetryPolicy {
    /// Delay before retry `retry_index` (0-indexed)
    ///
    /// `retry_delay * backoff_multiplier^retry_index`, capped at `max_retry_delay`.
    pub fn delay_for_retry(&self, retry_index: u32) -> Duration {
        let exponent = i32::try_from(retry_index).unwrap_or(i32::MAX);
        let base_delay =
            self.retry_delay.as_nanos() as f64 * self.backoff_multiplier.powi(exponent);

        let clamped_delay = match self.max_retry_delay {
            Some(max) => base_delay.min(max.as_nanos() as f64),
            None => base_delay,
        };

        // Float-to-int casts saturate: NaN and negatives become zero, infinity u64::MAX
        Duration::from_nanos(clamped_delay as u64)
    }

    /// Full delay schedule for every retry this policy allows
    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.retries).map(|i| self.delay_for_retry(i)).collect()
    }
}

/// Options for a single invocation
#[derive(Clone, Default)]
pub struct ExecutionOptions {
    /// Per-attempt timeout (executor default if unset)
    pub timeout: Option<Duration>,

    /// Additional attempts after the first
    pub retries: u32,

    /// Base delay before the first retry (executor default if unset)
    pub retry_delay: Option<Duration>,

    /// Multiplicative growth per retry (executor default if unset)
    pub backoff_multiplier: Option<f64>,

    /// Hard cap on the computed delay
    pub max_retry_delay: Option<Duration>,

    /// Which failures are retried
    pub retry_on: RetryCondition,

    /// Fired before each backoff wait
    pub on_retry: Option<RetryCallback>,

    /// Enable cache lookup and store
    pub cache: bool,

    /// Lifetime of a stored cache entry (executor default if unset)
    pub cache_ttl: Option<Duration>,

    /// Validate only, never execute
    pub dry_run: bool,

    /// Checked before and raced against every attempt and backoff wait
    pub cancellation: Option<CancellationToken>,
}

impl std::fmt::Debug for ExecutionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionOptions")
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .field("retry_delay", &self.retry_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("max_retry_delay", &self.max_retry_delay)
            .field("retry_on", &self.retry_on)
            .field("on_retry", &self.on_retry.is_some())
            .field("cache", &self.cache)
            .field("cache_ttl", &self.cache_ttl)
            .field("dry_run", &self.dry_run)
            .field("cancellation", &self.cancellation.is_some())
            .finish()
    }
}

impl ExecutionOptions {
    /// Create default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set number of retries
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set base retry delay
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Set backoff multiplier
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = Some(multiplier);
        self
    }

    /// Set delay cap
    pub fn with_max_retry_delay(mut self, delay: Duration) -> Self {
        self.max_retry_delay = Some(delay);
        self
    }

    /// Restrict which failures are retried
    pub fn with_retry_on(mut self, condition: RetryCondition) -> Self {
        self.retry_on = condition;
        self
    }

    /// Register a retry callback
    pub fn on_retry<F>(mut self, callback: F) -> Self
    where
        F: Fn(u32, &InvocationError, Duration) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(callback));
        self
    }

    /// Enable or disable caching
    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Set cache TTL (also enables caching)
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = true;
        self.cache_ttl = Some(ttl);
        self
    }

    /// Validate only
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Thread a cancellation token through every attempt
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Resolve the retry schedule against executor defaults
    pub fn retry_policy(&self, config: &ExecutorConfig) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            retry_delay: self.retry_delay.unwrap_or(config.default_retry_delay),
            backoff_multiplier: self
                .backoff_multiplier
                .unwrap_or(config.default_backoff_multiplier),
            max_retry_delay: self.max_retry_delay.or(config.default_max_retry_delay),
        }
    }

    /// Resolve the per-attempt timeout against executor defaults
    pub fn effective_timeout(&self, config: &ExecutorConfig) -> Duration {
        self.timeout.unwrap_or(config.default_timeout)
    }

    /// Resolve the cache TTL against executor defaults
    pub fn effective_cache_ttl(&self, config: &ExecutorConfig) -> Duration {
        self.cache_ttl.unwrap_or(config.default_cache_ttl)
    }
}
