//! Invocation executor
//!
//! Dispatches a named capability through a fixed pipeline:
//! resolve → validate → dry run → cache lookup → attempt loop (timeout, retry,
//! backoff) → cache store → history.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use toolgate_core::executor::{ExecutionOptions, Executor};
//! use toolgate_core::registry::CapabilityRegistry;
//!
//! # async fn run() {
//! let registry = Arc::new(CapabilityRegistry::new());
//! let executor = Executor::new(registry);
//!
//! let options = ExecutionOptions::new()
//!     .with_timeout(Duration::from_secs(5))
//!     .with_retries(3)
//!     .with_retry_delay(Duration::from_millis(100))
//!     .with_cache(true);
//!
//! let result = executor
//!     .execute("grep", serde_json::json!({"pattern": "fn main"}), options)
//!     .await;
//! # }
//! ```

mod cache;
mod events;
mod history;
mod options;
mod runtime;

pub use cache::{CacheEntry, ResultCache, cache_key};
pub use events::{
    InvocationEvent, InvocationObserver, LoggingObserver, ObserverRegistry, SubscriptionId,
};
pub use history::{HistoryRecord, InvocationHistory};
pub use options::{ExecutionOptions, RetryCallback, RetryCondition, RetryPolicy, RetryPredicate};
pub use runtime::{Executor, InvocationRequest};
