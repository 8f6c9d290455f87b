//! Invocation executor
//!
//! The executor wraps every capability call with:
//! - Name resolution and required-parameter validation
//! - Dry-run short circuit
//! - Result caching
//! - Timeout racing, retry and exponential backoff
//! - History recording and lifecycle events

use super::cache::{ResultCache, cache_key};
use super::events::{self, InvocationEvent, InvocationObserver, ObserverRegistry, SubscriptionId};
use super::history::{HistoryRecord, InvocationHistory};
use super::options::ExecutionOptions;
use crate::capability::{
    BoxedCapability, InvocationError, InvocationReport, InvocationResult, millis,
};
use crate::config::ExecutorConfig;
use crate::registry::CapabilityRegistry;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// One entry of a batch
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    /// Capability name
    pub capability: String,

    /// Parameters
    pub params: Value,

    /// Per-call options
    pub options: ExecutionOptions,
}

impl InvocationRequest {
    /// Create a request with default options
    pub fn new(capability: impl Into<String>, params: Value) -> Self {
        Self {
            capability: capability.into(),
            params,
            options: ExecutionOptions::default(),
        }
    }

    /// Set options
    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }
}

/// Outcome of the attempt loop
struct Attempts {
    result: InvocationResult,
    count: u32,
}

/// Executes capabilities from a registry with resilience policies applied
pub struct Executor {
    registry: Arc<CapabilityRegistry>,
    config: ExecutorConfig,
    cache: ResultCache,
    history: InvocationHistory,
    observers: ObserverRegistry,
}

impl Executor {
    /// Create an executor with default configuration
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self::with_config(registry, ExecutorConfig::default())
    }

    /// Create an executor with custom configuration
    pub fn with_config(registry: Arc<CapabilityRegistry>, config: ExecutorConfig) -> Self {
        let history = InvocationHistory::with_capacity(config.history_capacity);
        Self {
            registry,
            config,
            cache: ResultCache::new(),
            history,
            observers: ObserverRegistry::new(),
        }
    }

    /// Get the registry
    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Get the configuration
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Get the result cache
    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Execute a capability by name
    ///
    /// Never fails: every lookup, validation, timeout and execution failure is
    /// returned as a failure envelope.
    pub async fn execute(
        &self,
        name: &str,
        params: Value,
        options: ExecutionOptions,
    ) -> InvocationResult {
        let started_at = Instant::now();
        self.observers.notify(&InvocationEvent::Started {
            capability: name.to_string(),
            dry_run: options.dry_run,
        });

        // Step 1: Resolve
        let Some(capability) = self.registry.get(name) else {
            tracing::debug!(capability = %name, "Capability not found");
            let result = InvocationResult::from_error(InvocationError::not_found(name));
            return self
                .finish(name, params, result, &options, started_at, 0)
                .await;
        };

        // Step 2: Validate
        let definition = capability.definition();
        let missing = definition.missing_required(&params);
        if !missing.is_empty() {
            tracing::debug!(capability = %name, missing = ?missing, "Parameter validation failed");
            let result = InvocationResult::from_error(InvocationError::validation(missing));
            return self
                .finish(name, params, result, &options, started_at, 0)
                .await;
        }

        let mismatched = definition.type_mismatches(&params);
        if !mismatched.is_empty() {
            tracing::debug!(
                capability = %name,
                parameters = ?mismatched,
                "Parameter types differ from declared types"
            );
        }

        // Step 3: Dry run
        if options.dry_run {
            let data = json!({
                "dry_run": true,
                "capability": name,
                "valid": true,
                "params": params.clone(),
            });
            let result = InvocationResult::success(data, Duration::ZERO);
            return self
                .finish(name, params, result, &options, started_at, 0)
                .await;
        }

        // Step 4: Cache lookup
        let key = if options.cache {
            match cache_key(name, &params) {
                Ok(key) => Some(key),
                Err(e) => {
                    tracing::warn!(capability = %name, error = %e, "Failed to compute cache key, caching disabled for call");
                    None
                }
            }
        } else {
            None
        };

        if let Some(key) = &key {
            if let Some(hit) = self.cache.get(key).await {
                tracing::debug!(capability = %name, "Cache hit");
                self.observers.notify(&InvocationEvent::CacheHit {
                    capability: name.to_string(),
                });
                let result = hit.with_report(InvocationReport {
                    total_ms: millis(started_at.elapsed()),
                    attempts: 0,
                    cached: true,
                    dry_run: false,
                });
                if self.config.record_cache_hits {
                    self.history
                        .append(HistoryRecord::new(name, params, result.clone()))
                        .await;
                }
                self.notify_completed(name, &result, started_at);
                return result;
            }
        }

        // Step 5: Attempt loop
        let attempts = self.run_attempts(name, &capability, &params, &options).await;

        // Step 6: Cache store
        if let Some(key) = key {
            if attempts.result.is_success() {
                let ttl = options.effective_cache_ttl(&self.config);
                self.cache
                    .insert(key, name, attempts.result.clone(), ttl)
                    .await;
            }
        }

        // Step 7: History
        self.finish(
            name,
            params,
            attempts.result,
            &options,
            started_at,
            attempts.count,
        )
        .await
    }

    /// Execute and return just the value on success
    pub async fn execute_simple(&self, name: &str, params: Value) -> Result<Value, InvocationError> {
        self.execute(name, params, ExecutionOptions::default())
            .await
            .into_result()
    }

    /// Execute requests one at a time, stopping after the first failure
    ///
    /// The returned list includes the failing result; later requests are never
    /// dispatched.
    pub async fn execute_sequence(&self, requests: Vec<InvocationRequest>) -> Vec<InvocationResult> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            let result = self
                .execute(&request.capability, request.params, request.options)
                .await;
            let failed = result.is_failure();
            results.push(result);
            if failed {
                break;
            }
        }
        results
    }

    /// Execute requests concurrently, returning results in input order
    pub async fn execute_parallel(&self, requests: Vec<InvocationRequest>) -> Vec<InvocationResult> {
        let invocations = requests.into_iter().map(|request| async move {
            self.execute(&request.capability, request.params, request.options)
                .await
        });
        futures::future::join_all(invocations).await
    }

    /// Get history records, most recent last
    pub async fn get_history(&self, limit: Option<usize>) -> Vec<HistoryRecord> {
        self.history.recent(limit).await
    }

    /// Remove all history records
    pub async fn clear_history(&self) {
        self.history.clear().await;
    }

    /// Drop every cached result
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// Drop cached results for one capability
    pub async fn invalidate_cache(&self, name: &str) -> usize {
        self.cache.invalidate(name).await
    }

    /// Subscribe to invocation events
    pub fn subscribe(&self, observer: Arc<dyn InvocationObserver>) -> SubscriptionId {
        self.observers.subscribe(observer)
    }

    /// Subscribe a closure to invocation events
    pub fn subscribe_fn<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&InvocationEvent) + Send + Sync + 'static,
    {
        self.observers.subscribe_fn(f)
    }

    /// Remove an observer
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    async fn run_attempts(
        &self,
        name: &str,
        capability: &BoxedCapability,
        params: &Value,
        options: &ExecutionOptions,
    ) -> Attempts {
        let policy = options.retry_policy(&self.config);
        let timeout = options.effective_timeout(&self.config);
        let cancellation = options.cancellation.as_ref();
        let mut count: u32 = 0;

        loop {
            if cancellation.is_some_and(CancellationToken::is_cancelled) {
                let result = InvocationResult::from_error(InvocationError::cancelled());
                return Attempts { result, count };
            }

            count += 1;
            let result = attempt(capability, params.clone(), timeout, cancellation).await;

            let Some(error) = result.error() else {
                return Attempts { result, count };
            };

            let retry_index = count - 1;
            if retry_index >= policy.retries || !options.retry_on.allows(error) {
                if count > 1 {
                    tracing::warn!(
                        capability = %name,
                        attempts = count,
                        error = %error,
                        "Giving up after retries"
                    );
                }
                return Attempts { result, count };
            }

            let delay = policy.delay_for_retry(retry_index);
            tracing::warn!(
                capability = %name,
                attempt = count,
                delay_ms = millis(delay),
                error = %error,
                "Attempt failed, retrying"
            );

            if let Some(on_retry) = &options.on_retry {
                events::isolate("on_retry", || on_retry(count, error, delay));
            }
            self.observers.notify(&InvocationEvent::Retrying {
                capability: name.to_string(),
                attempt: count,
                error: error.clone(),
                delay,
            });

            match cancellation {
                Some(token) => {
                    tokio::select! {
                        _ = token.cancelled() => {
                            let result = InvocationResult::from_error(InvocationError::cancelled());
                            return Attempts { result, count };
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                None => tokio::time::sleep(delay).await,
            }
        }
    }

    async fn finish(
        &self,
        name: &str,
        params: Value,
        result: InvocationResult,
        options: &ExecutionOptions,
        started_at: Instant,
        attempts: u32,
    ) -> InvocationResult {
        let result = result.with_report(InvocationReport {
            total_ms: millis(started_at.elapsed()),
            attempts,
            cached: false,
            dry_run: options.dry_run,
        });

        self.history
            .append(HistoryRecord::new(name, params, result.clone()))
            .await;
        self.notify_completed(name, &result, started_at);
        result
    }

    fn notify_completed(&self, name: &str, result: &InvocationResult, started_at: Instant) {
        self.observers.notify(&InvocationEvent::Completed {
            capability: name.to_string(),
            success: result.is_success(),
            code: result.code(),
            attempts: result.report.as_ref().map_or(0, |r| r.attempts),
            total: started_at.elapsed(),
        });
    }
}

/// Run one attempt in its own task, racing it against the timeout
///
/// When the timer or the cancellation token wins, the task handle is dropped:
/// the capability keeps running detached and its result is discarded.
async fn attempt(
    capability: &BoxedCapability,
    params: Value,
    timeout: Duration,
    cancellation: Option<&CancellationToken>,
) -> InvocationResult {
    let started_at = Instant::now();
    let task_capability = Arc::clone(capability);
    let handle = tokio::spawn(async move { task_capability.execute(params).await });

    let raced = async {
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(error))) => InvocationResult::failure(error, started_at.elapsed()),
            Ok(Err(join_error)) => InvocationResult::failure(
                InvocationError::execution(format!("Capability task failed: {}", join_error)),
                started_at.elapsed(),
            ),
            Err(_) => InvocationResult::failure(InvocationError::timeout(timeout), timeout),
        }
    };

    match cancellation {
        Some(token) => {
            tokio::select! {
                _ = token.cancelled() => InvocationResult::failure(
                    InvocationError::cancelled(),
                    started_at.elapsed(),
                ),
                result = raced => result,
            }
        }
        None => raced.await,
    }
}
