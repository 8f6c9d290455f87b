//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use toolgate_core::prelude::*;

/// Capability that counts calls, optionally sleeps, and fails its first N calls
pub struct CountingCapability {
    definition: CapabilityDefinition,
    calls: Arc<AtomicU32>,
    fail_first: u32,
    delay: Duration,
}

impl CountingCapability {
    pub fn new(name: &str) -> Self {
        Self {
            definition: CapabilityDefinition::new(name, format!("Counting capability {}", name)),
            calls: Arc::new(AtomicU32::new(0)),
            fail_first: 0,
            delay: Duration::ZERO,
        }
    }

    /// Fail the first `n` calls with an execution error
    pub fn failing_first(mut self, n: u32) -> Self {
        self.fail_first = n;
        self
    }

    /// Fail every call
    pub fn always_failing(self) -> Self {
        self.failing_first(u32::MAX)
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requiring(mut self, parameter: &str) -> Self {
        self.definition = self.definition.with_parameter(ParameterSpec::required(
            parameter,
            ParameterType::String,
            "Required input",
        ));
        self
    }

    /// Shared call counter, readable after the capability is registered
    pub fn calls(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Capability for CountingCapability {
    fn definition(&self) -> &CapabilityDefinition {
        &self.definition
    }

    async fn execute(&self, params: Value) -> std::result::Result<InvocationResult, InvocationError> {
        let started_at = Instant::now();
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if call <= self.fail_first {
            return Err(InvocationError::execution(format!("call {} failed", call)));
        }

        Ok(InvocationResult::success(
            json!({"call": call, "params": params}),
            started_at.elapsed(),
        ))
    }
}

/// Register capabilities and build an executor with the given config
pub fn executor_with(
    capabilities: Vec<BoxedCapability>,
    config: ExecutorConfig,
) -> Arc<Executor> {
    let registry = CapabilityRegistry::new();
    registry
        .register_all(capabilities)
        .expect("fixture names are unique");
    Arc::new(Executor::with_config(Arc::new(registry), config))
}

/// Build an executor with default config
pub fn executor(capabilities: Vec<BoxedCapability>) -> Arc<Executor> {
    executor_with(capabilities, ExecutorConfig::default())
}

/// Register a single counting capability, returning the executor and its counter
pub fn single(capability: CountingCapability) -> (Arc<Executor>, Arc<AtomicU32>) {
    let calls = capability.calls();
    (executor(vec![Arc::new(capability)]), calls)
}

pub fn count(calls: &AtomicU32) -> u32 {
    calls.load(Ordering::SeqCst)
}
