//! Capability trait and handler adapters
//!
//! Capabilities are the only thing the executor knows how to call. Each one
//! declares a [`CapabilityDefinition`] and an async `execute` method that
//! returns a uniform [`InvocationResult`].

use super::definition::CapabilityDefinition;
use super::result::{InvocationError, InvocationResult};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;

/// Core capability trait
///
/// The executor resolves, validates and times every call before `execute`
/// runs. Implementations should measure their own `duration_ms` from the
/// moment substantive work begins.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Get the capability definition
    fn definition(&self) -> &CapabilityDefinition;

    /// Get capability name (convenience method)
    fn name(&self) -> &str {
        &self.definition().name
    }

    /// Get capability description (convenience method)
    fn description(&self) -> &str {
        &self.definition().description
    }

    /// Liveness check, e.g. whether an underlying binary or service is reachable
    async fn is_available(&self) -> bool {
        true
    }

    /// Execute the capability
    ///
    /// Returning `Err` is treated the same as returning a failure envelope
    /// carrying that error; use [`InvocationError::execution`] for ordinary
    /// failures so they stay retryable.
    async fn execute(&self, params: Value) -> Result<InvocationResult, InvocationError>;
}

/// Type alias for shared capabilities
pub type BoxedCapability = Arc<dyn Capability>;

/// Handler trait for simpler capability implementations
///
/// Use this when you don't need control over the result envelope.
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    /// Execute and return a plain value
    async fn handle(&self, params: Value) -> Result<Value, InvocationError>;
}

/// Adapter turning an async closure into a [`CapabilityHandler`]
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> CapabilityHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, InvocationError>> + Send + 'static,
{
    async fn handle(&self, params: Value) -> Result<Value, InvocationError> {
        (self.0)(params).await
    }
}

/// Wrapper to convert a [`CapabilityHandler`] into a full [`Capability`]
pub struct HandlerCapability<H: CapabilityHandler> {
    definition: CapabilityDefinition,
    handler: H,
}

impl<H: CapabilityHandler> HandlerCapability<H> {
    /// Create a new handler capability
    pub fn new(definition: CapabilityDefinition, handler: H) -> Self {
        Self {
            definition,
            handler,
        }
    }
}

impl<F, Fut> HandlerCapability<FnHandler<F>>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, InvocationError>> + Send + 'static,
{
    /// Create a capability from an async closure
    pub fn from_fn(definition: CapabilityDefinition, f: F) -> Self {
        Self::new(definition, FnHandler(f))
    }
}

#[async_trait]
impl<H: CapabilityHandler + 'static> Capability for HandlerCapability<H> {
    fn definition(&self) -> &CapabilityDefinition {
        &self.definition
    }

    async fn execute(&self, params: Value) -> Result<InvocationResult, InvocationError> {
        let started_at = Instant::now();
        let result = self.handler.handle(params).await;
        let elapsed = started_at.elapsed();

        match result {
            Ok(data) => Ok(InvocationResult::success(data, elapsed)),
            Err(error) => Ok(InvocationResult::failure(error, elapsed)),
        }
    }
}
