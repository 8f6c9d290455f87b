//! # Toolgate - capability registry and invocation engine
//!
//! Toolgate sits between an agent and the tools it calls. Capabilities are
//! registered once by unique name; every call then goes through a single
//! executor that applies:
//! - Required-parameter validation before any work
//! - Per-attempt timeouts
//! - Retry with exponential backoff, optionally restricted by condition
//! - A TTL result cache keyed by name and canonical parameters
//! - Dry runs that validate without executing
//! - An auditable invocation history
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use toolgate_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let registry = Arc::new(CapabilityRegistry::new());
//!     registry.register(Arc::new(HandlerCapability::from_fn(
//!         CapabilityDefinition::new("echo", "Echoes its input").with_parameter(
//!             ParameterSpec::required("message", ParameterType::String, "Text to echo"),
//!         ),
//!         |params: serde_json::Value| async move { Ok(params["message"].clone()) },
//!     )))?;
//!
//!     let executor = Executor::new(registry);
//!     let result = executor
//!         .execute(
//!             "echo",
//!             serde_json::json!({"message": "hi"}),
//!             ExecutionOptions::default(),
//!         )
//!         .await;
//!     assert!(result.is_success());
//!     Ok(())
//! }
//! ```

pub mod capability;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod registry;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::capability::{
        BoxedCapability, Capability, CapabilityCategory, CapabilityDefinition,
        CapabilityHandler, ErrorCode, HandlerCapability, InvocationError, InvocationReport,
        InvocationResult, ParameterSpec, ParameterType,
    };
    pub use crate::config::{ExecutorConfig, LoggingConfig, ToolgateConfig};
    pub use crate::error::{Result, ToolgateError};
    pub use crate::executor::{
        ExecutionOptions, Executor, HistoryRecord, InvocationEvent, InvocationRequest,
        RetryCondition,
    };
    pub use crate::registry::{CapabilityRegistry, CapabilitySummary, RegistryError};
}
