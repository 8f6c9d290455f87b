//! Capability contract
//!
//! Everything a tool must provide to be invoked through the executor:
//! - A static [`CapabilityDefinition`] (identity, category, parameters, tags)
//! - An async `execute` returning a uniform [`InvocationResult`]
//! - An optional liveness check
//!
//! # Example
//!
//! ```rust,no_run
//! use toolgate_core::capability::{
//!     CapabilityDefinition, HandlerCapability, ParameterSpec, ParameterType,
//! };
//!
//! let echo = HandlerCapability::from_fn(
//!     CapabilityDefinition::new("echo", "Echoes its input").with_parameter(
//!         ParameterSpec::required("message", ParameterType::String, "Text to echo"),
//!     ),
//!     |params: serde_json::Value| async move { Ok(params["message"].clone()) },
//! );
//! ```

mod contract;
mod definition;
mod result;

pub use contract::{BoxedCapability, Capability, CapabilityHandler, FnHandler, HandlerCapability};
pub use definition::{CapabilityCategory, CapabilityDefinition, ParameterSpec, ParameterType};
pub use result::{
    ErrorCode, InvocationError, InvocationReport, InvocationResult, Outcome,
    RESULT_SCHEMA_VERSION,
};

pub(crate) use result::millis;
