//! Uniform invocation result envelope and error taxonomy
//!
//! Every invocation, whether it failed during lookup, validation, timeout,
//! retry exhaustion or inside the capability itself, returns the same
//! [`InvocationResult`] shape:
//! - a success outcome carrying capability-specific `data`
//! - or a failure outcome carrying an [`InvocationError`] with a stable code
//!
//! `duration_ms` is the capability's own self-timing. The executor attaches an
//! [`InvocationReport`] with its total wall time and attempt count.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Current schema version for result envelopes
pub const RESULT_SCHEMA_VERSION: u32 = 1;

/// Convert a duration to whole milliseconds, saturating on overflow
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Result envelope returned from every invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationResult {
    /// Schema version for forward compatibility
    pub schema_version: u32,

    /// Whether the invocation succeeded; always agrees with `outcome`
    pub success: bool,

    /// Success or failure payload
    pub outcome: Outcome,

    /// Time the capability spent on substantive work
    pub duration_ms: u64,

    /// Executor bookkeeping (absent on envelopes built by capabilities)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<InvocationReport>,
}

impl InvocationResult {
    /// Build a success envelope
    pub fn success(data: Value, elapsed: Duration) -> Self {
        Self {
            schema_version: RESULT_SCHEMA_VERSION,
            success: true,
            outcome: Outcome::Success { data },
            duration_ms: millis(elapsed),
            report: None,
        }
    }

    /// Build a failure envelope
    pub fn failure(error: InvocationError, elapsed: Duration) -> Self {
        Self {
            schema_version: RESULT_SCHEMA_VERSION,
            success: false,
            outcome: Outcome::Failure { error },
            duration_ms: millis(elapsed),
            report: None,
        }
    }

    /// Build a failure envelope for an error that happened before any work
    pub fn from_error(error: InvocationError) -> Self {
        Self::failure(error, Duration::ZERO)
    }

    /// Attach executor bookkeeping
    pub fn with_report(mut self, report: InvocationReport) -> Self {
        self.report = Some(report);
        self
    }

    /// Check if this result represents success
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success { .. })
    }

    /// Check if this result represents failure
    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// Get the payload if successful
    pub fn data(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Success { data } => Some(data),
            Outcome::Failure { .. } => None,
        }
    }

    /// Get the error if failed
    pub fn error(&self) -> Option<&InvocationError> {
        match &self.outcome {
            Outcome::Success { .. } => None,
            Outcome::Failure { error } => Some(error),
        }
    }

    /// Get the error code if failed
    pub fn code(&self) -> Option<ErrorCode> {
        self.error().map(|e| e.code)
    }

    /// Convert into a plain `Result`
    pub fn into_result(self) -> Result<Value, InvocationError> {
        match self.outcome {
            Outcome::Success { data } => Ok(data),
            Outcome::Failure { error } => Err(error),
        }
    }
}

/// Invocation outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Capability completed successfully
    Success {
        /// Capability-specific payload
        data: Value,
    },

    /// Invocation failed
    Failure {
        /// Structured error information
        error: InvocationError,
    },
}

/// Bookkeeping the executor attaches to every result it returns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationReport {
    /// Wall time including validation, cache lookup and backoff delays
    pub total_ms: u64,

    /// Number of attempts dispatched to the capability
    pub attempts: u32,

    /// Served from the result cache
    pub cached: bool,

    /// Produced by a validation-only dry run
    pub dry_run: bool,
}

/// Error code taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Unknown capability name (fatal)
    ToolNotFound,

    /// Missing required parameter (fatal)
    ValidationFailed,

    /// The capability's own logic failed (retryable by default)
    ExecutionError,

    /// Attempt exceeded its time budget (retryable by default)
    Timeout,

    /// Invocation was cancelled by the caller (fatal)
    Cancelled,
}

impl ErrorCode {
    /// Stable string form of the code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ToolNotFound => "TOOL_NOT_FOUND",
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::ExecutionError => "EXECUTION_ERROR",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Cancelled => "CANCELLED",
        }
    }

    /// Whether the executor may ever retry this code
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::ExecutionError | ErrorCode::Timeout)
    }

    /// Whether this code always ends an invocation immediately
    pub fn is_fatal(&self) -> bool {
        !self.is_retryable()
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured invocation error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationError {
    /// Error code (determines retryability)
    pub code: ErrorCode,

    /// Human-readable message
    pub message: String,

    /// Additional context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl InvocationError {
    /// Create a new error
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Add structured details
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Unknown capability
    pub fn not_found(name: &str) -> Self {
        Self::new(
            ErrorCode::ToolNotFound,
            format!("Capability '{}' is not registered", name),
        )
    }

    /// Missing required parameters
    pub fn validation(missing: Vec<String>) -> Self {
        Self {
            code: ErrorCode::ValidationFailed,
            message: format!("Missing required parameters: {}", missing.join(", ")),
            details: Some(serde_json::json!({ "missing": missing })),
        }
    }

    /// Capability logic failure
    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExecutionError, message)
    }

    /// Attempt exceeded its timeout
    pub fn timeout(duration: Duration) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("Execution timed out after {}ms", millis(duration)),
        )
    }

    /// Invocation cancelled by the caller
    pub fn cancelled() -> Self {
        Self::new(ErrorCode::Cancelled, "Invocation cancelled")
    }
}

impl std::fmt::Display for InvocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for InvocationError {}
