//! Invocation lifecycle events and observers
//!
//! Observers are notified synchronously as an invocation progresses. A failing
//! or panicking observer is logged and skipped; it never changes the result of
//! the invocation that triggered it.
//!
//! # Example
//!
//! ```rust,no_run
//! use toolgate_core::executor::{InvocationEvent, ObserverRegistry};
//!
//! let observers = ObserverRegistry::new();
//! let id = observers.subscribe_fn(|event: &InvocationEvent| {
//!     println!("{} -> {:?}", event.capability(), event);
//! });
//! observers.unsubscribe(id);
//! ```

use crate::capability::{ErrorCode, InvocationError};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use uuid::Uuid;

/// Event emitted during an invocation
#[derive(Debug, Clone)]
pub enum InvocationEvent {
    /// Dispatch began
    Started {
        capability: String,
        dry_run: bool,
    },

    /// Result served from the cache
    CacheHit { capability: String },

    /// An attempt failed and another will follow after `delay`
    Retrying {
        capability: String,
        attempt: u32,
        error: InvocationError,
        delay: Duration,
    },

    /// Dispatch finished
    Completed {
        capability: String,
        success: bool,
        code: Option<ErrorCode>,
        attempts: u32,
        total: Duration,
    },
}

impl InvocationEvent {
    /// Name of the capability the event belongs to
    pub fn capability(&self) -> &str {
        match self {
            InvocationEvent::Started { capability, .. }
            | InvocationEvent::CacheHit { capability }
            | InvocationEvent::Retrying { capability, .. }
            | InvocationEvent::Completed { capability, .. } => capability,
        }
    }
}

/// Trait for invocation observers
pub trait InvocationObserver: Send + Sync {
    /// Handle an event
    fn on_event(&self, event: &InvocationEvent) -> anyhow::Result<()>;
}

struct FnObserver<F>(F);

impl<F> InvocationObserver for FnObserver<F>
where
    F: Fn(&InvocationEvent) + Send + Sync,
{
    fn on_event(&self, event: &InvocationEvent) -> anyhow::Result<()> {
        (self.0)(event);
        Ok(())
    }
}

/// Observer that writes every event to the tracing log
pub struct LoggingObserver;

impl InvocationObserver for LoggingObserver {
    fn on_event(&self, event: &InvocationEvent) -> anyhow::Result<()> {
        match event {
            InvocationEvent::Started {
                capability,
                dry_run,
            } => tracing::debug!(capability = %capability, dry_run, "Invocation started"),
            InvocationEvent::CacheHit { capability } => {
                tracing::debug!(capability = %capability, "Invocation served from cache")
            }
            InvocationEvent::Retrying {
                capability,
                attempt,
                error,
                delay,
            } => tracing::info!(
                capability = %capability,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Invocation retrying"
            ),
            InvocationEvent::Completed {
                capability,
                success,
                code,
                attempts,
                total,
            } => tracing::info!(
                capability = %capability,
                success,
                code = ?code,
                attempts,
                total_ms = total.as_millis() as u64,
                "Invocation completed"
            ),
        }
        Ok(())
    }
}

/// Handle returned by [`ObserverRegistry::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Registry of invocation observers, notified in subscription order
pub struct ObserverRegistry {
    observers: RwLock<Vec<(SubscriptionId, Arc<dyn InvocationObserver>)>>,
}

impl ObserverRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Subscribe an observer
    pub fn subscribe(&self, observer: Arc<dyn InvocationObserver>) -> SubscriptionId {
        let id = SubscriptionId(Uuid::new_v4());
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, observer));
        id
    }

    /// Subscribe a plain closure
    pub fn subscribe_fn<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&InvocationEvent) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(FnObserver(f)))
    }

    /// Remove an observer, returning whether it was subscribed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Number of subscribed observers
    pub fn len(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check whether no observers are subscribed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver an event to every observer
    pub fn notify(&self, event: &InvocationEvent) {
        // Snapshot so observers may subscribe/unsubscribe from inside a callback
        let observers: Vec<_> = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, observer)| (*id, Arc::clone(observer)))
            .collect();

        for (id, observer) in observers {
            match catch_unwind(AssertUnwindSafe(|| observer.on_event(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(
                    subscription = %id,
                    capability = %event.capability(),
                    error = %e,
                    "Invocation observer failed"
                ),
                Err(_) => tracing::warn!(
                    subscription = %id,
                    capability = %event.capability(),
                    "Invocation observer panicked"
                ),
            }
        }
    }
}

impl Default for ObserverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a user callback, logging instead of propagating a panic
pub(crate) fn isolate<F: FnOnce()>(label: &str, f: F) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::warn!(callback = label, "Callback panicked, continuing");
    }
}
