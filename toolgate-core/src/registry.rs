//! Capability Registry for registration, lookup, and discovery
//!
//! The `CapabilityRegistry` provides:
//! - Registration with duplicate detection
//! - Exact lookup by name and listing by category
//! - Case-insensitive search over names, descriptions and tags
//! - Ranked discovery through a pluggable [`DiscoveryStrategy`]
//! - Liveness filtering via each capability's own availability check
//!
//! All methods take `&self`; a single coarse lock guards the maps so the
//! registry can be shared behind an `Arc` with the executor.
//!
//! # Example
//!
//! ```rust,ignore
//! use toolgate_core::registry::CapabilityRegistry;
//!
//! let registry = Arc::new(CapabilityRegistry::new());
//! registry.register(Arc::new(ShellCapability::new()))?;
//!
//! let shell = registry.get("shell").unwrap();
//! let git_tools = registry.get_by_category(CapabilityCategory::Git);
//! let matches = registry.search("grep");
//! ```

use crate::capability::{BoxedCapability, Capability, CapabilityCategory};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A capability with this name already exists
    #[error("Capability '{0}' is already registered")]
    DuplicateCapability(String),
}

/// Summary of a capability for listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitySummary {
    /// Capability name
    pub name: String,
    /// Capability description
    pub description: String,
    /// Category
    pub category: CapabilityCategory,
    /// Version
    pub version: String,
    /// Tags for search
    pub tags: Vec<String>,
    /// JSON Schema for input parameters
    pub input_schema: serde_json::Value,
}

impl From<&dyn Capability> for CapabilitySummary {
    fn from(capability: &dyn Capability) -> Self {
        let definition = capability.definition();
        Self {
            name: definition.name.clone(),
            description: definition.description.clone(),
            category: definition.category,
            version: definition.version.clone(),
            tags: definition.tags.clone(),
            input_schema: definition.json_schema(),
        }
    }
}

/// Discovery strategy for ranking capabilities against a query
pub trait DiscoveryStrategy: Send + Sync {
    /// Score how well a capability matches the query (0.0 to 1.0)
    fn score(&self, query: &str, capability: &dyn Capability) -> f32;
}

/// Simple substring-based discovery strategy
///
/// Matches query against name, description and tags, with a word-overlap
/// fallback for multi-word queries.
#[derive(Debug, Clone, Default)]
pub struct SubstringDiscovery;

impl DiscoveryStrategy for SubstringDiscovery {
    fn score(&self, query: &str, capability: &dyn Capability) -> f32 {
        let query_lower = query.to_lowercase();
        let definition = capability.definition();
        let name_lower = definition.name.to_lowercase();
        let desc_lower = definition.description.to_lowercase();

        if name_lower == query_lower {
            return 1.0;
        }

        let mut score = 0.0f32;

        if name_lower.contains(&query_lower) {
            score = score.max(0.9);
        }

        if desc_lower.contains(&query_lower) {
            score = score.max(0.7);
        }

        if definition
            .tags
            .iter()
            .any(|tag| tag.to_lowercase().contains(&query_lower))
        {
            score = score.max(0.6);
        }

        let query_words: Vec<&str> = query_lower.split_whitespace().collect();
        if !query_words.is_empty() {
            let word_matches = query_words
                .iter()
                .filter(|word| word.len() > 2 && desc_lower.contains(*word))
                .count();
            let word_score = (word_matches as f32 / query_words.len() as f32) * 0.6;
            score = score.max(word_score);
        }

        score
    }
}

/// Result of a ranked discovery
#[derive(Clone)]
pub struct DiscoveryResult {
    /// The matching capability
    pub capability: BoxedCapability,
    /// Relevance score (0.0 to 1.0)
    pub score: f32,
}

impl std::fmt::Debug for DiscoveryResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryResult")
            .field("capability", &self.capability.name())
            .field("score", &self.score)
            .finish()
    }
}

#[derive(Default)]
struct RegistryState {
    capabilities: HashMap<String, BoxedCapability>,
    order: Vec<String>,
    by_category: HashMap<CapabilityCategory, Vec<String>>,
}

impl RegistryState {
    fn ordered(&self) -> impl Iterator<Item = &BoxedCapability> {
        self.order
            .iter()
            .filter_map(|name| self.capabilities.get(name))
    }
}

/// In-memory catalog of capabilities
pub struct CapabilityRegistry {
    state: RwLock<RegistryState>,
    discovery_strategy: Box<dyn DiscoveryStrategy>,
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("CapabilityRegistry")
            .field("count", &state.capabilities.len())
            .field("capabilities", &state.order)
            .finish()
    }
}

impl CapabilityRegistry {
    /// Create a new empty registry with the default discovery strategy
    pub fn new() -> Self {
        Self::with_discovery(Box::new(SubstringDiscovery))
    }

    /// Create a registry with a custom discovery strategy
    pub fn with_discovery(strategy: Box<dyn DiscoveryStrategy>) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            discovery_strategy: strategy,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a capability
    ///
    /// Returns an error if a capability with the same name is already registered.
    pub fn register(&self, capability: BoxedCapability) -> Result<(), RegistryError> {
        let name = capability.name().to_string();
        let category = capability.definition().category;

        let mut state = self.write();
        if state.capabilities.contains_key(&name) {
            return Err(RegistryError::DuplicateCapability(name));
        }
        state.capabilities.insert(name.clone(), capability);
        state.order.push(name.clone());
        state.by_category.entry(category).or_default().push(name.clone());
        drop(state);

        tracing::info!(capability = %name, category = %category, "Capability registered");
        Ok(())
    }

    /// Register multiple capabilities at once
    ///
    /// Stops at the first duplicate; capabilities before it stay registered.
    pub fn register_all(
        &self,
        capabilities: impl IntoIterator<Item = BoxedCapability>,
    ) -> Result<(), RegistryError> {
        for capability in capabilities {
            self.register(capability)?;
        }
        Ok(())
    }

    /// Unregister a capability by name
    ///
    /// Returns whether it was present.
    pub fn unregister(&self, name: &str) -> bool {
        let mut state = self.write();
        let Some(removed) = state.capabilities.remove(name) else {
            return false;
        };
        state.order.retain(|n| n != name);

        let category = removed.definition().category;
        if let Some(names) = state.by_category.get_mut(&category) {
            names.retain(|n| n != name);
            if names.is_empty() {
                state.by_category.remove(&category);
            }
        }
        drop(state);

        tracing::info!(capability = %name, "Capability unregistered");
        true
    }

    /// Get a capability by name
    pub fn get(&self, name: &str) -> Option<BoxedCapability> {
        self.read().capabilities.get(name).cloned()
    }

    /// Check if a capability is registered
    pub fn contains(&self, name: &str) -> bool {
        self.read().capabilities.contains_key(name)
    }

    /// Get all capabilities in a category, in registration order
    pub fn get_by_category(&self, category: CapabilityCategory) -> Vec<BoxedCapability> {
        let state = self.read();
        state
            .by_category
            .get(&category)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|name| state.capabilities.get(name).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Case-insensitive substring search over name, description and tags
    ///
    /// Returns matches in registration order.
    pub fn search(&self, query: &str) -> Vec<BoxedCapability> {
        let query_lower = query.to_lowercase();
        self.read()
            .ordered()
            .filter(|capability| {
                let definition = capability.definition();
                definition.name.to_lowercase().contains(&query_lower)
                    || definition.description.to_lowercase().contains(&query_lower)
                    || definition
                        .tags
                        .iter()
                        .any(|tag| tag.to_lowercase().contains(&query_lower))
            })
            .cloned()
            .collect()
    }

    /// Get all capabilities whose liveness check passes
    ///
    /// Checks run concurrently; the registry lock is not held while awaiting.
    pub async fn get_available(&self) -> Vec<BoxedCapability> {
        let all = self.all();
        let checks = all.iter().map(|capability| capability.is_available());
        let available = futures::future::join_all(checks).await;

        all.into_iter()
            .zip(available)
            .filter_map(|(capability, ok)| ok.then_some(capability))
            .collect()
    }

    /// Get all registered capabilities, in registration order
    pub fn all(&self) -> Vec<BoxedCapability> {
        self.read().ordered().cloned().collect()
    }

    /// Get all capability names, in registration order
    pub fn names(&self) -> Vec<String> {
        self.read().order.clone()
    }

    /// Get the number of registered capabilities
    pub fn count(&self) -> usize {
        self.read().capabilities.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.read().capabilities.is_empty()
    }

    /// Remove every capability and reset the indexes
    pub fn clear(&self) {
        *self.write() = RegistryState::default();
        tracing::info!("Capability registry cleared");
    }

    /// List all capabilities with their summaries
    pub fn list(&self) -> Vec<CapabilitySummary> {
        self.read()
            .ordered()
            .map(|c| CapabilitySummary::from(c.as_ref()))
            .collect()
    }

    /// Discover capabilities matching a query
    ///
    /// Returns capabilities sorted by relevance score (highest first), keeping
    /// only scores above 0.1.
    pub fn discover(&self, query: &str) -> Vec<DiscoveryResult> {
        self.discover_with_threshold(query, 0.1)
    }

    /// Discover capabilities with a custom score threshold
    pub fn discover_with_threshold(&self, query: &str, threshold: f32) -> Vec<DiscoveryResult> {
        let mut results: Vec<DiscoveryResult> = self
            .read()
            .ordered()
            .filter_map(|capability| {
                let score = self.discovery_strategy.score(query, capability.as_ref());
                (score >= threshold).then(|| DiscoveryResult {
                    capability: capability.clone(),
                    score,
                })
            })
            .collect();

        // Stable sort keeps registration order among equal scores
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results
    }
}
