//! Result cache keyed by capability name and canonical parameters
//!
//! Only successful results are stored. Entries expire lazily: an expired entry
//! is removed when its key is looked up, on the next insert of any key, or by
//! [`ResultCache::purge_expired`].

use crate::capability::InvocationResult;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Compute the cache key for an invocation
///
/// Object keys are sorted at every depth, so parameter maps that differ only
/// in key order produce the same key.
pub fn cache_key(capability: &str, params: &Value) -> Result<String, serde_json::Error> {
    let canonical = serde_json::to_string(&Canonical(params))?;

    let mut hasher = Sha256::new();
    hasher.update(capability.as_bytes());
    hasher.update(b"\n");
    hasher.update(canonical.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Serializes a JSON value with object keys in sorted order
struct Canonical<'a>(&'a Value);

impl Serialize for Canonical<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));

                let mut out = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    out.serialize_entry(key, &Canonical(value))?;
                }
                out.end()
            }
            Value::Array(items) => {
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    out.serialize_element(&Canonical(item))?;
                }
                out.end()
            }
            other => other.serialize(serializer),
        }
    }
}

/// A stored result with its expiry
#[derive(Debug, Clone)]
pub struct CacheEntry {
    result: InvocationResult,
    capability: String,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    /// The cached result
    pub fn result(&self) -> &InvocationResult {
        &self.result
    }

    /// Name of the capability that produced the result
    pub fn capability(&self) -> &str {
        &self.capability
    }

    /// Instant after which the entry is no longer served
    pub fn expires_at(&self) -> Instant {
        self.stored_at + self.ttl
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at()
    }
}

/// TTL cache of successful invocation results
#[derive(Default)]
pub struct ResultCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ResultCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a live entry, dropping it if it has expired
    pub async fn get(&self, key: &str) -> Option<InvocationResult> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.is_expired(Instant::now()) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.result.clone()),
            None => None,
        }
    }

    /// Store a result, replacing any previous entry for the key
    ///
    /// Expired entries for other keys are dropped on the same pass, so the
    /// map never outgrows the set of live entries plus the new one.
    pub async fn insert(
        &self,
        key: String,
        capability: impl Into<String>,
        result: InvocationResult,
        ttl: Duration,
    ) {
        let now = Instant::now();
        let entry = CacheEntry {
            result,
            capability: capability.into(),
            stored_at: now,
            ttl,
        };

        let mut entries = self.entries.lock().await;
        entries.retain(|_, existing| !existing.is_expired(now));
        entries.insert(key, entry);
    }

    /// Drop every entry produced by `capability`, returning how many were removed
    pub async fn invalidate(&self, capability: &str) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.capability != capability);
        before - entries.len()
    }

    /// Drop every expired entry, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Drop everything
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// Number of stored entries, expired ones included until purged
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Check whether the cache holds no entries
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
