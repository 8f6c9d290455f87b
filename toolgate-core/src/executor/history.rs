//! Invocation history
//!
//! Append-only log of completed invocations, most recent last. An optional
//! capacity turns it into a ring buffer that drops the oldest records.

use crate::capability::InvocationResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use tokio::sync::RwLock;
use uuid::Uuid;

/// One completed invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Unique record ID
    pub id: Uuid,

    /// Capability name as requested
    pub capability: String,

    /// Parameters as supplied
    pub params: Value,

    /// Result returned to the caller
    pub result: InvocationResult,

    /// When the invocation completed
    pub timestamp: DateTime<Utc>,
}

impl HistoryRecord {
    /// Create a record stamped with the current time
    pub fn new(capability: impl Into<String>, params: Value, result: InvocationResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            capability: capability.into(),
            params,
            result,
            timestamp: Utc::now(),
        }
    }
}

/// Bounded or unbounded log of invocations
#[derive(Debug, Default)]
pub struct InvocationHistory {
    records: RwLock<VecDeque<HistoryRecord>>,
    capacity: Option<usize>,
}

impl InvocationHistory {
    /// Create an unbounded history
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a history that keeps at most `capacity` records
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            records: RwLock::new(VecDeque::new()),
            capacity,
        }
    }

    /// Append a record, evicting the oldest when full
    pub async fn append(&self, record: HistoryRecord) {
        let mut records = self.records.write().await;
        records.push_back(record);
        if let Some(capacity) = self.capacity {
            while records.len() > capacity {
                records.pop_front();
            }
        }
    }

    /// Get records in completion order; with a limit, only the newest `limit`
    pub async fn recent(&self, limit: Option<usize>) -> Vec<HistoryRecord> {
        let records = self.records.read().await;
        let skip = limit.map_or(0, |limit| records.len().saturating_sub(limit));
        records.iter().skip(skip).cloned().collect()
    }

    /// Remove every record
    pub async fn clear(&self) {
        self.records.write().await.clear();
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Check whether the history is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
