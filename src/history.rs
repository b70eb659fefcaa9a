//! Append-only audit log of field-level changes.
//!
//! Recording is best-effort: a failed write is logged and swallowed so it can
//! never block the change it documents.

use crate::error::Result;
use crate::model::{new_id, HistoryEntry};
use crate::store::SharedStore;
use chrono::Utc;
use tracing::warn;

/// How many entries the dashboard table shows per key.
pub const RECENT_HISTORY_LIMIT: usize = 10;

pub const ACTION_CREATE: &str = "create";
pub const ACTION_UPDATE: &str = "update";
pub const ACTION_RENAME: &str = "rename";
pub const ACTION_CONFIRM: &str = "Confirmed translations";
pub const ACTION_DELETE: &str = "delete";

/// A change about to be recorded.
#[derive(Debug, Clone, Default)]
pub struct Change {
    pub key_id: String,
    pub translation_id: Option<String>,
    pub action: &'static str,
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

#[derive(Clone)]
pub struct HistoryLog {
    store: SharedStore,
}

impl HistoryLog {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Append one entry. Returns whether the write succeeded.
    pub async fn record(&self, change: Change, actor: &str) -> bool {
        let entry = HistoryEntry {
            id: new_id(),
            key_id: change.key_id,
            translation_id: change.translation_id,
            action: change.action.to_string(),
            field: change.field,
            old_value: change.old_value,
            new_value: change.new_value,
            actor: actor.to_string(),
            timestamp: Utc::now(),
        };

        match self.store.append_history(entry.clone()).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Failed to record history for key {} ({} {}): {}",
                    entry.key_id, entry.action, entry.field, e
                );
                false
            }
        }
    }

    /// Entries for a key, newest first. `None` returns the full log.
    pub async fn for_key(&self, key_id: &str, limit: Option<usize>) -> Result<Vec<HistoryEntry>> {
        self.store.history_for_key(key_id, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_record_and_read_back() {
        let log = HistoryLog::new(Arc::new(InMemoryStore::new()));

        let recorded = log
            .record(
                Change {
                    key_id: "k1".to_string(),
                    action: ACTION_RENAME,
                    field: "key".to_string(),
                    old_value: Some("old.name".to_string()),
                    new_value: Some("new.name".to_string()),
                    ..Default::default()
                },
                "alice",
            )
            .await;
        assert!(recorded);

        let entries = log.for_key("k1", None).await.expect("history");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "rename");
        assert_eq!(entries[0].actor, "alice");
        assert_eq!(entries[0].old_value.as_deref(), Some("old.name"));
    }

    #[tokio::test]
    async fn test_other_keys_are_not_returned() {
        let log = HistoryLog::new(Arc::new(InMemoryStore::new()));
        for key_id in ["k1", "k2", "k1"] {
            log.record(
                Change {
                    key_id: key_id.to_string(),
                    action: ACTION_UPDATE,
                    field: "description".to_string(),
                    ..Default::default()
                },
                "system",
            )
            .await;
        }

        assert_eq!(log.for_key("k1", None).await.expect("history").len(), 2);
        assert_eq!(log.for_key("k2", None).await.expect("history").len(), 1);
    }
}
