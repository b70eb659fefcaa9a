//! Translation values: `(key, language) -> text`, versioned through the
//! history log.
//!
//! Writes are upserts keyed on the `(key_id, language_code)` pair. The
//! empty-base-text rule is enforced here rather than in the database.

use crate::error::{Error, Result};
use crate::history::{Change, HistoryLog, ACTION_CREATE, ACTION_UPDATE};
use crate::model::{new_id, KeyStatus, Translation, BASE_LANGUAGE_CODE};
use crate::store::SharedStore;
use chrono::Utc;
use tracing::debug;

/// Result of an upsert.
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub translation: Translation,
    /// A new row was inserted.
    pub created: bool,
    /// The stored value differs from what was there before.
    pub changed: bool,
}

#[derive(Clone)]
pub struct ValueStore {
    store: SharedStore,
    history: HistoryLog,
}

impl ValueStore {
    pub fn new(store: SharedStore) -> Self {
        let history = HistoryLog::new(store.clone());
        Self { store, history }
    }

    /// Code of the base language for a project.
    pub async fn base_language(&self, project_id: &str) -> Result<String> {
        let languages = self.store.list_languages(project_id).await?;
        Ok(languages
            .into_iter()
            .find(|l| l.is_base)
            .map(|l| l.code)
            .unwrap_or_else(|| BASE_LANGUAGE_CODE.to_string()))
    }

    /// Insert or update the value for `(key_id, language_code)`.
    ///
    /// Non-base writes always reset the owning key to unconfirmed; base
    /// writes do so only when the text actually changed.
    pub async fn upsert(
        &self,
        key_id: &str,
        language_code: &str,
        value: &str,
        actor: &str,
    ) -> Result<UpsertOutcome> {
        let mut key = self
            .store
            .get_key(key_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("key {}", key_id)))?;

        let base = self.base_language(&key.project_id).await?;
        let is_base = language_code == base;
        if is_base && value.trim().is_empty() {
            return Err(Error::EmptyBaseText);
        }

        let now = Utc::now();
        let existing = self.store.get_translation(key_id, language_code).await?;

        let outcome = match existing {
            Some(mut row) => {
                if row.value == value {
                    debug!("Translation {}/{} unchanged", key.key, language_code);
                    UpsertOutcome {
                        translation: row,
                        created: false,
                        changed: false,
                    }
                } else {
                    let old_value = std::mem::replace(&mut row.value, value.to_string());
                    row.updated_at = now;
                    row.updated_by = Some(actor.to_string());
                    let row = self.store.update_translation(row).await?;
                    self.history
                        .record(
                            Change {
                                key_id: key_id.to_string(),
                                translation_id: Some(row.id.clone()),
                                action: ACTION_UPDATE,
                                field: language_code.to_string(),
                                old_value: Some(old_value),
                                new_value: Some(value.to_string()),
                            },
                            actor,
                        )
                        .await;
                    UpsertOutcome {
                        translation: row,
                        created: false,
                        changed: true,
                    }
                }
            }
            None => {
                let row = self
                    .store
                    .insert_translation(Translation {
                        id: new_id(),
                        key_id: key_id.to_string(),
                        language_code: language_code.to_string(),
                        value: value.to_string(),
                        created_at: now,
                        updated_at: now,
                        created_by: Some(actor.to_string()),
                        updated_by: Some(actor.to_string()),
                    })
                    .await?;
                self.history
                    .record(
                        Change {
                            key_id: key_id.to_string(),
                            translation_id: Some(row.id.clone()),
                            action: ACTION_CREATE,
                            field: language_code.to_string(),
                            old_value: None,
                            new_value: Some(value.to_string()),
                        },
                        actor,
                    )
                    .await;
                UpsertOutcome {
                    translation: row,
                    created: true,
                    changed: true,
                }
            }
        };

        let resets_status = !is_base || outcome.changed;
        if resets_status && key.status != KeyStatus::Unconfirmed {
            key.status = KeyStatus::Unconfirmed;
            key.updated_at = now;
            key.updated_by = Some(actor.to_string());
            self.store.update_key(key).await?;
        }

        Ok(outcome)
    }

    pub async fn fetch_for_key(&self, key_id: &str) -> Result<Vec<Translation>> {
        self.store.list_translations_for_key(key_id).await
    }

    pub async fn fetch_all(&self, project_id: &str) -> Result<Vec<Translation>> {
        self.store.list_translations_for_project(project_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TranslationKey;
    use crate::store::memory::InMemoryStore;
    use std::sync::Arc;

    async fn setup() -> (ValueStore, SharedStore, String) {
        let store: SharedStore = Arc::new(InMemoryStore::new());
        let now = Utc::now();
        let key = store
            .insert_key(TranslationKey {
                id: new_id(),
                project_id: "p1".to_string(),
                namespace: "default".to_string(),
                key: "greeting".to_string(),
                description: String::new(),
                status: KeyStatus::Confirmed,
                created_at: now,
                updated_at: now,
                created_by: None,
                updated_by: None,
            })
            .await
            .expect("key");
        (ValueStore::new(store.clone()), store, key.id)
    }

    #[tokio::test]
    async fn test_insert_then_update_records_history() {
        let (values, store, key_id) = setup().await;

        let first = values.upsert(&key_id, "en", "Hello", "alice").await.expect("insert");
        assert!(first.created);

        let second = values.upsert(&key_id, "en", "Hi", "alice").await.expect("update");
        assert!(!second.created);
        assert!(second.changed);

        let history = store.history_for_key(&key_id, None).await.expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, "update");
        assert_eq!(history[0].old_value.as_deref(), Some("Hello"));
        assert_eq!(history[1].action, "create");
    }

    #[tokio::test]
    async fn test_same_value_twice_appends_one_entry() {
        let (values, store, key_id) = setup().await;

        values.upsert(&key_id, "fr", "Bonjour", "bob").await.expect("first");
        let again = values.upsert(&key_id, "fr", "Bonjour", "bob").await.expect("second");
        assert!(!again.changed);

        let history = store.history_for_key(&key_id, None).await.expect("history");
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_non_base_write_resets_status() {
        let (values, store, key_id) = setup().await;

        values.upsert(&key_id, "fr", "Bonjour", "bob").await.expect("write");

        let key = store.get_key(&key_id).await.expect("get").expect("exists");
        assert_eq!(key.status, KeyStatus::Unconfirmed);
    }

    #[tokio::test]
    async fn test_empty_base_text_is_rejected() {
        let (values, store, key_id) = setup().await;

        let err = values.upsert(&key_id, "en", "   ", "bob").await.unwrap_err();
        assert!(matches!(err, Error::EmptyBaseText));
        assert!(store.get_translation(&key_id, "en").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_empty_non_base_value_is_allowed() {
        let (values, _store, key_id) = setup().await;
        let outcome = values.upsert(&key_id, "de", "", "bob").await.expect("write");
        assert_eq!(outcome.translation.value, "");
    }

    #[tokio::test]
    async fn test_unknown_key_is_not_found() {
        let (values, _store, _key_id) = setup().await;
        let err = values.upsert("missing", "en", "Hi", "bob").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
