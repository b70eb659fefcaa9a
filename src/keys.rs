//! Translation keys: named strings with a review status and a description.
//!
//! A key is only valid once its base-language text exists, so `create` takes
//! the base text and writes both. Deleting a key removes its translation rows
//! here rather than through a database cascade, after the deletion has been
//! recorded in the history log.

use crate::error::{Error, Result};
use crate::history::{
    Change, HistoryLog, ACTION_CONFIRM, ACTION_DELETE, ACTION_RENAME, ACTION_UPDATE,
    RECENT_HISTORY_LIMIT,
};
use crate::model::{new_id, HistoryEntry, KeyStatus, KeyView, TranslationKey, DEFAULT_NAMESPACE};
use crate::store::SharedStore;
use crate::translations::{UpsertOutcome, ValueStore};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

/// Input for [`KeyStore::create`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewKey {
    pub project_id: String,
    #[serde(default)]
    pub namespace: Option<String>,
    pub key: String,
    #[serde(default)]
    pub description: String,
    pub base_text: String,
    /// Extra non-base translations written after the base text.
    #[serde(default)]
    pub translations: BTreeMap<String, String>,
}

/// One edit to an existing key, dispatched through [`KeyStore::apply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KeyUpdate {
    Rename { key: String },
    UpdateDescription { description: String },
    UpdateTranslation { language: String, value: String },
}

/// What [`KeyStore::apply`] changed.
#[derive(Debug, Clone)]
pub enum Applied {
    Key(TranslationKey),
    Translation(UpsertOutcome),
}

#[derive(Clone)]
pub struct KeyStore {
    store: SharedStore,
    values: ValueStore,
    history: HistoryLog,
}

impl KeyStore {
    pub fn new(store: SharedStore) -> Self {
        Self {
            values: ValueStore::new(store.clone()),
            history: HistoryLog::new(store.clone()),
            store,
        }
    }

    pub fn values(&self) -> &ValueStore {
        &self.values
    }

    async fn load(&self, id: &str) -> Result<TranslationKey> {
        self.store
            .get_key(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("key {}", id)))
    }

    /// Create a key together with its base-language text.
    ///
    /// The key row and the translation rows are separate writes. If the base
    /// text cannot be stored the key row is removed again.
    pub async fn create(&self, new_key: NewKey, actor: &str) -> Result<TranslationKey> {
        let name = new_key.key.trim();
        if name.is_empty() {
            return Err(Error::EmptyKeyName);
        }
        if new_key.base_text.trim().is_empty() {
            return Err(Error::EmptyBaseText);
        }

        let namespace = new_key
            .namespace
            .as_deref()
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
            .unwrap_or(DEFAULT_NAMESPACE)
            .to_string();

        if self
            .store
            .find_key(&new_key.project_id, &namespace, name)
            .await?
            .is_some()
        {
            return Err(Error::DuplicateKey(name.to_string()));
        }

        let now = Utc::now();
        let key = self
            .store
            .insert_key(TranslationKey {
                id: new_id(),
                project_id: new_key.project_id.clone(),
                namespace,
                key: name.to_string(),
                description: new_key.description.clone(),
                status: KeyStatus::Unconfirmed,
                created_at: now,
                updated_at: now,
                created_by: Some(actor.to_string()),
                updated_by: Some(actor.to_string()),
            })
            .await?;

        let base = self.values.base_language(&key.project_id).await?;
        if let Err(e) = self
            .values
            .upsert(&key.id, &base, &new_key.base_text, actor)
            .await
        {
            warn!("Base text for new key '{}' failed, removing key: {}", key.key, e);
            if let Err(cleanup) = self.store.delete_key(&key.id).await {
                warn!("Failed to remove half-created key {}: {}", key.id, cleanup);
            }
            return Err(e);
        }

        for (language, value) in new_key.translations.iter().filter(|(lang, _)| **lang != base) {
            if let Err(e) = self.values.upsert(&key.id, language, value, actor).await {
                warn!("Failed to store {} translation for '{}': {}", language, key.key, e);
            }
        }

        info!("Created key '{}' in namespace '{}'", key.key, key.namespace);
        self.load(&key.id).await
    }

    pub async fn rename(&self, id: &str, new_name: &str, actor: &str) -> Result<TranslationKey> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(Error::EmptyKeyName);
        }

        let mut key = self.load(id).await?;
        if key.key == new_name {
            return Ok(key);
        }
        if self
            .store
            .find_key(&key.project_id, &key.namespace, new_name)
            .await?
            .is_some()
        {
            return Err(Error::DuplicateKey(new_name.to_string()));
        }

        let old_name = std::mem::replace(&mut key.key, new_name.to_string());
        key.updated_at = Utc::now();
        key.updated_by = Some(actor.to_string());
        let key = self.store.update_key(key).await?;

        self.history
            .record(
                Change {
                    key_id: id.to_string(),
                    action: ACTION_RENAME,
                    field: "key".to_string(),
                    old_value: Some(old_name),
                    new_value: Some(key.key.clone()),
                    ..Default::default()
                },
                actor,
            )
            .await;
        Ok(key)
    }

    pub async fn update_description(
        &self,
        id: &str,
        description: &str,
        actor: &str,
    ) -> Result<TranslationKey> {
        let mut key = self.load(id).await?;
        if key.description == description {
            return Ok(key);
        }

        let old = std::mem::replace(&mut key.description, description.to_string());
        key.updated_at = Utc::now();
        key.updated_by = Some(actor.to_string());
        let key = self.store.update_key(key).await?;

        self.history
            .record(
                Change {
                    key_id: id.to_string(),
                    action: ACTION_UPDATE,
                    field: "description".to_string(),
                    old_value: Some(old),
                    new_value: Some(key.description.clone()),
                    ..Default::default()
                },
                actor,
            )
            .await;
        Ok(key)
    }

    pub async fn confirm(&self, id: &str, actor: &str) -> Result<TranslationKey> {
        let mut key = self.load(id).await?;
        let old_status = key.status;
        key.status = KeyStatus::Confirmed;
        key.updated_at = Utc::now();
        key.updated_by = Some(actor.to_string());
        let key = self.store.update_key(key).await?;

        self.history
            .record(
                Change {
                    key_id: id.to_string(),
                    action: ACTION_CONFIRM,
                    field: "status".to_string(),
                    old_value: Some(old_status.as_str().to_string()),
                    new_value: Some(KeyStatus::Confirmed.as_str().to_string()),
                    ..Default::default()
                },
                actor,
            )
            .await;
        Ok(key)
    }

    /// Delete a key and every translation it owns. History entries survive.
    pub async fn delete(&self, id: &str, actor: &str) -> Result<()> {
        let key = self.load(id).await?;

        self.history
            .record(
                Change {
                    key_id: id.to_string(),
                    action: ACTION_DELETE,
                    field: "key".to_string(),
                    old_value: Some(key.key.clone()),
                    new_value: None,
                    ..Default::default()
                },
                actor,
            )
            .await;

        let removed = self.store.delete_translations_for_key(id).await?;
        self.store.delete_key(id).await?;
        info!("Deleted key '{}' and {} translations", key.key, removed);
        Ok(())
    }

    /// Apply a single typed edit.
    pub async fn apply(&self, id: &str, update: KeyUpdate, actor: &str) -> Result<Applied> {
        match update {
            KeyUpdate::Rename { key } => self.rename(id, &key, actor).await.map(Applied::Key),
            KeyUpdate::UpdateDescription { description } => self
                .update_description(id, &description, actor)
                .await
                .map(Applied::Key),
            KeyUpdate::UpdateTranslation { language, value } => self
                .values
                .upsert(id, &language, &value, actor)
                .await
                .map(Applied::Translation),
        }
    }

    pub async fn get(&self, id: &str) -> Result<KeyView> {
        let key = self.load(id).await?;
        let translations = self
            .store
            .list_translations_for_key(id)
            .await?
            .into_iter()
            .map(|t| (t.language_code, t.value))
            .collect();
        let history = self
            .store
            .history_for_key(id, Some(RECENT_HISTORY_LIMIT))
            .await?;
        Ok(KeyView {
            key,
            translations,
            history,
        })
    }

    /// Every key of a project with its translations and recent history.
    pub async fn list(&self, project_id: &str) -> Result<Vec<KeyView>> {
        let keys = self.store.list_keys(project_id).await?;
        let mut by_key: HashMap<String, BTreeMap<String, String>> = HashMap::new();
        for t in self.store.list_translations_for_project(project_id).await? {
            by_key
                .entry(t.key_id)
                .or_default()
                .insert(t.language_code, t.value);
        }

        let mut views = Vec::with_capacity(keys.len());
        for key in keys {
            let history = self
                .store
                .history_for_key(&key.id, Some(RECENT_HISTORY_LIMIT))
                .await?;
            views.push(KeyView {
                translations: by_key.remove(&key.id).unwrap_or_default(),
                history,
                key,
            });
        }
        Ok(views)
    }

    /// Full history of a key, newest first. Works after deletion.
    pub async fn history(&self, id: &str) -> Result<Vec<HistoryEntry>> {
        self.history.for_key(id, None).await
    }

    /// `key -> text` for one namespace and locale, as served by the read API.
    /// Keys without a non-empty value in that locale are left out.
    pub async fn bundle(
        &self,
        project_id: &str,
        namespace: &str,
        locale: &str,
    ) -> Result<BTreeMap<String, String>> {
        let names: HashMap<String, String> = self
            .store
            .list_keys(project_id)
            .await?
            .into_iter()
            .filter(|k| k.namespace == namespace)
            .map(|k| (k.id, k.key))
            .collect();

        Ok(self
            .store
            .list_translations_for_project(project_id)
            .await?
            .into_iter()
            .filter(|t| t.language_code == locale && !t.value.is_empty())
            .filter_map(|t| names.get(&t.key_id).map(|name| (name.clone(), t.value)))
            .collect())
    }

    /// Distinct namespaces in use by a project, sorted.
    pub async fn namespaces(&self, project_id: &str) -> Result<Vec<String>> {
        let mut namespaces: Vec<String> = self
            .store
            .list_keys(project_id)
            .await?
            .into_iter()
            .map(|k| k.namespace)
            .collect();
        namespaces.sort();
        namespaces.dedup();
        Ok(namespaces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use crate::store::testing::FaultyStore;
    use std::sync::Arc;

    fn new_key(name: &str, base: &str) -> NewKey {
        NewKey {
            project_id: "p1".to_string(),
            key: name.to_string(),
            base_text: base.to_string(),
            ..Default::default()
        }
    }

    fn keys() -> (KeyStore, SharedStore) {
        let store: SharedStore = Arc::new(InMemoryStore::new());
        (KeyStore::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_create_requires_key_name() {
        let (keys, _) = keys();
        let err = keys.create(new_key("  ", "Hello"), "alice").await.unwrap_err();
        assert!(matches!(err, Error::EmptyKeyName));
    }

    #[tokio::test]
    async fn test_create_requires_base_text() {
        let (keys, store) = keys();
        let err = keys.create(new_key("greeting", ""), "alice").await.unwrap_err();
        assert!(matches!(err, Error::EmptyBaseText));
        assert!(store.list_keys("p1").await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_create_starts_unconfirmed_with_base_text() {
        let (keys, _) = keys();
        let mut input = new_key("greeting", "Hello");
        input.translations.insert("fr".to_string(), "Bonjour".to_string());

        let key = keys.create(input, "alice").await.expect("create");
        assert_eq!(key.status, KeyStatus::Unconfirmed);
        assert_eq!(key.namespace, "default");

        let view = keys.get(&key.id).await.expect("get");
        assert_eq!(view.translations.get("en").map(String::as_str), Some("Hello"));
        assert_eq!(view.translations.get("fr").map(String::as_str), Some("Bonjour"));
    }

    #[tokio::test]
    async fn test_duplicate_key_in_namespace_is_rejected() {
        let (keys, _) = keys();
        keys.create(new_key("greeting", "Hello"), "alice").await.expect("create");
        let err = keys.create(new_key("greeting", "Hi"), "alice").await.unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(_)));
    }

    #[tokio::test]
    async fn test_rename_records_history_and_keeps_status() {
        let (keys, _) = keys();
        let key = keys.create(new_key("old.name", "Hello"), "alice").await.expect("create");
        keys.confirm(&key.id, "alice").await.expect("confirm");

        let renamed = keys.rename(&key.id, "new.name", "bob").await.expect("rename");
        assert_eq!(renamed.key, "new.name");
        assert_eq!(renamed.status, KeyStatus::Confirmed);

        let history = keys.history(&key.id).await.expect("history");
        assert_eq!(history[0].action, "rename");
        assert_eq!(history[0].old_value.as_deref(), Some("old.name"));
        assert_eq!(history[0].actor, "bob");
    }

    #[tokio::test]
    async fn test_rename_to_existing_name_is_rejected() {
        let (keys, _) = keys();
        let first = keys.create(new_key("home.title", "Home"), "alice").await.expect("create");
        let second = keys.create(new_key("home.cta", "Start"), "alice").await.expect("create");

        let err = keys
            .rename(&second.id, " home.title ", "bob")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(ref name) if name == "home.title"));

        assert_eq!(keys.get(&first.id).await.expect("get").key.key, "home.title");
        assert_eq!(keys.get(&second.id).await.expect("get").key.key, "home.cta");
        let history = keys.history(&second.id).await.expect("history");
        assert!(history.iter().all(|h| h.action != ACTION_RENAME));
    }

    #[tokio::test]
    async fn test_confirm_until_next_translation_write() {
        let (keys, _) = keys();
        let key = keys.create(new_key("greeting", "Hello"), "alice").await.expect("create");

        let confirmed = keys.confirm(&key.id, "alice").await.expect("confirm");
        assert_eq!(confirmed.status, KeyStatus::Confirmed);
        let history = keys.history(&key.id).await.expect("history");
        assert_eq!(history[0].action, "Confirmed translations");
        assert_eq!(history[0].field, "status");

        keys.apply(
            &key.id,
            KeyUpdate::UpdateTranslation {
                language: "es".to_string(),
                value: "Hola".to_string(),
            },
            "bob",
        )
        .await
        .expect("apply");

        let view = keys.get(&key.id).await.expect("get");
        assert_eq!(view.key.status, KeyStatus::Unconfirmed);
    }

    #[tokio::test]
    async fn test_delete_cascades_translations_but_keeps_history() {
        let (keys, _) = keys();
        let mut input = new_key("greeting", "Hello");
        input.translations.insert("fr".to_string(), "Bonjour".to_string());
        let key = keys.create(input, "alice").await.expect("create");

        keys.delete(&key.id, "alice").await.expect("delete");

        assert!(keys.values().fetch_for_key(&key.id).await.expect("fetch").is_empty());
        assert!(matches!(keys.get(&key.id).await, Err(Error::NotFound(_))));

        let history = keys.history(&key.id).await.expect("history");
        assert_eq!(history[0].action, "delete");
        assert!(history.len() >= 3);
    }

    #[tokio::test]
    async fn test_list_limits_history_to_ten_newest() {
        let (keys, _) = keys();
        let key = keys.create(new_key("counter", "0"), "alice").await.expect("create");
        for i in 1..=12 {
            keys.apply(
                &key.id,
                KeyUpdate::UpdateDescription {
                    description: format!("revision {}", i),
                },
                "alice",
            )
            .await
            .expect("apply");
        }

        let views = keys.list("p1").await.expect("list");
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].history.len(), RECENT_HISTORY_LIMIT);
        assert_eq!(views[0].history[0].new_value.as_deref(), Some("revision 12"));
    }

    #[tokio::test]
    async fn test_key_update_deserializes_from_tagged_json() {
        let update: KeyUpdate = serde_json::from_str(
            r#"{"kind": "update_translation", "language": "fr", "value": "Salut"}"#,
        )
        .expect("parse");
        assert_eq!(
            update,
            KeyUpdate::UpdateTranslation {
                language: "fr".to_string(),
                value: "Salut".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_bundle_filters_namespace_locale_and_empty_values() {
        let (keys, _) = keys();
        let mut hello = new_key("hello", "Hello, {{name}}!");
        hello.translations.insert("fr".to_string(), "Bonjour, {{name}} !".to_string());
        hello.translations.insert("de".to_string(), String::new());
        keys.create(hello, "alice").await.expect("create");
        keys.create(new_key("save", "Save"), "alice").await.expect("create");
        let mut admin = new_key("dashboard", "Dashboard");
        admin.namespace = Some("admin".to_string());
        keys.create(admin, "alice").await.expect("create");

        let fr = keys.bundle("p1", "default", "fr").await.expect("bundle");
        assert_eq!(fr.len(), 1);
        assert_eq!(fr["hello"], "Bonjour, {{name}} !");

        let en = keys.bundle("p1", "default", "en").await.expect("bundle");
        assert_eq!(en.len(), 2);
        assert!(keys.bundle("p1", "default", "de").await.expect("bundle").is_empty());
        assert_eq!(keys.bundle("p1", "admin", "en").await.expect("bundle").len(), 1);
    }

    #[tokio::test]
    async fn test_namespaces_are_distinct() {
        let (keys, _) = keys();
        let mut admin = new_key("dashboard", "Dashboard");
        admin.namespace = Some("admin".to_string());
        keys.create(admin, "alice").await.expect("create");
        keys.create(new_key("save", "Save"), "alice").await.expect("create");
        keys.create(new_key("cancel", "Cancel"), "alice").await.expect("create");

        assert_eq!(
            keys.namespaces("p1").await.expect("namespaces"),
            vec!["admin".to_string(), "default".to_string()]
        );
    }

    #[tokio::test]
    async fn test_history_failures_do_not_block_writes() {
        let store: SharedStore = Arc::new(FaultyStore::new().failing_history());
        let keys = KeyStore::new(store.clone());

        let key = keys.create(new_key("greeting", "Hello"), "alice").await.expect("create");
        let outcome = keys
            .values()
            .upsert(&key.id, "en", "Hello there", "bob")
            .await
            .expect("upsert");
        assert!(outcome.changed);
        assert_eq!(
            store
                .get_translation(&key.id, "en")
                .await
                .expect("lookup")
                .map(|t| t.value)
                .as_deref(),
            Some("Hello there")
        );

        keys.delete(&key.id, "bob").await.expect("delete");
        assert!(store.get_key(&key.id).await.expect("lookup").is_none());
        assert!(store
            .list_translations_for_key(&key.id)
            .await
            .expect("list")
            .is_empty());
        assert!(keys.history(&key.id).await.expect("history").is_empty());
    }
}
