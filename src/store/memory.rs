//! In-memory store.
//!
//! All tables sit behind one `tokio::sync::RwLock`, so every operation is
//! atomic with respect to the others. Nothing survives a restart; this
//! backend serves tests and local runs without `DATABASE_URL`.

use super::Store;
use crate::error::{Error, Result};
use crate::model::{ApiKey, HistoryEntry, Language, Project, Translation, TranslationKey};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    projects: HashMap<String, Project>,
    languages: Vec<Language>,
    keys: Vec<TranslationKey>,
    translations: Vec<Translation>,
    history: Vec<HistoryEntry>,
    api_keys: Vec<ApiKey>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        Ok(self.tables.read().await.projects.get(id).cloned())
    }

    async fn upsert_project(&self, project: Project) -> Result<Project> {
        let mut tables = self.tables.write().await;
        tables.projects.insert(project.id.clone(), project.clone());
        Ok(project)
    }

    async fn list_languages(&self, project_id: &str) -> Result<Vec<Language>> {
        let tables = self.tables.read().await;
        Ok(tables
            .languages
            .iter()
            .filter(|lang| lang.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn get_language(&self, id: &str) -> Result<Option<Language>> {
        let tables = self.tables.read().await;
        Ok(tables.languages.iter().find(|lang| lang.id == id).cloned())
    }

    async fn insert_language(&self, language: Language) -> Result<Language> {
        let mut tables = self.tables.write().await;
        if tables
            .languages
            .iter()
            .any(|l| l.project_id == language.project_id && l.code == language.code)
        {
            return Err(Error::DuplicateCode(language.code));
        }
        tables.languages.push(language.clone());
        Ok(language)
    }

    async fn update_language(&self, language: Language) -> Result<Language> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .languages
            .iter_mut()
            .find(|l| l.id == language.id)
            .ok_or_else(|| Error::NotFound(format!("language {}", language.id)))?;
        *slot = language.clone();
        Ok(language)
    }

    async fn list_keys(&self, project_id: &str) -> Result<Vec<TranslationKey>> {
        let tables = self.tables.read().await;
        Ok(tables
            .keys
            .iter()
            .filter(|k| k.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn get_key(&self, id: &str) -> Result<Option<TranslationKey>> {
        let tables = self.tables.read().await;
        Ok(tables.keys.iter().find(|k| k.id == id).cloned())
    }

    async fn find_key(
        &self,
        project_id: &str,
        namespace: &str,
        key: &str,
    ) -> Result<Option<TranslationKey>> {
        let tables = self.tables.read().await;
        Ok(tables
            .keys
            .iter()
            .find(|k| k.project_id == project_id && k.namespace == namespace && k.key == key)
            .cloned())
    }

    async fn insert_key(&self, key: TranslationKey) -> Result<TranslationKey> {
        let mut tables = self.tables.write().await;
        if tables.keys.iter().any(|k| {
            k.project_id == key.project_id && k.namespace == key.namespace && k.key == key.key
        }) {
            return Err(Error::DuplicateKey(key.key));
        }
        tables.keys.push(key.clone());
        Ok(key)
    }

    async fn update_key(&self, key: TranslationKey) -> Result<TranslationKey> {
        let mut tables = self.tables.write().await;
        let clash = tables.keys.iter().any(|k| {
            k.id != key.id
                && k.project_id == key.project_id
                && k.namespace == key.namespace
                && k.key == key.key
        });
        if clash {
            return Err(Error::DuplicateKey(key.key));
        }
        let slot = tables
            .keys
            .iter_mut()
            .find(|k| k.id == key.id)
            .ok_or_else(|| Error::NotFound(format!("key {}", key.id)))?;
        *slot = key.clone();
        Ok(key)
    }

    async fn delete_key(&self, id: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.keys.len();
        tables.keys.retain(|k| k.id != id);
        Ok(tables.keys.len() < before)
    }

    async fn get_translation(
        &self,
        key_id: &str,
        language_code: &str,
    ) -> Result<Option<Translation>> {
        let tables = self.tables.read().await;
        Ok(tables
            .translations
            .iter()
            .find(|t| t.key_id == key_id && t.language_code == language_code)
            .cloned())
    }

    async fn list_translations_for_key(&self, key_id: &str) -> Result<Vec<Translation>> {
        let tables = self.tables.read().await;
        Ok(tables
            .translations
            .iter()
            .filter(|t| t.key_id == key_id)
            .cloned()
            .collect())
    }

    async fn list_translations_for_project(&self, project_id: &str) -> Result<Vec<Translation>> {
        let tables = self.tables.read().await;
        let key_ids: Vec<&str> = tables
            .keys
            .iter()
            .filter(|k| k.project_id == project_id)
            .map(|k| k.id.as_str())
            .collect();
        Ok(tables
            .translations
            .iter()
            .filter(|t| key_ids.contains(&t.key_id.as_str()))
            .cloned()
            .collect())
    }

    async fn insert_translation(&self, translation: Translation) -> Result<Translation> {
        let mut tables = self.tables.write().await;
        if tables.translations.iter().any(|t| {
            t.key_id == translation.key_id && t.language_code == translation.language_code
        }) {
            return Err(Error::Store(anyhow!(
                "translation for ({}, {}) already exists",
                translation.key_id,
                translation.language_code
            )));
        }
        tables.translations.push(translation.clone());
        Ok(translation)
    }

    async fn update_translation(&self, translation: Translation) -> Result<Translation> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .translations
            .iter_mut()
            .find(|t| t.id == translation.id)
            .ok_or_else(|| Error::NotFound(format!("translation {}", translation.id)))?;
        *slot = translation.clone();
        Ok(translation)
    }

    async fn delete_translations_for_key(&self, key_id: &str) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.translations.len();
        tables.translations.retain(|t| t.key_id != key_id);
        Ok((before - tables.translations.len()) as u64)
    }

    async fn append_history(&self, entry: HistoryEntry) -> Result<()> {
        self.tables.write().await.history.push(entry);
        Ok(())
    }

    async fn history_for_key(
        &self,
        key_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<HistoryEntry>> {
        let tables = self.tables.read().await;
        // Appends arrive in time order, so reverse iteration is newest first.
        let entries = tables
            .history
            .iter()
            .rev()
            .filter(|h| h.key_id == key_id)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(entries)
    }

    async fn insert_api_key(&self, key: ApiKey) -> Result<ApiKey> {
        self.tables.write().await.api_keys.push(key.clone());
        Ok(key)
    }

    async fn list_api_keys(&self, project_id: &str) -> Result<Vec<ApiKey>> {
        let tables = self.tables.read().await;
        let mut keys: Vec<ApiKey> = tables
            .api_keys
            .iter()
            .filter(|k| k.project_id == project_id)
            .cloned()
            .collect();
        keys.reverse();
        Ok(keys)
    }

    async fn delete_api_key(&self, id: &str, user_id: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.api_keys.len();
        tables
            .api_keys
            .retain(|k| !(k.id == id && k.user_id == user_id));
        Ok(tables.api_keys.len() < before)
    }

    async fn touch_api_key(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(key) = tables.api_keys.iter_mut().find(|k| k.id == id) {
            key.last_used_at = Some(at);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{new_id, KeyStatus};

    fn key(project_id: &str, name: &str) -> TranslationKey {
        let now = Utc::now();
        TranslationKey {
            id: new_id(),
            project_id: project_id.to_string(),
            namespace: "default".to_string(),
            key: name.to_string(),
            description: String::new(),
            status: KeyStatus::Unconfirmed,
            created_at: now,
            updated_at: now,
            created_by: None,
            updated_by: None,
        }
    }

    fn translation(key_id: &str, lang: &str, value: &str) -> Translation {
        let now = Utc::now();
        Translation {
            id: new_id(),
            key_id: key_id.to_string(),
            language_code: lang.to_string(),
            value: value.to_string(),
            created_at: now,
            updated_at: now,
            created_by: None,
            updated_by: None,
        }
    }

    #[tokio::test]
    async fn test_insert_key_rejects_duplicate_name_in_namespace() {
        let store = InMemoryStore::new();
        store.insert_key(key("p1", "a.b")).await.expect("first insert");

        let err = store.insert_key(key("p1", "a.b")).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(_)));

        // Same name in another project is fine
        store.insert_key(key("p2", "a.b")).await.expect("other project");
    }

    #[tokio::test]
    async fn test_translation_pair_is_unique() {
        let store = InMemoryStore::new();
        let k = store.insert_key(key("p1", "a.b")).await.expect("key");
        store
            .insert_translation(translation(&k.id, "en", "Hi"))
            .await
            .expect("first");
        assert!(store
            .insert_translation(translation(&k.id, "en", "Hello"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_project_translations_are_scoped() {
        let store = InMemoryStore::new();
        let k1 = store.insert_key(key("p1", "a")).await.expect("key");
        let k2 = store.insert_key(key("p2", "b")).await.expect("key");
        store.insert_translation(translation(&k1.id, "en", "A")).await.expect("t1");
        store.insert_translation(translation(&k2.id, "en", "B")).await.expect("t2");

        let p1 = store.list_translations_for_project("p1").await.expect("list");
        assert_eq!(p1.len(), 1);
        assert_eq!(p1[0].value, "A");
    }

    #[tokio::test]
    async fn test_history_is_newest_first_and_limited() {
        let store = InMemoryStore::new();
        for i in 0..5 {
            store
                .append_history(HistoryEntry {
                    id: new_id(),
                    key_id: "k1".to_string(),
                    translation_id: None,
                    action: "update".to_string(),
                    field: "en".to_string(),
                    old_value: None,
                    new_value: Some(i.to_string()),
                    actor: "tester".to_string(),
                    timestamp: Utc::now(),
                })
                .await
                .expect("append");
        }

        let recent = store.history_for_key("k1", Some(2)).await.expect("history");
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].new_value.as_deref(), Some("4"));
        assert_eq!(recent[1].new_value.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_delete_api_key_requires_owner() {
        let store = InMemoryStore::new();
        let api_key = ApiKey {
            id: "k1".to_string(),
            key: "trn_a_b".to_string(),
            name: "ci".to_string(),
            project_id: "p1".to_string(),
            user_id: "alice".to_string(),
            created_at: Utc::now(),
            last_used_at: None,
            is_active: true,
        };
        store.insert_api_key(api_key).await.expect("insert");

        assert!(!store.delete_api_key("k1", "bob").await.expect("delete"));
        assert!(store.delete_api_key("k1", "alice").await.expect("delete"));
        assert!(store.list_api_keys("p1").await.expect("list").is_empty());
    }
}
