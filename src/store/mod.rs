//! Persistence seam.
//!
//! Every data-access module receives an explicitly constructed
//! `Arc<dyn Store>`. The trait exposes plain row-level operations only; the
//! business rules (status resets, history, cascades) live in the modules
//! that call it, so both backends behave identically.

use crate::error::Result;
use crate::model::{ApiKey, HistoryEntry, Language, Project, Translation, TranslationKey};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub mod memory;
pub mod postgres;
#[cfg(test)]
pub mod testing;

pub type SharedStore = Arc<dyn Store>;

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_project(&self, id: &str) -> Result<Option<Project>>;
    async fn upsert_project(&self, project: Project) -> Result<Project>;

    /// All languages of a project, inactive ones included, in creation order.
    async fn list_languages(&self, project_id: &str) -> Result<Vec<Language>>;
    async fn get_language(&self, id: &str) -> Result<Option<Language>>;
    async fn insert_language(&self, language: Language) -> Result<Language>;
    async fn update_language(&self, language: Language) -> Result<Language>;

    /// Keys of a project in creation order.
    async fn list_keys(&self, project_id: &str) -> Result<Vec<TranslationKey>>;
    async fn get_key(&self, id: &str) -> Result<Option<TranslationKey>>;
    async fn find_key(
        &self,
        project_id: &str,
        namespace: &str,
        key: &str,
    ) -> Result<Option<TranslationKey>>;
    async fn insert_key(&self, key: TranslationKey) -> Result<TranslationKey>;
    async fn update_key(&self, key: TranslationKey) -> Result<TranslationKey>;
    /// Removes the key row only. Returns whether a row was deleted.
    async fn delete_key(&self, id: &str) -> Result<bool>;

    async fn get_translation(
        &self,
        key_id: &str,
        language_code: &str,
    ) -> Result<Option<Translation>>;
    async fn list_translations_for_key(&self, key_id: &str) -> Result<Vec<Translation>>;
    async fn list_translations_for_project(&self, project_id: &str) -> Result<Vec<Translation>>;
    async fn insert_translation(&self, translation: Translation) -> Result<Translation>;
    async fn update_translation(&self, translation: Translation) -> Result<Translation>;
    /// Returns the number of rows removed.
    async fn delete_translations_for_key(&self, key_id: &str) -> Result<u64>;

    async fn append_history(&self, entry: HistoryEntry) -> Result<()>;
    /// Newest first.
    async fn history_for_key(&self, key_id: &str, limit: Option<usize>)
        -> Result<Vec<HistoryEntry>>;

    async fn insert_api_key(&self, key: ApiKey) -> Result<ApiKey>;
    /// Newest first.
    async fn list_api_keys(&self, project_id: &str) -> Result<Vec<ApiKey>>;
    /// Deletes only when `user_id` owns the key.
    async fn delete_api_key(&self, id: &str, user_id: &str) -> Result<bool>;
    async fn touch_api_key(&self, id: &str, at: DateTime<Utc>) -> Result<()>;

    async fn health_check(&self) -> Result<()>;
    fn backend_name(&self) -> &'static str;
}

/// Postgres when `DATABASE_URL` is set, otherwise an empty in-memory store.
pub async fn open(config: &crate::config::Config) -> anyhow::Result<SharedStore> {
    match config.database_url.as_deref() {
        Some(url) => {
            let store = postgres::PostgresStore::connect(url, config.database_max_connections).await?;
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            Ok(Arc::new(memory::InMemoryStore::new()))
        }
    }
}
