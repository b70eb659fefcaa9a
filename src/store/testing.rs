//! Store double for failure-path tests: an [`InMemoryStore`] with switchable
//! faults.

use super::memory::InMemoryStore;
use super::Store;
use crate::error::{Error, Result};
use crate::model::{ApiKey, HistoryEntry, Language, Project, Translation, TranslationKey};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, Default)]
pub struct FaultyStore {
    inner: InMemoryStore,
    fail_history: bool,
    fail_language_reads: bool,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `append_history` fails.
    pub fn failing_history(mut self) -> Self {
        self.fail_history = true;
        self
    }

    /// Every `list_languages` fails.
    pub fn failing_language_reads(mut self) -> Self {
        self.fail_language_reads = true;
        self
    }

    /// The wrapped store, without faults.
    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }
}

fn injected(what: &str) -> Error {
    Error::Store(anyhow!("injected {} failure", what))
}

#[async_trait]
impl Store for FaultyStore {
    async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        self.inner.get_project(id).await
    }

    async fn upsert_project(&self, project: Project) -> Result<Project> {
        self.inner.upsert_project(project).await
    }

    async fn list_languages(&self, project_id: &str) -> Result<Vec<Language>> {
        if self.fail_language_reads {
            return Err(injected("language read"));
        }
        self.inner.list_languages(project_id).await
    }

    async fn get_language(&self, id: &str) -> Result<Option<Language>> {
        self.inner.get_language(id).await
    }

    async fn insert_language(&self, language: Language) -> Result<Language> {
        self.inner.insert_language(language).await
    }

    async fn update_language(&self, language: Language) -> Result<Language> {
        self.inner.update_language(language).await
    }

    async fn list_keys(&self, project_id: &str) -> Result<Vec<TranslationKey>> {
        self.inner.list_keys(project_id).await
    }

    async fn get_key(&self, id: &str) -> Result<Option<TranslationKey>> {
        self.inner.get_key(id).await
    }

    async fn find_key(
        &self,
        project_id: &str,
        namespace: &str,
        key: &str,
    ) -> Result<Option<TranslationKey>> {
        self.inner.find_key(project_id, namespace, key).await
    }

    async fn insert_key(&self, key: TranslationKey) -> Result<TranslationKey> {
        self.inner.insert_key(key).await
    }

    async fn update_key(&self, key: TranslationKey) -> Result<TranslationKey> {
        self.inner.update_key(key).await
    }

    async fn delete_key(&self, id: &str) -> Result<bool> {
        self.inner.delete_key(id).await
    }

    async fn get_translation(
        &self,
        key_id: &str,
        language_code: &str,
    ) -> Result<Option<Translation>> {
        self.inner.get_translation(key_id, language_code).await
    }

    async fn list_translations_for_key(&self, key_id: &str) -> Result<Vec<Translation>> {
        self.inner.list_translations_for_key(key_id).await
    }

    async fn list_translations_for_project(&self, project_id: &str) -> Result<Vec<Translation>> {
        self.inner.list_translations_for_project(project_id).await
    }

    async fn insert_translation(&self, translation: Translation) -> Result<Translation> {
        self.inner.insert_translation(translation).await
    }

    async fn update_translation(&self, translation: Translation) -> Result<Translation> {
        self.inner.update_translation(translation).await
    }

    async fn delete_translations_for_key(&self, key_id: &str) -> Result<u64> {
        self.inner.delete_translations_for_key(key_id).await
    }

    async fn append_history(&self, entry: HistoryEntry) -> Result<()> {
        if self.fail_history {
            return Err(injected("history write"));
        }
        self.inner.append_history(entry).await
    }

    async fn history_for_key(
        &self,
        key_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<HistoryEntry>> {
        self.inner.history_for_key(key_id, limit).await
    }

    async fn insert_api_key(&self, key: ApiKey) -> Result<ApiKey> {
        self.inner.insert_api_key(key).await
    }

    async fn list_api_keys(&self, project_id: &str) -> Result<Vec<ApiKey>> {
        self.inner.list_api_keys(project_id).await
    }

    async fn delete_api_key(&self, id: &str, user_id: &str) -> Result<bool> {
        self.inner.delete_api_key(id, user_id).await
    }

    async fn touch_api_key(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        self.inner.touch_api_key(id, at).await
    }

    async fn health_check(&self) -> Result<()> {
        self.inner.health_check().await
    }

    fn backend_name(&self) -> &'static str {
        "faulty"
    }
}
