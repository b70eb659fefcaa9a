//! Postgres-backed store.
//!
//! Uses a `sqlx::PgPool`; the schema lives in `migrations/` and is applied on
//! connect. Uniqueness of `(project_id, code)`, `(project_id, namespace, key)`
//! and `(key_id, language_code)` is enforced by the database and surfaced as
//! the matching domain errors.
//!
//! Database URLs may carry credentials: never log them.

use super::Store;
use crate::error::{Error, Result};
use crate::model::{
    ApiKey, HistoryEntry, KeyStatus, Language, Project, Translation, TranslationKey,
};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use std::time::Duration;
use tracing::info;

pub struct PostgresStore {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct DbProject {
    id: String,
    name: String,
    translate_api_key: Option<String>,
    auto_translate: bool,
    created_at: DateTime<Utc>,
}

impl From<DbProject> for Project {
    fn from(row: DbProject) -> Self {
        Project {
            id: row.id,
            name: row.name,
            translate_api_key: row.translate_api_key,
            auto_translate: row.auto_translate,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct DbLanguage {
    id: String,
    project_id: String,
    code: String,
    name: String,
    is_base: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<DbLanguage> for Language {
    fn from(row: DbLanguage) -> Self {
        Language {
            id: row.id,
            project_id: row.project_id,
            code: row.code,
            name: row.name,
            is_base: row.is_base,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct DbKey {
    id: String,
    project_id: String,
    namespace: String,
    key: String,
    description: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    created_by: Option<String>,
    updated_by: Option<String>,
}

impl From<DbKey> for TranslationKey {
    fn from(row: DbKey) -> Self {
        TranslationKey {
            id: row.id,
            project_id: row.project_id,
            namespace: row.namespace,
            key: row.key,
            description: row.description,
            status: KeyStatus::parse(&row.status),
            created_at: row.created_at,
            updated_at: row.updated_at,
            created_by: row.created_by,
            updated_by: row.updated_by,
        }
    }
}

#[derive(Debug, FromRow)]
struct DbTranslation {
    id: String,
    key_id: String,
    language_code: String,
    value: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    created_by: Option<String>,
    updated_by: Option<String>,
}

impl From<DbTranslation> for Translation {
    fn from(row: DbTranslation) -> Self {
        Translation {
            id: row.id,
            key_id: row.key_id,
            language_code: row.language_code,
            value: row.value,
            created_at: row.created_at,
            updated_at: row.updated_at,
            created_by: row.created_by,
            updated_by: row.updated_by,
        }
    }
}

#[derive(Debug, FromRow)]
struct DbHistory {
    id: String,
    key_id: String,
    translation_id: Option<String>,
    action: String,
    field: String,
    old_value: Option<String>,
    new_value: Option<String>,
    actor: String,
    performed_at: DateTime<Utc>,
}

impl From<DbHistory> for HistoryEntry {
    fn from(row: DbHistory) -> Self {
        HistoryEntry {
            id: row.id,
            key_id: row.key_id,
            translation_id: row.translation_id,
            action: row.action,
            field: row.field,
            old_value: row.old_value,
            new_value: row.new_value,
            actor: row.actor,
            timestamp: row.performed_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct DbApiKey {
    id: String,
    key: String,
    name: String,
    project_id: String,
    user_id: String,
    created_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
    is_active: bool,
}

impl From<DbApiKey> for ApiKey {
    fn from(row: DbApiKey) -> Self {
        ApiKey {
            id: row.id,
            key: row.key,
            name: row.name,
            project_id: row.project_id,
            user_id: row.user_id,
            created_at: row.created_at,
            last_used_at: row.last_used_at,
            is_active: row.is_active,
        }
    }
}

const KEY_COLUMNS: &str = "id, project_id, namespace, key, description, status, \
     created_at, updated_at, created_by, updated_by";
const TRANSLATION_COLUMNS: &str = "id, key_id, language_code, value, created_at, updated_at, \
     created_by, updated_by";

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |err| Error::Store(anyhow::Error::new(err).context(context))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

impl PostgresStore {
    /// Connect, run pending migrations, and return the store.
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .context("Failed to connect to Postgres")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;

        info!("Postgres store ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        let row = sqlx::query_as::<_, DbProject>(
            "SELECT id, name, translate_api_key, auto_translate, created_at
             FROM projects WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to load project"))?;
        Ok(row.map(Project::from))
    }

    async fn upsert_project(&self, project: Project) -> Result<Project> {
        sqlx::query(
            "INSERT INTO projects (id, name, translate_api_key, auto_translate, created_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                translate_api_key = EXCLUDED.translate_api_key,
                auto_translate = EXCLUDED.auto_translate",
        )
        .bind(&project.id)
        .bind(&project.name)
        .bind(&project.translate_api_key)
        .bind(project.auto_translate)
        .bind(project.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to save project"))?;
        Ok(project)
    }

    async fn list_languages(&self, project_id: &str) -> Result<Vec<Language>> {
        let rows = sqlx::query_as::<_, DbLanguage>(
            "SELECT id, project_id, code, name, is_base, is_active, created_at
             FROM languages WHERE project_id = $1 ORDER BY created_at ASC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list languages"))?;
        Ok(rows.into_iter().map(Language::from).collect())
    }

    async fn get_language(&self, id: &str) -> Result<Option<Language>> {
        let row = sqlx::query_as::<_, DbLanguage>(
            "SELECT id, project_id, code, name, is_base, is_active, created_at
             FROM languages WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to load language"))?;
        Ok(row.map(Language::from))
    }

    async fn insert_language(&self, language: Language) -> Result<Language> {
        let result = sqlx::query(
            "INSERT INTO languages (id, project_id, code, name, is_base, is_active, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&language.id)
        .bind(&language.project_id)
        .bind(&language.code)
        .bind(&language.name)
        .bind(language.is_base)
        .bind(language.is_active)
        .bind(language.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(language),
            Err(err) if is_unique_violation(&err) => Err(Error::DuplicateCode(language.code)),
            Err(err) => Err(db_error("Failed to insert language")(err)),
        }
    }

    async fn update_language(&self, language: Language) -> Result<Language> {
        let result = sqlx::query(
            "UPDATE languages SET name = $2, is_base = $3, is_active = $4 WHERE id = $1",
        )
        .bind(&language.id)
        .bind(&language.name)
        .bind(language.is_base)
        .bind(language.is_active)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to update language"))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("language {}", language.id)));
        }
        Ok(language)
    }

    async fn list_keys(&self, project_id: &str) -> Result<Vec<TranslationKey>> {
        let rows = sqlx::query_as::<_, DbKey>(&format!(
            "SELECT {KEY_COLUMNS} FROM translation_keys WHERE project_id = $1
             ORDER BY created_at ASC"
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list translation keys"))?;
        Ok(rows.into_iter().map(TranslationKey::from).collect())
    }

    async fn get_key(&self, id: &str) -> Result<Option<TranslationKey>> {
        let row = sqlx::query_as::<_, DbKey>(&format!(
            "SELECT {KEY_COLUMNS} FROM translation_keys WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to load translation key"))?;
        Ok(row.map(TranslationKey::from))
    }

    async fn find_key(
        &self,
        project_id: &str,
        namespace: &str,
        key: &str,
    ) -> Result<Option<TranslationKey>> {
        let row = sqlx::query_as::<_, DbKey>(&format!(
            "SELECT {KEY_COLUMNS} FROM translation_keys
             WHERE project_id = $1 AND namespace = $2 AND key = $3"
        ))
        .bind(project_id)
        .bind(namespace)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to look up translation key"))?;
        Ok(row.map(TranslationKey::from))
    }

    async fn insert_key(&self, key: TranslationKey) -> Result<TranslationKey> {
        let result = sqlx::query(&format!(
            "INSERT INTO translation_keys ({KEY_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(&key.id)
        .bind(&key.project_id)
        .bind(&key.namespace)
        .bind(&key.key)
        .bind(&key.description)
        .bind(key.status.as_str())
        .bind(key.created_at)
        .bind(key.updated_at)
        .bind(&key.created_by)
        .bind(&key.updated_by)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(key),
            Err(err) if is_unique_violation(&err) => Err(Error::DuplicateKey(key.key)),
            Err(err) => Err(db_error("Failed to insert translation key")(err)),
        }
    }

    async fn update_key(&self, key: TranslationKey) -> Result<TranslationKey> {
        let result = sqlx::query(
            "UPDATE translation_keys SET
                namespace = $2, key = $3, description = $4, status = $5,
                updated_at = $6, updated_by = $7
             WHERE id = $1",
        )
        .bind(&key.id)
        .bind(&key.namespace)
        .bind(&key.key)
        .bind(&key.description)
        .bind(key.status.as_str())
        .bind(key.updated_at)
        .bind(&key.updated_by)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => {
                Err(Error::NotFound(format!("key {}", key.id)))
            }
            Ok(_) => Ok(key),
            Err(err) if is_unique_violation(&err) => Err(Error::DuplicateKey(key.key)),
            Err(err) => Err(db_error("Failed to update translation key")(err)),
        }
    }

    async fn delete_key(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM translation_keys WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to delete translation key"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_translation(
        &self,
        key_id: &str,
        language_code: &str,
    ) -> Result<Option<Translation>> {
        let row = sqlx::query_as::<_, DbTranslation>(&format!(
            "SELECT {TRANSLATION_COLUMNS} FROM translations
             WHERE key_id = $1 AND language_code = $2"
        ))
        .bind(key_id)
        .bind(language_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to load translation"))?;
        Ok(row.map(Translation::from))
    }

    async fn list_translations_for_key(&self, key_id: &str) -> Result<Vec<Translation>> {
        let rows = sqlx::query_as::<_, DbTranslation>(&format!(
            "SELECT {TRANSLATION_COLUMNS} FROM translations WHERE key_id = $1
             ORDER BY created_at ASC"
        ))
        .bind(key_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list translations"))?;
        Ok(rows.into_iter().map(Translation::from).collect())
    }

    async fn list_translations_for_project(&self, project_id: &str) -> Result<Vec<Translation>> {
        let rows = sqlx::query_as::<_, DbTranslation>(
            "SELECT t.id, t.key_id, t.language_code, t.value, t.created_at, t.updated_at,
                    t.created_by, t.updated_by
             FROM translations t
             JOIN translation_keys k ON k.id = t.key_id
             WHERE k.project_id = $1
             ORDER BY t.created_at ASC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list project translations"))?;
        Ok(rows.into_iter().map(Translation::from).collect())
    }

    async fn insert_translation(&self, translation: Translation) -> Result<Translation> {
        sqlx::query(&format!(
            "INSERT INTO translations ({TRANSLATION_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(&translation.id)
        .bind(&translation.key_id)
        .bind(&translation.language_code)
        .bind(&translation.value)
        .bind(translation.created_at)
        .bind(translation.updated_at)
        .bind(&translation.created_by)
        .bind(&translation.updated_by)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to insert translation"))?;
        Ok(translation)
    }

    async fn update_translation(&self, translation: Translation) -> Result<Translation> {
        let result = sqlx::query(
            "UPDATE translations SET value = $2, updated_at = $3, updated_by = $4 WHERE id = $1",
        )
        .bind(&translation.id)
        .bind(&translation.value)
        .bind(translation.updated_at)
        .bind(&translation.updated_by)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to update translation"))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("translation {}", translation.id)));
        }
        Ok(translation)
    }

    async fn delete_translations_for_key(&self, key_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM translations WHERE key_id = $1")
            .bind(key_id)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to delete translations"))?;
        Ok(result.rows_affected())
    }

    async fn append_history(&self, entry: HistoryEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO translation_history
                (id, key_id, translation_id, action, field, old_value, new_value, actor, performed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&entry.id)
        .bind(&entry.key_id)
        .bind(&entry.translation_id)
        .bind(&entry.action)
        .bind(&entry.field)
        .bind(&entry.old_value)
        .bind(&entry.new_value)
        .bind(&entry.actor)
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to record history"))?;
        Ok(())
    }

    async fn history_for_key(
        &self,
        key_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<HistoryEntry>> {
        let limit = limit.map(|l| l as i64).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, DbHistory>(
            "SELECT id, key_id, translation_id, action, field, old_value, new_value, actor,
                    performed_at
             FROM translation_history WHERE key_id = $1
             ORDER BY seq DESC LIMIT $2",
        )
        .bind(key_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to load history"))?;
        Ok(rows.into_iter().map(HistoryEntry::from).collect())
    }

    async fn insert_api_key(&self, key: ApiKey) -> Result<ApiKey> {
        sqlx::query(
            "INSERT INTO api_keys
                (id, key, name, project_id, user_id, created_at, last_used_at, is_active)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&key.id)
        .bind(&key.key)
        .bind(&key.name)
        .bind(&key.project_id)
        .bind(&key.user_id)
        .bind(key.created_at)
        .bind(key.last_used_at)
        .bind(key.is_active)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to insert API key"))?;
        Ok(key)
    }

    async fn list_api_keys(&self, project_id: &str) -> Result<Vec<ApiKey>> {
        let rows = sqlx::query_as::<_, DbApiKey>(
            "SELECT id, key, name, project_id, user_id, created_at, last_used_at, is_active
             FROM api_keys WHERE project_id = $1 ORDER BY created_at DESC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list API keys"))?;
        Ok(rows.into_iter().map(ApiKey::from).collect())
    }

    async fn delete_api_key(&self, id: &str, user_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to delete API key"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn touch_api_key(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE api_keys SET last_used_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to update API key usage"))?;
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error("Postgres health check failed"))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
