//! Machine-translation gateway.
//!
//! Talks to a Google Translate v2 compatible endpoint: one request per target
//! language, fanned out concurrently, each retried on transient failures.
//! `translate` never fails; per-language errors are logged and the language is
//! left out of the result. The bulk helpers persist results through the
//! value store.

use crate::error::{Error, Result};
use crate::model::TranslationKey;
use crate::retry::{with_retry_if, RetryConfig};
use crate::store::SharedStore;
use crate::translations::ValueStore;
use crate::validator::TranslationValidator;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;
use tracing::{debug, info, warn};

pub const DEFAULT_TRANSLATE_API_URL: &str =
    "https://translation.googleapis.com/language/translate/v2";

/// Keys translated at once during a bulk language fill.
const BULK_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranslateRequest {
    pub source_language: String,
    pub target_languages: Vec<String>,
    pub text: String,
    /// Overrides the project's stored credential.
    #[serde(default)]
    pub credential: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

/// Result of a fan-out. The map contains the source language's own text;
/// `success` is true when at least one target language came back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TranslateOutcome {
    pub translations: BTreeMap<String, String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TranslateOutcome {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Counts reported back for bulk operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkReport {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Serialize)]
struct ProviderRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    data: ProviderData,
}

#[derive(Debug, Deserialize)]
struct ProviderData {
    translations: Vec<ProviderTranslation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderTranslation {
    translated_text: String,
}

#[derive(Debug, ThisError)]
enum ProviderError {
    #[error("translation API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("translation request failed: {0}")]
    Transport(String),

    #[error("unexpected translation response: {0}")]
    Decode(String),

    #[error("translation API returned empty text")]
    Empty,
}

/// Retry 429 and 5xx responses and transport failures. Other 4xx responses
/// (bad credential, unsupported language), undecodable bodies and empty
/// output are final.
fn is_retryable_error(error: &ProviderError) -> bool {
    match error {
        ProviderError::Status { status, .. } => *status == 429 || *status >= 500,
        ProviderError::Transport(_) => true,
        ProviderError::Decode(_) | ProviderError::Empty => false,
    }
}

#[derive(Clone)]
pub struct Gateway {
    client: reqwest::Client,
    api_url: String,
    store: SharedStore,
    values: ValueStore,
    retry: RetryConfig,
}

impl Gateway {
    pub fn new(client: reqwest::Client, api_url: impl Into<String>, store: SharedStore) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            values: ValueStore::new(store.clone()),
            store,
            retry: RetryConfig::translation(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Explicit credential, then the project's stored secret.
    async fn resolve_credential(
        &self,
        explicit: Option<&str>,
        project_id: Option<&str>,
    ) -> Result<String> {
        if let Some(credential) = explicit.map(str::trim).filter(|c| !c.is_empty()) {
            return Ok(credential.to_string());
        }
        if let Some(project_id) = project_id {
            let stored = self
                .store
                .get_project(project_id)
                .await?
                .and_then(|p| p.translate_api_key)
                .filter(|c| !c.trim().is_empty());
            if let Some(credential) = stored {
                return Ok(credential);
            }
        }
        Err(Error::MissingCredential)
    }

    async fn call_provider(
        &self,
        credential: &str,
        source: &str,
        target: &str,
        text: &str,
        retry: &RetryConfig,
    ) -> std::result::Result<String, ProviderError> {
        let body = ProviderRequest {
            q: text,
            source,
            target,
            format: "text",
        };

        with_retry_if(
            retry,
            &format!("Translation {} -> {}", source, target),
            || async {
                let response = self
                    .client
                    .post(&self.api_url)
                    .query(&[("key", credential)])
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| ProviderError::Transport(e.to_string()))?;

                if !response.status().is_success() {
                    let status = response.status().as_u16();
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
                    return Err(ProviderError::Status { status, body });
                }

                let parsed: ProviderResponse = response
                    .json()
                    .await
                    .map_err(|e| ProviderError::Decode(e.to_string()))?;

                let text = parsed
                    .data
                    .translations
                    .into_iter()
                    .next()
                    .map(|t| t.translated_text)
                    .ok_or_else(|| ProviderError::Decode("no translations returned".to_string()))?;
                if text.trim().is_empty() {
                    return Err(ProviderError::Empty);
                }
                Ok(text)
            },
            is_retryable_error,
        )
        .await
    }

    async fn fan_out(
        &self,
        credential: &str,
        source: &str,
        targets: &[String],
        text: &str,
    ) -> BTreeMap<String, String> {
        let targets: Vec<&String> = targets.iter().filter(|t| t.as_str() != source).collect();

        let calls = targets.iter().map(|target| async move {
            let result = self
                .call_provider(credential, source, target, text, &self.retry)
                .await;
            (target.to_string(), result)
        });

        let mut translated = BTreeMap::new();
        for (target, result) in join_all(calls).await {
            match result {
                Ok(value) => {
                    let report = TranslationValidator::validate(text, &value);
                    if !report.is_clean() {
                        warn!(
                            "Translation {} -> {} has issues: errors={:?} warnings={:?}",
                            source, target, report.errors, report.warnings
                        );
                    }
                    translated.insert(target, value);
                }
                Err(e) => warn!("Translation {} -> {} failed: {}", source, target, e),
            }
        }
        translated
    }

    /// Translate `text` into every target language.
    pub async fn translate(&self, request: TranslateRequest) -> TranslateOutcome {
        if request.text.trim().is_empty() {
            return TranslateOutcome::failed("Text is required");
        }

        let credential = match self
            .resolve_credential(request.credential.as_deref(), request.project_id.as_deref())
            .await
        {
            Ok(c) => c,
            Err(e) => return TranslateOutcome::failed(e.to_string()),
        };

        let mut translations = self
            .fan_out(
                &credential,
                &request.source_language,
                &request.target_languages,
                &request.text,
            )
            .await;
        let success = !translations.is_empty();
        translations.insert(request.source_language.clone(), request.text.clone());

        TranslateOutcome {
            translations,
            success,
            error: if success {
                None
            } else {
                Some("No target language could be translated".to_string())
            },
        }
    }

    /// Check a credential by translating "Hello" into French once.
    pub async fn test_credential(&self, credential: &str) -> bool {
        if credential.trim().is_empty() {
            return false;
        }
        match self
            .call_provider(credential, "en", "fr", "Hello", &RetryConfig::once())
            .await
        {
            Ok(_) => true,
            Err(e) => {
                debug!("Credential check failed: {}", e);
                false
            }
        }
    }

    async fn active_targets(&self, project_id: &str) -> Result<Vec<String>> {
        Ok(self
            .store
            .list_languages(project_id)
            .await?
            .into_iter()
            .filter(|l| l.is_active && !l.is_base)
            .map(|l| l.code)
            .collect())
    }

    async fn base_text(&self, key: &TranslationKey, base: &str) -> Result<Option<String>> {
        Ok(self
            .store
            .get_translation(&key.id, base)
            .await?
            .map(|t| t.value)
            .filter(|v| !v.trim().is_empty()))
    }

    /// Translate one key's base text and store the results. Targets default
    /// to every active non-base language; existing values are overwritten.
    pub async fn translate_key(
        &self,
        key_id: &str,
        targets: Option<Vec<String>>,
        actor: &str,
    ) -> Result<BulkReport> {
        let key = self
            .store
            .get_key(key_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("key {}", key_id)))?;
        let base = self.values.base_language(&key.project_id).await?;
        let text = self
            .base_text(&key, &base)
            .await?
            .ok_or(Error::EmptyBaseText)?;
        let credential = self.resolve_credential(None, Some(&key.project_id)).await?;

        let targets = match targets {
            Some(t) => t,
            None => self.active_targets(&key.project_id).await?,
        };
        let mut report = BulkReport {
            skipped: targets.iter().filter(|t| **t == base).count(),
            ..Default::default()
        };

        let translated = self.fan_out(&credential, &base, &targets, &text).await;
        for target in targets.iter().filter(|t| **t != base) {
            let Some(value) = translated.get(target) else {
                report.failed += 1;
                continue;
            };
            match self.values.upsert(&key.id, target, value, actor).await {
                Ok(_) => report.succeeded += 1,
                Err(e) => {
                    warn!("Failed to store {} translation for '{}': {}", target, key.key, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Auto-translated '{}': {} ok, {} failed",
            key.key, report.succeeded, report.failed
        );
        Ok(report)
    }

    /// Fill one language for every key of a project. Keys that already have a
    /// non-empty value in that language, or no base text, are skipped.
    pub async fn translate_language(
        &self,
        project_id: &str,
        code: &str,
        actor: &str,
    ) -> Result<BulkReport> {
        let base = self.values.base_language(project_id).await?;
        let keys = self.store.list_keys(project_id).await?;
        if code == base {
            return Ok(BulkReport {
                skipped: keys.len(),
                ..Default::default()
            });
        }
        let credential = self.resolve_credential(None, Some(project_id)).await?;

        let mut existing: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for t in self.store.list_translations_for_project(project_id).await? {
            existing
                .entry(t.key_id)
                .or_default()
                .insert(t.language_code, t.value);
        }

        let mut report = BulkReport::default();
        let mut pending = Vec::new();
        for key in keys {
            let values = existing.get(&key.id);
            let has_target = values
                .and_then(|v| v.get(code))
                .is_some_and(|v| !v.trim().is_empty());
            let text = values
                .and_then(|v| v.get(&base))
                .filter(|v| !v.trim().is_empty())
                .cloned();
            match text {
                Some(text) if !has_target => pending.push((key, text)),
                _ => report.skipped += 1,
            }
        }

        let results: Vec<bool> = stream::iter(pending)
            .map(|(key, text)| {
                let credential = credential.as_str();
                let base = base.as_str();
                async move {
                    let translated = match self
                        .call_provider(credential, base, code, &text, &self.retry)
                        .await
                    {
                        Ok(v) => v,
                        Err(e) => {
                            warn!("Translation of '{}' into {} failed: {}", key.key, code, e);
                            return false;
                        }
                    };
                    match self.values.upsert(&key.id, code, &translated, actor).await {
                        Ok(_) => true,
                        Err(e) => {
                            warn!("Failed to store {} translation for '{}': {}", code, key.key, e);
                            false
                        }
                    }
                }
            })
            .buffer_unordered(BULK_CONCURRENCY)
            .collect()
            .await;

        report.succeeded = results.iter().filter(|ok| **ok).count();
        report.failed = results.len() - report.succeeded;
        info!(
            "Bulk translation into {}: {} ok, {} failed, {} skipped",
            code, report.succeeded, report.failed, report.skipped
        );
        Ok(report)
    }
}
