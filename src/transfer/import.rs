use super::csv::parse_records;
use super::export::ARCHIVE_FILE_NAME;
use super::{Entry, ImportFormat};
use crate::error::{Error, Result};
use crate::keys::{KeyStore, NewKey};
use crate::model::{KeyStatus, DEFAULT_NAMESPACE};
use crate::store::SharedStore;
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read};
use tracing::{info, warn};

const SAMPLE_SIZE: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportPreview {
    pub key_count: usize,
    pub detected_languages: Vec<String>,
    /// Up to three `key -> base text` pairs.
    pub sample_entries: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Parse an uploaded file into import entries.
pub fn parse(format: ImportFormat, bytes: &[u8]) -> Result<Vec<Entry>> {
    match format {
        ImportFormat::Json => parse_json(as_text(bytes)?),
        ImportFormat::JsonArchive => parse_archive(bytes),
        ImportFormat::Csv => parse_csv(as_text(bytes)?),
        ImportFormat::Yaml => Err(Error::UnsupportedFormat(
            "YAML parsing is not fully implemented. Please use JSON or CSV format.".to_string(),
        )),
    }
}

fn as_text(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|_| Error::Malformed("file is not valid UTF-8".to_string()))
}

fn string_map(value: &serde_json::Value, context: &str) -> Result<BTreeMap<String, String>> {
    let object = value
        .as_object()
        .ok_or_else(|| Error::Malformed(format!("{} must be an object", context)))?;
    object
        .iter()
        .map(|(k, v)| match v {
            serde_json::Value::String(s) => Ok((k.clone(), s.clone())),
            serde_json::Value::Null => Ok((k.clone(), String::new())),
            _ => Err(Error::Malformed(format!("{}.{} must be a string", context, k))),
        })
        .collect()
}

/// `{"key": {"en": "...", "fr": "..."}}`
fn parse_json(text: &str) -> Result<Vec<Entry>> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| Error::Malformed(format!("Invalid JSON format: {}", e)))?;
    let object = value
        .as_object()
        .ok_or_else(|| Error::Malformed("Invalid JSON format".to_string()))?;

    object
        .iter()
        .map(|(key, row)| {
            Ok(Entry {
                key: key.clone(),
                translations: string_map(row, key)?,
            })
        })
        .collect()
}

/// Zip of `<lang>/<file>.json`, each a flat `key -> value` object.
fn parse_archive(bytes: &[u8]) -> Result<Vec<Entry>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Error::Malformed(format!("Invalid archive: {}", e)))?;

    let mut table: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    for index in 0..archive.len() {
        let mut file = archive
            .by_index(index)
            .map_err(|e| Error::Malformed(format!("Invalid archive entry: {}", e)))?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        let Some((language, file_name)) = name.split_once('/') else {
            warn!("Skipping archive entry outside a language folder: {}", name);
            continue;
        };
        if !file_name.ends_with(".json") {
            continue;
        }
        if file_name != ARCHIVE_FILE_NAME {
            warn!("Reading non-default namespace file {}", name);
        }

        let mut text = String::new();
        file.read_to_string(&mut text)
            .map_err(|e| Error::Malformed(format!("{}: {}", name, e)))?;
        let value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| Error::Malformed(format!("{}: {}", name, e)))?;

        for (key, text) in string_map(&value, &name)? {
            table
                .entry(key)
                .or_default()
                .insert(language.to_string(), text);
        }
    }

    if table.is_empty() {
        return Err(Error::Malformed("archive contains no language files".to_string()));
    }
    Ok(table
        .into_iter()
        .map(|(key, translations)| Entry { key, translations })
        .collect())
}

/// Header `key,<codes...>`; short rows read missing cells as empty.
fn parse_csv(text: &str) -> Result<Vec<Entry>> {
    let mut records = parse_records(text).into_iter();
    let header = records.next().unwrap_or_default();
    if header.len() < 2 || header[0] != "key" {
        return Err(Error::Malformed(
            "CSV header must start with 'key' followed by language codes".to_string(),
        ));
    }
    let languages = &header[1..];

    let entries: Vec<Entry> = records
        .filter(|r| r.first().is_some_and(|k| !k.is_empty()))
        .map(|record| Entry {
            key: record[0].clone(),
            translations: languages
                .iter()
                .enumerate()
                .map(|(i, lang)| (lang.clone(), record.get(i + 1).cloned().unwrap_or_default()))
                .collect(),
        })
        .collect();

    if entries.is_empty() {
        return Err(Error::Malformed(
            "CSV file must have at least a header row and one data row".to_string(),
        ));
    }
    Ok(entries)
}

/// Summarize parsed entries before committing them.
pub fn preview(entries: &[Entry], base_language: &str) -> ImportPreview {
    let detected_languages: BTreeSet<&str> = entries
        .iter()
        .flat_map(|e| e.translations.keys().map(String::as_str))
        .collect();

    let sample_entries = entries
        .iter()
        .take(SAMPLE_SIZE)
        .filter_map(|e| {
            e.translations
                .get(base_language)
                .filter(|v| !v.is_empty())
                .map(|v| (e.key.clone(), v.clone()))
        })
        .collect();

    ImportPreview {
        key_count: entries.len(),
        detected_languages: detected_languages.into_iter().map(str::to_string).collect(),
        sample_entries,
    }
}

/// Merges parsed entries into a project.
#[derive(Clone)]
pub struct Importer {
    store: SharedStore,
    keys: KeyStore,
}

impl Importer {
    pub fn new(store: SharedStore) -> Self {
        Self {
            keys: KeyStore::new(store.clone()),
            store,
        }
    }

    /// Existing keys (matched by name) get their non-empty imported values
    /// written and end up unconfirmed; unknown keys are created. One bad entry
    /// never aborts the batch.
    pub async fn commit(
        &self,
        project_id: &str,
        namespace: Option<&str>,
        entries: Vec<Entry>,
        actor: &str,
    ) -> Result<ImportReport> {
        let namespace = namespace
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
            .unwrap_or(DEFAULT_NAMESPACE);
        let base = self.keys.values().base_language(project_id).await?;
        let mut report = ImportReport::default();

        for entry in entries {
            let key_name = entry.key.trim().to_string();
            let outcome = match self.store.find_key(project_id, namespace, &key_name).await {
                Ok(Some(existing)) => self
                    .merge(&existing.id, entry.translations, actor)
                    .await
                    .map(|_| false),
                Ok(None) => self
                    .create(project_id, namespace, &key_name, &base, entry.translations, actor)
                    .await
                    .map(|_| true),
                Err(e) => Err(e),
            };
            match outcome {
                Ok(true) => report.created += 1,
                Ok(false) => report.updated += 1,
                Err(e) => {
                    warn!("Import of '{}' failed: {}", key_name, e);
                    report.failed += 1;
                    report.errors.push(format!("{}: {}", key_name, e));
                }
            }
        }

        info!(
            "Import into {}/{}: {} created, {} updated, {} failed",
            project_id, namespace, report.created, report.updated, report.failed
        );
        Ok(report)
    }

    async fn merge(
        &self,
        key_id: &str,
        translations: BTreeMap<String, String>,
        actor: &str,
    ) -> Result<()> {
        for (language, value) in translations.iter().filter(|(_, v)| !v.trim().is_empty()) {
            self.keys.values().upsert(key_id, language, value, actor).await?;
        }

        let Some(mut key) = self.store.get_key(key_id).await? else {
            return Err(Error::NotFound(format!("key {}", key_id)));
        };
        if key.status != KeyStatus::Unconfirmed {
            key.status = KeyStatus::Unconfirmed;
            key.updated_at = Utc::now();
            key.updated_by = Some(actor.to_string());
            self.store.update_key(key).await?;
        }
        Ok(())
    }

    async fn create(
        &self,
        project_id: &str,
        namespace: &str,
        key: &str,
        base: &str,
        mut translations: BTreeMap<String, String>,
        actor: &str,
    ) -> Result<()> {
        let base_text = translations.remove(base).unwrap_or_default();
        translations.retain(|_, v| !v.trim().is_empty());
        self.keys
            .create(
                NewKey {
                    project_id: project_id.to_string(),
                    namespace: Some(namespace.to_string()),
                    key: key.to_string(),
                    description: String::new(),
                    base_text,
                    translations,
                },
                actor,
            )
            .await
            .map(|_| ())
    }
}
