//! Import and export of key tables.
//!
//! Everything here works on an in-memory table of `key -> {language: value}`
//! rows. Reading and writing the store is left to [`import::Importer`] and the
//! callers of [`export::export`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

mod csv;
pub mod export;
pub mod import;

pub use export::{export, ExportFile};
pub use import::{parse, preview, ImportPreview, ImportReport, Importer};

/// One row of an import or export table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub key: String,
    pub translations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// Zip archive with one `<lang>/common.json` per language.
    Json,
    /// A single JSON object `key -> {lang: value}`.
    JsonFlat,
    Csv,
    Yaml,
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" | "zip" => Ok(Self::Json),
            "json_flat" | "json-flat" | "flat" => Ok(Self::JsonFlat),
            "csv" => Ok(Self::Csv),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(Error::UnsupportedFormat(format!(
                "unknown export format '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportFormat {
    Json,
    /// The archive produced by [`ExportFormat::Json`].
    JsonArchive,
    Csv,
    Yaml,
}

impl FromStr for ImportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "zip" | "json_archive" | "archive" => Ok(Self::JsonArchive),
            "csv" => Ok(Self::Csv),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(Error::UnsupportedFormat(format!(
                "unknown import format '{}'",
                other
            ))),
        }
    }
}

/// The languages an export covers: the base language first and always
/// present, then the requested codes in order, without duplicates.
pub fn select_languages(base: &str, requested: &[String]) -> Vec<String> {
    let mut selected = vec![base.to_string()];
    for code in requested {
        let code = code.trim();
        if !code.is_empty() && !selected.iter().any(|c| c == code) {
            selected.push(code.to_string());
        }
    }
    selected
}
