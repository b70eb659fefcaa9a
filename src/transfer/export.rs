use super::csv::quote;
use super::{Entry, ExportFormat};
use crate::error::Result;
use crate::model::KeyView;
use anyhow::Context;
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Name of the per-language file inside the JSON archive.
pub const ARCHIVE_FILE_NAME: &str = "common.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl From<&KeyView> for Entry {
    fn from(view: &KeyView) -> Self {
        Self {
            key: view.key.key.clone(),
            translations: view.translations.clone(),
        }
    }
}

/// Serialize `entries` restricted to `languages`. Missing values export as
/// empty strings. `languages` should come from
/// [`select_languages`](super::select_languages).
pub fn export(entries: &[Entry], languages: &[String], format: ExportFormat) -> Result<ExportFile> {
    let file = match format {
        ExportFormat::Json => ExportFile {
            file_name: "translations.zip".to_string(),
            content_type: "application/zip",
            bytes: to_archive(entries, languages)?,
        },
        ExportFormat::JsonFlat => ExportFile {
            file_name: "translations.json".to_string(),
            content_type: "application/json",
            bytes: to_flat_json(entries, languages)?.into_bytes(),
        },
        ExportFormat::Csv => ExportFile {
            file_name: "translations.csv".to_string(),
            content_type: "text/csv",
            bytes: to_csv(entries, languages).into_bytes(),
        },
        ExportFormat::Yaml => ExportFile {
            file_name: "translations.yaml".to_string(),
            content_type: "text/yaml",
            bytes: to_yaml(entries, languages).into_bytes(),
        },
    };
    Ok(file)
}

fn value<'a>(entry: &'a Entry, language: &str) -> &'a str {
    entry
        .translations
        .get(language)
        .map(String::as_str)
        .unwrap_or("")
}

fn to_archive(entries: &[Entry], languages: &[String]) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for language in languages {
        let per_language: BTreeMap<&str, &str> = entries
            .iter()
            .map(|e| (e.key.as_str(), value(e, language)))
            .collect();
        let json = serde_json::to_string_pretty(&per_language)
            .context("Failed to serialize language file")?;

        writer
            .start_file(format!("{}/{}", language, ARCHIVE_FILE_NAME), options)
            .context("Failed to start archive entry")?;
        writer
            .write_all(json.as_bytes())
            .context("Failed to write archive entry")?;
    }

    let cursor = writer.finish().context("Failed to finish archive")?;
    Ok(cursor.into_inner())
}

fn to_flat_json(entries: &[Entry], languages: &[String]) -> Result<String> {
    let table: BTreeMap<&str, BTreeMap<&str, &str>> = entries
        .iter()
        .map(|e| {
            let row = languages
                .iter()
                .map(|l| (l.as_str(), value(e, l)))
                .collect();
            (e.key.as_str(), row)
        })
        .collect();
    Ok(serde_json::to_string_pretty(&table).context("Failed to serialize translations")?)
}

/// Header unquoted, every data field quoted, `\n` between lines.
pub fn to_csv(entries: &[Entry], languages: &[String]) -> String {
    let header = std::iter::once("key")
        .chain(languages.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(",");

    let rows = entries.iter().map(|e| {
        std::iter::once(quote(&e.key))
            .chain(languages.iter().map(|l| quote(value(e, l))))
            .collect::<Vec<_>>()
            .join(",")
    });

    std::iter::once(header)
        .chain(rows)
        .collect::<Vec<_>>()
        .join("\n")
}

fn yaml_escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Two-space indented mapping with double-quoted values.
pub fn to_yaml(entries: &[Entry], languages: &[String]) -> String {
    let mut lines = Vec::with_capacity(entries.len() * (languages.len() + 1));
    for entry in entries {
        lines.push(format!("{}:", entry.key));
        for language in languages {
            lines.push(format!("  {}: \"{}\"", language, yaml_escape(value(entry, language))));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn entry(key: &str, pairs: &[(&str, &str)]) -> Entry {
        Entry {
            key: key.to_string(),
            translations: pairs
                .iter()
                .map(|(l, v)| (l.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn langs(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_csv_exact_output() {
        let entries = vec![
            entry("a.b", &[("en", "Hi"), ("fr", "Salut")]),
            entry("c.d", &[("en", "Bye"), ("fr", "Au revoir")]),
        ];
        assert_eq!(
            to_csv(&entries, &langs(&["en", "fr"])),
            "key,en,fr\n\"a.b\",\"Hi\",\"Salut\"\n\"c.d\",\"Bye\",\"Au revoir\""
        );
    }

    #[test]
    fn test_csv_escapes_quotes_and_fills_missing() {
        let entries = vec![entry("quote", &[("en", r#"He said "no""#)])];
        assert_eq!(
            to_csv(&entries, &langs(&["en", "de"])),
            "key,en,de\n\"quote\",\"He said \"\"no\"\"\",\"\""
        );
    }

    #[test]
    fn test_yaml_layout() {
        let entries = vec![entry("a.b", &[("en", "Hi \"there\""), ("fr", "Salut")])];
        assert_eq!(
            to_yaml(&entries, &langs(&["en", "fr"])),
            "a.b:\n  en: \"Hi \\\"there\\\"\"\n  fr: \"Salut\""
        );
    }

    #[test]
    fn test_flat_json_includes_empty_values() {
        let entries = vec![entry("a.b", &[("en", "Hi")])];
        let json = to_flat_json(&entries, &langs(&["en", "fr"])).expect("json");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed["a.b"]["en"], "Hi");
        assert_eq!(parsed["a.b"]["fr"], "");
    }

    #[test]
    fn test_archive_has_one_file_per_language() {
        let entries = vec![
            entry("a.b", &[("en", "Hi"), ("fr", "Salut")]),
            entry("c.d", &[("en", "Bye")]),
        ];
        let file = export(&entries, &langs(&["en", "fr"]), ExportFormat::Json).expect("export");
        assert_eq!(file.file_name, "translations.zip");

        let mut archive = zip::ZipArchive::new(Cursor::new(file.bytes)).expect("zip");
        assert_eq!(archive.len(), 2);

        let mut fr = String::new();
        archive
            .by_name("fr/common.json")
            .expect("fr file")
            .read_to_string(&mut fr)
            .expect("read");
        let parsed: BTreeMap<String, String> = serde_json::from_str(&fr).expect("parse");
        assert_eq!(parsed["a.b"], "Salut");
        assert_eq!(parsed["c.d"], "");
        assert!(fr.contains("\n  \"a.b\""));
    }
}
