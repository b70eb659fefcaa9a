//! Machine-translation output checks.
//!
//! A translated string must keep the interpolation placeholders, URLs and
//! inline markup of its source, or the application that renders it breaks.
//! Mismatches are reported, never corrected.

use regex::Regex;
use std::sync::OnceLock;

/// Validation report containing errors and warnings about a translation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Problems that make the string unusable as-is
    pub errors: Vec<String>,

    /// Differences that are probably, but not certainly, wrong
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        !self.has_errors() && !self.has_warnings()
    }
}

pub struct TranslationValidator;

static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();
static URL_REGEX: OnceLock<Regex> = OnceLock::new();
static TAG_REGEX: OnceLock<Regex> = OnceLock::new();

/// Matches `{{name}}` with optional inner whitespace.
pub fn placeholder_regex() -> &'static Regex {
    PLACEHOLDER_REGEX
        .get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("valid regex"))
}

impl TranslationValidator {
    /// Compare a translation against its source text.
    ///
    /// - a missing or invented placeholder is an error
    /// - URL and markup tag differences are warnings
    pub fn validate(original: &str, translated: &str) -> ValidationReport {
        let mut report = ValidationReport::default();

        if translated.trim().is_empty() && !original.trim().is_empty() {
            report.errors.push("Translation is empty".to_string());
            return report;
        }

        let orig_placeholders = Self::extract_placeholders(original);
        let trans_placeholders = Self::extract_placeholders(translated);
        if orig_placeholders != trans_placeholders {
            report.errors.push(format!(
                "Placeholder mismatch: original has {:?}, translation has {:?}",
                orig_placeholders, trans_placeholders
            ));
        }

        let orig_urls = Self::extract_urls(original);
        let trans_urls = Self::extract_urls(translated);
        if orig_urls != trans_urls {
            report.warnings.push(format!(
                "URL mismatch: original has {} URLs, translation has {} URLs",
                orig_urls.len(),
                trans_urls.len()
            ));
        }

        let orig_tags = Self::extract_tags(original);
        let trans_tags = Self::extract_tags(translated);
        if orig_tags != trans_tags {
            report.warnings.push(format!(
                "Markup mismatch: original has {:?}, translation has {:?}",
                orig_tags, trans_tags
            ));
        }

        report
    }

    /// Placeholder names, sorted. Word order may legitimately change.
    pub fn extract_placeholders(text: &str) -> Vec<String> {
        let mut names: Vec<String> = placeholder_regex()
            .captures_iter(text)
            .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
            .collect();
        names.sort();
        names
    }

    fn extract_urls(text: &str) -> Vec<String> {
        let regex = URL_REGEX
            .get_or_init(|| Regex::new(r#"https?://[^\s)\]"'<>]+"#).expect("valid regex"));

        let mut urls: Vec<String> = regex
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect();
        urls.sort();
        urls
    }

    fn extract_tags(text: &str) -> Vec<String> {
        let regex =
            TAG_REGEX.get_or_init(|| Regex::new(r"</?([a-zA-Z][a-zA-Z0-9]*)[^>]*>").expect("valid regex"));

        let mut tags: Vec<String> = regex
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect();
        tags.sort();
        tags
    }
}
