//! Persistent records shared by the store and the data-access modules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Code of the base language every project is created with.
pub const BASE_LANGUAGE_CODE: &str = "en";
/// Display name of the base language.
pub const BASE_LANGUAGE_NAME: &str = "English";
/// Namespace used when a caller does not name one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Generate a fresh opaque identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Tenant boundary. Owns languages, keys and API keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    /// Machine-translation provider secret. Never serialized back to clients.
    #[serde(skip_serializing)]
    pub translate_api_key: Option<String>,
    /// Whether adding a language triggers bulk auto-translation.
    pub auto_translate: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub id: String,
    pub project_id: String,
    pub code: String,
    pub name: String,
    pub is_base: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Review status of a key's translation set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    Confirmed,
    Unconfirmed,
}

impl KeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyStatus::Confirmed => "confirmed",
            KeyStatus::Unconfirmed => "unconfirmed",
        }
    }

    /// Parse a stored status. Anything unrecognised reads as unconfirmed.
    pub fn parse(value: &str) -> Self {
        match value {
            "confirmed" => KeyStatus::Confirmed,
            _ => KeyStatus::Unconfirmed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationKey {
    pub id: String,
    pub project_id: String,
    pub namespace: String,
    pub key: String,
    pub description: String,
    pub status: KeyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub id: String,
    pub key_id: String,
    pub language_code: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

/// One field-level change. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub key_id: String,
    pub translation_id: Option<String>,
    pub action: String,
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: String,
    pub key: String,
    pub name: String,
    pub project_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// A key with its translations and recent history denormalized, as the
/// dashboard table renders it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyView {
    #[serde(flatten)]
    pub key: TranslationKey,
    pub translations: BTreeMap<String, String>,
    pub history: Vec<HistoryEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_status_roundtrip() {
        assert_eq!(KeyStatus::parse("confirmed"), KeyStatus::Confirmed);
        assert_eq!(KeyStatus::parse("unconfirmed"), KeyStatus::Unconfirmed);
        assert_eq!(KeyStatus::parse("complete"), KeyStatus::Unconfirmed);
        assert_eq!(KeyStatus::Confirmed.as_str(), "confirmed");
    }

    #[test]
    fn test_key_status_serializes_lowercase() {
        let json = serde_json::to_string(&KeyStatus::Unconfirmed).expect("serialize");
        assert_eq!(json, "\"unconfirmed\"");
    }

    #[test]
    fn test_project_secret_not_serialized() {
        let project = Project {
            id: "p1".to_string(),
            name: "Demo".to_string(),
            translate_api_key: Some("super-secret".to_string()),
            auto_translate: true,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&project).expect("serialize");
        assert!(!json.contains("super-secret"));
        assert!(json.contains("auto_translate"));
    }

    #[test]
    fn test_new_id_is_unique() {
        assert_ne!(new_id(), new_id());
    }
}
