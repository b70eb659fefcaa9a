//! Per-project language registry.
//!
//! Languages are never hard-deleted: removal flips `is_active`, and adding a
//! code that exists only as an inactive row brings that row back.

use crate::error::{Error, Result};
use crate::events::{DashboardEvent, EventBus};
use crate::model::{new_id, Language, BASE_LANGUAGE_CODE, BASE_LANGUAGE_NAME};
use crate::store::SharedStore;
use chrono::Utc;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{info, warn};

static CODE_REGEX: OnceLock<Regex> = OnceLock::new();

/// `fr`, `pt-BR`, `zh-Hant-TW`.
pub fn is_valid_code(code: &str) -> bool {
    CODE_REGEX
        .get_or_init(|| Regex::new(r"^[a-z]{2,3}(-[A-Za-z0-9]{2,8})*$").expect("valid regex"))
        .is_match(code)
}

#[derive(Clone)]
pub struct LanguageRegistry {
    store: SharedStore,
    events: Option<EventBus>,
}

impl LanguageRegistry {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            events: None,
        }
    }

    /// Publish `LanguageAdded` on this bus for projects with auto-translate on.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Active languages, base first.
    pub async fn list(&self, project_id: &str) -> Result<Vec<Language>> {
        let mut languages: Vec<Language> = self
            .store
            .list_languages(project_id)
            .await?
            .into_iter()
            .filter(|l| l.is_active)
            .collect();
        // Stable sort keeps creation order among the rest.
        languages.sort_by_key(|l| !l.is_base);
        Ok(languages)
    }

    pub async fn base(&self, project_id: &str) -> Result<Language> {
        self.store
            .list_languages(project_id)
            .await?
            .into_iter()
            .find(|l| l.is_base)
            .ok_or_else(|| Error::NotFound(format!("base language of project {}", project_id)))
    }

    /// Create the base language if the project has none yet.
    pub async fn ensure_base(&self, project_id: &str) -> Result<Language> {
        match self.base(project_id).await {
            Ok(base) => return Ok(base),
            Err(Error::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        self.store
            .insert_language(Language {
                id: new_id(),
                project_id: project_id.to_string(),
                code: BASE_LANGUAGE_CODE.to_string(),
                name: BASE_LANGUAGE_NAME.to_string(),
                is_base: true,
                is_active: true,
                created_at: Utc::now(),
            })
            .await
    }

    pub async fn add(&self, project_id: &str, code: &str, name: &str) -> Result<Language> {
        let code = code.trim();
        let name = name.trim();
        if !is_valid_code(code) {
            return Err(Error::InvalidLanguageCode(code.to_string()));
        }
        if name.is_empty() {
            return Err(Error::Malformed("language name cannot be empty".to_string()));
        }

        let existing = self
            .store
            .list_languages(project_id)
            .await?
            .into_iter()
            .find(|l| l.code == code);

        let language = match existing {
            Some(l) if l.is_active => return Err(Error::DuplicateCode(code.to_string())),
            Some(mut inactive) => {
                inactive.is_active = true;
                inactive.name = name.to_string();
                info!("Reactivating language {} in project {}", code, project_id);
                self.store.update_language(inactive).await?
            }
            None => {
                info!("Adding language {} in project {}", code, project_id);
                self.store
                    .insert_language(Language {
                        id: new_id(),
                        project_id: project_id.to_string(),
                        code: code.to_string(),
                        name: name.to_string(),
                        is_base: false,
                        is_active: true,
                        created_at: Utc::now(),
                    })
                    .await?
            }
        };

        self.notify_added(&language).await;
        Ok(language)
    }

    async fn notify_added(&self, language: &Language) {
        let Some(events) = &self.events else {
            return;
        };
        let auto_translate = match self.store.get_project(&language.project_id).await {
            Ok(project) => project.is_some_and(|p| p.auto_translate),
            Err(e) => {
                warn!("Could not read auto-translate setting: {}", e);
                false
            }
        };
        if auto_translate
            && !events.publish(DashboardEvent::LanguageAdded {
                project_id: language.project_id.clone(),
                code: language.code.clone(),
            })
        {
            warn!("Auto-translate worker is not running; {} left empty", language.code);
        }
    }

    /// Soft delete. The base language cannot be removed.
    pub async fn remove(&self, id: &str) -> Result<Language> {
        let mut language = self
            .store
            .get_language(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("language {}", id)))?;
        if language.is_base {
            return Err(Error::BaseLanguageProtected);
        }
        if !language.is_active {
            return Ok(language);
        }
        language.is_active = false;
        info!("Deactivating language {}", language.code);
        self.store.update_language(language).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::channel;
    use crate::model::Project;
    use crate::store::memory::InMemoryStore;
    use crate::store::testing::FaultyStore;
    use crate::store::Store;
    use std::sync::Arc;

    async fn registry() -> LanguageRegistry {
        let registry = LanguageRegistry::new(Arc::new(InMemoryStore::new()));
        registry.ensure_base("p1").await.expect("base");
        registry
    }

    #[test]
    fn test_code_format() {
        for ok in ["en", "fr", "pt-BR", "zh-Hant", "haw"] {
            assert!(is_valid_code(ok), "{}", ok);
        }
        for bad in ["", "EN", "e", "english", "fr_FR", "fr-", "-fr"] {
            assert!(!is_valid_code(bad), "{}", bad);
        }
    }

    #[tokio::test]
    async fn test_list_puts_base_first() {
        let registry = registry().await;
        registry.add("p1", "fr", "French").await.expect("fr");
        registry.add("p1", "de", "German").await.expect("de");

        let codes: Vec<String> = registry
            .list("p1")
            .await
            .expect("list")
            .into_iter()
            .map(|l| l.code)
            .collect();
        assert_eq!(codes, vec!["en", "fr", "de"]);
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected_case_sensitive() {
        let registry = registry().await;
        registry.add("p1", "pt-BR", "Portuguese").await.expect("add");
        let err = registry.add("p1", "pt-BR", "Portuguese").await.unwrap_err();
        assert!(matches!(err, Error::DuplicateCode(_)));
        registry.add("p1", "pt-br", "Portuguese (lower)").await.expect("distinct code");
    }

    #[tokio::test]
    async fn test_invalid_code_and_blank_name() {
        let registry = registry().await;
        assert!(matches!(
            registry.add("p1", "French", "French").await,
            Err(Error::InvalidLanguageCode(_))
        ));
        assert!(matches!(
            registry.add("p1", "fr", "  ").await,
            Err(Error::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_base_language_is_protected() {
        let registry = registry().await;
        let base = registry.base("p1").await.expect("base");
        assert!(matches!(
            registry.remove(&base.id).await,
            Err(Error::BaseLanguageProtected)
        ));
        assert!(registry.list("p1").await.expect("list").iter().any(|l| l.is_base));
    }

    #[tokio::test]
    async fn test_remove_is_soft_and_add_reactivates() {
        let registry = registry().await;
        let fr = registry.add("p1", "fr", "French").await.expect("add");

        let removed = registry.remove(&fr.id).await.expect("remove");
        assert!(!removed.is_active);
        assert_eq!(registry.list("p1").await.expect("list").len(), 1);

        let back = registry.add("p1", "fr", "Français").await.expect("re-add");
        assert_eq!(back.id, fr.id);
        assert!(back.is_active);
        assert_eq!(back.name, "Français");
    }

    #[tokio::test]
    async fn test_add_publishes_only_with_auto_translate() {
        let store: SharedStore = Arc::new(InMemoryStore::new());
        store
            .upsert_project(Project {
                id: "p1".to_string(),
                name: "Demo".to_string(),
                translate_api_key: None,
                auto_translate: false,
                created_at: Utc::now(),
            })
            .await
            .expect("project");
        let (bus, mut rx) = channel();
        let registry = LanguageRegistry::new(store.clone()).with_events(bus);

        registry.add("p1", "fr", "French").await.expect("add");
        assert!(rx.try_next().is_none());

        let mut project = store.get_project("p1").await.expect("get").expect("exists");
        project.auto_translate = true;
        store.upsert_project(project).await.expect("update");

        registry.add("p1", "es", "Spanish").await.expect("add");
        assert_eq!(
            rx.try_next(),
            Some(DashboardEvent::LanguageAdded {
                project_id: "p1".to_string(),
                code: "es".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_ensure_base_propagates_store_errors() {
        let faulty = Arc::new(FaultyStore::new().failing_language_reads());
        let registry = LanguageRegistry::new(faulty.clone());

        let err = registry.ensure_base("p1").await.unwrap_err();
        assert!(matches!(err, Error::Store(_)), "{:?}", err);
        // No second base language is written behind the failed read.
        assert!(faulty.inner().list_languages("p1").await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_ensure_base_is_idempotent() {
        let registry = registry().await;
        let first = registry.base("p1").await.expect("base");
        let again = registry.ensure_base("p1").await.expect("ensure");
        assert_eq!(first.id, again.id);
        assert_eq!(registry.list("p1").await.expect("list").len(), 1);
    }
}
