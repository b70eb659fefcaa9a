//! Project records and their settings.

use crate::error::{Error, Result};
use crate::languages::LanguageRegistry;
use crate::model::Project;
use crate::store::SharedStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Settings as shown to clients. The stored credential is never echoed back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectSettings {
    pub project_id: String,
    pub name: String,
    pub auto_translate: bool,
    pub has_translate_api_key: bool,
}

impl From<&Project> for ProjectSettings {
    fn from(project: &Project) -> Self {
        Self {
            project_id: project.id.clone(),
            name: project.name.clone(),
            auto_translate: project.auto_translate,
            has_translate_api_key: project
                .translate_api_key
                .as_deref()
                .is_some_and(|k| !k.is_empty()),
        }
    }
}

/// Partial update. `translate_api_key: Some("")` clears the credential.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default)]
    pub translate_api_key: Option<String>,
    #[serde(default)]
    pub auto_translate: Option<bool>,
}

#[derive(Clone)]
pub struct Projects {
    store: SharedStore,
    languages: LanguageRegistry,
}

impl Projects {
    pub fn new(store: SharedStore) -> Self {
        Self {
            languages: LanguageRegistry::new(store.clone()),
            store,
        }
    }

    async fn load(&self, project_id: &str) -> Result<Project> {
        self.store
            .get_project(project_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("project {}", project_id)))
    }

    /// Create the project and its base language if they do not exist.
    pub async fn ensure(&self, project_id: &str, name: &str) -> Result<Project> {
        let project = match self.store.get_project(project_id).await? {
            Some(p) => p,
            None => {
                info!("Creating project {} ({})", project_id, name);
                self.store
                    .upsert_project(Project {
                        id: project_id.to_string(),
                        name: name.to_string(),
                        translate_api_key: None,
                        auto_translate: true,
                        created_at: Utc::now(),
                    })
                    .await?
            }
        };
        self.languages.ensure_base(project_id).await?;
        Ok(project)
    }

    pub async fn settings(&self, project_id: &str) -> Result<ProjectSettings> {
        Ok(ProjectSettings::from(&self.load(project_id).await?))
    }

    pub async fn update_settings(
        &self,
        project_id: &str,
        update: SettingsUpdate,
    ) -> Result<ProjectSettings> {
        let mut project = self.load(project_id).await?;
        if let Some(key) = update.translate_api_key {
            let key = key.trim().to_string();
            project.translate_api_key = if key.is_empty() { None } else { Some(key) };
        }
        if let Some(flag) = update.auto_translate {
            project.auto_translate = flag;
        }
        let project = self.store.upsert_project(project).await?;
        info!(
            "Updated settings for project {} (auto_translate={})",
            project.id, project.auto_translate
        );
        Ok(ProjectSettings::from(&project))
    }
}
