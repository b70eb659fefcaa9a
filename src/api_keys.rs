//! Bearer secrets for the public read API.

use crate::error::{Error, Result};
use crate::model::{new_id, ApiKey};
use crate::security::{constant_time_compare, generate_api_key};
use crate::store::SharedStore;
use chrono::Utc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct ApiKeys {
    store: SharedStore,
}

impl ApiKeys {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn generate(&self, project_id: &str, user_id: &str, name: &str) -> Result<ApiKey> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Malformed("API key name cannot be empty".to_string()));
        }
        let key = self
            .store
            .insert_api_key(ApiKey {
                id: new_id(),
                key: generate_api_key(),
                name: name.to_string(),
                project_id: project_id.to_string(),
                user_id: user_id.to_string(),
                created_at: Utc::now(),
                last_used_at: None,
                is_active: true,
            })
            .await?;
        info!("Generated API key '{}' for project {}", key.name, project_id);
        Ok(key)
    }

    /// Keys a user created in a project, newest first.
    pub async fn list(&self, project_id: &str, user_id: &str) -> Result<Vec<ApiKey>> {
        Ok(self
            .store
            .list_api_keys(project_id)
            .await?
            .into_iter()
            .filter(|k| k.user_id == user_id)
            .collect())
    }

    /// Hard delete. Only the owner can revoke.
    pub async fn revoke(&self, id: &str, user_id: &str) -> Result<()> {
        if self.store.delete_api_key(id, user_id).await? {
            info!("Revoked API key {}", id);
            Ok(())
        } else {
            Err(Error::NotFound(format!("API key {}", id)))
        }
    }

    /// Resolve a bearer token to an active key of the project.
    pub async fn authenticate(&self, project_id: &str, token: &str) -> Result<ApiKey> {
        let matched = self
            .store
            .list_api_keys(project_id)
            .await?
            .into_iter()
            .filter(|k| k.is_active)
            .find(|k| constant_time_compare(&k.key, token));

        let Some(mut key) = matched else {
            return Err(Error::Unauthorized("Invalid API key".to_string()));
        };

        let now = Utc::now();
        if let Err(e) = self.store.touch_api_key(&key.id, now).await {
            warn!("Failed to record API key use: {}", e);
        }
        key.last_used_at = Some(now);
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use std::sync::Arc;

    fn api_keys() -> ApiKeys {
        ApiKeys::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn test_generate_and_authenticate() {
        let keys = api_keys();
        let created = keys.generate("p1", "alice", "Website").await.expect("generate");
        assert!(created.key.starts_with("trn_"));

        let found = keys.authenticate("p1", &created.key).await.expect("auth");
        assert_eq!(found.id, created.id);
        assert!(found.last_used_at.is_some());
    }

    #[tokio::test]
    async fn test_key_is_scoped_to_project() {
        let keys = api_keys();
        let created = keys.generate("p1", "alice", "Website").await.expect("generate");
        assert!(matches!(
            keys.authenticate("p2", &created.key).await,
            Err(Error::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_list_newest_first_per_user() {
        let keys = api_keys();
        keys.generate("p1", "alice", "first").await.expect("first");
        keys.generate("p1", "bob", "other").await.expect("other");
        keys.generate("p1", "alice", "second").await.expect("second");

        let names: Vec<String> = keys
            .list("p1", "alice")
            .await
            .expect("list")
            .into_iter()
            .map(|k| k.name)
            .collect();
        assert_eq!(names, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_revoke_is_owner_scoped() {
        let keys = api_keys();
        let created = keys.generate("p1", "alice", "Website").await.expect("generate");

        assert!(matches!(
            keys.revoke(&created.id, "mallory").await,
            Err(Error::NotFound(_))
        ));
        keys.revoke(&created.id, "alice").await.expect("revoke");
        assert!(keys.authenticate("p1", &created.key).await.is_err());
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        assert!(matches!(
            api_keys().generate("p1", "alice", " ").await,
            Err(Error::Malformed(_))
        ));
    }
}
