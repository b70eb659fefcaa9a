//! Client for the public read API, usable like a small i18n library.
//!
//! Bundles are cached per `locale:namespace` until [`TranslationClient::clear_cache`].

use crate::validator::placeholder_regex;
use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

pub type Bundle = BTreeMap<String, String>;

#[derive(Clone)]
pub struct TranslationClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    project_id: String,
    cache: Arc<RwLock<HashMap<String, Bundle>>>,
}

impl TranslationClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, api_key, project_id)
    }

    pub fn with_client(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            project_id: project_id.into(),
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Fetch one bundle, served from the cache after the first call.
    pub async fn fetch(&self, locale: &str, namespace: &str) -> Result<Bundle> {
        let cache_key = format!("{}:{}", locale, namespace);
        if let Some(bundle) = self.cache.read().await.get(&cache_key) {
            return Ok(bundle.clone());
        }

        let url = format!("{}/api/translations/{}/{}", self.base_url, locale, namespace);
        debug!("Fetching translations from {}", url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .header("Project-ID", &self.project_id)
            .send()
            .await
            .context("Failed to send translations request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to fetch translations ({}): {}", status, body);
        }

        let bundle: Bundle = response
            .json()
            .await
            .context("Failed to parse translations response")?;
        self.cache.write().await.insert(cache_key, bundle.clone());
        Ok(bundle)
    }

    /// Load several namespaces into one lookup table. Later namespaces win
    /// on duplicate keys.
    pub async fn translator(&self, locale: &str, namespaces: &[&str]) -> Result<Translator> {
        let mut messages = Bundle::new();
        for namespace in namespaces {
            messages.extend(self.fetch(locale, namespace).await?);
        }
        Ok(Translator {
            locale: locale.to_string(),
            messages,
        })
    }

    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translator {
    locale: String,
    messages: Bundle,
}

impl Translator {
    pub fn new(locale: impl Into<String>, messages: Bundle) -> Self {
        Self {
            locale: locale.into(),
            messages,
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Look up `key` and fill `{{name}}` placeholders from `params`. Missing
    /// keys return the key itself; unknown placeholders are left as written.
    pub fn t(&self, key: &str, params: &[(&str, &str)]) -> String {
        let Some(template) = self.messages.get(key) else {
            return key.to_string();
        };
        placeholder_regex()
            .replace_all(template, |caps: &regex::Captures| {
                let name = &caps[1];
                params
                    .iter()
                    .find(|(k, _)| *k == name)
                    .map(|(_, v)| v.to_string())
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}
