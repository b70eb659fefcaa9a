use crate::gateway::DEFAULT_TRANSLATE_API_URL;
use anyhow::{Context, Result};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub port: u16,

    // Persistence. Unset means the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,

    // Shared secret for the admin API (X-API-Key). Unset leaves it open.
    pub admin_api_key: Option<String>,

    // Project created at startup
    pub default_project_id: String,
    pub default_project_name: String,

    // Machine translation
    pub translate_api_url: String,
    pub auto_translate_wait: Duration,

    pub app_version: String,
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            environment: optional("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            port: match optional("PORT") {
                Some(p) => p.parse().context("PORT must be a valid port number")?,
                None => 8080,
            },

            database_url: optional("DATABASE_URL"),
            database_max_connections: optional("DATABASE_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),

            admin_api_key: optional("ADMIN_API_KEY"),

            default_project_id: optional("DEFAULT_PROJECT_ID")
                .unwrap_or_else(|| "default".to_string()),
            default_project_name: optional("DEFAULT_PROJECT_NAME")
                .unwrap_or_else(|| "Default project".to_string()),

            translate_api_url: optional("TRANSLATE_API_URL")
                .unwrap_or_else(|| DEFAULT_TRANSLATE_API_URL.to_string()),
            auto_translate_wait: Duration::from_secs(
                match optional("AUTO_TRANSLATE_WAIT_SECS") {
                    Some(v) => v
                        .parse()
                        .context("AUTO_TRANSLATE_WAIT_SECS must be a whole number of seconds")?,
                    None => 10,
                },
            ),

            app_version: optional("APP_VERSION")
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
        })
    }

    /// Settings that are required outside development. Returns the missing
    /// variable names.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.is_production() {
            if self.database_url.is_none() {
                missing.push("DATABASE_URL");
            }
            if self.admin_api_key.is_none() {
                missing.push("ADMIN_API_KEY");
            }
        }
        missing
    }

    /// Reported as `envValid` by the health endpoint.
    pub fn validate(&self) -> bool {
        self.missing_required().is_empty()
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Configuration for tests: in-memory store, no admin secret.
    pub fn for_tests() -> Self {
        Self {
            environment: "test".to_string(),
            port: 0,
            database_url: None,
            database_max_connections: 1,
            admin_api_key: None,
            default_project_id: "default".to_string(),
            default_project_name: "Test project".to_string(),
            translate_api_url: DEFAULT_TRANSLATE_API_URL.to_string(),
            auto_translate_wait: Duration::from_secs(1),
            app_version: "test".to_string(),
        }
    }
}
