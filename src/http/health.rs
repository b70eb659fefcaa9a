use crate::http::AppState;
use axum::extract::State;
use axum::http::{header, HeaderValue};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub environment: String,
    pub env_valid: bool,
    /// `ok`, `error`, or `unknown` when no database is configured. Kept
    /// under the `supabase` name existing monitors parse.
    #[serde(rename = "supabase")]
    pub database: &'static str,
    pub version: String,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let database = if state.store.backend_name() == "memory" {
        "unknown"
    } else {
        match state.store.health_check().await {
            Ok(()) => "ok",
            Err(e) => {
                warn!("Database health check failed: {}", e);
                "error"
            }
        }
    };

    let body = HealthResponse {
        status: if database == "error" { "degraded" } else { "ok" },
        timestamp: Utc::now().to_rfc3339(),
        environment: state.config.environment.clone(),
        env_valid: state.config.validate(),
        database,
        version: state.config.app_version.clone(),
    };

    (
        [(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, max-age=0"),
        )],
        Json(body),
    )
}
