//! Public read API consumed by client applications.
//!
//! Both routes require `Authorization: Bearer <token>` and `Project-ID`; the
//! token must match an active API key of that project. Errors use the flat
//! `{"error": "..."}` shape clients already expect.

use crate::error::Error;
use crate::http::AppState;
use crate::model::{ApiKey, BASE_LANGUAGE_CODE, DEFAULT_NAMESPACE};
use crate::security::parse_bearer;
use axum::extract::{Path, Query, Request, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error};

pub const PROJECT_ID_HEADER: &str = "project-id";

const ALLOWED_METHODS: &str = "GET, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization, Project-ID";
const PREFLIGHT_MAX_AGE_SECS: u64 = 86_400;

fn public_error(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// Any origin may read.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(PROJECT_ID_HEADER),
        ])
        .max_age(Duration::from_secs(PREFLIGHT_MAX_AGE_SECS))
}

fn header_str<'a>(headers: &'a HeaderMap, name: impl header::AsHeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

pub async fn require_api_key(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let headers = request.headers();
    let Some(token) = header_str(headers, header::AUTHORIZATION)
        .and_then(parse_bearer)
        .map(str::to_string)
    else {
        return public_error(StatusCode::UNAUTHORIZED, "Unauthorized");
    };
    let Some(project_id) = header_str(headers, PROJECT_ID_HEADER)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
    else {
        return public_error(StatusCode::UNAUTHORIZED, "Missing Project-ID header");
    };

    match state.api_keys.authenticate(&project_id, &token).await {
        Ok(key) => {
            debug!("Read API access with key '{}'", key.name);
            request.extensions_mut().insert(key);
            next.run(request).await
        }
        Err(Error::Unauthorized(_)) => public_error(StatusCode::UNAUTHORIZED, "Invalid API key"),
        Err(e) => {
            error!("API key validation failed: {}", e);
            public_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TranslationQuery {
    pub namespace: Option<String>,
    pub locale: Option<String>,
}

async fn bundle_response(
    state: &AppState,
    key: &ApiKey,
    namespace: &str,
    locale: &str,
) -> Response {
    match state.keys.bundle(&key.project_id, namespace, locale).await {
        Ok(bundle) => Json::<BTreeMap<String, String>>(bundle).into_response(),
        Err(e) => {
            error!("Failed to load {}/{}: {}", locale, namespace, e);
            public_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// `GET /api/translations?namespace=&locale=`
pub async fn translations_by_query(
    State(state): State<AppState>,
    Extension(key): Extension<ApiKey>,
    Query(query): Query<TranslationQuery>,
) -> Response {
    let namespace = query
        .namespace
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
    let locale = query
        .locale
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| BASE_LANGUAGE_CODE.to_string());
    bundle_response(&state, &key, &namespace, &locale).await
}

/// `GET /api/translations/{locale}/{namespace}`
pub async fn translations_by_path(
    State(state): State<AppState>,
    Extension(key): Extension<ApiKey>,
    Path((locale, namespace)): Path<(String, String)>,
) -> Response {
    bundle_response(&state, &key, &namespace, &locale).await
}

/// Plain `OPTIONS` without preflight headers still advertises the policy.
pub async fn preflight() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [
            (
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOWED_METHODS),
            ),
            (
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(ALLOWED_HEADERS),
            ),
            (
                header::ACCESS_CONTROL_MAX_AGE,
                HeaderValue::from_static("86400"),
            ),
        ],
    )
}
