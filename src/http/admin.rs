//! Admin API driven by the dashboard.
//!
//! Every route lives under `/api/admin/projects/{project}`. When
//! `ADMIN_API_KEY` is configured, requests must carry it in `X-API-Key`. The
//! acting user comes from `X-User-Id` and defaults to `system`.

use crate::events::DashboardEvent;
use crate::gateway::{BulkReport, TranslateOutcome, TranslateRequest};
use crate::http::error::{api_bad_request, api_unauthorized, ApiError};
use crate::http::AppState;
use crate::keys::{KeyUpdate, NewKey};
use crate::model::{ApiKey, HistoryEntry, KeyView, Language, Translation, TranslationKey};
use crate::projects::{ProjectSettings, SettingsUpdate};
use crate::security::constant_time_compare;
use crate::transfer::{
    self, select_languages, Entry, ExportFormat, ImportFormat, ImportPreview, ImportReport,
};
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequestParts, Path, Query, Request, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

pub const ADMIN_KEY_HEADER: &str = "x-api-key";
pub const USER_ID_HEADER: &str = "x-user-id";
pub const DEFAULT_ACTOR: &str = "system";

type ApiResult<T> = Result<T, ApiError>;

pub async fn require_admin_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(expected) = state.config.admin_api_key.as_deref() {
        let provided = request
            .headers()
            .get(ADMIN_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !constant_time_compare(provided, expected) {
            warn!("Rejected admin request to {}", request.uri().path());
            return api_unauthorized("invalid or missing X-API-Key").into_response();
        }
    }
    next.run(request).await
}

/// The user performing a change, recorded in history entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_ACTOR);
        Ok(Actor(actor.to_string()))
    }
}

async fn ensure_project(state: &AppState, project: &str) -> ApiResult<ProjectSettings> {
    Ok(state.projects.settings(project).await?)
}

/// Load a key and check it belongs to the project in the path.
async fn owned_key(state: &AppState, project: &str, key_id: &str) -> ApiResult<TranslationKey> {
    match state.store.get_key(key_id).await.map_err(ApiError::from)? {
        Some(key) if key.project_id == project => Ok(key),
        _ => Err(crate::Error::NotFound(format!("key {}", key_id)).into()),
    }
}

// ---- settings ----

pub async fn get_settings(
    State(state): State<AppState>,
    Path(project): Path<String>,
) -> ApiResult<Json<ProjectSettings>> {
    Ok(Json(ensure_project(&state, &project).await?))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Json(update): Json<SettingsUpdate>,
) -> ApiResult<Json<ProjectSettings>> {
    Ok(Json(state.projects.update_settings(&project, update).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct CredentialCheck {
    #[serde(default)]
    pub credential: Option<String>,
}

pub async fn test_credential(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Json(body): Json<CredentialCheck>,
) -> ApiResult<Json<serde_json::Value>> {
    ensure_project(&state, &project).await?;
    let credential = match body.credential.filter(|c| !c.trim().is_empty()) {
        Some(c) => c,
        None => state
            .store
            .get_project(&project)
            .await
            .map_err(ApiError::from)?
            .and_then(|p| p.translate_api_key)
            .ok_or(crate::Error::MissingCredential)?,
    };
    let valid = state.gateway.test_credential(&credential).await;
    Ok(Json(serde_json::json!({ "valid": valid })))
}

// ---- languages ----

pub async fn list_languages(
    State(state): State<AppState>,
    Path(project): Path<String>,
) -> ApiResult<Json<Vec<Language>>> {
    ensure_project(&state, &project).await?;
    Ok(Json(state.languages.list(&project).await?))
}

#[derive(Debug, Deserialize)]
pub struct AddLanguage {
    pub code: String,
    pub name: String,
}

pub async fn add_language(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Json(body): Json<AddLanguage>,
) -> ApiResult<(StatusCode, Json<Language>)> {
    ensure_project(&state, &project).await?;
    let language = state.languages.add(&project, &body.code, &body.name).await?;
    Ok((StatusCode::CREATED, Json(language)))
}

pub async fn remove_language(
    State(state): State<AppState>,
    Path((project, language_id)): Path<(String, String)>,
) -> ApiResult<Json<Language>> {
    let language = state
        .store
        .get_language(&language_id)
        .await
        .map_err(ApiError::from)?
        .filter(|l| l.project_id == project)
        .ok_or_else(|| crate::Error::NotFound(format!("language {}", language_id)))?;
    Ok(Json(state.languages.remove(&language.id).await?))
}

pub async fn auto_translate_language(
    State(state): State<AppState>,
    Path((project, code)): Path<(String, String)>,
    Actor(actor): Actor,
) -> ApiResult<Json<BulkReport>> {
    ensure_project(&state, &project).await?;
    Ok(Json(
        state.gateway.translate_language(&project, &code, &actor).await?,
    ))
}

// ---- keys ----

#[derive(Debug, Default, Deserialize)]
pub struct KeyFilter {
    pub namespace: Option<String>,
}

pub async fn list_keys(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(filter): Query<KeyFilter>,
) -> ApiResult<Json<Vec<KeyView>>> {
    ensure_project(&state, &project).await?;
    let mut views = state.keys.list(&project).await?;
    if let Some(namespace) = filter.namespace.filter(|n| !n.is_empty()) {
        views.retain(|v| v.key.namespace == namespace);
    }
    Ok(Json(views))
}

#[derive(Debug, Deserialize)]
pub struct CreateKey {
    #[serde(default)]
    pub namespace: Option<String>,
    pub key: String,
    #[serde(default)]
    pub description: String,
    pub base_text: String,
    #[serde(default)]
    pub translations: BTreeMap<String, String>,
    /// Translate into every active language and wait for the result.
    #[serde(default)]
    pub auto_translate: bool,
}

pub async fn create_key(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Actor(actor): Actor,
    Json(body): Json<CreateKey>,
) -> ApiResult<(StatusCode, Json<KeyView>)> {
    let settings = ensure_project(&state, &project).await?;
    let key = state
        .keys
        .create(
            NewKey {
                project_id: project.clone(),
                namespace: body.namespace,
                key: body.key,
                description: body.description,
                base_text: body.base_text,
                translations: body.translations,
            },
            &actor,
        )
        .await?;

    let mut status = StatusCode::CREATED;
    if body.auto_translate && settings.auto_translate {
        let done = state
            .events
            .request(DashboardEvent::BaseTextChanged {
                key_id: key.id.clone(),
            });
        match tokio::time::timeout(state.config.auto_translate_wait, done).await {
            Ok(Ok(Ok(report))) => info!(
                "Key '{}' auto-translated: {} ok, {} failed",
                key.key, report.succeeded, report.failed
            ),
            Ok(Ok(Err(e))) => warn!("Auto-translate for '{}' failed: {}", key.key, e),
            Ok(Err(_)) => warn!("Auto-translate worker dropped the request for '{}'", key.key),
            Err(_) => {
                info!("Auto-translate for '{}' still running", key.key);
                status = StatusCode::ACCEPTED;
            }
        }
    }

    Ok((status, Json(state.keys.get(&key.id).await?)))
}

pub async fn get_key(
    State(state): State<AppState>,
    Path((project, key_id)): Path<(String, String)>,
) -> ApiResult<Json<KeyView>> {
    owned_key(&state, &project, &key_id).await?;
    Ok(Json(state.keys.get(&key_id).await?))
}

pub async fn update_key(
    State(state): State<AppState>,
    Path((project, key_id)): Path<(String, String)>,
    Actor(actor): Actor,
    Json(update): Json<KeyUpdate>,
) -> ApiResult<Json<KeyView>> {
    owned_key(&state, &project, &key_id).await?;
    state.keys.apply(&key_id, update, &actor).await?;
    Ok(Json(state.keys.get(&key_id).await?))
}

pub async fn delete_key(
    State(state): State<AppState>,
    Path((project, key_id)): Path<(String, String)>,
    Actor(actor): Actor,
) -> ApiResult<StatusCode> {
    owned_key(&state, &project, &key_id).await?;
    state.keys.delete(&key_id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn confirm_key(
    State(state): State<AppState>,
    Path((project, key_id)): Path<(String, String)>,
    Actor(actor): Actor,
) -> ApiResult<Json<KeyView>> {
    owned_key(&state, &project, &key_id).await?;
    state.keys.confirm(&key_id, &actor).await?;
    Ok(Json(state.keys.get(&key_id).await?))
}

/// Full history. A live key must belong to the project; once deleted the
/// entries carry no project, so only the key id scopes them.
pub async fn key_history(
    State(state): State<AppState>,
    Path((project, key_id)): Path<(String, String)>,
) -> ApiResult<Json<Vec<HistoryEntry>>> {
    ensure_project(&state, &project).await?;
    if let Some(key) = state.store.get_key(&key_id).await? {
        if key.project_id != project {
            return Err(crate::Error::NotFound(format!("key {}", key_id)).into());
        }
    }
    Ok(Json(state.keys.history(&key_id).await?))
}

pub async fn list_key_translations(
    State(state): State<AppState>,
    Path((project, key_id)): Path<(String, String)>,
) -> ApiResult<Json<Vec<Translation>>> {
    owned_key(&state, &project, &key_id).await?;
    Ok(Json(state.keys.values().fetch_for_key(&key_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct TranslationValue {
    pub value: String,
}

pub async fn upsert_translation(
    State(state): State<AppState>,
    Path((project, key_id, language)): Path<(String, String, String)>,
    Actor(actor): Actor,
    Json(body): Json<TranslationValue>,
) -> ApiResult<Json<serde_json::Value>> {
    owned_key(&state, &project, &key_id).await?;
    let outcome = state
        .keys
        .values()
        .upsert(&key_id, &language, &body.value, &actor)
        .await?;
    Ok(Json(serde_json::json!({
        "translation": outcome.translation,
        "created": outcome.created,
        "changed": outcome.changed,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct AutoTranslateKey {
    #[serde(default)]
    pub targets: Option<Vec<String>>,
}

pub async fn auto_translate_key(
    State(state): State<AppState>,
    Path((project, key_id)): Path<(String, String)>,
    Actor(actor): Actor,
    body: Option<Json<AutoTranslateKey>>,
) -> ApiResult<Json<BulkReport>> {
    owned_key(&state, &project, &key_id).await?;
    let targets = body.and_then(|Json(b)| b.targets);
    Ok(Json(
        state.gateway.translate_key(&key_id, targets, &actor).await?,
    ))
}

pub async fn translate_text(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Json(mut request): Json<TranslateRequest>,
) -> ApiResult<Json<TranslateOutcome>> {
    ensure_project(&state, &project).await?;
    request.project_id = Some(project);
    Ok(Json(state.gateway.translate(request).await))
}

pub async fn list_namespaces(
    State(state): State<AppState>,
    Path(project): Path<String>,
) -> ApiResult<Json<Vec<String>>> {
    ensure_project(&state, &project).await?;
    Ok(Json(state.keys.namespaces(&project).await?))
}

// ---- import / export ----

#[derive(Debug, Deserialize)]
pub struct ImportParams {
    pub format: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

pub async fn import_preview(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(params): Query<ImportParams>,
    body: Bytes,
) -> ApiResult<Json<ImportPreview>> {
    ensure_project(&state, &project).await?;
    let format: ImportFormat = params.format.parse()?;
    let entries = transfer::parse(format, &body)?;
    let base = state.keys.values().base_language(&project).await?;
    Ok(Json(transfer::preview(&entries, &base)))
}

pub async fn import_commit(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(params): Query<ImportParams>,
    Actor(actor): Actor,
    body: Bytes,
) -> ApiResult<Json<ImportReport>> {
    ensure_project(&state, &project).await?;
    let format: ImportFormat = params.format.parse()?;
    let entries = transfer::parse(format, &body)?;
    if entries.is_empty() {
        return Err(api_bad_request("No valid data to import"));
    }
    let report = state
        .importer
        .commit(&project, params.namespace.as_deref(), entries, &actor)
        .await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    #[serde(default = "default_export_format")]
    pub format: String,
    /// Comma-separated codes. Defaults to every active language.
    #[serde(default)]
    pub languages: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

fn default_export_format() -> String {
    "json".to_string()
}

pub async fn export(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(params): Query<ExportParams>,
) -> ApiResult<Response> {
    ensure_project(&state, &project).await?;
    let format: ExportFormat = params.format.parse()?;

    let base = state.keys.values().base_language(&project).await?;
    let requested: Vec<String> = match params.languages.filter(|l| !l.trim().is_empty()) {
        Some(list) => list.split(',').map(|c| c.trim().to_string()).collect(),
        None => state
            .languages
            .list(&project)
            .await?
            .into_iter()
            .map(|l| l.code)
            .collect(),
    };
    let languages = select_languages(&base, &requested);

    let entries: Vec<Entry> = state
        .keys
        .list(&project)
        .await?
        .iter()
        .filter(|v| {
            params
                .namespace
                .as_deref()
                .map_or(true, |ns| v.key.namespace == ns)
        })
        .map(Entry::from)
        .collect();

    let file = transfer::export(&entries, &languages, format)?;
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file.file_name))
        .map_err(|_| api_bad_request("invalid file name"))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(file.content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.bytes,
    )
        .into_response())
}

// ---- API keys ----

pub async fn list_api_keys(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Actor(actor): Actor,
) -> ApiResult<Json<Vec<ApiKey>>> {
    ensure_project(&state, &project).await?;
    Ok(Json(state.api_keys.list(&project, &actor).await?))
}

#[derive(Debug, Deserialize)]
pub struct GenerateApiKey {
    pub name: String,
}

pub async fn generate_api_key(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Actor(actor): Actor,
    Json(body): Json<GenerateApiKey>,
) -> ApiResult<(StatusCode, Json<ApiKey>)> {
    ensure_project(&state, &project).await?;
    let key = state.api_keys.generate(&project, &actor, &body.name).await?;
    Ok((StatusCode::CREATED, Json(key)))
}

pub async fn revoke_api_key(
    State(state): State<AppState>,
    Path((project, api_key_id)): Path<(String, String)>,
    Actor(actor): Actor,
) -> ApiResult<StatusCode> {
    ensure_project(&state, &project).await?;
    state.api_keys.revoke(&api_key_id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}
