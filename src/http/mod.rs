//! HTTP surface: the public read API, health and docs endpoints, and the
//! admin API the dashboard drives.

use crate::api_keys::ApiKeys;
use crate::config::Config;
use crate::events::EventBus;
use crate::gateway::Gateway;
use crate::keys::KeyStore;
use crate::languages::LanguageRegistry;
use crate::projects::Projects;
use crate::store::SharedStore;
use crate::transfer::Importer;
use axum::routing::{delete, get, post};
use axum::{middleware, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod docs;
pub mod error;
pub mod health;
pub mod public;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: SharedStore,
    pub projects: Projects,
    pub languages: LanguageRegistry,
    pub keys: KeyStore,
    pub gateway: Gateway,
    pub importer: Importer,
    pub api_keys: ApiKeys,
    pub events: EventBus,
}

impl AppState {
    pub fn new(config: Config, store: SharedStore, gateway: Gateway, events: EventBus) -> Self {
        Self {
            config: Arc::new(config),
            projects: Projects::new(store.clone()),
            languages: LanguageRegistry::new(store.clone()).with_events(events.clone()),
            keys: KeyStore::new(store.clone()),
            importer: Importer::new(store.clone()),
            api_keys: ApiKeys::new(store.clone()),
            gateway,
            events,
            store,
        }
    }
}

fn admin_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/projects/:project/settings",
            get(admin::get_settings).put(admin::update_settings),
        )
        .route(
            "/projects/:project/settings/test-credential",
            post(admin::test_credential),
        )
        .route(
            "/projects/:project/languages",
            get(admin::list_languages).post(admin::add_language),
        )
        .route(
            "/projects/:project/languages/:language",
            delete(admin::remove_language),
        )
        .route(
            "/projects/:project/languages/:language/auto-translate",
            post(admin::auto_translate_language),
        )
        .route(
            "/projects/:project/keys",
            get(admin::list_keys).post(admin::create_key),
        )
        .route(
            "/projects/:project/keys/:key_id",
            get(admin::get_key)
                .patch(admin::update_key)
                .delete(admin::delete_key),
        )
        .route("/projects/:project/keys/:key_id/confirm", post(admin::confirm_key))
        .route("/projects/:project/keys/:key_id/history", get(admin::key_history))
        .route(
            "/projects/:project/keys/:key_id/translations",
            get(admin::list_key_translations),
        )
        .route(
            "/projects/:project/keys/:key_id/translations/:language",
            axum::routing::put(admin::upsert_translation),
        )
        .route(
            "/projects/:project/keys/:key_id/auto-translate",
            post(admin::auto_translate_key),
        )
        .route("/projects/:project/translate", post(admin::translate_text))
        .route("/projects/:project/namespaces", get(admin::list_namespaces))
        .route("/projects/:project/import/preview", post(admin::import_preview))
        .route("/projects/:project/import", post(admin::import_commit))
        .route("/projects/:project/export", get(admin::export))
        .route(
            "/projects/:project/api-keys",
            get(admin::list_api_keys).post(admin::generate_api_key),
        )
        .route(
            "/projects/:project/api-keys/:api_key_id",
            delete(admin::revoke_api_key),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin::require_admin_key,
        ))
}

pub fn build_router(state: AppState) -> Router {
    let read_api = Router::new()
        .route(
            "/api/translations",
            get(public::translations_by_query)
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    public::require_api_key,
                ))
                .options(public::preflight),
        )
        .route(
            "/api/translations/:locale/:namespace",
            get(public::translations_by_path).route_layer(middleware::from_fn_with_state(
                state.clone(),
                public::require_api_key,
            )),
        )
        .layer(public::cors_layer());

    Router::new()
        .merge(read_api)
        .route("/api/health", get(health::health))
        .route("/api/docs/i18n", get(docs::i18n_docs))
        .nest("/api/admin", admin_router(&state))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
