use anyhow::{Context, Result};
use std::net::SocketAddr;
use tracing::{info, warn};
use transloom::config::Config;
use transloom::events::{self, AutoTranslateWorker};
use transloom::gateway::Gateway;
use transloom::http::{build_router, AppState};
use transloom::projects::Projects;
use transloom::store;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("transloom=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    info!(
        "Starting transloom {} ({})",
        config.app_version, config.environment
    );
    for name in config.missing_required() {
        warn!("{} is not set", name);
    }

    let store = store::open(&config).await?;
    Projects::new(store.clone())
        .ensure(&config.default_project_id, &config.default_project_name)
        .await
        .context("Failed to create the default project")?;

    let (bus, receiver) = events::channel();
    let gateway = Gateway::new(
        reqwest::Client::new(),
        config.translate_api_url.clone(),
        store.clone(),
    );
    tokio::spawn(AutoTranslateWorker::new(gateway.clone(), receiver).run());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = build_router(AppState::new(config, store, gateway, bus));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}
