use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use impostor::{api, config::AppConfig, state::AppState, store::MemoryStore, themes};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "impostor=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting impostor server...");

    let config = AppConfig::from_env();

    let themes = match &config.themes_file {
        Some(path) => match themes::load_themes(path) {
            Ok(themes) => {
                tracing::info!("Loaded {} themes from {}", themes.len(), path.display());
                themes
            }
            Err(e) => {
                tracing::error!("Failed to load themes from {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => themes::default_themes(),
    };

    let bind_addr = config.bind_addr;
    let store = Arc::new(MemoryStore::new(themes));
    let state = Arc::new(AppState::new(store, config));

    let app = api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", bind_addr);

    let listener = match tokio::net::TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", bind_addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}
