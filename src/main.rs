//! Retouch Image Editing Service
//!
//! Upload, adjust, crop and rotate images, paint masks for generative fill,
//! apply AI style filters and keep results in an account or local gallery.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use retouch::config::Config;
use retouch::generative::GeminiClient;
use retouch::service::{EditorService, LibraryService, SessionStore};
use retouch::storage::{JsonGalleryStore, SqliteStorage};
use retouch::api::rest::{AppState, create_rest_router};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    info!("Starting Retouch v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load(Config::default_path()).unwrap_or_else(|e| {
        info!("Using default config ({})", e);
        Config::default()
    });

    info!("Configuration loaded:");
    info!("  REST port: {}", config.server.rest_port);
    info!("  Model: {}", config.generative.model);
    info!("  Max upload: {} bytes", config.editor.max_upload_bytes);
    info!("  Session idle timeout: {}s", config.editor.session_idle_timeout);

    if config.generative.resolved_api_key().is_none() {
        warn!("No model API key configured; AI tools will fail until one is set");
    }

    // Initialize storage
    let storage_path = config.storage.sqlite_path.to_string_lossy().to_string();
    let storage = Arc::new(SqliteStorage::new(&storage_path).await?);
    info!("SQLite storage initialized at: {}", storage_path);

    let gallery = Arc::new(JsonGalleryStore::open(config.gallery.path.clone())?);
    info!("Gallery file: {}", gallery.path().display());

    // Generative model client
    let model = Arc::new(GeminiClient::new(&config.generative)?);

    // Edit sessions and their cleanup task
    let sessions = Arc::new(SessionStore::new(Duration::from_secs(
        config.editor.session_idle_timeout,
    )));
    let sessions_clone = sessions.clone();
    tokio::spawn(async move {
        sessions_clone.start_cleanup_task().await;
    });

    let editor = Arc::new(EditorService::new(
        sessions.clone(),
        model,
        config.editor.max_upload_bytes,
    ));
    let library = Arc::new(LibraryService::new(
        storage,
        gallery,
        config.editor.max_upload_bytes,
    ));

    // Create REST app state
    let app_state = Arc::new(AppState {
        editor,
        library,
        start_time: Instant::now(),
    });

    let rest_router = create_rest_router(app_state, config.editor.body_limit);

    // Start REST server
    let addr = format!("0.0.0.0:{}", config.server.rest_port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("REST API listening on http://{}", addr);
    info!("Retouch is ready!");

    axum::serve(listener, rest_router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received, cleaning up...");
        })
        .await?;

    sessions.shutdown();

    info!("Goodbye!");
    Ok(())
}
