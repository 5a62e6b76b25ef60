mod analysis;
mod annotate;
mod config;
mod errors;
mod routes;
mod session;
mod state;
mod storage;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::annotate::AnnotateOptions;
use crate::config::Config;
use crate::routes::build_router;
use crate::session::FsSessionStore;
use crate::state::AppState;
use crate::storage::Storage;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CV adapter v{}", env!("CARGO_PKG_VERSION"));

    // Resolve storage directories
    let storage = Arc::new(Storage::resolve(&config.storage)?);
    info!("Storage base: {} ({:?})", storage.base().display(), storage.deployment());

    // Startup sweep of stale uploads and generated files
    let sweeper = storage.clone();
    let max_age = config.max_file_age_hours;
    match tokio::task::spawn_blocking(move || sweeper.sweep(max_age)).await {
        Ok(Ok(deleted)) => info!("Startup cleanup: {deleted} files deleted"),
        Ok(Err(e)) => error!("Startup cleanup failed: {e:#}"),
        Err(e) => error!("Startup cleanup task failed: {e}"),
    }

    // Sessions live next to the uploads
    let sessions = Arc::new(FsSessionStore::new(
        storage.uploads_dir().to_path_buf(),
        config.session_lifetime_secs,
    ));

    let annotate_options = AnnotateOptions {
        pdf_gate: config.pdf_gate,
    };
    info!("PDF highlight gate: {:?}", annotate_options.pdf_gate);

    // Build app state
    let state = AppState {
        config: config.clone(),
        storage,
        sessions,
        annotate_options,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
