mod config;
mod errors;
mod extraction;
mod llm_client;
mod quiz;
mod routes;
mod state;
mod uploads;

#[cfg(test)]
mod test_utils;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::quiz::QuizGenerator;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Quizforge API v{}", env!("CARGO_PKG_VERSION"));

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("Failed to create upload dir {}", config.upload_dir.display()))?;
    info!("Upload dir: {}", config.upload_dir.display());

    // Initialize LLM client
    let llm = LlmClient::new(&config).context("Failed to build provider HTTP client")?;
    info!(
        "LLM client initialized (model: {}, keep remote files: {})",
        llm.model(),
        config.keep_remote_files
    );

    let generator = Arc::new(QuizGenerator::new(Arc::new(llm), config.keep_remote_files));

    let state = AppState {
        config: config.clone(),
        generator,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
