// VitalChat Backend Entry Point
// Korean conversational queries over PPG / HRV / stress readings

mod actors;
mod analytics;
mod brain;
mod config;
mod database;
mod error;
mod fs_manager;
mod handlers;
mod history;
mod models;
mod names;
mod prompts;
mod server;

#[cfg(test)]
mod tests;

use actors::llm::{LlmActorHandle, LlmClientConfig};
use actors::rag::RagActorHandle;
use actors::supervisor::{SupervisorHandle, SupervisorSettings};
use config::{AppConfig, LogFormat};
use fs_manager::PortablePathManager;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(JsonStorageLayer)
            .with(BunyanFormattingLayer::new("vitalchat".to_string(), std::io::stdout))
            .init(),
    }
}

/// Configured corpus, else `data/corpus.json` when it exists.
fn resolve_corpus_path(config: &AppConfig) -> Option<PathBuf> {
    if let Some(path) = &config.rag_corpus_path {
        return Some(PathBuf::from(path));
    }
    let default = PortablePathManager::default_corpus_path();
    if default.exists() {
        Some(default)
    } else {
        warn!("No retrieval corpus found; semantic answers will have no references");
        None
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);
    info!("Starting VitalChat (name refresh: {})", config.name_refresh);

    PortablePathManager::prepare_database_dir(&config.database_url)?;
    let pool = database::init_db(&config.database_url, config.database_max_connections).await?;
    info!("Readings store ready: {}", config.database_url);

    let llm = Arc::new(LlmActorHandle::new(LlmClientConfig::from_app_config(&config)));
    let rag = Arc::new(RagActorHandle::new(
        resolve_corpus_path(&config),
        PortablePathManager::data_dir().join("models").join("embeddings"),
    ));
    let supervisor = SupervisorHandle::new(pool, llm, rag, SupervisorSettings::from_app_config(&config));

    let app = server::create_router(server::ServerState {
        supervisor: supervisor.clone(),
    });
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    supervisor.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}
