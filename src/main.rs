mod config;
mod db;
mod error;
mod image;
mod model;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::model::{ImageModel, ModelClient};
use crate::services::quota::{MemoryQuotaStore, PgQuotaStore, QuotaStore};
use crate::services::store::{FileStore, LocalStore, MemoryStore};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::AppConfig::from_env();

    let quota: Arc<dyn QuotaStore> = match &config.database_url {
        Some(url) => {
            let pool = db::init_pool(url, config.db_max_connections).await.expect("database init failed");
            tracing::info!("quota store: postgres");
            Arc::new(PgQuotaStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; quota records kept in memory");
            Arc::new(MemoryQuotaStore::new())
        }
    };

    let store: Arc<dyn LocalStore> = match &config.store_dir {
        Some(dir) => {
            let store = FileStore::open(dir, config.store_max_value_bytes)
                .await
                .expect("store directory init failed");
            tracing::info!(dir = %store.dir().display(), "local store: files");
            Arc::new(store)
        }
        None => {
            tracing::warn!("STORE_DIR not set; editor state kept in memory");
            Arc::new(MemoryStore::new(config.store_max_value_bytes))
        }
    };

    // Initialize model client (non-fatal: AI edits disabled if config missing).
    let model: Option<Arc<dyn ImageModel>> = match ModelClient::from_env() {
        Ok(client) => {
            tracing::info!(model = client.model(), service_key = client.has_service_key(), "model client initialized");
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!(error = %e, "model client not configured; AI edits disabled");
            None
        }
    };

    let state = state::AppState::new(quota, store, model);
    let _sweeper = services::editor::spawn_session_sweeper(state.clone(), config.session_idle);

    let app = routes::app(state);
    let port = config.port;
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "imagigenius listening");
    axum::serve(listener, app).await.expect("server failed");
}
