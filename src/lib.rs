//! modelsweep -- parameter-sweep test campaigns for remote LLM inference
//! services.
//!
//! This crate provides the core library for sweep expansion, duration
//! estimation, worker planning, batch execution, result aggregation, and
//! campaign lifecycle management.

pub mod analysis;
pub mod api;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod settings;
pub mod storage;
pub mod sweep;

use crate::config::{ConfigLibrary, ModelCatalog};
use crate::engine::HttpCaseExecutor;
use crate::orchestrator::Orchestrator;
use crate::settings::Settings;
use crate::storage::{MemoryStore, PersistenceStore, SqliteStore};
use anyhow::Result;
use std::sync::Arc;

/// Wire up the orchestrator from settings.
pub fn build_orchestrator(settings: &Settings) -> Result<Arc<Orchestrator>> {
    let store: Arc<dyn PersistenceStore> = if settings.db_path == "memory" {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(SqliteStore::open(&settings.db_path)?)
    };

    let catalog = match &settings.catalog_path {
        Some(path) => ModelCatalog::load(std::path::Path::new(path))?,
        None => ModelCatalog::default(),
    };

    let executor = Arc::new(HttpCaseExecutor::new(settings.inference_url.clone()));
    let dispatcher = dispatch::from_settings(&settings.dispatcher)?;

    Ok(Arc::new(Orchestrator::new(
        store, executor, dispatcher, catalog,
    )))
}

/// Start the modelsweep daemon: API server plus the in-process worker pool.
pub async fn serve(bind: &str, settings: &Settings) -> Result<()> {
    tracing::info!(db_path = %settings.db_path, "Initializing persistence");
    let orchestrator = build_orchestrator(settings)?;
    let configs = ConfigLibrary::new(&settings.config_dir);

    let state = api::AppState {
        orchestrator,
        configs,
    };

    let addr: std::net::SocketAddr = bind.parse()?;
    let app = api::router(state);

    tracing::info!(%addr, "modelsweep listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
