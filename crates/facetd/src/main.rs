use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use facet_core::{AnalyzerConfig, Analyzer, FaceMeshDetector, ModelRegistry};
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;
mod history;

use config::Config;
use dbus_interface::{ConsultantService, BUS_NAME, OBJECT_PATH};
use engine::EngineHandle;
use history::MemoryStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("facetd starting");
    let config = Config::from_env();

    let tuning = match &config.tuning_file {
        Some(path) => AnalyzerConfig::load(path)?,
        None => AnalyzerConfig::default(),
    };

    let registry = if config.use_oracles {
        ModelRegistry::load(&config.model_dir)
    } else {
        tracing::info!("oracles disabled via FACET_USE_ORACLES=0");
        ModelRegistry::empty()
    };
    tracing::info!(oracles = ?registry.loaded(), model_dir = %config.model_dir.display(), "model registry ready");

    let mut analyzer = Analyzer::new(tuning, registry);
    match FaceMeshDetector::load(config.face_mesh_model_path()) {
        Ok(detector) => analyzer = analyzer.with_detector(Arc::new(detector)),
        Err(e) => tracing::warn!(
            error = %e,
            "face-mesh detector unavailable; callers must supply landmarks"
        ),
    }

    let engine = EngineHandle::new(
        analyzer,
        Duration::from_millis(config.oracle_timeout_ms),
        config.max_concurrent,
    );
    let store = Arc::new(MemoryStore::new(config.history_limit));
    let service = ConsultantService::new(engine, store);

    let _conn = zbus::connection::Builder::session()?
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await?;

    tracing::info!(bus_name = BUS_NAME, path = OBJECT_PATH, "facetd ready");

    // Keep running until signaled
    tokio::signal::ctrl_c().await?;
    tracing::info!("facetd shutting down");

    Ok(())
}
