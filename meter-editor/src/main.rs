use std::sync::Arc;

use anyhow::Result;
use meter_editor::{config::AppConfig, metrics_server, observability, server, MeterEditor};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let store = cfg.feature_service.connect()?;
    tracing::info!(layer_url = %store.layer_url(), "using feature service");

    let bind_addr = cfg.server.bind_addr.clone();
    let editor = Arc::new(MeterEditor::new(Arc::new(store), cfg));

    // Serve while loading so clients can watch /api/status. A failed load
    // leaves the service up in the failed state.
    let loader = editor.clone();
    tokio::spawn(async move {
        if let Err(e) = loader.initialize().await {
            tracing::error!(error = %e, "initial meter load failed");
        }
    });

    server::serve(&bind_addr, editor).await
}
