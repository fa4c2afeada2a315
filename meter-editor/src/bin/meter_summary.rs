use std::sync::Arc;

use anyhow::Result;
use meter_editor::{config::AppConfig, observability, MeterEditor};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;
    let store = cfg.feature_service.connect()?;
    let editor = MeterEditor::new(Arc::new(store), cfg);

    let summary = editor.initialize().await?;
    let renderer = editor.renderer().await?;

    for class in &renderer.classes {
        tracing::info!(label = class.label, color = %class.color, count = class.count, "legend");
    }
    tracing::info!(
        total = summary.total,
        updated = summary.updated,
        needs_update = summary.needs_update,
        percent_updated = %format!("{:.1}", summary.percent_updated()),
        "meter account update summary"
    );

    Ok(())
}
