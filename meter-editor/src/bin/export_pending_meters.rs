use std::{env, fs::File, io, sync::Arc};

use anyhow::{Context, Result};
use meter_editor::{config::AppConfig, export, observability, MeterEditor};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Optional output path; stdout otherwise.
    let out_path = env::args().nth(1);

    let cfg = AppConfig::load()?;
    let store = cfg.feature_service.connect()?;
    let editor = MeterEditor::new(Arc::new(store), cfg);
    editor.initialize().await?;

    let records = editor.records().await?;
    let rows = match &out_path {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("creating {path}"))?;
            export::write_pending_csv(&records, file)?
        }
        None => export::write_pending_csv(&records, io::stdout().lock())?,
    };

    tracing::info!(rows, total = records.len(), "pending meters exported");
    Ok(())
}
