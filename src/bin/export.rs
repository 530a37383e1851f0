//! Entrypoint for the export pipeline: read the flat tables under `data_dir`
//! and write the static JSON tree under `api_dir`.
//!
//! Takes no arguments; everything comes from `Settings` (see `config.rs`).

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use wilayah_static_api::config::Settings;
use wilayah_static_api::exporter::run_export;
use wilayah_static_api::metrics;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ───────────────────────────────────────────────────────────────
    // 1. Initialise tracing / logging (defaults to `info`)
    // ───────────────────────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // ───────────────────────────────────────────────────────────────
    // 2. Load configuration
    // ───────────────────────────────────────────────────────────────
    let settings = Settings::new().context("failed to load configuration")?;
    info!(?settings, "Loaded configuration");

    // ───────────────────────────────────────────────────────────────
    // 3. Run the pipeline
    // ───────────────────────────────────────────────────────────────
    let summary = run_export(&settings)
        .await
        .context("export pipeline failed")?;
    info!(?summary, "Export complete");

    if let Some(path) = &settings.metrics_path {
        metrics::write_textfile(path)
            .await
            .context("failed to write metrics textfile")?;
    }

    Ok(())
}
