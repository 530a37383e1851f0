//! Entrypoint for the update pipeline: download the SQL dump and rebuild the
//! four flat tables under `data_dir`.
//!
//! Takes no arguments; everything comes from `Settings` (see `config.rs`).

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use wilayah_static_api::config::Settings;
use wilayah_static_api::ingestor::run_update;
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
    let summary = run_update(&settings)
        .await
        .context("update pipeline failed")?;
    info!(?summary, "Update complete");

    if let Some(path) = &settings.metrics_path {
        metrics::write_textfile(path)
            .await
            .context("failed to write metrics textfile")?;
    }

    Ok(())
}
