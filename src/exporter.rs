//! exporter.rs
//!
//! Export pipeline: read the four flat tables and fan them out into the
//! static JSON API tree.

use tracing::info;

use crate::config::Settings;
use crate::errors::PipelineError;
use crate::fanout::{write_aggregate, write_entities, write_groups, ApiTree};
use crate::flat_file::read_tables;

/// Counts reported at the end of an export run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSummary {
    pub provinces: usize,
    pub regencies: usize,
    pub districts: usize,
    pub villages: usize,
    /// Batch waits across all seven per-file groups
    pub batches: usize,
}

pub async fn run_export(settings: &Settings) -> Result<ExportSummary, PipelineError> {
    info!("Reading data...");
    let tables = read_tables(&settings.data_dir).await?;

    let tree = ApiTree::new(&settings.api_dir);
    tree.ensure_dirs().await?;
    let limit = settings.write_concurrency;

    write_aggregate(&tree, "provinces.json", &tables.provinces).await?;

    let mut batches = 0;
    batches += write_entities(&tree, "province", &tables.provinces, limit).await?;
    batches += write_groups(&tree, "regencies", &tables.provinces, &tables.regencies, limit).await?;
    batches += write_entities(&tree, "regency", &tables.regencies, limit).await?;
    batches += write_groups(&tree, "districts", &tables.regencies, &tables.districts, limit).await?;
    batches += write_entities(&tree, "district", &tables.districts, limit).await?;
    batches += write_groups(&tree, "villages", &tables.districts, &tables.villages, limit).await?;
    batches += write_entities(&tree, "village", &tables.villages, limit).await?;

    info!(api_dir = %tree.root().display(), "Done writing files!");

    Ok(ExportSummary {
        provinces: tables.provinces.len(),
        regencies: tables.regencies.len(),
        districts: tables.districts.len(),
        villages: tables.villages.len(),
        batches,
    })
}
