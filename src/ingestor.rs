//! ingestor.rs
//!
//! Update pipeline: download the SQL dump, execute it into a scratch SQLite
//! store, classify every row, and persist the four flat tables.

use std::time::Instant;

use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;

use crate::classify::{Tables, WilayahRecord};
use crate::config::Settings;
use crate::errors::PipelineError;
use crate::flat_file::write_tables;
use crate::metrics::{FETCH_HISTOGRAM, ROWS_LOADED};

/// Counts reported at the end of an update run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateSummary {
    pub rows: usize,
    pub provinces: usize,
    pub regencies: usize,
    pub districts: usize,
    pub villages: usize,
    pub dropped: usize,
}

/// Fetch the SQL dump at `url` as text.
pub async fn fetch_dump(url: &str) -> Result<String, PipelineError> {
    let start = Instant::now();

    let sql = reqwest::get(url)
        .await
        .and_then(|resp| resp.error_for_status())
        .map_err(|e| PipelineError::Fetch(url.to_string(), e))?
        .text()
        .await
        .map_err(|e| PipelineError::Fetch(url.to_string(), e))?;

    FETCH_HISTOGRAM.observe(start.elapsed().as_secs_f64());
    Ok(sql)
}

/// Execute `sql` into the scratch store and read back every `wilayah` row.
///
/// A single connection is used so an in-memory database survives between
/// the script and the select.
pub async fn load_records(database_url: &str, sql: &str) -> Result<Vec<WilayahRecord>, PipelineError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(database_url)
        .await?;

    sqlx::raw_sql(sql).execute(&pool).await?;

    let records: Vec<WilayahRecord> =
        sqlx::query_as("SELECT kode, COALESCE(nama, '') AS nama FROM wilayah")
            .fetch_all(&pool)
            .await?;
    pool.close().await;

    ROWS_LOADED.inc_by(records.len() as u64);
    Ok(records)
}

/// Everything after the download: load, classify, write.
pub async fn ingest_dump(settings: &Settings, sql: &str) -> Result<UpdateSummary, PipelineError> {
    info!("Loading database...");
    let records = load_records(&settings.database_url, sql).await?;
    info!(count = records.len(), "Database loaded!");

    info!("Parsing data...");
    let (tables, dropped) = Tables::from_records(&records);
    info!(
        provinces = tables.provinces.len(),
        regencies = tables.regencies.len(),
        districts = tables.districts.len(),
        villages = tables.villages.len(),
        dropped,
        "Data parsed!"
    );

    info!("Writing data...");
    write_tables(&settings.data_dir, &tables).await?;
    info!(data_dir = %settings.data_dir.display(), "Data written!");

    Ok(UpdateSummary {
        rows: records.len(),
        provinces: tables.provinces.len(),
        regencies: tables.regencies.len(),
        districts: tables.districts.len(),
        villages: tables.villages.len(),
        dropped,
    })
}

/// Full update run: download the dump, then [`ingest_dump`].
pub async fn run_update(settings: &Settings) -> Result<UpdateSummary, PipelineError> {
    info!(url = %settings.source_url, "Downloading database...");
    let sql = fetch_dump(&settings.source_url).await?;
    info!(bytes = sql.len(), "Database downloaded!");

    ingest_dump(settings, &sql).await
}
