//! Prometheus metrics registry and metric definitions.
//!
//! Both pipelines are short-lived batch jobs, so nothing is scraped over HTTP;
//! the registry is dumped to a textfile at the end of a run instead.

use std::path::Path;

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::errors::PipelineError;

/// Global registry under crate namespace
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    Registry::new_custom(Some("wilayah".into()), None)
        .expect("failed to create Prometheus registry")
});

/// Duration of the SQL dump download
pub static FETCH_HISTOGRAM: Lazy<Histogram> = Lazy::new(|| {
    let opts = HistogramOpts::new(
        "fetch_duration_seconds",
        "Duration of the SQL dump download in seconds",
    );
    let h = Histogram::with_opts(opts).expect("histogram opts");
    REGISTRY.register(Box::new(h.clone())).unwrap();
    h
});

/// Raw rows read back from the scratch store
pub static ROWS_LOADED: Lazy<IntCounter> = Lazy::new(|| {
    let opts = Opts::new("rows_loaded_total", "Raw rows read from the scratch store");
    let c = IntCounter::with_opts(opts).expect("counter opts");
    REGISTRY.register(Box::new(c.clone())).unwrap();
    c
});

/// Rows routed into each of the four tables
pub static ROWS_CLASSIFIED: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new("rows_classified_total", "Rows routed into a division table");
    let c = IntCounterVec::new(opts, &["table"]).expect("counter vec opts");
    REGISTRY.register(Box::new(c.clone())).unwrap();
    c
});

/// Rows whose code depth matched no table
pub static ROWS_DROPPED: Lazy<IntCounter> = Lazy::new(|| {
    let opts = Opts::new("rows_dropped_total", "Rows with an unsupported code depth");
    let c = IntCounter::with_opts(opts).expect("counter opts");
    REGISTRY.register(Box::new(c.clone())).unwrap();
    c
});

/// JSON files successfully written
pub static FILES_WRITTEN: Lazy<IntCounter> = Lazy::new(|| {
    let opts = Opts::new("files_written_total", "JSON files written by the fan-out");
    let c = IntCounter::with_opts(opts).expect("counter opts");
    REGISTRY.register(Box::new(c.clone())).unwrap();
    c
});

/// JSON file writes that failed
pub static WRITE_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    let opts = Opts::new("write_failures_total", "JSON file writes that failed");
    let c = IntCounter::with_opts(opts).expect("counter opts");
    REGISTRY.register(Box::new(c.clone())).unwrap();
    c
});

/// Time spent waiting on one fan-out batch
pub static BATCH_HISTOGRAM: Lazy<Histogram> = Lazy::new(|| {
    let opts = HistogramOpts::new(
        "batch_wait_seconds",
        "Time spent awaiting one batch of concurrent writes",
    );
    let h = Histogram::with_opts(opts).expect("histogram opts");
    REGISTRY.register(Box::new(h.clone())).unwrap();
    h
});

/// Encode all metrics as text
pub fn gather_metrics() -> Result<String, PipelineError> {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let mf = REGISTRY.gather();
    encoder.encode(&mf, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Dump the registry in text exposition format, for a textfile collector.
pub async fn write_textfile(path: &Path) -> Result<(), PipelineError> {
    let text = gather_metrics()?;
    tokio::fs::write(path, text)
        .await
        .map_err(|e| PipelineError::io(path, e))
}
