//! Library entrypoint: re‑export modules

pub mod classify;
pub mod config;
pub mod errors;
pub mod exporter;
pub mod fanout;
pub mod flat_file;
pub mod ingestor;
pub mod metrics;
pub mod model;
