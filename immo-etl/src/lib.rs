//! immo-etl library
//!
//! Ingestion, geocoding reconciliation and yearly aggregation of real-estate
//! sale records. The `immo-etl` binary is a thin front end over these
//! components.

pub mod aggregate;
pub mod config;
pub mod db;
pub mod geocode;
pub mod ingest;

pub use aggregate::{AggregateReport, AggregationEngine, LevelReport};
pub use geocode::{ReconcileReport, Reconciler};
pub use ingest::{IngestOptions, IngestReport, Ingestor};
