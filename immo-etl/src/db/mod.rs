//! Database access for immo-etl
//!
//! Free functions over a shared `SqlitePool`: batched insert, keyed upsert,
//! conditional count, filtered/joined reads and truncate.

pub mod aggregates;
pub mod geo;
pub mod transactions;

pub use immo_common::db::{init_database, init_memory_database};
