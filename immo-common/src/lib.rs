//! # immotep common library
//!
//! Shared code for the immotep crates:
//! - Error type
//! - Configuration loading (TOML + environment + defaults)
//! - SQLite schema creation and persisted row models

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
