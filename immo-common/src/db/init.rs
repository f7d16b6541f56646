//! Database initialization
//!
//! Opens (or creates) the SQLite file and creates every table idempotently.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

pub const CITY_YEARLY_AGGS: &str = "city_yearly_aggs";
pub const DEPARTMENT_YEARLY_AGGS: &str = "department_yearly_aggs";
pub const REGION_YEARLY_AGGS: &str = "region_yearly_aggs";

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Jobs are single-pass and sequential; a small pool is enough
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// In-memory database on a single connection (each connection of
/// `sqlite::memory:` would otherwise see its own empty database)
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables (idempotent - safe to call multiple times)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_transactions_table(pool).await?;
    create_regions_table(pool).await?;
    create_departments_table(pool).await?;
    create_cities_table(pool).await?;

    for table in [CITY_YEARLY_AGGS, DEPARTMENT_YEARLY_AGGS, REGION_YEARLY_AGGS] {
        create_yearly_agg_table(pool, table).await?;
    }

    Ok(())
}

/// Every column carries a default so a keyed upsert listing only some
/// columns passes NOT NULL checks before conflict resolution.
async fn create_transactions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            tr_id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL DEFAULT '',
            address TEXT NOT NULL DEFAULT '',
            zip_code INTEGER NOT NULL DEFAULT -1,
            city TEXT NOT NULL DEFAULT '',
            city_code TEXT NOT NULL DEFAULT '',
            department_code TEXT NOT NULL DEFAULT '',
            price REAL NOT NULL DEFAULT 0,
            price_psqm REAL NOT NULL DEFAULT 0,
            area INTEGER NOT NULL DEFAULT 0,
            full_area INTEGER NOT NULL DEFAULT 0,
            nb_room INTEGER NOT NULL DEFAULT 0,
            cadastre TEXT NOT NULL DEFAULT '',
            type_culture TEXT NOT NULL DEFAULT '',
            lat REAL NOT NULL DEFAULT 0,
            long REAL NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_lat_long ON transactions(lat, long)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_transactions_department ON transactions(department_code)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_city_code ON transactions(city_code)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_regions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS regions (
            code TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            avg_price REAL NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_departments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS departments (
            code TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            avg_price REAL NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_cities_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cities (
            code TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            name_upper TEXT NOT NULL DEFAULT '',
            zip_code INTEGER NOT NULL DEFAULT -1,
            population INTEGER NOT NULL DEFAULT 0,
            code_department TEXT NOT NULL DEFAULT '',
            code_region TEXT NOT NULL DEFAULT '',
            avg_price REAL NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_cities_name_upper ON cities(name_upper)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_yearly_agg_table(pool: &SqlitePool, table: &str) -> Result<()> {
    let sql = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            code TEXT NOT NULL,
            year INTEGER NOT NULL,
            name TEXT NOT NULL DEFAULT '',
            avg_price REAL NOT NULL,
            increase REAL NOT NULL DEFAULT 0,
            PRIMARY KEY (code, year)
        )
        "#,
        table
    );

    sqlx::query(&sql).execute(pool).await?;

    Ok(())
}
