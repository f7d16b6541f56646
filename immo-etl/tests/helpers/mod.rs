//! Test Helper Utilities
//!
//! Shared fixtures for immo-etl integration tests: temporary databases,
//! reference seeding, raw sale rows and stored transactions.

#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;

use chrono::NaiveDate;
use immo_common::db::{init_database, City, Department, Region, Transaction};
use immo_etl::db::{geo, transactions};
use immo_etl::ingest::columns;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Create a file-backed test database
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("immotep.db"))
        .await
        .unwrap();
    (temp_dir, pool)
}

/// Seed two regions, two departments and three cities
///
/// Brest and Quimper are in Finistère (29, Bretagne 53), Ajaccio in
/// Corse-du-Sud (2A, Corse 94).
pub async fn seed_reference(pool: &SqlitePool) {
    for (code, name) in [("53", "Bretagne"), ("94", "Corse")] {
        geo::upsert_region(
            pool,
            &Region {
                code: code.to_string(),
                name: name.to_string(),
                avg_price: 0.0,
            },
        )
        .await
        .unwrap();
    }

    for (code, name) in [("29", "Finistère"), ("2A", "Corse-du-Sud")] {
        geo::upsert_department(
            pool,
            &Department {
                code: code.to_string(),
                name: name.to_string(),
                avg_price: 0.0,
            },
        )
        .await
        .unwrap();
    }

    for (code, name, zip, dep, reg) in [
        ("29019", "Brest", 29200, "29", "53"),
        ("29232", "Quimper", 29000, "29", "53"),
        ("2A004", "Ajaccio", 20000, "2A", "94"),
    ] {
        geo::upsert_city(
            pool,
            &City {
                code: code.to_string(),
                name: name.to_string(),
                name_upper: name.to_uppercase(),
                zip_code: zip,
                population: 0,
                code_department: dep.to_string(),
                code_region: reg.to_string(),
                avg_price: 0.0,
            },
        )
        .await
        .unwrap();
    }
}

/// Builder for one raw pipe-delimited sale row
#[derive(Debug, Clone)]
pub struct RawRow {
    fields: Vec<String>,
}

impl RawRow {
    /// A valid house sale in Brest: 100 000 € for 50 m²
    pub fn house() -> Self {
        let mut fields = vec![String::new(); columns::COLUMN_COUNT];
        fields[columns::DATE] = "15/03/2021".to_string();
        fields[columns::SALE_TYPE] = "Vente".to_string();
        fields[columns::PRICE] = "100000,00".to_string();
        fields[columns::STREET_NUMBER] = "12".to_string();
        fields[columns::STREET_TYPE] = "RUE".to_string();
        fields[columns::STREET_NAME] = "DE SIAM".to_string();
        fields[columns::ZIP] = "29200".to_string();
        fields[columns::CITY] = "BREST".to_string();
        fields[columns::DEPARTMENT] = "29".to_string();
        fields[columns::CITY_LOCAL_CODE] = "19".to_string();
        fields[columns::CADASTRE_SECTION] = "AB".to_string();
        fields[columns::CADASTRE_PARCEL] = "101".to_string();
        fields[columns::PROPERTY_TYPE] = "Maison".to_string();
        fields[columns::BUILT_AREA] = "50".to_string();
        fields[columns::ROOM_COUNT] = "4".to_string();
        fields[columns::TOTAL_AREA] = "300".to_string();
        Self { fields }
    }

    pub fn set(mut self, column: usize, value: &str) -> Self {
        self.fields[column] = value.to_string();
        self
    }

    pub fn line(&self) -> String {
        self.fields.join("|")
    }
}

/// Header line of the raw file (content is never interpreted)
pub fn raw_header() -> String {
    (0..columns::COLUMN_COUNT)
        .map(|i| format!("Col{}", i))
        .collect::<Vec<_>>()
        .join("|")
}

/// Full raw file content: header then rows
pub fn raw_file(rows: &[RawRow]) -> String {
    let mut text = raw_header();
    for row in rows {
        text.push('\n');
        text.push_str(&row.line());
    }
    text.push('\n');
    text
}

/// Write a raw file into `dir`
pub fn write_raw_file(dir: &TempDir, name: &str, rows: &[RawRow]) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(raw_file(rows).as_bytes()).unwrap();
    path
}

/// A stored-transaction fixture
pub fn transaction(city_code: &str, year: i32, price_psqm: f64) -> Transaction {
    let department = &city_code[..2];
    Transaction {
        tr_id: None,
        date: NaiveDate::from_ymd_opt(year, 6, 15).unwrap(),
        address: "1 PLACE DE LA MAIRIE".to_string(),
        zip_code: 29200,
        city: "UNKNOWN".to_string(),
        city_code: city_code.to_string(),
        department_code: department.to_string(),
        price: price_psqm * 100.0,
        price_psqm,
        area: 100,
        full_area: 0,
        nb_room: 4,
        cadastre: String::new(),
        type_culture: String::new(),
        lat: 0.0,
        long: 0.0,
    }
}

pub async fn insert_transactions(pool: &SqlitePool, batch: &[Transaction]) {
    transactions::insert_batch(pool, batch).await.unwrap();
}
