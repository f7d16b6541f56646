//! Database models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Zip code recorded when no resolution source knows the city
pub const UNRESOLVED_ZIP: i64 = -1;

/// One accepted house sale
///
/// `lat`/`long` at (0, 0) means the record has not been geocoded yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Transaction {
    /// Assigned by the database on insert
    pub tr_id: Option<i64>,
    pub date: NaiveDate,
    pub address: String,
    pub zip_code: i64,
    pub city: String,
    pub city_code: String,
    pub department_code: String,
    pub price: f64,
    /// `price / area`, only ever computed with `area > 0`
    pub price_psqm: f64,
    /// Built area in square meters
    pub area: i64,
    /// Total parcel area in square meters (0 when unknown)
    pub full_area: i64,
    pub nb_room: i64,
    pub cadastre: String,
    pub type_culture: String,
    pub lat: f64,
    pub long: f64,
}

impl Transaction {
    pub fn is_geocoded(&self) -> bool {
        self.lat != 0.0 || self.long != 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Region {
    pub code: String,
    pub name: String,
    pub avg_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Department {
    pub code: String,
    pub name: String,
    pub avg_price: f64,
}

/// City reference entry; department and region codes are recorded independently
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct City {
    pub code: String,
    pub name: String,
    /// Uppercase, accent-free name used for zip fallback lookups
    pub name_upper: String,
    pub zip_code: i64,
    pub population: i64,
    pub code_department: String,
    pub code_region: String,
    pub avg_price: f64,
}

/// Derived (unit code, year) statistic; the tables holding these are rebuilt on every run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct YearlyAggregate {
    pub code: String,
    pub year: i64,
    pub name: String,
    pub avg_price: f64,
    /// Relative change versus the previous year on record for the same code
    pub increase: f64,
}
