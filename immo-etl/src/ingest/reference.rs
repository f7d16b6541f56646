//! In-memory city reference used to fill missing zip codes
//!
//! Built once per ingestion run from the `cities` table, optionally merged
//! with the postal service's semicolon-delimited city/zip file.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use immo_common::Result;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use super::record::decode_lossy;
use crate::db::geo;

/// What the reference knows about one city code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityRef {
    pub zip_code: i64,
    pub department_code: String,
    pub region_code: String,
    pub name: String,
}

#[derive(Debug, Default)]
pub struct ReferenceIndex {
    by_code: HashMap<String, CityRef>,
    zip_by_name: HashMap<String, i64>,
}

/// Uppercase a city name and strip its accents ("Saint-Étienne" → "SAINT-ETIENNE")
pub fn normalize_city_name(name: &str) -> String {
    name.trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_uppercase()
}

impl ReferenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every city of the reference tables
    pub async fn from_database(pool: &SqlitePool) -> Result<Self> {
        let cities = geo::load_cities(pool).await?;
        let mut index = Self::new();

        for city in cities {
            let name_key = if city.name_upper.is_empty() {
                normalize_city_name(&city.name)
            } else {
                normalize_city_name(&city.name_upper)
            };
            index.zip_by_name.entry(name_key).or_insert(city.zip_code);

            index.by_code.insert(
                city.code,
                CityRef {
                    zip_code: city.zip_code,
                    department_code: city.code_department,
                    region_code: city.code_region,
                    name: city.name,
                },
            );
        }

        info!(
            cities = index.by_code.len(),
            names = index.zip_by_name.len(),
            "Reference index loaded from database"
        );

        Ok(index)
    }

    /// Merge a city/zip file; an unreadable file is logged and adds nothing
    pub fn merge_zipcode_file(&mut self, path: &Path) -> usize {
        let file = match std::fs::File::open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot open zip code file, skipping");
                return 0;
            }
        };

        match self.merge_zipcode_reader(file) {
            Ok(added) => {
                info!(path = %path.display(), added, "Zip code file merged");
                added
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read zip code file, skipping");
                0
            }
        }
    }

    /// Merge `INSEE code;city name;zip;...` rows (header skipped)
    ///
    /// Returns the number of new name keys. Names already known keep their zip.
    /// Rows that cannot be interpreted are skipped; only an I/O failure stops
    /// the merge.
    pub fn merge_zipcode_reader<R: Read>(&mut self, reader: R) -> Result<usize> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(true)
            .flexible(true)
            .quoting(false)
            .from_reader(reader);

        let mut added = 0;
        for (row, record) in csv_reader.byte_records().enumerate() {
            let record = match record {
                Ok(record) => decode_lossy(&record),
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    debug!(row, error = %e, "Skipping unreadable zip code row");
                    continue;
                }
            };
            let (Some(name), Some(zip)) = (record.get(1), record.get(2)) else {
                continue;
            };

            let zip = match zip.trim().trim_start_matches('0').parse::<i64>() {
                Ok(z) => z,
                Err(_) => {
                    debug!(name, zip, "Skipping unparseable zip code");
                    continue;
                }
            };

            let key = normalize_city_name(name);
            let alternate = key.replace(' ', "-");

            for k in [key, alternate] {
                if !self.zip_by_name.contains_key(&k) {
                    self.zip_by_name.insert(k, zip);
                    added += 1;
                }
            }
        }

        Ok(added)
    }

    /// Register one city by code (tests and ad-hoc seeding)
    pub fn insert_city(&mut self, code: impl Into<String>, city: CityRef) {
        self.zip_by_name
            .entry(normalize_city_name(&city.name))
            .or_insert(city.zip_code);
        self.by_code.insert(code.into(), city);
    }

    pub fn city(&self, code: &str) -> Option<&CityRef> {
        self.by_code.get(code)
    }

    /// Zip of a city: by code, then by normalized name, then hyphenated name
    pub fn lookup_zip(&self, city_code: &str, city_name: &str) -> Option<i64> {
        if let Some(city) = self.by_code.get(city_code) {
            return Some(city.zip_code);
        }

        let key = normalize_city_name(city_name);
        if let Some(zip) = self.zip_by_name.get(&key) {
            return Some(*zip);
        }

        self.zip_by_name.get(&key.replace(' ', "-")).copied()
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty() && self.zip_by_name.is_empty()
    }
}
