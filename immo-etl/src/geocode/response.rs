//! Geocoder CSV response adapter
//!
//! The batch service echoes the request columns and appends its own result
//! columns. Offsets depend on the request header sent by
//! [`super::request`]; if either side changes shape, only
//! [`ResponseLayout`] needs updating.

use csv::StringRecord;
use thiserror::Error;

/// Why a response row could not be applied
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowError {
    #[error("row has {len} fields, expected at least {expected}")]
    TooShort { len: usize, expected: usize },

    #[error("unparseable row id '{0}'")]
    BadId(String),

    #[error("row id {0} was not part of the request")]
    UnknownId(i64),

    #[error("row {tr_id}: unparseable coordinate '{value}'")]
    BadCoordinate { tr_id: i64, value: String },

    #[error("row {tr_id}: no position found (status '{status}')")]
    NoPosition { tr_id: i64, status: String },

    #[error("malformed CSV row: {0}")]
    Malformed(String),
}

impl RowError {
    /// Request id the failing row answered, when it could be read
    pub fn tr_id(&self) -> Option<i64> {
        match self {
            RowError::UnknownId(id) => Some(*id),
            RowError::BadCoordinate { tr_id, .. } | RowError::NoPosition { tr_id, .. } => {
                Some(*tr_id)
            }
            RowError::TooShort { .. } | RowError::BadId(_) | RowError::Malformed(_) => None,
        }
    }
}

/// One successfully geocoded row
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedRow {
    pub tr_id: i64,
    pub lat: f64,
    pub long: f64,
    pub address: String,
    /// `None` when the service returned no usable zip
    pub zip_code: Option<i64>,
    pub city: String,
    pub city_code: String,
    pub status: String,
}

/// Column offsets of the geocoder response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseLayout {
    pub id: usize,
    pub longitude: usize,
    pub latitude: usize,
    pub address: usize,
    pub zip: usize,
    pub city: usize,
    pub city_code: usize,
    pub status: usize,
}

impl ResponseLayout {
    /// National address base `/search/csv/` answering a `trid,Address,ZipCode,City` request
    pub const ADRESSE_CSV: ResponseLayout = ResponseLayout {
        id: 0,
        longitude: 3,
        latitude: 4,
        address: 7,
        zip: 13,
        city: 14,
        city_code: 16,
        status: 20,
    };

    /// Fields a row needs before any offset can be read
    pub fn min_len(&self) -> usize {
        [
            self.id,
            self.longitude,
            self.latitude,
            self.address,
            self.zip,
            self.city,
            self.city_code,
            self.status,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
            + 1
    }

    /// Interpret one data row
    pub fn parse_row(&self, record: &StringRecord) -> Result<GeocodedRow, RowError> {
        if record.len() < self.min_len() {
            return Err(RowError::TooShort {
                len: record.len(),
                expected: self.min_len(),
            });
        }

        let field = |i: usize| record.get(i).unwrap_or_default().trim();

        let raw_id = field(self.id);
        let tr_id = raw_id
            .parse::<i64>()
            .map_err(|_| RowError::BadId(raw_id.to_string()))?;

        let status = field(self.status).to_string();
        let (raw_lat, raw_long) = (field(self.latitude), field(self.longitude));
        if raw_lat.is_empty() && raw_long.is_empty() {
            return Err(RowError::NoPosition { tr_id, status });
        }

        let lat = parse_coordinate(tr_id, raw_lat)?;
        let long = parse_coordinate(tr_id, raw_long)?;
        if lat == 0.0 && long == 0.0 {
            return Err(RowError::NoPosition { tr_id, status });
        }

        Ok(GeocodedRow {
            tr_id,
            lat,
            long,
            address: field(self.address).to_string(),
            zip_code: field(self.zip).parse::<i64>().ok().filter(|z| *z > 0),
            city: field(self.city).to_string(),
            city_code: field(self.city_code).to_string(),
            status,
        })
    }

    /// Parse a whole response body (header row first)
    pub fn parse_response(&self, body: &[u8]) -> Vec<Result<GeocodedRow, RowError>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(body);

        reader
            .records()
            .map(|record| match record {
                Ok(record) => self.parse_row(&record),
                Err(e) => Err(RowError::Malformed(e.to_string())),
            })
            .collect()
    }
}

impl Default for ResponseLayout {
    fn default() -> Self {
        Self::ADRESSE_CSV
    }
}

fn parse_coordinate(tr_id: i64, raw: &str) -> Result<f64, RowError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| RowError::BadCoordinate {
            tr_id,
            value: raw.to_string(),
        })
}
