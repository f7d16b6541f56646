//! Turning one raw row into a Transaction
//!
//! Candidate selection, field normalization and the per-row accept/reject
//! decision. Nothing here touches storage.

use std::fmt;

use chrono::NaiveDate;
use csv::{ByteRecord, StringRecord};
use immo_common::db::{Transaction, UNRESOLVED_ZIP};
use serde::Serialize;
use tracing::debug;

use super::columns;
use super::reference::ReferenceIndex;

const DATE_FORMAT: &str = "%d/%m/%Y";

/// Why a candidate row was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RejectReason {
    MissingPrice,
    MissingArea,
    /// Built area parsed but is not positive
    ZeroArea,
    MissingDate,
    /// Fewer fields than the column layout
    Truncated,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::MissingPrice => "missing or unparseable price",
            RejectReason::MissingArea => "missing or unparseable built area",
            RejectReason::ZeroArea => "built area is zero",
            RejectReason::MissingDate => "missing or unparseable date",
            RejectReason::Truncated => "row shorter than the column layout",
        };
        f.write_str(s)
    }
}

/// A rejected row kept for inspection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRow {
    /// 1-based line in the source file (header is line 1)
    pub line: u64,
    pub reason: RejectReason,
    pub fields: Vec<String>,
}

/// Outcome of deriving a candidate row
#[derive(Debug, Clone, PartialEq)]
pub enum Derivation {
    Accepted {
        transaction: Transaction,
        /// No zip in the row and none found in the reference
        zip_unresolved: bool,
    },
    /// Overseas territory (department code longer than two characters)
    Excluded,
    Rejected(RejectReason),
}

/// Decode a raw row field by field, replacing invalid UTF-8 sequences
///
/// Source files occasionally carry Latin-1 bytes in free-text fields.
pub fn decode_lossy(record: &ByteRecord) -> StringRecord {
    record
        .iter()
        .map(|field| String::from_utf8_lossy(field))
        .collect()
}

/// House sale with a price and a room count
///
/// Anything else is skipped without being counted as rejected.
pub fn is_candidate(record: &StringRecord) -> bool {
    let field = |i: usize| record.get(i).unwrap_or_default();

    field(columns::PROPERTY_TYPE) == columns::HOUSE
        && field(columns::SALE_TYPE) == columns::SALE
        && !field(columns::PRICE).is_empty()
        && !field(columns::ROOM_COUNT).is_empty()
}

/// Zero-pad a department code to two characters
///
/// Returns `None` for overseas codes ("971", "974", ...).
pub fn normalize_department(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.chars().count() > 2 {
        return None;
    }
    Some(format!("{:0>2}", raw))
}

/// Department code followed by the zero-padded 3-digit local code
pub fn city_code(department: &str, local_code: &str) -> String {
    format!("{}{:0>3}", department, local_code.trim())
}

/// Join street parts with single spaces
pub fn compose_address(number: &str, complement: &str, street_type: &str, name: &str) -> String {
    [number, complement, street_type, name]
        .iter()
        .flat_map(|part| part.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse an amount written with a decimal comma ("150000,00")
pub fn parse_price(raw: &str) -> Option<f64> {
    raw.trim()
        .replacen(',', ".", 1)
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

/// Build a Transaction from a full-layout candidate row
pub fn derive_transaction(record: &StringRecord, reference: &ReferenceIndex) -> Derivation {
    let field = |i: usize| record.get(i).unwrap_or_default();

    let Some(department) = normalize_department(field(columns::DEPARTMENT)) else {
        return Derivation::Excluded;
    };

    let Some(price) = parse_price(field(columns::PRICE)) else {
        return Derivation::Rejected(RejectReason::MissingPrice);
    };

    let area = match field(columns::BUILT_AREA).trim().parse::<i64>() {
        Ok(a) if a > 0 => a,
        Ok(_) => return Derivation::Rejected(RejectReason::ZeroArea),
        Err(_) => return Derivation::Rejected(RejectReason::MissingArea),
    };

    let Some(date) = parse_date(field(columns::DATE)) else {
        return Derivation::Rejected(RejectReason::MissingDate);
    };

    let nb_room = field(columns::ROOM_COUNT).trim().parse::<i64>().unwrap_or_else(|_| {
        debug!(value = field(columns::ROOM_COUNT), "Unparseable room count, using 0");
        0
    });

    let raw_full_area = field(columns::TOTAL_AREA).trim();
    let full_area = if raw_full_area.is_empty() {
        0
    } else {
        raw_full_area.parse::<i64>().unwrap_or_else(|_| {
            debug!(value = raw_full_area, "Unparseable total area, using 0");
            0
        })
    };

    let local_code = field(columns::CITY_LOCAL_CODE);
    let code = city_code(&department, local_code);
    let city = field(columns::CITY).trim().to_string();

    let explicit_zip = field(columns::ZIP).trim().parse::<i64>().ok();
    let resolved_zip = explicit_zip.or_else(|| reference.lookup_zip(&code, &city));
    let zip_unresolved = resolved_zip.is_none();

    let transaction = Transaction {
        tr_id: None,
        date,
        address: compose_address(
            field(columns::STREET_NUMBER),
            field(columns::STREET_COMPLEMENT),
            field(columns::STREET_TYPE),
            field(columns::STREET_NAME),
        ),
        zip_code: resolved_zip.unwrap_or(UNRESOLVED_ZIP),
        city,
        city_code: code,
        department_code: department,
        price,
        price_psqm: price / area as f64,
        area,
        full_area,
        nb_room,
        cadastre: format!(
            "{}{}{}",
            local_code.trim(),
            field(columns::CADASTRE_SECTION).trim(),
            field(columns::CADASTRE_PARCEL).trim()
        ),
        type_culture: field(columns::CULTURE_TYPE).trim().to_string(),
        lat: 0.0,
        long: 0.0,
    };

    Derivation::Accepted {
        transaction,
        zip_unresolved,
    }
}
