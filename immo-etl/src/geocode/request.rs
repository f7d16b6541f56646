//! CSV payload sent to the batch geocoder

use immo_common::db::Transaction;
use immo_common::{Error, Result};

/// Header of the uploaded CSV file; the response echoes these columns first
pub const REQUEST_HEADER: [&str; 4] = ["trid", "Address", "ZipCode", "City"];

/// File name given to the `data` part of the upload
pub const DATA_FILE_NAME: &str = "address.csv";

/// Zip as the service expects it: five digits, empty when unknown
fn format_zip(zip: i64) -> String {
    if zip > 0 {
        format!("{:05}", zip)
    } else {
        String::new()
    }
}

/// Build the CSV body for one batch of transactions
pub fn build_payload(batch: &[Transaction]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(REQUEST_HEADER)?;

    for tr in batch {
        let id = tr
            .tr_id
            .ok_or_else(|| Error::InvalidInput("transaction without identifier".to_string()))?;

        writer.write_record([
            id.to_string(),
            tr.address.clone(),
            format_zip(tr.zip_code),
            tr.city.clone(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| Error::Internal(format!("Cannot finish CSV payload: {}", e)))
}
