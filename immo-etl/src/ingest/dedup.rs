//! Adjacent-row duplicate suppression
//!
//! The raw file lists the lots of one sale on consecutive rows, so a row
//! equal to its immediate predecessor on the key fields is the same sale.
//! Only the previous candidate is remembered: a repeat further down the
//! file is not detected.

use csv::StringRecord;

use super::columns;

/// Fields identifying one sale
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateKey {
    pub date: String,
    pub price: String,
    pub city: String,
    pub section: String,
    pub parcel: String,
}

impl DuplicateKey {
    /// Build the key from a row already known to hold the full layout
    pub fn from_record(record: &StringRecord) -> Self {
        let field = |i: usize| record.get(i).unwrap_or_default().to_string();

        Self {
            date: field(columns::DATE),
            price: field(columns::PRICE),
            city: field(columns::CITY),
            section: field(columns::CADASTRE_SECTION),
            parcel: field(columns::CADASTRE_PARCEL),
        }
    }
}

/// Single-row lookback state
#[derive(Debug, Default)]
pub struct DuplicateWindow {
    previous: Option<DuplicateKey>,
}

impl DuplicateWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a candidate and report whether it repeats the previous one
    ///
    /// The window always moves forward, duplicates included.
    pub fn observe(&mut self, key: DuplicateKey) -> bool {
        let duplicate = self.previous.as_ref() == Some(&key);
        self.previous = Some(key);
        duplicate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(date: &str, parcel: &str) -> DuplicateKey {
        DuplicateKey {
            date: date.to_string(),
            price: "150000,00".to_string(),
            city: "BREST".to_string(),
            section: "AB".to_string(),
            parcel: parcel.to_string(),
        }
    }

    #[test]
    fn test_adjacent_repeat_is_duplicate() {
        let mut window = DuplicateWindow::new();
        assert!(!window.observe(key("03/01/2022", "12")));
        assert!(window.observe(key("03/01/2022", "12")));
        // Third copy still compares against the (duplicate) previous row
        assert!(window.observe(key("03/01/2022", "12")));
    }

    #[test]
    fn test_non_adjacent_repeat_is_kept() {
        let mut window = DuplicateWindow::new();
        assert!(!window.observe(key("03/01/2022", "12")));
        assert!(!window.observe(key("04/01/2022", "7")));
        assert!(!window.observe(key("03/01/2022", "12")));
    }

    #[test]
    fn test_key_reads_layout_columns() {
        let mut fields = vec![String::new(); columns::COLUMN_COUNT];
        fields[columns::DATE] = "03/01/2022".to_string();
        fields[columns::PRICE] = "150000,00".to_string();
        fields[columns::CITY] = "BREST".to_string();
        fields[columns::CADASTRE_SECTION] = "AB".to_string();
        fields[columns::CADASTRE_PARCEL] = "12".to_string();

        let record = StringRecord::from(fields);
        assert_eq!(DuplicateKey::from_record(&record), key("03/01/2022", "12"));
    }
}
