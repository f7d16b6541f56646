//! Group, sort, then fold
//!
//! Samples are grouped per (unit code, year) in a `BTreeMap`, so iteration
//! is always by code then year ascending. The year-over-year fold relies on
//! that order and gets it from the type.

use std::collections::BTreeMap;

use chrono::Datelike;
use immo_common::db::YearlyAggregate;

use crate::db::aggregates::UnitSample;

#[derive(Debug, Clone, PartialEq)]
struct YearBucket {
    sum: f64,
    count: u64,
    /// Smallest display name seen for the unit that year
    name: String,
}

/// Running per-(code, year) sums
#[derive(Debug, Clone, Default)]
pub struct YearlyAverages {
    groups: BTreeMap<(String, i32), YearBucket>,
}

/// Relative change from `previous` to `current`; 0 when `previous` is 0
pub fn relative_change(previous: f64, current: f64) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    (current - previous) / previous
}

impl YearlyAverages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sample: &UnitSample) {
        self.add_value(&sample.code, sample.date.year(), &sample.name, sample.price_psqm);
    }

    pub fn add_value(&mut self, code: &str, year: i32, name: &str, value: f64) {
        let bucket = self
            .groups
            .entry((code.to_string(), year))
            .or_insert_with(|| YearBucket {
                sum: 0.0,
                count: 0,
                name: name.to_string(),
            });

        bucket.sum += value;
        bucket.count += 1;
        if name < bucket.name.as_str() {
            bucket.name = name.to_string();
        }
    }

    /// Number of (code, year) groups
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Average per group with the change versus the same unit's previous year on record
    ///
    /// The first year of each unit gets 0.
    pub fn into_aggregates(self) -> Vec<YearlyAggregate> {
        let mut out = Vec::with_capacity(self.groups.len());
        let mut previous: Option<(String, f64)> = None;

        for ((code, year), bucket) in self.groups {
            let avg_price = bucket.sum / bucket.count as f64;

            let increase = match &previous {
                Some((prev_code, prev_avg)) if *prev_code == code => {
                    relative_change(*prev_avg, avg_price)
                }
                _ => 0.0,
            };

            previous = Some((code.clone(), avg_price));
            out.push(YearlyAggregate {
                code,
                year: i64::from(year),
                name: bucket.name,
                avg_price,
                increase,
            });
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_over_year_increase() {
        let mut averages = YearlyAverages::new();
        averages.add_value("29019", 2020, "Brest", 2000.0);
        averages.add_value("29019", 2021, "Brest", 2100.0);
        averages.add_value("29019", 2021, "Brest", 2300.0);

        let rows = averages.into_aggregates();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].year, 2020);
        assert_eq!(rows[0].avg_price, 2000.0);
        assert_eq!(rows[0].increase, 0.0);
        assert_eq!(rows[1].avg_price, 2200.0);
        assert_eq!(rows[1].increase, 0.10);
    }

    #[test]
    fn test_new_unit_restarts_at_zero() {
        let mut averages = YearlyAverages::new();
        // Inserted out of order on purpose
        averages.add_value("B", 2020, "Bravo", 500.0);
        averages.add_value("A", 2021, "Alpha", 300.0);
        averages.add_value("A", 2020, "Alpha", 200.0);

        let rows = averages.into_aggregates();
        let keys: Vec<_> = rows.iter().map(|r| (r.code.as_str(), r.year)).collect();
        assert_eq!(keys, vec![("A", 2020), ("A", 2021), ("B", 2020)]);
        assert_eq!(rows[1].increase, 0.5);
        assert_eq!(rows[2].increase, 0.0);
    }

    #[test]
    fn test_gap_years_compare_to_previous_record() {
        let mut averages = YearlyAverages::new();
        averages.add_value("29", 2018, "Finistère", 1000.0);
        averages.add_value("29", 2021, "Finistère", 1500.0);

        let rows = averages.into_aggregates();
        assert_eq!(rows[1].increase, 0.5);
    }

    #[test]
    fn test_zero_previous_average_does_not_divide() {
        assert_eq!(relative_change(0.0, 1200.0), 0.0);

        let mut averages = YearlyAverages::new();
        averages.add_value("X", 2020, "X", 0.0);
        averages.add_value("X", 2021, "X", 1000.0);
        let rows = averages.into_aggregates();
        assert_eq!(rows[1].increase, 0.0);
        assert!(rows.iter().all(|r| r.increase.is_finite()));
    }

    #[test]
    fn test_group_keeps_smallest_name() {
        let mut averages = YearlyAverages::new();
        averages.add_value("29019", 2020, "BREST", 1.0);
        averages.add_value("29019", 2020, "Brest", 1.0);
        let rows = averages.into_aggregates();
        assert_eq!(rows[0].name, "BREST");
    }
}
