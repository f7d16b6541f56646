//! Geocoding reconciliation
//!
//! Selects stored transactions, sends them in CSV batches to the external
//! geocoder and writes back coordinates and the service's normalized
//! address fields.
//!
//! Batches run strictly one after another. A failed request or upsert
//! skips its batch; the rows stay at (0, 0) and are picked up by the next
//! incremental run.

pub mod client;
pub mod request;
pub mod response;

use std::collections::{BTreeMap, HashMap, HashSet};

use immo_common::db::Transaction;
use immo_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};

use crate::db::transactions::{self, GeocodedUpdate, Selection};
use client::GeocodeClient;
use response::{GeocodedRow, ResponseLayout, RowError};

const MIN_BATCH: i64 = 100;
const MAX_BATCH: i64 = 5_000;

/// Rows per request for a selection of `count` rows
///
/// Large selections use bigger batches to bound the number of round-trips.
pub fn batch_size_for(count: i64) -> i64 {
    (count / 100).clamp(MIN_BATCH, MAX_BATCH)
}

/// End-of-run summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Rows matching the selection when the run started
    pub selected: i64,
    /// Rows sent to the geocoder
    pub attempted: u64,
    pub updated: u64,
    /// Response rows that could not be applied
    pub errored: u64,
    /// Sent rows the response did not mention at all
    pub unanswered: u64,
    pub batches: u64,
    /// Batches skipped after a request or write failure
    pub failed_batches: u64,
}

pub struct Reconciler {
    pool: SqlitePool,
    client: GeocodeClient,
    layout: ResponseLayout,
}

impl Reconciler {
    pub fn new(pool: SqlitePool, client: GeocodeClient) -> Self {
        Self {
            pool,
            client,
            layout: ResponseLayout::default(),
        }
    }

    /// Geocode every transaction of a selection
    ///
    /// Only storage read failures are returned as errors.
    pub async fn reconcile(&self, selection: &Selection) -> Result<ReconcileReport> {
        let selected = transactions::count_selection(&self.pool, selection).await?;
        let mut report = ReconcileReport {
            selected,
            ..Default::default()
        };

        if selected == 0 {
            info!(
                incremental = selection.incremental,
                department = ?selection.department,
                "Nothing to geocode"
            );
            return Ok(report);
        }

        let batch_size = batch_size_for(selected);
        info!(
            selected,
            batch_size,
            incremental = selection.incremental,
            department = ?selection.department,
            "Starting geocoding"
        );

        let mut after_id = 0;
        loop {
            let page =
                transactions::fetch_selection_page(&self.pool, selection, after_id, batch_size)
                    .await?;
            let Some(last) = page.last().and_then(|t| t.tr_id) else {
                break;
            };
            after_id = last;

            report.batches += 1;
            report.attempted += page.len() as u64;

            let batch_errors = self.process_batch(&page, &mut report).await;

            info!(
                batch = report.batches,
                size = page.len(),
                processed = report.attempted,
                total = selected,
                errors = batch_errors,
                "Geocoding batch processed"
            );
        }

        info!(
            attempted = report.attempted,
            updated = report.updated,
            errored = report.errored,
            unanswered = report.unanswered,
            failed_batches = report.failed_batches,
            "Geocoding complete"
        );

        Ok(report)
    }

    /// Send, parse and apply one batch; returns the number of row errors
    ///
    /// Row errors and unanswered rows are added to `report` here.
    async fn process_batch(&self, page: &[Transaction], report: &mut ReconcileReport) -> u64 {
        let payload = match request::build_payload(page) {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "Cannot build geocoding payload, skipping batch");
                report.failed_batches += 1;
                return 0;
            }
        };

        let body = match self.client.geocode_csv(payload).await {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, rows = page.len(), "Geocoding request failed, skipping batch");
                report.failed_batches += 1;
                return 0;
            }
        };

        let sent: HashMap<i64, &Transaction> = page
            .iter()
            .filter_map(|t| t.tr_id.map(|id| (id, t)))
            .collect();

        let mut errors = 0;
        let mut answered: HashSet<i64> = HashSet::with_capacity(sent.len());
        // Keyed by id so a repeated response row cannot produce two writes
        let mut updates: BTreeMap<i64, GeocodedUpdate> = BTreeMap::new();

        for parsed in self.layout.parse_response(&body) {
            let row = parsed.and_then(|row| match sent.get(&row.tr_id) {
                Some(original) => Ok(to_update(row, original)),
                None => Err(RowError::UnknownId(row.tr_id)),
            });

            match row {
                Ok(update) => {
                    answered.insert(update.tr_id);
                    updates.insert(update.tr_id, update);
                }
                Err(e) => {
                    debug!(error = %e, "Cannot geocode row");
                    answered.extend(e.tr_id());
                    errors += 1;
                }
            }
        }

        let unanswered = sent.keys().filter(|id| !answered.contains(id)).count() as u64;
        if unanswered > 0 {
            warn!(unanswered, sent = sent.len(), "Geocoder response is missing rows");
        }
        report.errored += errors;
        report.unanswered += unanswered;

        let updates: Vec<_> = updates.into_values().collect();
        match transactions::upsert_geocoded(&self.pool, &updates).await {
            Ok(n) => report.updated += n,
            Err(e) => {
                error!(error = %e, rows = updates.len(), "Geocoding upsert failed, skipping batch");
                report.failed_batches += 1;
            }
        }

        errors
    }
}

/// Service fields win; an empty answer keeps the stored value
fn to_update(row: GeocodedRow, original: &Transaction) -> GeocodedUpdate {
    let or_stored = |value: String, stored: &str| {
        if value.is_empty() {
            stored.to_string()
        } else {
            value
        }
    };

    GeocodedUpdate {
        tr_id: row.tr_id,
        lat: row.lat,
        long: row.long,
        address: or_stored(row.address, &original.address),
        zip_code: row.zip_code.unwrap_or(original.zip_code),
        city: or_stored(row.city, &original.city),
        city_code: or_stored(row.city_code, &original.city_code),
    }
}
