//! Ingestion pipeline for raw land-registry sale files
//!
//! Streams a pipe-delimited file, keeps house sales, drops adjacent
//! duplicates, derives Transactions and writes them in fixed-size batches.
//!
//! Only failing to open or read the source aborts a run. Bad rows and
//! failed batch writes are counted in the [`IngestReport`] and skipped.

pub mod columns;
pub mod dedup;
pub mod record;
pub mod reference;

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use immo_common::config::IngestConfig;
use immo_common::db::Transaction;
use immo_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, error, info, trace, warn};

use crate::db::transactions;
use dedup::{DuplicateKey, DuplicateWindow};
use record::Derivation;

pub use record::{RejectReason, RejectedRow};
pub use reference::ReferenceIndex;

/// Tunables of one ingestion run
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub batch_size: usize,
    pub progress_interval: u64,
    pub max_rejected_kept: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self::from(&IngestConfig::default())
    }
}

impl From<&IngestConfig> for IngestOptions {
    fn from(config: &IngestConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            progress_interval: config.progress_interval,
            max_rejected_kept: config.max_rejected_kept,
        }
    }
}

/// End-of-run summary of one source file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    /// Data rows read (header excluded)
    pub lines_read: u64,
    /// Data rows found by the counting pre-pass
    pub total_lines: u64,
    pub accepted: u64,
    pub duplicates: u64,
    pub invalid: u64,
    /// Overseas-territory rows left out on purpose
    pub excluded: u64,
    /// Accepted rows stored with the unresolved zip sentinel
    pub unresolved_zip: u64,
    pub rows_written: u64,
    pub failed_batches: u64,
    /// First rejected rows, capped by `max_rejected_kept`
    pub rejected: Vec<RejectedRow>,
}

pub struct Ingestor {
    pool: SqlitePool,
    reference: ReferenceIndex,
    options: IngestOptions,
}

impl Ingestor {
    pub fn new(pool: SqlitePool, reference: ReferenceIndex, options: IngestOptions) -> Self {
        Self {
            pool,
            reference,
            options,
        }
    }

    /// Ingest one file
    ///
    /// Lines are counted first so progress can be reported against a total.
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestReport> {
        info!(path = %path.display(), "Counting lines");
        let total_lines = count_lines(path)?.saturating_sub(1);

        let file = File::open(path)?;
        info!(path = %path.display(), total_lines, "Starting ingestion");

        let report = self.ingest_reader(BufReader::new(file), total_lines).await?;

        info!(
            path = %path.display(),
            lines = report.lines_read,
            accepted = report.accepted,
            duplicates = report.duplicates,
            invalid = report.invalid,
            excluded = report.excluded,
            unresolved_zip = report.unresolved_zip,
            written = report.rows_written,
            failed_batches = report.failed_batches,
            "Ingestion complete"
        );

        Ok(report)
    }

    /// Ingest an already opened stream whose first row is a header
    pub async fn ingest_reader<R: Read>(&self, reader: R, total_lines: u64) -> Result<IngestReport> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(columns::DELIMITER)
            .has_headers(true)
            .flexible(true)
            .quoting(false)
            .from_reader(reader);

        let mut report = IngestReport {
            total_lines,
            ..Default::default()
        };
        let mut window = DuplicateWindow::new();
        let mut batch: Vec<Transaction> = Vec::with_capacity(self.options.batch_size);

        for result in csv_reader.byte_records() {
            report.lines_read += 1;
            let line = report.lines_read + 1;

            if self.options.progress_interval > 0
                && report.lines_read % self.options.progress_interval == 0
            {
                info!(
                    lines_read = report.lines_read,
                    total_lines = report.total_lines,
                    accepted = report.accepted,
                    "Ingestion progress"
                );
            }

            let record = match result {
                Ok(record) => record::decode_lossy(&record),
                Err(e) if e.is_io_error() => return Err(Error::Csv(e)),
                Err(e) => {
                    debug!(line, error = %e, "Unreadable row");
                    report.invalid += 1;
                    continue;
                }
            };

            if record.len() < columns::COLUMN_COUNT {
                debug!(line, fields = record.len(), "Row shorter than the column layout");
                self.reject(&mut report, line, RejectReason::Truncated, &record);
                continue;
            }

            if !record::is_candidate(&record) {
                continue;
            }

            if window.observe(DuplicateKey::from_record(&record)) {
                trace!(line, "Duplicate of previous row");
                report.duplicates += 1;
                continue;
            }

            match record::derive_transaction(&record, &self.reference) {
                Derivation::Accepted {
                    transaction,
                    zip_unresolved,
                } => {
                    if zip_unresolved {
                        warn!(
                            line,
                            city = %transaction.city,
                            city_code = %transaction.city_code,
                            "No zip code found"
                        );
                        report.unresolved_zip += 1;
                    }

                    report.accepted += 1;
                    batch.push(transaction);

                    if batch.len() >= self.options.batch_size {
                        self.flush(&mut batch, &mut report).await;
                    }
                }
                Derivation::Excluded => {
                    report.excluded += 1;
                }
                Derivation::Rejected(reason) => {
                    debug!(line, %reason, "Row rejected");
                    self.reject(&mut report, line, reason, &record);
                }
            }
        }

        self.flush(&mut batch, &mut report).await;

        Ok(report)
    }

    fn reject(
        &self,
        report: &mut IngestReport,
        line: u64,
        reason: RejectReason,
        record: &csv::StringRecord,
    ) {
        report.invalid += 1;
        if report.rejected.len() < self.options.max_rejected_kept {
            report.rejected.push(RejectedRow {
                line,
                reason,
                fields: record.iter().map(str::to_string).collect(),
            });
        }
    }

    /// Write the buffered rows; a failure is logged and the rows are dropped
    async fn flush(&self, batch: &mut Vec<Transaction>, report: &mut IngestReport) {
        if batch.is_empty() {
            return;
        }

        match transactions::insert_batch(&self.pool, batch).await {
            Ok(written) => {
                report.rows_written += written;
                debug!(rows = written, total = report.rows_written, "Batch written");
            }
            Err(e) => {
                report.failed_batches += 1;
                error!(rows = batch.len(), error = %e, "Batch insert failed, continuing");
            }
        }

        batch.clear();
    }
}

/// Number of newline-terminated lines in a file
pub fn count_lines(path: &Path) -> Result<u64> {
    let mut file = File::open(path)?;
    let mut buf = vec![0u8; 32 * 1024];
    let mut count = 0u64;

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            return Ok(count);
        }
        count += buf[..n].iter().filter(|&&b| b == b'\n').count() as u64;
    }
}
