//! Aggregation engine
//!
//! Rebuilds the yearly price tables of every geographic level from the
//! stored transactions, and refreshes the all-time average kept on each
//! reference unit.
//!
//! Each level is processed independently: stream the joined samples,
//! group them in [`trend::YearlyAverages`], fold the year-over-year change,
//! then replace the level's table in batches.

pub mod trend;

use futures::TryStreamExt;
use immo_common::config::AggregateConfig;
use immo_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};

use crate::db::aggregates;
use crate::db::geo::{self, GeoLevel};
use trend::YearlyAverages;

/// Outcome for one level's yearly table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelReport {
    pub level: GeoLevel,
    /// (unit, year) groups computed
    pub groups: u64,
    pub rows_written: u64,
    pub failed_batches: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateReport {
    pub levels: Vec<LevelReport>,
}

impl AggregateReport {
    pub fn rows_written(&self) -> u64 {
        self.levels.iter().map(|l| l.rows_written).sum()
    }

    pub fn level(&self, level: GeoLevel) -> Option<&LevelReport> {
        self.levels.iter().find(|l| l.level == level)
    }
}

/// Outcome of refreshing the stored average of one level's units
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitAverageReport {
    pub level: GeoLevel,
    /// Units with at least one transaction
    pub computed: u64,
    pub updated: u64,
    /// Computed codes with no matching reference unit
    pub unknown: u64,
}

pub struct AggregationEngine {
    pool: SqlitePool,
    batch_size: usize,
}

impl AggregationEngine {
    pub fn new(pool: SqlitePool, config: &AggregateConfig) -> Self {
        Self {
            pool,
            batch_size: config.batch_size.max(1),
        }
    }

    /// Rebuild the yearly tables of all three levels
    pub async fn aggregate(&self) -> Result<AggregateReport> {
        let mut report = AggregateReport::default();

        for level in GeoLevel::ALL {
            report.levels.push(self.aggregate_level(level).await?);
        }

        info!(rows = report.rows_written(), "Aggregation complete");
        Ok(report)
    }

    /// Rebuild one level's yearly table
    ///
    /// Storage read or truncate failures abort; a failed insert batch is
    /// logged and counted.
    pub async fn aggregate_level(&self, level: GeoLevel) -> Result<LevelReport> {
        let mut averages = YearlyAverages::new();
        let mut samples = 0u64;

        let mut stream = aggregates::unit_samples(&self.pool, level);
        while let Some(sample) = stream.try_next().await? {
            averages.add(&sample);
            samples += 1;
        }
        drop(stream);

        let cleared = aggregates::truncate(&self.pool, level).await?;
        debug!(%level, cleared, "Yearly table cleared");

        let mut report = LevelReport {
            level,
            groups: averages.len() as u64,
            rows_written: 0,
            failed_batches: 0,
        };

        if averages.is_empty() {
            info!(%level, "Nothing to aggregate");
            return Ok(report);
        }

        let rows = averages.into_aggregates();
        for batch in rows.chunks(self.batch_size) {
            match aggregates::insert_batch(&self.pool, level, batch).await {
                Ok(written) => report.rows_written += written,
                Err(e) => {
                    report.failed_batches += 1;
                    error!(%level, rows = batch.len(), error = %e, "Aggregate insert failed, continuing");
                }
            }
        }

        info!(
            %level,
            samples,
            groups = report.groups,
            written = report.rows_written,
            failed_batches = report.failed_batches,
            "Level aggregated"
        );

        Ok(report)
    }

    /// Store the all-time average price per area on every reference unit
    ///
    /// Units without transactions keep their previous value.
    pub async fn compute_unit_averages(&self) -> Result<Vec<UnitAverageReport>> {
        let mut reports = Vec::with_capacity(GeoLevel::ALL.len());

        for level in [GeoLevel::Region, GeoLevel::Department, GeoLevel::City] {
            let averages = aggregates::unit_averages(&self.pool, level).await?;
            let mut report = UnitAverageReport {
                level,
                computed: averages.len() as u64,
                updated: 0,
                unknown: 0,
            };

            for unit in &averages {
                if geo::update_avg_price(&self.pool, level, &unit.code, unit.avg_price).await? {
                    report.updated += 1;
                } else {
                    debug!(%level, code = %unit.code, "No reference unit for computed average");
                    report.unknown += 1;
                }
            }

            if report.unknown > 0 {
                warn!(%level, unknown = report.unknown, "Averages computed for units missing from the reference");
            }
            info!(
                %level,
                computed = report.computed,
                updated = report.updated,
                "Unit averages stored"
            );

            reports.push(report);
        }

        Ok(reports)
    }
}
