//! Yearly aggregate tables and the joined reads feeding them
//!
//! Every level resolves its unit through the same hierarchy:
//! transaction → city → department / region.

use chrono::NaiveDate;
use futures::stream::BoxStream;
use immo_common::db::YearlyAggregate;
use immo_common::Result;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::geo::GeoLevel;

/// One transaction resolved to the unit it belongs to at a given level
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct UnitSample {
    pub code: String,
    pub name: String,
    pub date: NaiveDate,
    pub price_psqm: f64,
}

/// All-time average of one unit
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct UnitAverage {
    pub code: String,
    pub avg_price: f64,
}

// City falls back to the transaction's own name when the city is not in the reference.
const CITY_SAMPLES: &str = r#"
    SELECT t.city_code AS code, COALESCE(c.name, t.city) AS name, t.date AS date, t.price_psqm AS price_psqm
    FROM transactions t
    LEFT JOIN cities c ON c.code = t.city_code
    WHERE t.area > 0
    ORDER BY t.tr_id
"#;

const DEPARTMENT_SAMPLES: &str = r#"
    SELECT d.code AS code, d.name AS name, t.date AS date, t.price_psqm AS price_psqm
    FROM transactions t
    JOIN cities c ON c.code = t.city_code
    JOIN departments d ON d.code = c.code_department
    WHERE t.area > 0
    ORDER BY t.tr_id
"#;

const REGION_SAMPLES: &str = r#"
    SELECT r.code AS code, r.name AS name, t.date AS date, t.price_psqm AS price_psqm
    FROM transactions t
    JOIN cities c ON c.code = t.city_code
    JOIN regions r ON r.code = c.code_region
    WHERE t.area > 0
    ORDER BY t.tr_id
"#;

const CITY_AVERAGES: &str = r#"
    SELECT t.city_code AS code, AVG(t.price_psqm) AS avg_price
    FROM transactions t
    WHERE t.area > 0
    GROUP BY t.city_code
    ORDER BY t.city_code
"#;

const DEPARTMENT_AVERAGES: &str = r#"
    SELECT c.code_department AS code, AVG(t.price_psqm) AS avg_price
    FROM transactions t
    JOIN cities c ON c.code = t.city_code
    WHERE t.area > 0
    GROUP BY c.code_department
    ORDER BY c.code_department
"#;

const REGION_AVERAGES: &str = r#"
    SELECT c.code_region AS code, AVG(t.price_psqm) AS avg_price
    FROM transactions t
    JOIN cities c ON c.code = t.city_code
    WHERE t.area > 0
    GROUP BY c.code_region
    ORDER BY c.code_region
"#;

/// Stream every transaction of a level as (unit, date, price per area)
///
/// Rows come in identifier order so repeated runs sum in the same order.
pub fn unit_samples(
    pool: &SqlitePool,
    level: GeoLevel,
) -> BoxStream<'_, std::result::Result<UnitSample, sqlx::Error>> {
    let sql = match level {
        GeoLevel::City => CITY_SAMPLES,
        GeoLevel::Department => DEPARTMENT_SAMPLES,
        GeoLevel::Region => REGION_SAMPLES,
    };

    sqlx::query_as::<_, UnitSample>(sql).fetch(pool)
}

/// All-time average price per area of every unit of a level
pub async fn unit_averages(pool: &SqlitePool, level: GeoLevel) -> Result<Vec<UnitAverage>> {
    let sql = match level {
        GeoLevel::City => CITY_AVERAGES,
        GeoLevel::Department => DEPARTMENT_AVERAGES,
        GeoLevel::Region => REGION_AVERAGES,
    };

    let averages = sqlx::query_as::<_, UnitAverage>(sql).fetch_all(pool).await?;
    Ok(averages)
}

/// Remove every row of a level's yearly table
pub async fn truncate(pool: &SqlitePool, level: GeoLevel) -> Result<u64> {
    let sql = format!("DELETE FROM {}", level.yearly_table());
    let result = sqlx::query(&sql).execute(pool).await?;
    Ok(result.rows_affected())
}

/// Insert one batch of yearly aggregates
pub async fn insert_batch(
    pool: &SqlitePool,
    level: GeoLevel,
    batch: &[YearlyAggregate],
) -> Result<u64> {
    if batch.is_empty() {
        return Ok(0);
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "INSERT INTO {} (code, year, name, avg_price, increase) ",
        level.yearly_table()
    ));

    qb.push_values(batch, |mut b, agg| {
        b.push_bind(agg.code.clone())
            .push_bind(agg.year)
            .push_bind(agg.name.clone())
            .push_bind(agg.avg_price)
            .push_bind(agg.increase);
    });

    let result = qb.build().execute(pool).await?;
    Ok(result.rows_affected())
}

/// Read a level's yearly table ordered by code then year
pub async fn load_all(pool: &SqlitePool, level: GeoLevel) -> Result<Vec<YearlyAggregate>> {
    let sql = format!(
        "SELECT code, year, name, avg_price, increase FROM {} ORDER BY code, year",
        level.yearly_table()
    );

    let rows = sqlx::query_as::<_, YearlyAggregate>(&sql)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Yearly rows of a single unit
pub async fn load_for_unit(
    pool: &SqlitePool,
    level: GeoLevel,
    code: &str,
) -> Result<Vec<YearlyAggregate>> {
    let sql = format!(
        "SELECT code, year, name, avg_price, increase FROM {} WHERE code = ? ORDER BY year",
        level.yearly_table()
    );

    let rows = sqlx::query_as::<_, YearlyAggregate>(&sql)
        .bind(code)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}
