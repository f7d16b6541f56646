//! Transaction persistence
//!
//! Batched inserts for ingestion, selection reads and coordinate upserts
//! for geocoding reconciliation.

use immo_common::db::Transaction;
use immo_common::Result;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

/// Rows per upsert statement (keeps bound parameters well under SQLite's limit)
const UPSERT_CHUNK: usize = 500;

/// Which stored transactions a geocoding run looks at
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Only rows still at the (0, 0) coordinate sentinel
    pub incremental: bool,
    /// Restrict to one (normalized) department code
    pub department: Option<String>,
}

impl Selection {
    pub fn incremental() -> Self {
        Self {
            incremental: true,
            department: None,
        }
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }
}

/// Coordinates and normalized address fields returned by the geocoder
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedUpdate {
    pub tr_id: i64,
    pub lat: f64,
    pub long: f64,
    pub address: String,
    pub zip_code: i64,
    pub city: String,
    pub city_code: String,
}

fn push_selection_filter(qb: &mut QueryBuilder<'_, Sqlite>, selection: &Selection) {
    qb.push(" WHERE 1 = 1");
    if selection.incremental {
        qb.push(" AND lat = 0 AND long = 0");
    }
    if let Some(department) = &selection.department {
        qb.push(" AND department_code = ");
        qb.push_bind(department.clone());
    }
}

/// Insert a batch of transactions in one statement
///
/// Returns the number of rows written. Identifiers are assigned by the database.
pub async fn insert_batch(pool: &SqlitePool, batch: &[Transaction]) -> Result<u64> {
    if batch.is_empty() {
        return Ok(0);
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "INSERT INTO transactions (date, address, zip_code, city, city_code, department_code, \
         price, price_psqm, area, full_area, nb_room, cadastre, type_culture, lat, long) ",
    );

    qb.push_values(batch, |mut b, tr| {
        b.push_bind(tr.date)
            .push_bind(tr.address.clone())
            .push_bind(tr.zip_code)
            .push_bind(tr.city.clone())
            .push_bind(tr.city_code.clone())
            .push_bind(tr.department_code.clone())
            .push_bind(tr.price)
            .push_bind(tr.price_psqm)
            .push_bind(tr.area)
            .push_bind(tr.full_area)
            .push_bind(tr.nb_room)
            .push_bind(tr.cadastre.clone())
            .push_bind(tr.type_culture.clone())
            .push_bind(tr.lat)
            .push_bind(tr.long);
    });

    let result = qb.build().execute(pool).await?;
    Ok(result.rows_affected())
}

/// Count transactions matching a selection
pub async fn count_selection(pool: &SqlitePool, selection: &Selection) -> Result<i64> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM transactions");
    push_selection_filter(&mut qb, selection);

    let count: i64 = qb.build_query_scalar().fetch_one(pool).await?;
    Ok(count)
}

/// Read one keyset page of a selection, ordered by identifier
///
/// `after_id` is the last identifier of the previous page (0 for the first page).
pub async fn fetch_selection_page(
    pool: &SqlitePool,
    selection: &Selection,
    after_id: i64,
    limit: i64,
) -> Result<Vec<Transaction>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM transactions");
    push_selection_filter(&mut qb, selection);
    qb.push(" AND tr_id > ");
    qb.push_bind(after_id);
    qb.push(" ORDER BY tr_id LIMIT ");
    qb.push_bind(limit);

    let page = qb.build_query_as::<Transaction>().fetch_all(pool).await?;
    Ok(page)
}

/// Apply geocoder results keyed by transaction id
///
/// Conflicting rows get their coordinates and normalized address fields
/// overwritten; other columns are left untouched. The whole batch is
/// applied in one database transaction.
pub async fn upsert_geocoded(pool: &SqlitePool, updates: &[GeocodedUpdate]) -> Result<u64> {
    if updates.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    let mut affected = 0;

    for chunk in updates.chunks(UPSERT_CHUNK) {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO transactions (tr_id, lat, long, address, zip_code, city, city_code) ",
        );

        qb.push_values(chunk, |mut b, u| {
            b.push_bind(u.tr_id)
                .push_bind(u.lat)
                .push_bind(u.long)
                .push_bind(u.address.clone())
                .push_bind(u.zip_code)
                .push_bind(u.city.clone())
                .push_bind(u.city_code.clone());
        });

        qb.push(
            " ON CONFLICT(tr_id) DO UPDATE SET \
             lat = excluded.lat, \
             long = excluded.long, \
             address = excluded.address, \
             zip_code = excluded.zip_code, \
             city = excluded.city, \
             city_code = excluded.city_code",
        );

        affected += qb.build().execute(&mut *tx).await?.rows_affected();
    }

    tx.commit().await?;
    Ok(affected)
}

/// Load a single transaction by identifier
pub async fn load_transaction(pool: &SqlitePool, tr_id: i64) -> Result<Option<Transaction>> {
    let tr = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE tr_id = ?")
        .bind(tr_id)
        .fetch_optional(pool)
        .await?;

    Ok(tr)
}

/// Total number of stored transactions
pub async fn count_all(pool: &SqlitePool) -> Result<i64> {
    count_selection(pool, &Selection::all()).await
}
