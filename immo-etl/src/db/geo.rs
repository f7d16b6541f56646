//! Geographic reference units (regions, departments, cities)
//!
//! The reference tables are populated by a separate one-shot import; the
//! pipeline only reads them, plus the `avg_price` column it maintains.

use immo_common::db::{self, City, Department, Region};
use immo_common::Result;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// Geographic granularity of an aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeoLevel {
    City,
    Department,
    Region,
}

impl GeoLevel {
    /// All levels, in processing order
    pub const ALL: [GeoLevel; 3] = [GeoLevel::City, GeoLevel::Department, GeoLevel::Region];

    pub fn label(&self) -> &'static str {
        match self {
            GeoLevel::City => "city",
            GeoLevel::Department => "department",
            GeoLevel::Region => "region",
        }
    }

    /// Reference table holding units of this level
    pub fn unit_table(&self) -> &'static str {
        match self {
            GeoLevel::City => "cities",
            GeoLevel::Department => "departments",
            GeoLevel::Region => "regions",
        }
    }

    /// Derived per-year statistics table
    pub fn yearly_table(&self) -> &'static str {
        match self {
            GeoLevel::City => db::CITY_YEARLY_AGGS,
            GeoLevel::Department => db::DEPARTMENT_YEARLY_AGGS,
            GeoLevel::Region => db::REGION_YEARLY_AGGS,
        }
    }
}

impl std::fmt::Display for GeoLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

pub async fn upsert_region(pool: &SqlitePool, region: &Region) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO regions (code, name, avg_price)
        VALUES (?, ?, ?)
        ON CONFLICT(code) DO UPDATE SET
            name = excluded.name
        "#,
    )
    .bind(&region.code)
    .bind(&region.name)
    .bind(region.avg_price)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn upsert_department(pool: &SqlitePool, department: &Department) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO departments (code, name, avg_price)
        VALUES (?, ?, ?)
        ON CONFLICT(code) DO UPDATE SET
            name = excluded.name
        "#,
    )
    .bind(&department.code)
    .bind(&department.name)
    .bind(department.avg_price)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn upsert_city(pool: &SqlitePool, city: &City) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO cities (code, name, name_upper, zip_code, population,
                            code_department, code_region, avg_price)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(code) DO UPDATE SET
            name = excluded.name,
            name_upper = excluded.name_upper,
            zip_code = excluded.zip_code,
            population = excluded.population,
            code_department = excluded.code_department,
            code_region = excluded.code_region
        "#,
    )
    .bind(&city.code)
    .bind(&city.name)
    .bind(&city.name_upper)
    .bind(city.zip_code)
    .bind(city.population)
    .bind(&city.code_department)
    .bind(&city.code_region)
    .bind(city.avg_price)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load every city, for building the in-memory reference index
pub async fn load_cities(pool: &SqlitePool) -> Result<Vec<City>> {
    let cities = sqlx::query_as::<_, City>("SELECT * FROM cities ORDER BY code")
        .fetch_all(pool)
        .await?;

    Ok(cities)
}

pub async fn load_regions(pool: &SqlitePool) -> Result<Vec<Region>> {
    let regions = sqlx::query_as::<_, Region>("SELECT * FROM regions ORDER BY code")
        .fetch_all(pool)
        .await?;

    Ok(regions)
}

pub async fn load_departments(pool: &SqlitePool) -> Result<Vec<Department>> {
    let departments = sqlx::query_as::<_, Department>("SELECT * FROM departments ORDER BY code")
        .fetch_all(pool)
        .await?;

    Ok(departments)
}

/// Stored all-time average price per square meter of one unit
///
/// Returns whether a unit with that code exists.
pub async fn update_avg_price(
    pool: &SqlitePool,
    level: GeoLevel,
    code: &str,
    avg_price: f64,
) -> Result<bool> {
    let sql = format!("UPDATE {} SET avg_price = ? WHERE code = ?", level.unit_table());

    let result = sqlx::query(&sql)
        .bind(avg_price)
        .bind(code)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use immo_common::db::init_memory_database;

    #[test]
    fn test_level_tables() {
        assert_eq!(GeoLevel::Department.unit_table(), "departments");
        assert_eq!(GeoLevel::Region.yearly_table(), "region_yearly_aggs");
        assert_eq!(GeoLevel::City.to_string(), "city");
    }

    #[tokio::test]
    async fn test_level_tables_exist_in_schema() {
        let pool = init_memory_database().await.unwrap();

        for level in GeoLevel::ALL {
            for table in [level.unit_table(), level.yearly_table()] {
                let found: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
                )
                .bind(table)
                .fetch_one(&pool)
                .await
                .unwrap();
                assert_eq!(found, 1, "missing table {}", table);
            }
        }
    }

    #[tokio::test]
    async fn test_update_avg_price_on_known_and_unknown_unit() {
        let pool = init_memory_database().await.unwrap();
        upsert_department(
            &pool,
            &Department {
                code: "29".to_string(),
                name: "Finistère".to_string(),
                avg_price: 0.0,
            },
        )
        .await
        .unwrap();

        assert!(update_avg_price(&pool, GeoLevel::Department, "29", 1850.5).await.unwrap());
        assert!(!update_avg_price(&pool, GeoLevel::Department, "2A", 10.0).await.unwrap());

        let departments = load_departments(&pool).await.unwrap();
        assert_eq!(departments.len(), 1);
        assert_eq!(departments[0].avg_price, 1850.5);
    }
}
