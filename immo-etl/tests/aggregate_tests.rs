//! Aggregation engine integration tests

mod helpers;

use helpers::{create_test_db, insert_transactions, seed_reference, transaction};
use immo_common::config::AggregateConfig;
use immo_etl::db::aggregates;
use immo_etl::db::geo::{self, GeoLevel};
use immo_etl::AggregationEngine;
use sqlx::SqlitePool;

/// Brest 2020/2021, Quimper 2021, Ajaccio 2021 and one city missing from the reference
async fn seed_sales(pool: &SqlitePool) {
    seed_reference(pool).await;
    insert_transactions(
        pool,
        &[
            transaction("29019", 2020, 2000.0),
            transaction("29019", 2021, 2200.0),
            transaction("29232", 2021, 1800.0),
            transaction("2A004", 2021, 3000.0),
            transaction("35238", 2021, 1000.0),
        ],
    )
    .await;
}

fn engine(pool: &SqlitePool) -> AggregationEngine {
    AggregationEngine::new(pool.clone(), &AggregateConfig::default())
}

#[tokio::test]
async fn test_city_level_trend() {
    let (_dir, pool) = create_test_db().await;
    seed_sales(&pool).await;

    let report = engine(&pool).aggregate().await.unwrap();
    assert_eq!(report.level(GeoLevel::City).unwrap().rows_written, 5);

    let rows = aggregates::load_for_unit(&pool, GeoLevel::City, "29019")
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!((rows[0].year, rows[0].avg_price, rows[0].increase), (2020, 2000.0, 0.0));
    assert_eq!((rows[1].year, rows[1].avg_price, rows[1].increase), (2021, 2200.0, 0.10));
    assert_eq!(rows[0].name, "Brest");
}

#[tokio::test]
async fn test_city_missing_from_reference_keeps_its_own_name() {
    let (_dir, pool) = create_test_db().await;
    seed_sales(&pool).await;

    engine(&pool).aggregate().await.unwrap();

    let rows = aggregates::load_for_unit(&pool, GeoLevel::City, "35238")
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "UNKNOWN");
    assert_eq!(rows[0].avg_price, 1000.0);
}

#[tokio::test]
async fn test_department_and_region_follow_city_hierarchy() {
    let (_dir, pool) = create_test_db().await;
    seed_sales(&pool).await;

    let report = engine(&pool).aggregate().await.unwrap();
    assert_eq!(report.level(GeoLevel::Department).unwrap().groups, 3);
    assert_eq!(report.level(GeoLevel::Region).unwrap().groups, 3);

    let departments = aggregates::load_all(&pool, GeoLevel::Department).await.unwrap();
    let keys: Vec<_> = departments
        .iter()
        .map(|r| (r.code.as_str(), r.year, r.avg_price))
        .collect();
    assert_eq!(
        keys,
        vec![("29", 2020, 2000.0), ("29", 2021, 2000.0), ("2A", 2021, 3000.0)]
    );
    assert_eq!(departments[1].increase, 0.0);
    assert_eq!(departments[0].name, "Finistère");

    let regions = aggregates::load_all(&pool, GeoLevel::Region).await.unwrap();
    let codes: Vec<_> = regions.iter().map(|r| r.code.as_str()).collect();
    assert_eq!(codes, vec!["53", "53", "94"]);
    assert_eq!(regions[2].name, "Corse");
}

#[tokio::test]
async fn test_aggregation_is_idempotent() {
    let (_dir, pool) = create_test_db().await;
    seed_sales(&pool).await;
    let engine = engine(&pool);

    engine.aggregate().await.unwrap();
    let mut first = Vec::new();
    for level in GeoLevel::ALL {
        first.push(aggregates::load_all(&pool, level).await.unwrap());
    }

    engine.aggregate().await.unwrap();
    let mut second = Vec::new();
    for level in GeoLevel::ALL {
        second.push(aggregates::load_all(&pool, level).await.unwrap());
    }

    assert_eq!(first, second);
    assert!(first.iter().all(|rows| !rows.is_empty()));
}

#[tokio::test]
async fn test_nothing_to_aggregate_clears_tables() {
    let (_dir, pool) = create_test_db().await;
    seed_sales(&pool).await;
    engine(&pool).aggregate().await.unwrap();

    sqlx::query("DELETE FROM transactions")
        .execute(&pool)
        .await
        .unwrap();

    let report = engine(&pool).aggregate().await.unwrap();
    assert_eq!(report.levels.len(), 3);
    assert_eq!(report.rows_written(), 0);
    for level in GeoLevel::ALL {
        assert!(aggregates::load_all(&pool, level).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_small_insert_batches() {
    let (_dir, pool) = create_test_db().await;
    seed_sales(&pool).await;

    let engine = AggregationEngine::new(pool.clone(), &AggregateConfig { batch_size: 2 });
    let report = engine.aggregate_level(GeoLevel::City).await.unwrap();

    assert_eq!(report.groups, 5);
    assert_eq!(report.rows_written, 5);
    assert_eq!(report.failed_batches, 0);
}

#[tokio::test]
async fn test_unit_averages_are_stored_on_reference_units() {
    let (_dir, pool) = create_test_db().await;
    seed_sales(&pool).await;

    let reports = engine(&pool).compute_unit_averages().await.unwrap();
    let city = reports.iter().find(|r| r.level == GeoLevel::City).unwrap();
    assert_eq!(city.computed, 4);
    assert_eq!(city.updated, 3);
    assert_eq!(city.unknown, 1);

    let regions = geo::load_regions(&pool).await.unwrap();
    assert_eq!(regions[0].code, "53");
    assert_eq!(regions[0].avg_price, 2000.0);
    assert_eq!(regions[1].avg_price, 3000.0);

    let departments = geo::load_departments(&pool).await.unwrap();
    assert_eq!(departments[0].avg_price, 2000.0);

    let cities = geo::load_cities(&pool).await.unwrap();
    let brest = cities.iter().find(|c| c.code == "29019").unwrap();
    assert_eq!(brest.avg_price, 2100.0);
}
