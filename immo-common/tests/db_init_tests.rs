//! Database initialization tests
//!
//! Database file creation, reopening, and transaction round trip through the schema.

use chrono::NaiveDate;
use immo_common::db::{init_database, Transaction};
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("immotep.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("immotep.db");

    let pool1 = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO regions (code, name) VALUES ('53', 'Bretagne')")
        .execute(&pool1)
        .await
        .unwrap();
    pool1.close().await;

    // Reopening keeps existing rows
    let pool2 = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM regions")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_transaction_row_decodes_into_model() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("immotep.db")).await.unwrap();

    sqlx::query(
        r#"
        INSERT INTO transactions (date, address, zip_code, city, city_code, department_code,
                                  price, price_psqm, area, full_area, nb_room, cadastre)
        VALUES ('2021-03-15', '12 RUE DES LILAS', 29200, 'BREST', '29019', '29',
                150000, 1500, 100, 350, 5, '19AB12')
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();

    let tr: Transaction = sqlx::query_as("SELECT * FROM transactions")
        .fetch_one(&pool)
        .await
        .unwrap();

    assert_eq!(tr.tr_id, Some(1));
    assert_eq!(tr.date, NaiveDate::from_ymd_opt(2021, 3, 15).unwrap());
    assert_eq!(tr.price_psqm, 1500.0);
    assert_eq!(tr.type_culture, "");
    assert!(!tr.is_geocoded());
}
