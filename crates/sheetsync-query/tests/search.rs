//! End-to-end filter queries against an in-memory customer table.

use sheetsync_query::{FilterRequest, QueryConfig, QueryError, TableQuery};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

async fn create_test_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("Failed to create in-memory SQLite pool")
}

async fn customers() -> (SqlitePool, TableQuery) {
    let pool = create_test_pool().await;
    sqlx::query(
        r#"CREATE TABLE "customer_data" (
            "id" INTEGER PRIMARY KEY AUTOINCREMENT,
            "CUSTOMER_NUMBER" TEXT,
            "CUSTOMER_NAME" TEXT,
            "STATE" TEXT,
            "CITY" TEXT,
            "ZONE" TEXT
        )"#,
    )
    .execute(&pool)
    .await
    .unwrap();

    let rows = [
        ("C001", "Zeta Traders", "Delhi", "New Delhi", "North"),
        ("C002", "Alpha Agro", "Haryana", "Gurgaon", "North"),
        ("C003", "Mehta & Sons", "Punjab", "Ludhiana", "North"),
        ("C004", "O'Brien Farms", "Goa", "Panaji", "West"),
        ("C005", "Alpha Agro", "Delhi", "", "North"),
    ];
    for (number, name, state, city, zone) in rows {
        sqlx::query(
            r#"INSERT INTO "customer_data"
               ("CUSTOMER_NUMBER", "CUSTOMER_NAME", "STATE", "CITY", "ZONE")
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(number)
        .bind(name)
        .bind(state)
        .bind(city)
        .bind(zone)
        .execute(&pool)
        .await
        .unwrap();
    }

    let config = QueryConfig {
        filter_fields: vec!["CUSTOMER_NAME".into(), "STATE".into(), "CITY".into(), "ZONE".into()],
        distinct_fields: vec!["STATE".into(), "CITY".into()],
        projection: vec![
            "CUSTOMER_NUMBER".into(),
            "CUSTOMER_NAME".into(),
            "STATE".into(),
            "CITY".into(),
        ],
        ..QueryConfig::default()
    };
    let query = TableQuery::new(pool.clone(), config).unwrap();
    (pool, query)
}

fn numbers(rows: &[sheetsync_query::Row]) -> Vec<&str> {
    rows.iter()
        .map(|r| r.get("CUSTOMER_NUMBER").unwrap())
        .collect()
}

#[tokio::test]
async fn test_values_within_field_are_alternatives() {
    let (_pool, query) = customers().await;

    let rows = query
        .search(&FilterRequest::from_pairs([("STATE", "Delhi,Haryana")]))
        .await
        .unwrap();

    assert_eq!(numbers(&rows), ["C002", "C005", "C001"]);
    assert!(rows
        .iter()
        .all(|r| matches!(r.get("STATE"), Some("Delhi" | "Haryana"))));
}

#[tokio::test]
async fn test_fields_are_combined() {
    let (_pool, query) = customers().await;

    let request = FilterRequest::from_pairs([("STATE", "Delhi"), ("CUSTOMER_NAME", "Alpha Agro")]);
    let rows = query.search(&request).await.unwrap();

    assert_eq!(numbers(&rows), ["C005"]);
}

#[tokio::test]
async fn test_quotes_in_values_match_literally() {
    let (_pool, query) = customers().await;

    let rows = query
        .search_by_field("CUSTOMER_NAME", "O'Brien Farms")
        .await
        .unwrap();

    assert_eq!(numbers(&rows), ["C004"]);
}

#[tokio::test]
async fn test_injection_in_field_name_is_rejected() {
    let (pool, query) = customers().await;

    let request = FilterRequest::from_pairs([("STATE; DROP TABLE customer_data", "x")]);
    let err = query.search(&request).await.unwrap_err();
    assert!(matches!(err, QueryError::InvalidFilterField(_)));

    // The table is untouched.
    let (count,): (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM "customer_data""#)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 5);
}

#[tokio::test]
async fn test_one_bad_field_rejects_the_request() {
    let (_pool, query) = customers().await;

    let request = FilterRequest::from_pairs([("STATE", "Delhi"), ("CUSTOMER_NUMBER", "C001")]);
    let err = query.search(&request).await.unwrap_err();

    assert!(matches!(err, QueryError::InvalidFilterField(ref f) if f == "CUSTOMER_NUMBER"));
}

#[tokio::test]
async fn test_empty_request_returns_all_rows_in_stable_order() {
    let (_pool, query) = customers().await;

    let first = query.search(&FilterRequest::new()).await.unwrap();
    let second = query.search(&FilterRequest::new()).await.unwrap();

    // By name, then insertion order for the two "Alpha Agro" rows.
    assert_eq!(numbers(&first), ["C002", "C005", "C003", "C004", "C001"]);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_blank_values_filter_nothing() {
    let (_pool, query) = customers().await;

    let rows = query
        .search(&FilterRequest::from_pairs([("STATE", " , ")]))
        .await
        .unwrap();

    assert_eq!(rows.len(), 5);
}

#[tokio::test]
async fn test_distinct_values() {
    let (_pool, query) = customers().await;

    let states = query.distinct_values("STATE").await.unwrap();
    assert_eq!(states, ["Delhi", "Goa", "Haryana", "Punjab"]);

    // Empty strings are skipped.
    let cities = query.distinct_values("city").await.unwrap();
    assert_eq!(cities, ["Gurgaon", "Ludhiana", "New Delhi", "Panaji"]);
}

#[tokio::test]
async fn test_distinct_values_validation() {
    let (_pool, query) = customers().await;

    let err = query.distinct_values("STATE; DROP TABLE x").await.unwrap_err();
    assert!(matches!(err, QueryError::InvalidIdentifier(_)));

    let err = query.distinct_values("ZONE").await.unwrap_err();
    assert!(matches!(err, QueryError::InvalidFilterField(_)));
}

#[tokio::test]
async fn test_find_by_key() {
    let (_pool, query) = customers().await;

    let row = query.find_by_key("C003").await.unwrap().unwrap();
    assert_eq!(row.get("CUSTOMER_NAME"), Some("Mehta & Sons"));
    assert_eq!(row.get("STATE"), Some("Punjab"));

    assert!(query.find_by_key("C999").await.unwrap().is_none());
}

#[tokio::test]
async fn test_column_added_after_insert_reads_null() {
    let (pool, _query) = customers().await;
    sqlx::query(r#"ALTER TABLE "customer_data" ADD COLUMN "REGION" TEXT"#)
        .execute(&pool)
        .await
        .unwrap();

    let config = QueryConfig {
        projection: vec!["CUSTOMER_NUMBER".into(), "REGION".into()],
        ..QueryConfig::default()
    };
    let query = TableQuery::new(pool, config).unwrap();

    let row = query.find_by_key("C001").await.unwrap().unwrap();
    assert_eq!(row.get("REGION"), None);
    assert_eq!(row.len(), 2);
}
