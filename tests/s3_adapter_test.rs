//! Integration tests for the S3 object store against a mock HTTP endpoint

mod common;

use common::{date, gzip_csv};
use trade_backfill::adapters::storage::{ObjectStore, S3ObjectStore};
use trade_backfill::config::{secret_string, StorageConfig};
use trade_backfill::core::extract::parse_trades;
use trade_backfill::core::object_key;
use trade_backfill::domain::StorageError;

fn storage_config(endpoint: String) -> StorageConfig {
    StorageConfig {
        endpoint,
        bucket: "flatfiles".to_string(),
        region: "us-east-1".to_string(),
        access_key_id: "AKIAEXAMPLE".to_string(),
        secret_access_key: secret_string("s3cret".to_string()),
        force_path_style: true,
        timeout_seconds: 5,
    }
}

fn object_path(key: &str) -> String {
    format!("/flatfiles/{key}")
}

#[tokio::test]
async fn test_get_object_returns_payload() {
    let mut server = mockito::Server::new_async().await;
    let key = object_key::resolve(date(2024, 1, 1));
    let payload = gzip_csv(&["X:BTC-USD,1,4,1001,1704067200000000000,42250.5,0.015"]);

    let mock = server
        .mock("GET", object_path(key.as_str()).as_str())
        .with_status(200)
        .with_header("content-type", "application/octet-stream")
        .with_body(payload.to_vec())
        .create_async()
        .await;

    let store = S3ObjectStore::new(&storage_config(server.url()));
    let body = store.get_object(key.as_str()).await.unwrap();

    mock.assert_async().await;
    assert_eq!(body, payload);

    let records = parse_trades(&body).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].trade_id, 1001);
}

#[tokio::test]
async fn test_get_missing_object_is_not_found() {
    let mut server = mockito::Server::new_async().await;
    let key = object_key::resolve(date(2024, 1, 2));

    server
        .mock("GET", object_path(key.as_str()).as_str())
        .with_status(404)
        .with_header("content-type", "application/xml")
        .with_body(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message></Error>",
        )
        .create_async()
        .await;

    let store = S3ObjectStore::new(&storage_config(server.url()));
    let err = store.get_object(key.as_str()).await.unwrap_err();

    assert!(matches!(err, StorageError::NotFound(ref k) if k == key.as_str()));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_server_error_is_retryable_request_error() {
    let mut server = mockito::Server::new_async().await;
    let key = object_key::resolve(date(2024, 1, 3));

    server
        .mock("GET", object_path(key.as_str()).as_str())
        .with_status(503)
        .with_body("<Error><Code>SlowDown</Code><Message>Reduce your request rate.</Message></Error>")
        .create_async()
        .await;

    let store = S3ObjectStore::new(&storage_config(server.url()));
    let err = store.get_object(key.as_str()).await.unwrap_err();

    assert!(matches!(err, StorageError::Request(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_object_exists_uses_head() {
    let mut server = mockito::Server::new_async().await;
    let present = object_key::resolve(date(2024, 1, 1));
    let missing = object_key::resolve(date(2024, 1, 2));

    server
        .mock("HEAD", object_path(present.as_str()).as_str())
        .with_status(200)
        .create_async()
        .await;
    server
        .mock("HEAD", object_path(missing.as_str()).as_str())
        .with_status(404)
        .create_async()
        .await;

    let store = S3ObjectStore::new(&storage_config(server.url()));

    assert!(store.object_exists(present.as_str()).await.unwrap());
    assert!(!store.object_exists(missing.as_str()).await.unwrap());
}

#[tokio::test]
async fn test_describe_names_bucket_and_endpoint() {
    let store = S3ObjectStore::new(&storage_config("http://localhost:9000".to_string()));
    assert_eq!(store.describe(), "s3://flatfiles@http://localhost:9000");
}
