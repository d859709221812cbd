//! Blackbox tests for the object API.

use anyhow::Result;
use minio_test::server::{TEST_CAPACITY, TestServer};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn test_object_lifecycle() -> Result<()> {
    minio_test::tracing::init();
    let server = TestServer::new().await;
    let client = reqwest::Client::new();
    let url = server.url("/photos/2015/feb/donut.jpg");

    let response = client.put(&url).body("oh hai!").send().await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.json::<serde_json::Value>().await?,
        json!({ "bucket": "photos", "key": "2015/feb/donut.jpg", "size": 7 })
    );

    let response = client.get(&url).send().await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-length"], "7");
    assert_eq!(response.text().await?, "oh hai!");

    let response = client.head(&url).send().await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = client.delete(&url).send().await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = client.get(&url).send().await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client.head(&url).send().await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_overwrite() -> Result<()> {
    let server = TestServer::new().await;
    let client = reqwest::Client::new();
    let url = server.url("/bucket/key");

    client.put(&url).body("first").send().await?.error_for_status()?;
    client.put(&url).body("second").send().await?.error_for_status()?;

    let response = client.get(&url).send().await?;
    assert_eq!(response.text().await?, "second");

    Ok(())
}

#[tokio::test]
async fn test_delete_missing_object() -> Result<()> {
    let server = TestServer::new().await;

    let response = reqwest::Client::new()
        .delete(server.url("/bucket/missing"))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    Ok(())
}

#[tokio::test]
async fn test_rejects_reserved_bucket() -> Result<()> {
    let server = TestServer::new().await;

    let response = reqwest::Client::new()
        .put(server.url("/.minio.sys/tmp"))
        .body("nope")
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn test_rejects_objects_over_capacity() -> Result<()> {
    let server = TestServer::new().await;
    let body = vec![0u8; TEST_CAPACITY as usize + 1];

    let response = reqwest::Client::new()
        .put(server.url("/bucket/huge"))
        .body(body)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    Ok(())
}

#[tokio::test]
async fn test_donut_backend() -> Result<()> {
    let server = TestServer::donut().await;
    let client = reqwest::Client::new();
    let url = server.url("/bucket/nested/key.txt");

    client.put(&url).body("mirrored").send().await?.error_for_status()?;

    let response = client.get(&url).send().await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await?, "mirrored");

    Ok(())
}

#[tokio::test]
async fn test_server_header() -> Result<()> {
    let server = TestServer::new().await;

    let response = reqwest::get(server.url("/health")).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let header = response.headers()["server"].to_str()?;
    assert_eq!(header, concat!("minio/", env!("CARGO_PKG_VERSION")));
    assert_eq!(response.text().await?, "OK");

    Ok(())
}
