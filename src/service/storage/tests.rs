use super::*;
use aws_sdk_s3::config::Credentials;
use httpmock::prelude::*;

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nchart";

fn test_uploader(server: &MockServer) -> ChartUploader {
    let config = aws_sdk_s3::config::Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(Credentials::new("test", "test", None, None, "test"))
        .endpoint_url(server.base_url())
        .force_path_style(true)
        .retry_config(RetryConfig::disabled())
        .build();

    ChartUploader::new(
        aws_sdk_s3::Client::from_conf(config),
        "charts".to_owned(),
        "imgs".to_owned(),
    )
}

#[tokio::test]
async fn store_chart_locally() {
    let dir = tempfile::tempdir().unwrap();
    let storage = StorageService::new(dir.path().to_owned(), None);

    storage.store("abc123-firing.png", PNG.to_vec()).await.unwrap();

    let stored = tokio::fs::read(dir.path().join("abc123-firing.png"))
        .await
        .unwrap();
    assert_eq!(stored, PNG);

    // Only the chart itself remains, no scratch files.
    let entries = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(entries, 1);
}

#[tokio::test]
async fn concurrent_stores_of_the_same_chart() {
    let dir = tempfile::tempdir().unwrap();
    let storage = StorageService::new(dir.path().to_owned(), None);

    let (first, second) = tokio::join!(
        storage.store("abc123-resolved.png", PNG.to_vec()),
        storage.store("abc123-resolved.png", PNG.to_vec()),
    );

    first.unwrap();
    second.unwrap();
    let stored = std::fs::read(dir.path().join("abc123-resolved.png")).unwrap();
    assert_eq!(stored, PNG);
}

#[test]
fn reject_names_outside_storage_dir() {
    let storage = StorageService::new(PathBuf::from("/tmp/charts"), None);

    for name in ["", "../secret", "a/b.png", ".hidden", "a\\b.png"] {
        assert_matches!(
            storage.chart_path(name),
            Err(StorageServiceError::InvalidName(_))
        );
    }

    assert_eq!(
        storage.chart_path("abc-firing.png").unwrap(),
        PathBuf::from("/tmp/charts/abc-firing.png")
    );
}

#[tokio::test]
async fn store_rejects_invalid_fingerprint() {
    let dir = tempfile::tempdir().unwrap();
    let storage = StorageService::new(dir.path().to_owned(), None);

    let result = storage.store("../../abc-firing.png", PNG.to_vec()).await;

    assert_matches!(result, Err(StorageServiceError::InvalidName(_)));
}

#[tokio::test]
async fn upload_chart_to_bucket() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(PUT).path("/charts/imgs/abc123-firing.png");
            then.status(200);
        })
        .await;

    let dir = tempfile::tempdir().unwrap();
    let storage = StorageService::new(dir.path().to_owned(), Some(test_uploader(&server)));

    storage.store("abc123-firing.png", PNG.to_vec()).await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn upload_is_retried_once() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(PUT).path("/charts/imgs/abc123-firing.png");
            then.status(500);
        })
        .await;

    let dir = tempfile::tempdir().unwrap();
    let storage = StorageService::new(dir.path().to_owned(), Some(test_uploader(&server)));

    let result = storage.store("abc123-firing.png", PNG.to_vec()).await;

    assert_matches!(result, Err(StorageServiceError::Upload(_)));
    assert_eq!(mock.hits_async().await, 2);
    // The chart is still available locally.
    assert!(dir.path().join("abc123-firing.png").exists());
}

#[tokio::test]
async fn upload_key_uses_prefix() {
    let server = MockServer::start_async().await;
    let uploader = test_uploader(&server);

    assert_eq!(uploader.key("abc-resolved.png"), "imgs/abc-resolved.png");
}

#[tokio::test]
async fn upload_sends_image_of_this_call() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/charts/imgs/abc123-firing.png")
                .body_contains("chart rendered by this call");
            then.status(200);
        })
        .await;

    // Nothing is stored locally under this name, so the upload cannot have
    // read the shared file.
    let key = test_uploader(&server)
        .upload("abc123-firing.png", b"chart rendered by this call")
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(key, "imgs/abc123-firing.png");
}
