use mockito::{Matcher, Server};
use release_pipeline::config::PublishSettings;
use release_pipeline::publish::{PublishError, ReleasePublisher, ReleaseRecord, RetryPolicy};
use release_pipeline::stages::{ArchiveArtifact, archive_name};
use tempfile::TempDir;

const RELEASES: &str = "/repos/owner/starcheat/releases";
const COMMIT: &str = "abc1234567";

fn settings(api_base: &str) -> PublishSettings {
    PublishSettings {
        api_base: api_base.to_string(),
        repository: "owner/starcheat".to_string(),
        prerelease: true,
        asset_suffix: None,
        timeout_secs: 5,
        retry: RetryPolicy {
            initial_delay_ms: 1,
            max_delay_ms: 5,
            ..Default::default()
        },
    }
}

fn archive(dir: &TempDir) -> ArchiveArtifact {
    let file_name = archive_name("starcheat", Some(COMMIT), None);
    let path = dir.path().join(&file_name);
    std::fs::write(&path, b"fake gzip bytes").unwrap();
    ArchiveArtifact {
        path,
        file_name,
        size: 15,
        sha256: String::new(),
    }
}

fn record() -> ReleaseRecord {
    ReleaseRecord::for_commit("starcheat", COMMIT, true)
}

#[test]
fn short_commit_is_exactly_seven_characters_everywhere() {
    let record = record();
    assert_eq!(record.tag_name, "abc1234");
    assert_eq!(record.name, "starcheat (abc1234)");
    assert_eq!(record.target_commitish, COMMIT);
    assert_eq!(archive_name("starcheat", Some(COMMIT), None), "starcheat-abc1234.tar.gz");
    assert_eq!(
        archive_name("starcheat", Some(COMMIT), Some("osx")),
        "starcheat-abc1234-osx.tar.gz"
    );
}

#[tokio::test]
async fn publishes_release_then_uploads_archive() {
    let mut server = Server::new_async().await;
    let upload_url = format!("{}/uploads{RELEASES}/1/assets{{?name,label}}", server.url());
    let create = server
        .mock("POST", RELEASES)
        .match_header("authorization", "Bearer t0ken")
        .match_header("accept", "application/vnd.github+json")
        .match_body(Matcher::Json(serde_json::json!({
            "tag_name": "abc1234",
            "target_commitish": COMMIT,
            "name": "starcheat (abc1234)",
            "prerelease": true
        })))
        .with_status(201)
        .with_body(serde_json::json!({ "id": 1, "upload_url": upload_url }).to_string())
        .create_async()
        .await;
    let upload = server
        .mock("POST", format!("/uploads{RELEASES}/1/assets").as_str())
        .match_query(Matcher::UrlEncoded(
            "name".into(),
            "starcheat-abc1234.tar.gz".into(),
        ))
        .match_header("authorization", "Bearer t0ken")
        .match_header("content-type", "application/gzip")
        .match_body(Matcher::Exact("fake gzip bytes".to_string()))
        .with_status(201)
        .with_body(r#"{"name":"starcheat-abc1234.tar.gz"}"#)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let publisher = ReleasePublisher::new(&settings(&server.url()), "t0ken").unwrap();
    let published = publisher.publish(&record(), &archive(&dir)).await.unwrap();

    create.assert_async().await;
    upload.assert_async().await;
    assert_eq!(published.tag, "abc1234");
    assert_eq!(published.asset.name.as_deref(), Some("starcheat-abc1234.tar.gz"));
}

#[tokio::test]
async fn missing_upload_url_is_a_malformed_response() {
    let mut server = Server::new_async().await;
    let _create = server
        .mock("POST", RELEASES)
        .with_status(201)
        .with_body(r#"{"id": 1, "html_url": "https://example.test/r/1"}"#)
        .create_async()
        .await;
    let upload = server
        .mock("POST", Matcher::Regex("^/uploads".to_string()))
        .expect(0)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let publisher = ReleasePublisher::new(&settings(&server.url()), "t0ken").unwrap();
    let err = publisher.publish(&record(), &archive(&dir)).await.unwrap_err();

    assert!(matches!(err, PublishError::MalformedResponse { .. }), "{err:?}");
    assert!(err.to_string().contains("upload_url"));
    upload.assert_async().await;
}

#[tokio::test]
async fn unparseable_release_response_is_a_malformed_response() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", RELEASES)
        .with_status(201)
        .with_body("<html>gateway</html>")
        .expect(1)
        .create_async()
        .await;

    let publisher = ReleasePublisher::new(&settings(&server.url()), "t0ken").unwrap();
    let err = publisher.create_release(&record()).await.unwrap_err();

    assert!(matches!(err, PublishError::MalformedResponse { .. }));
    create.assert_async().await;
}

#[tokio::test]
async fn existing_tag_is_reported_distinctly() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", RELEASES)
        .with_status(422)
        .with_body(
            r#"{"message":"Validation Failed","errors":[{"resource":"Release","code":"already_exists","field":"tag_name"}]}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let publisher = ReleasePublisher::new(&settings(&server.url()), "t0ken").unwrap();
    let err = publisher.create_release(&record()).await.unwrap_err();

    match &err {
        PublishError::TagInUse { tag } => assert_eq!(tag, "abc1234"),
        other => panic!("expected TagInUse, got {other:?}"),
    }
    assert!(!err.is_retryable());
    create.assert_async().await;
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let mut server = Server::new_async().await;
    let upload_url = format!("{}/uploads{RELEASES}/2/assets{{?name}}", server.url());
    let failing = server
        .mock("POST", RELEASES)
        .with_status(502)
        .expect(2)
        .create_async()
        .await;
    let succeeding = server
        .mock("POST", RELEASES)
        .with_status(201)
        .with_body(serde_json::json!({ "id": 2, "upload_url": upload_url }).to_string())
        .expect(1)
        .create_async()
        .await;

    let publisher = ReleasePublisher::new(&settings(&server.url()), "t0ken").unwrap();
    let created = publisher.create_release(&record()).await.unwrap();

    failing.assert_async().await;
    succeeding.assert_async().await;
    assert_eq!(created.id, Some(2));
    assert_eq!(
        created.upload_base.as_str(),
        format!("{}/uploads{RELEASES}/2/assets", server.url())
    );
}

#[tokio::test]
async fn retries_stop_after_three_attempts() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", RELEASES)
        .with_status(503)
        .expect(3)
        .create_async()
        .await;

    let publisher = ReleasePublisher::new(&settings(&server.url()), "t0ken").unwrap();
    let err = publisher.create_release(&record()).await.unwrap_err();

    assert!(matches!(err, PublishError::Rejected { status: 503, .. }));
    create.assert_async().await;
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", RELEASES)
        .with_status(401)
        .with_body(r#"{"message":"Bad credentials"}"#)
        .expect(1)
        .create_async()
        .await;

    let publisher = ReleasePublisher::new(&settings(&server.url()), "wrong").unwrap();
    let err = publisher.create_release(&record()).await.unwrap_err();

    assert!(matches!(err, PublishError::Rejected { status: 401, .. }));
    create.assert_async().await;
}

#[tokio::test]
async fn unreachable_api_is_a_network_error() {
    let publisher = ReleasePublisher::new(&settings("http://127.0.0.1:9"), "t0ken").unwrap();
    let err = publisher.create_release(&record()).await.unwrap_err();

    assert!(matches!(err, PublishError::Network { .. }), "{err:?}");
    assert!(err.is_retryable());
}
