use std::time::Duration;

use fhirbase_bulk::{BulkClient, BulkConfig, BulkError};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> BulkClient {
    BulkClient::new(
        BulkConfig::default()
            .with_base_delay(Duration::from_millis(1))
            .with_workers(2),
    )
    .unwrap()
}

async fn mount_manifest(server: &MockServer, files: &[&str]) {
    let output: Vec<_> = files
        .iter()
        .map(|f| json!({"type": "Patient", "url": format!("{}/files/{f}", server.uri())}))
        .collect();

    Mock::given(method("GET"))
        .and(path("/status/1"))
        .respond_with(ResponseTemplate::new(202).insert_header("Retry-After", "0"))
        .up_to_n_times(2)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/status/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "transactionTime": "2024-01-01T00:00:00Z",
            "output": output
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_export() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/fhir/$export"))
        .and(header("prefer", "respond-async"))
        .and(header("accept", "application/fhir+json"))
        .respond_with(
            ResponseTemplate::new(202)
                .insert_header("Content-Location", format!("{}/status/1", server.uri()).as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;

    mount_manifest(&server, &["patients", "observations.ndjson"]).await;

    Mock::given(method("GET"))
        .and(path("/files/patients"))
        .and(header("accept-encoding", "gzip"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"resourceType\":\"Patient\"}\n"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/observations.ndjson"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("{\"resourceType\":\"Observation\"}\n"),
        )
        .mount(&server)
        .await;

    let dest = tempfile::tempdir().unwrap();
    let target = dest.path().join("out");
    let report = client()
        .export(&format!("{}/fhir/$export", server.uri()), &target)
        .await
        .unwrap();

    assert_eq!(report.failed, 0);
    let mut names: Vec<_> = report
        .files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["observations.ndjson", "patients.ndjson"]);

    let content = std::fs::read_to_string(target.join("patients.ndjson")).unwrap();
    assert_eq!(content, "{\"resourceType\":\"Patient\"}\n");

    // Staging directory is gone.
    let entries: Vec<_> = std::fs::read_dir(&target).unwrap().collect();
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn test_failed_download_does_not_abort() {
    let server = MockServer::start().await;
    mount_manifest(&server, &["good", "missing"]).await;

    Mock::given(method("GET"))
        .and(path("/files/good"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}\n"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dest = tempfile::tempdir().unwrap();
    // A status URL skips the kickoff; no kickoff mock is mounted.
    let status_url = format!("{}/status/1?$export-poll-status", server.uri());
    let report = client().export(&status_url, dest.path()).await.unwrap();

    assert_eq!(report.files, vec![dest.path().join("good.ndjson")]);
    assert_eq!(report.failed, 1);
}

#[tokio::test]
async fn test_kickoff_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/denied/$export"))
        .respond_with(ResponseTemplate::new(403).set_body_string("nope"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/nolocation/$export"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let client = client();

    let err = client
        .kickoff(&format!("{}/denied/$export", server.uri()))
        .await
        .unwrap_err();
    match err {
        BulkError::Kickoff { status, body } => {
            assert_eq!(status, 403);
            assert_eq!(body, "nope");
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = client
        .kickoff(&format!("{}/nolocation/$export", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, BulkError::MissingContentLocation));
}

#[tokio::test]
async fn test_poll_gives_up_after_ceiling() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/status/slow"))
        .respond_with(ResponseTemplate::new(202))
        .expect(3)
        .mount(&server)
        .await;

    let client = BulkClient::new(
        BulkConfig::default()
            .with_base_delay(Duration::from_millis(1))
            .with_max_attempts(3),
    )
    .unwrap();

    let err = client
        .poll(&format!("{}/status/slow", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, BulkError::RetriesExhausted { attempts: 3 }));
}

#[tokio::test]
async fn test_poll_unexpected_status_and_bad_manifest() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/status/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status/garbled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output": "x"})))
        .mount(&server)
        .await;

    let client = client();

    let err = client
        .poll(&format!("{}/status/broken", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, BulkError::Poll { status: 500, .. }));

    let err = client
        .poll(&format!("{}/status/garbled", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, BulkError::Manifest(_)));
}
