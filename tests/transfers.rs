//! Upload staging and download relocation against a mock server

mod common;

use std::sync::{Arc, Mutex};

use rest_transport::app::{Endpoint, ProgressSink, RequestDescriptor};
use rest_transport::errors::{DecodeFailure, TransportError};
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{client, entries, fresh_credential};

fn source_file(temp: &TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
    let path = temp.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[tokio::test]
async fn test_upload_sends_multipart_and_removes_staging() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    Mock::given(method("POST"))
        .and(path("/rest/files"))
        .and(header("Authorization", "Bearer current"))
        .and(body_string_contains("name=\"filename\"\r\n\r\nnotes.txt"))
        .and(body_string_contains("name=\"attachment\"; filename=\"notes.txt\""))
        .and(body_string_contains("hello upload"))
        .and(body_string_contains(r#"{"folder":"inbox"}"#))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 31})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, &temp, Some(fresh_credential("current")));
    let source = source_file(&temp, "notes.txt", b"hello upload");

    let created: Value = client
        .upload(
            RequestDescriptor::upload(Endpoint::home("/rest/files"), &source)
                .with_json(&json!({"folder": "inbox"}))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(created["id"], 31);

    let request = &server.received_requests().await.unwrap()[0];
    let content_type = request.headers.get("Content-Type").unwrap().to_str().unwrap();
    assert!(content_type.starts_with("multipart/form-data; boundary="));

    assert_eq!(entries(&client.staging().uploads), 0);
    assert!(source.exists());
}

#[tokio::test]
async fn test_failed_upload_still_removes_staging() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    Mock::given(method("POST"))
        .and(path("/rest/files"))
        .respond_with(
            ResponseTemplate::new(413).set_body_json(json!({"message": "File too large"})),
        )
        .mount(&server)
        .await;

    let client = client(&server, &temp, Some(fresh_credential("current")));
    let source = source_file(&temp, "big.bin", &[7u8; 4096]);

    let error = client
        .upload::<Value>(RequestDescriptor::upload(Endpoint::home("/rest/files"), &source))
        .await
        .unwrap_err();

    let message = error.server_message().unwrap();
    assert_eq!(message.message, "File too large");
    assert_eq!(message.status_code, Some(413));
    assert_eq!(entries(&client.staging().uploads), 0);
}

#[tokio::test]
async fn test_upload_of_missing_file_fails_before_sending() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let client = client(&server, &temp, Some(fresh_credential("current")));

    let result = client
        .upload::<Value>(RequestDescriptor::upload(
            Endpoint::home("/rest/files"),
            temp.path().join("absent.txt"),
        ))
        .await;

    assert!(matches!(
        result,
        Err(TransportError::FailedEncodingRequestBody { .. })
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_download_is_relocated_under_the_suggested_name() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let payload = vec![42u8; 64 * 1024];
    Mock::given(method("GET"))
        .and(path("/rest/files/9/content"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Disposition", "attachment; filename=\"report.csv\"")
                .set_body_bytes(payload.clone()),
        )
        .mount(&server)
        .await;

    let client = client(&server, &temp, Some(fresh_credential("current")));
    let reports: Arc<Mutex<Vec<(i64, i64, i64)>>> = Arc::default();
    let sink = {
        let reports = reports.clone();
        ProgressSink::new(move |written, total, expected| {
            reports.lock().unwrap().push((written, total, expected))
        })
    };

    let saved = client
        .download(
            RequestDescriptor::download(Endpoint::home("/rest/files/9/content"))
                .with_progress(sink),
        )
        .await
        .unwrap();

    assert_eq!(saved, client.staging().downloads.join("report.csv"));
    assert_eq!(std::fs::read(&saved).unwrap(), payload);
    assert_eq!(entries(&client.staging().downloads), 1);

    let reports = reports.lock().unwrap();
    let (_, total, expected) = *reports.last().unwrap();
    assert_eq!(total, payload.len() as i64);
    assert_eq!(expected, payload.len() as i64);
    assert_eq!(
        reports.iter().map(|(written, _, _)| written).sum::<i64>(),
        payload.len() as i64
    );
}

#[tokio::test]
async fn test_download_failure_reports_the_envelope() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    Mock::given(path("/rest/files/1/content"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({"message": "Forbidden file"})),
        )
        .mount(&server)
        .await;
    Mock::given(path("/rest/files/2/content"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = client(&server, &temp, Some(fresh_credential("current")));

    let forbidden = client
        .download(RequestDescriptor::download(Endpoint::home("/rest/files/1/content")))
        .await
        .unwrap_err();
    let message = forbidden.server_message().unwrap();
    assert_eq!(message.message, "Forbidden file");
    assert_eq!(message.status_code, Some(403));

    let empty = client
        .download(RequestDescriptor::download(Endpoint::home("/rest/files/2/content")))
        .await;
    assert!(matches!(
        empty,
        Err(TransportError::FailedDecodingResponse(DecodeFailure::MissingResource))
    ));

    // Neither failure leaves a partial file behind
    assert_eq!(entries(&client.staging().downloads), 0);
}
