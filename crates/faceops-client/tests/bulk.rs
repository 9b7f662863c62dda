mod common;

use common::{bearer, frame, logged_in, logged_out};
use faceops_client::{CancellationToken, ClientError};
use faceops_core::{BulkCandidate, BulkStatus};
use reqwest::StatusCode;
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BULK_PATH: &str = "/api/v1/users/register/bulk";

fn write_candidates(dir: &Path, names: &[&str]) -> Vec<BulkCandidate> {
    names
        .iter()
        .map(|name| {
            let file = dir.join(format!("{name}.jpg"));
            std::fs::write(&file, format!("jpeg-of-{name}")).unwrap();
            BulkCandidate {
                name: name.to_string(),
                file,
            }
        })
        .collect()
}

fn event_stream(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

#[tokio::test]
async fn test_progress_then_summary() {
    let server = MockServer::start().await;
    let body = [
        frame(r#"{"type":"progress","current":1,"total":2,"name":"alice","status":"success"}"#),
        frame(r#"{"type":"progress","current":2,"total":2,"name":"bob","status":"success"}"#),
        frame(r#"{"type":"complete","total_folders_scanned":2,"success_count":2,"failed_count":0,"failures":[]}"#),
    ]
    .concat();
    Mock::given(method("POST"))
        .and(path(BULK_PATH))
        .and(header("authorization", bearer().as_str()))
        .respond_with(event_stream(body))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let candidates = write_candidates(dir.path(), &["alice", "bob"]);
    let client = logged_in(&server);

    let mut seen = Vec::new();
    let summary = client
        .register_bulk(&candidates, |event| {
            seen.push((event.current, event.name.clone(), event.status))
        })
        .await
        .unwrap();

    assert_eq!(
        seen,
        vec![
            (1, "alice".to_string(), BulkStatus::Success),
            (2, "bob".to_string(), BulkStatus::Success),
        ]
    );
    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.failed_count, 0);
    assert!(summary.is_consistent());
}

#[tokio::test]
async fn test_files_and_names_keep_candidate_order() {
    let server = MockServer::start().await;
    let body = frame(r#"{"type":"complete","total_folders_scanned":2,"success_count":1,"failed_count":1,"failures":[{"folder":"bob","reason":"Already registered"}]}"#);
    Mock::given(method("POST"))
        .and(path(BULK_PATH))
        .respond_with(event_stream(body))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let candidates = write_candidates(dir.path(), &["zoe", "adam"]);
    let summary = logged_in(&server)
        .register_bulk(&candidates, |_| {})
        .await
        .unwrap();
    assert_eq!(summary.failures[0].reason, "Already registered");

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body).into_owned();

    let file_zoe = body.find("jpeg-of-zoe").unwrap();
    let file_adam = body.find("jpeg-of-adam").unwrap();
    let name_zoe = body.find("\r\n\r\nzoe\r\n").unwrap();
    let name_adam = body.find("\r\n\r\nadam\r\n").unwrap();
    assert!(file_zoe < file_adam);
    assert!(name_zoe < name_adam);
    assert!(file_adam < name_zoe);
    assert_eq!(body.matches("name=\"files\"").count(), 2);
    assert_eq!(body.matches("name=\"names\"").count(), 2);
}

#[tokio::test]
async fn test_stream_without_completion_is_an_error() {
    let server = MockServer::start().await;
    let body = frame(r#"{"type":"progress","current":1,"total":2,"name":"alice","status":"failed","reason":"no face"}"#);
    Mock::given(method("POST"))
        .and(path(BULK_PATH))
        .respond_with(event_stream(body))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let candidates = write_candidates(dir.path(), &["alice", "bob"]);
    let mut calls = 0;
    let err = logged_in(&server)
        .register_bulk(&candidates, |_| calls += 1)
        .await
        .unwrap_err();

    assert_eq!(calls, 1);
    assert!(matches!(err, ClientError::IncompleteStream { frames: 1 }), "{err:?}");
}

#[tokio::test]
async fn test_summary_survives_cut_off_tail() {
    let server = MockServer::start().await;
    let body = [
        frame(r#"{"type":"progress","current":1,"total":1,"name":"alice","status":"success"}"#),
        frame(r#"{"type":"complete","total_folders_scanned":1,"success_count":1,"failed_count":0,"failures":[]}"#),
        r#"data: {"type":"prog"#.to_string(),
    ]
    .concat();
    Mock::given(method("POST"))
        .and(path(BULK_PATH))
        .respond_with(event_stream(body))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let candidates = write_candidates(dir.path(), &["alice"]);
    let summary = logged_in(&server)
        .register_bulk(&candidates, |_| {})
        .await
        .unwrap();
    assert_eq!(summary.success_count, 1);
}

#[tokio::test]
async fn test_stream_cut_before_summary_is_incomplete() {
    let server = MockServer::start().await;
    let body = [
        frame(r#"{"type":"progress","current":1,"total":2,"name":"alice","status":"success"}"#),
        r#"data: {"type":"complete","total_fol"#.to_string(),
    ]
    .concat();
    Mock::given(method("POST"))
        .and(path(BULK_PATH))
        .respond_with(event_stream(body))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let candidates = write_candidates(dir.path(), &["alice", "bob"]);
    let err = logged_in(&server)
        .register_bulk(&candidates, |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::IncompleteStream { frames: 1 }), "{err:?}");
}

#[tokio::test]
async fn test_rejected_request_carries_server_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(BULK_PATH))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(serde_json::json!({"detail": "파일 수와 이름 수가 일치하지 않습니다."})),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let candidates = write_candidates(dir.path(), &["alice"]);
    let err = logged_in(&server)
        .register_bulk(&candidates, |_| {})
        .await
        .unwrap_err();

    match err {
        ClientError::Api { status, detail } => {
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(detail, "파일 수와 이름 수가 일치하지 않습니다.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_rejected_request_without_json_uses_generic_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(BULK_PATH))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let candidates = write_candidates(dir.path(), &["alice"]);
    let err = logged_in(&server)
        .register_bulk(&candidates, |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Api { ref detail, .. } if detail == "bulk registration failed"));
}

#[tokio::test]
async fn test_cancel_aborts_pending_upload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(BULK_PATH))
        .respond_with(event_stream(String::new()).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let candidates = write_candidates(dir.path(), &["alice"]);
    let client = logged_in(&server);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(10),
        client.register_bulk_cancellable(&candidates, |_| {}, &cancel),
    )
    .await
    .expect("cancellation should end the call promptly")
    .unwrap_err();
    assert!(matches!(err, ClientError::Cancelled));
}

#[tokio::test]
async fn test_requires_login() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let candidates = write_candidates(dir.path(), &["alice"]);
    let err = logged_out(&server)
        .register_bulk(&candidates, |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotAuthenticated));
    assert!(server.received_requests().await.unwrap().is_empty());
}
