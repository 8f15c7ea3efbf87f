use std::sync::{Arc, Mutex};

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use client_core::{
    FileSessionStore, HttpRemoteService, MediaFile, SessionStore, View, ViewController,
};
use serde_json::{json, Value};
use shared::protocol::CredentialsRequest;
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct FakeService {
    meetings: Arc<Mutex<Vec<u8>>>,
}

async fn login(Json(payload): Json<CredentialsRequest>) -> (StatusCode, Json<Value>) {
    if payload.username == "alice" && payload.password == "pw" {
        (StatusCode::OK, Json(json!({ "user_id": "u1" })))
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Invalid credentials" })),
        )
    }
}

async fn analyze(State(service): State<FakeService>, mut multipart: Multipart) -> Json<Value> {
    while let Ok(Some(field)) = multipart.next_field().await {
        let _ = field.bytes().await;
    }
    let clarity_index = {
        let mut meetings = service.meetings.lock().expect("meetings");
        let index = 60 + 10 * meetings.len() as u8;
        meetings.push(index);
        index
    };
    Json(json!({
        "clarity_index": clarity_index,
        "total_words": 3,
        "total_jargon_count": 0,
        "overall_summary": "Clear.",
        "speaker_scores": [],
        "top_jargon_terms": [],
        "transcript": "all good here"
    }))
}

async fn history(
    State(service): State<FakeService>,
    Path(user_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    if user_id != "u1" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "Invalid user_id" })),
        );
    }
    let meetings = service.meetings.lock().expect("meetings").clone();
    let history: Vec<Value> = meetings
        .iter()
        .enumerate()
        .map(|(i, index)| {
            json!({
                "id": format!("m{i}"),
                "created_at": format!("2024-06-0{}T09:00:00", i + 1),
                "clarity_index": index
            })
        })
        .collect();
    (StatusCode::OK, Json(json!({ "history": history })))
}

async fn spawn_service() -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new()
        .route("/api/login", post(login))
        .route("/api/analyze", post(analyze))
        .route("/api/history/:user_id", get(history))
        .with_state(FakeService::default());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}/api")
}

fn controller(api: &str, session: &FileSessionStore) -> Arc<ViewController> {
    ViewController::new(
        Arc::new(HttpRemoteService::new(api)),
        Arc::new(session.clone()),
    )
}

#[tokio::test]
async fn session_survives_restart_and_history_accumulates() {
    let api = spawn_service().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let session = FileSessionStore::new(dir.path().join("session.json"));

    let first_run = controller(&api, &session);
    assert_eq!(first_run.view(), View::Unauthenticated);
    first_run.submit_auth("alice", "pw").await.expect("login");
    first_run.settle_background().await;
    let snapshot = first_run.snapshot();
    assert_eq!(snapshot.view, View::AwaitingInput);
    assert!(snapshot.history.is_empty());
    drop(first_run);

    let second_run = controller(&api, &session);
    assert_eq!(second_run.view(), View::AwaitingInput);
    second_run
        .submit_analysis(Some(MediaFile::new("one.mp4", vec![1; 8])))
        .await
        .expect("first analysis");
    second_run.settle_background().await;
    second_run.request_another().expect("another");
    second_run
        .submit_analysis(Some(MediaFile::new("two.mp4", vec![2; 8])))
        .await
        .expect("second analysis");
    second_run.settle_background().await;

    let snapshot = second_run.snapshot();
    assert_eq!(snapshot.view, View::Presenting);
    assert_eq!(
        snapshot
            .history
            .iter()
            .map(|entry| entry.clarity_index)
            .collect::<Vec<_>>(),
        vec![60, 70]
    );

    second_run.logout();
    assert_eq!(session.get(), "");
    assert_eq!(controller(&api, &session).view(), View::Unauthenticated);
}

#[tokio::test]
async fn rejected_login_leaves_nothing_persisted() {
    let api = spawn_service().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let session = FileSessionStore::new(dir.path().join("session.json"));

    let run = controller(&api, &session);
    let err = run.submit_auth("alice", "wrong").await.expect_err("reject");

    assert_eq!(err.to_string(), "Invalid credentials");
    assert_eq!(session.get(), "");
    assert!(!dir.path().join("session.json").exists());
    assert!(!run.snapshot().loading);
}

#[tokio::test]
async fn restarted_session_loads_history_on_start() {
    let api = spawn_service().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let session = FileSessionStore::new(dir.path().join("session.json"));

    let first_run = controller(&api, &session);
    first_run.submit_auth("alice", "pw").await.expect("login");
    first_run
        .submit_analysis(Some(MediaFile::new("one.mp4", vec![1; 8])))
        .await
        .expect("analysis");
    first_run.settle_background().await;
    drop(first_run);

    let second_run = controller(&api, &session);
    assert!(second_run.snapshot().history.is_empty());
    second_run.start();
    second_run.settle_background().await;

    let snapshot = second_run.snapshot();
    assert_eq!(snapshot.view, View::AwaitingInput);
    assert_eq!(
        snapshot
            .history
            .iter()
            .map(|entry| entry.clarity_index)
            .collect::<Vec<_>>(),
        vec![60]
    );
}
