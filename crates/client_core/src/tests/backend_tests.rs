use std::sync::Arc;

use super::*;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
struct ReceivedUpload {
    field: String,
    filename: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

#[derive(Clone, Default)]
struct ServerState {
    uploads: Arc<Mutex<Vec<ReceivedUpload>>>,
}

async fn handle_initialize() -> Json<Value> {
    Json(json!({"status": "ready", "message": "Vector DB already initialized with current resume."}))
}

async fn handle_ask(Json(request): Json<AskRequest>) -> (StatusCode, String) {
    match request.question.as_str() {
        "empty" => (
            StatusCode::BAD_REQUEST,
            json!({"detail": "Question cannot be empty."}).to_string(),
        ),
        "plain" => (StatusCode::BAD_GATEWAY, "upstream unavailable".to_string()),
        "garbled" => (StatusCode::OK, "not json".to_string()),
        question => (
            StatusCode::OK,
            json!({
                "answer": format!("You asked: {question}"),
                "relevant_sections": ["Skills"],
                "follow_up_questions": ["Anything else?"],
            })
            .to_string(),
        ),
    }
}

async fn handle_reload(
    State(state): State<ServerState>,
    mut multipart: Multipart,
) -> (StatusCode, Json<Value>) {
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let Ok(bytes) = field.bytes().await else {
            return (StatusCode::BAD_REQUEST, Json(json!({"detail": "bad field"})));
        };
        state.uploads.lock().await.push(ReceivedUpload {
            field: name,
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
    (StatusCode::OK, Json(json!({"message": "Resume reloaded and indexed."})))
}

async fn handle_health() -> Json<Value> {
    Json(json!({"status": "ok", "vectordb_exists": true, "resume_exists": false}))
}

async fn handle_validation_error() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({"detail": [{"loc": ["body", "question"], "msg": "field required"}]})),
    )
}

fn routes(state: ServerState) -> Router {
    Router::new()
        .route("/initialize", post(handle_initialize))
        .route("/ask", post(handle_ask))
        .route("/reload", post(handle_reload))
        .route("/health", get(handle_health))
        .with_state(state)
}

async fn spawn_backend_server(prefix: Option<&str>) -> (String, ServerState) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = ServerState::default();
    let app = match prefix {
        Some(prefix) => Router::new().nest(prefix, routes(state.clone())),
        None => routes(state.clone()),
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    let base = match prefix {
        Some(prefix) => format!("http://{addr}{prefix}"),
        None => format!("http://{addr}"),
    };
    (base, state)
}

#[test]
fn normalizes_base_url_with_trailing_slash() {
    let url = normalize_base_url(" http://localhost:8000 ").expect("url");
    assert_eq!(url.as_str(), "http://localhost:8000/");
    assert_eq!(url.join("ask").expect("join").as_str(), "http://localhost:8000/ask");

    let nested = normalize_base_url("http://example.test/api").expect("url");
    assert_eq!(
        nested.join("reload").expect("join").as_str(),
        "http://example.test/api/reload"
    );
}

#[test]
fn rejects_unparseable_base_url() {
    let err = normalize_base_url("   ").expect_err("must fail");
    assert!(matches!(err, ClientError::InvalidBaseUrl { .. }));
    assert!(HttpBackend::new("not a url").is_err());
}

#[test]
fn display_url_drops_trailing_slash() {
    let backend = HttpBackend::new("http://localhost:8000/").expect("backend");
    assert_eq!(backend.base_url(), "http://localhost:8000");
}

#[tokio::test]
async fn initialize_decodes_status_body() {
    let (base, _) = spawn_backend_server(None).await;
    let backend = HttpBackend::new(&base).expect("backend");

    let response = backend.initialize().await.expect("initialize");

    assert_eq!(response.status.as_deref(), Some("ready"));
}

#[tokio::test]
async fn ask_returns_answer_with_lists() {
    let (base, _) = spawn_backend_server(None).await;
    let backend = HttpBackend::new(&base).expect("backend");

    let response = backend.ask("Where did they study?").await.expect("ask");

    assert_eq!(response.answer, "You asked: Where did they study?");
    assert_eq!(response.relevant_sections, Some(vec!["Skills".to_string()]));
    assert_eq!(
        response.follow_up_questions,
        Some(vec!["Anything else?".to_string()])
    );
}

#[tokio::test]
async fn ask_maps_detail_body_to_backend_error() {
    let (base, _) = spawn_backend_server(None).await;
    let backend = HttpBackend::new(&base).expect("backend");

    let err = backend.ask("empty").await.expect_err("must fail");

    match err {
        ClientError::Backend { status, detail } => {
            assert_eq!(status, 400);
            assert_eq!(detail, "Question cannot be empty.");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn non_json_error_body_falls_back_to_status_text() {
    let (base, _) = spawn_backend_server(None).await;
    let backend = HttpBackend::new(&base).expect("backend");

    let err = backend.ask("plain").await.expect_err("must fail");

    assert_eq!(err.backend_detail(), Some("request failed with status 502"));
}

#[tokio::test]
async fn undecodable_success_body_is_a_decode_error() {
    let (base, _) = spawn_backend_server(None).await;
    let backend = HttpBackend::new(&base).expect("backend");

    let err = backend.ask("garbled").await.expect_err("must fail");

    assert!(matches!(err, ClientError::Decode(_)), "unexpected error: {err}");
}

#[tokio::test]
async fn structured_validation_detail_is_kept_readable() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new().route("/ask", post(handle_validation_error));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    let backend = HttpBackend::new(&format!("http://{addr}")).expect("backend");

    let err = backend.ask("anything").await.expect_err("must fail");

    let detail = err.backend_detail().expect("detail");
    assert!(detail.contains("field required"), "unexpected detail: {detail}");
}

#[tokio::test]
async fn reload_posts_multipart_file_field() {
    let (base, state) = spawn_backend_server(None).await;
    let backend = HttpBackend::new(&base).expect("backend");

    let response = backend
        .reload(ResumeUpload::new(
            "resume.pdf",
            Some(crate::upload::PDF_MIME_TYPE.to_string()),
            b"%PDF-1.7 test".to_vec(),
        ))
        .await
        .expect("reload");

    assert_eq!(response.message, "Resume reloaded and indexed.");
    let uploads = state.uploads.lock().await;
    assert_eq!(
        uploads.as_slice(),
        [ReceivedUpload {
            field: "file".to_string(),
            filename: Some("resume.pdf".to_string()),
            content_type: Some("application/pdf".to_string()),
            bytes: b"%PDF-1.7 test".to_vec(),
        }]
    );
}

#[tokio::test]
async fn health_reports_backend_flags() {
    let (base, _) = spawn_backend_server(None).await;
    let backend = HttpBackend::new(&base).expect("backend");

    let health = backend.health().await.expect("health");

    assert_eq!(health.status, "ok");
    assert!(health.vectordb_exists);
    assert!(!health.resume_exists);
}

#[tokio::test]
async fn base_path_prefix_is_preserved() {
    let (base, _) = spawn_backend_server(Some("/api")).await;
    let backend = HttpBackend::new(&base).expect("backend");

    let response = backend.ask("prefixed?").await.expect("ask");

    assert_eq!(response.answer, "You asked: prefixed?");
}

#[tokio::test]
async fn missing_route_is_a_backend_error() {
    let (base, _) = spawn_backend_server(Some("/api")).await;
    let backend = HttpBackend::new(base.trim_end_matches("/api")).expect("backend");

    let err = backend.ask("wrong prefix").await.expect_err("must fail");

    assert!(matches!(err, ClientError::Backend { status: 404, .. }), "unexpected error: {err}");
}
