//! In-process stand-in for the question-answering backend.
//!
//! Serves every route the client uses on a random local port, records each
//! request it sees, and tracks how many uploads were on the wire at once.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Multipart, Path as UrlPath, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use docquery::admin::{self, AdminView};
use docquery::config::Config;
use docquery::query::{self, QueryView};

pub const TOKEN: &str = "test-token";
pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "secret";

#[derive(Default)]
pub struct MockState {
    pub log: Mutex<Vec<String>>,
    pub documents: Mutex<Vec<Value>>,
    /// Uploads whose filename is listed here are rejected with 400.
    pub reject_uploads: Mutex<Vec<String>>,
    /// Non-zero forces `GET /api/admin/documents` to answer with this status.
    pub list_status: Mutex<u16>,
    /// Non-zero forces `POST /api/query` to answer with this status.
    pub query_status: Mutex<u16>,
    pub uploads_in_flight: AtomicUsize,
    pub max_uploads_in_flight: AtomicUsize,
}

impl MockState {
    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

pub struct MockBackend {
    pub base_url: String,
    pub state: Arc<MockState>,
}

impl MockBackend {
    pub fn log(&self) -> Vec<String> {
        self.state.log.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.log().iter().filter(|e| e.as_str() == entry).count()
    }

    pub fn add_document(&self, filename: &str) {
        self.state
            .documents
            .lock()
            .unwrap()
            .push(document_json(filename));
    }

    pub fn reject_upload(&self, filename: &str) {
        self.state
            .reject_uploads
            .lock()
            .unwrap()
            .push(filename.to_string());
    }

    pub fn set_list_status(&self, status: u16) {
        *self.state.list_status.lock().unwrap() = status;
    }

    pub fn set_query_status(&self, status: u16) {
        *self.state.query_status.lock().unwrap() = status;
    }

    pub fn max_uploads_in_flight(&self) -> usize {
        self.state.max_uploads_in_flight.load(Ordering::SeqCst)
    }

    /// Config pointing at this backend, with the session file under `dir`.
    pub fn config(&self, dir: &Path) -> Config {
        let mut cfg = Config::minimal();
        cfg.server.base_url = self.base_url.clone();
        cfg.session.store_path = dir.join("storage.json");
        cfg
    }
}

pub async fn spawn_backend() -> MockBackend {
    let state = Arc::new(MockState::default());
    let app = Router::new()
        .route("/api/query", post(handle_query))
        .route("/api/login", post(handle_login))
        .route("/api/admin/upload", post(handle_upload))
        .route("/api/admin/documents", get(handle_list))
        .route("/api/admin/documents/{filename}", delete(handle_delete))
        .route("/api/admin/rebuild-index", post(handle_rebuild))
        .route("/api/admin/stats", get(handle_stats))
        .route("/api/admin/backup", post(handle_backup))
        .route("/health", get(handle_health))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockBackend {
        base_url: format!("http://{}", addr),
        state,
    }
}

pub fn document_json(filename: &str) -> Value {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, e)| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    json!({
        "filename": filename,
        "type": ext,
        "size": 1536,
        "upload_date": "2024-01-15T10:30:00",
        "indexed": true
    })
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", TOKEN))
        .unwrap_or(false)
}

fn unauthorized() -> Response {
    detail(StatusCode::UNAUTHORIZED, "Could not validate credentials")
}

async fn handle_query(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    let question = body["question"].as_str().unwrap_or_default().to_string();
    state.record(format!("POST /api/query {}", question));

    let status = *state.query_status.lock().unwrap();
    if status != 0 {
        let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return detail(code, "Query engine not initialized");
    }

    let sources: Vec<Value> = (1..=7)
        .map(|i| {
            json!({
                "type": if i % 2 == 0 { "excel" } else { "pdf" },
                "filename": format!("report{}.pdf", i),
                "content": format!("excerpt {}", i),
                "metadata": { "page": i }
            })
        })
        .collect();
    Json(json!({
        "answer": "Revenue grew 12% in Q3.\n\n1. North region\n2. South region",
        "sources": sources,
        "processing_time": 1.2
    }))
    .into_response()
}

async fn handle_login(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.record("POST /api/login".to_string());
    let user = params.get("username").map(String::as_str);
    let pass = params.get("password").map(String::as_str);
    if user == Some(USERNAME) && pass == Some(PASSWORD) {
        Json(json!({ "access_token": TOKEN, "token_type": "bearer" })).into_response()
    } else {
        detail(StatusCode::UNAUTHORIZED, "Incorrect username or password")
    }
}

async fn handle_upload(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let now = state.uploads_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.max_uploads_in_flight.fetch_max(now, Ordering::SeqCst);

    let mut filename = String::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            filename = field.file_name().unwrap_or_default().to_string();
            let _ = field.bytes().await;
        }
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    state.uploads_in_flight.fetch_sub(1, Ordering::SeqCst);
    state.record(format!("POST /api/admin/upload {}", filename));

    if !authorized(&headers) {
        return unauthorized();
    }
    if state.reject_uploads.lock().unwrap().contains(&filename) {
        return detail(
            StatusCode::BAD_REQUEST,
            &format!("File '{}' already exists.", filename),
        );
    }

    state.documents.lock().unwrap().push(document_json(&filename));
    Json(json!({
        "filename": filename,
        "status": "success",
        "message": format!("Document '{}' uploaded and indexed successfully", filename),
        "timestamp": "2024-01-15T10:30:00.123456"
    }))
    .into_response()
}

async fn handle_list(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.record("GET /api/admin/documents".to_string());
    if !authorized(&headers) {
        return unauthorized();
    }
    let status = *state.list_status.lock().unwrap();
    if status != 0 {
        let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return detail(code, "Storage unavailable");
    }
    let docs = state.documents.lock().unwrap().clone();
    Json(Value::Array(docs)).into_response()
}

async fn handle_delete(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    UrlPath(filename): UrlPath<String>,
) -> Response {
    state.record(format!("DELETE /api/admin/documents {}", filename));
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut docs = state.documents.lock().unwrap();
    let before = docs.len();
    docs.retain(|d| d["filename"] != filename.as_str());
    if docs.len() == before {
        return detail(StatusCode::NOT_FOUND, "Document not found");
    }
    Json(json!({ "message": format!("Document '{}' deleted successfully", filename) }))
        .into_response()
}

async fn handle_rebuild(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.record("POST /api/admin/rebuild-index".to_string());
    if !authorized(&headers) {
        return unauthorized();
    }
    let n = state.documents.lock().unwrap().len();
    Json(json!({ "message": "Index rebuilt successfully", "documents_processed": n }))
        .into_response()
}

async fn handle_stats(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.record("GET /api/admin/stats".to_string());
    if !authorized(&headers) {
        return unauthorized();
    }
    let n = state.documents.lock().unwrap().len();
    Json(json!({
        "total_documents": n,
        "index_loaded": true,
        "query_engine_ready": true,
        "uploaded_files": n,
        "vector_store_path": "./data/vector_store"
    }))
    .into_response()
}

async fn handle_backup(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.record("POST /api/admin/backup".to_string());
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({
        "message": "Backup created successfully",
        "backup_path": "./backups/backup_20240115_103000"
    }))
    .into_response()
}

async fn handle_health(State(state): State<Arc<MockState>>) -> Response {
    state.record("GET /health".to_string());
    let n = state.documents.lock().unwrap().len();
    Json(json!({ "status": "healthy", "version": "1.0.0", "documents": n })).into_response()
}

/// View that keeps every effect for later assertions.
#[derive(Default)]
pub struct Recording {
    pub query: Vec<query::Effect>,
    pub admin: Vec<admin::Effect>,
}

impl QueryView for Recording {
    fn apply(&mut self, effect: &query::Effect) {
        self.query.push(effect.clone());
    }
}

impl AdminView for Recording {
    fn apply(&mut self, effect: &admin::Effect) {
        self.admin.push(effect.clone());
    }
}
