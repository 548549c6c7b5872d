//! Router harness shared by the route tests.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    response::Response,
    Router,
};
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::{
    config::Config,
    db::Database,
    messaging::{fake::FakeTransport, MessageTransport},
    routes,
    state::AppState,
    uploads::{LocalStore, ObjectStore, StagedUpload, StorageError},
};

pub const ADMIN_EMAIL: &str = "admin@example.com";
const BOUNDARY: &str = "wedding-test-boundary";

pub struct TestApp {
    pub state: AppState,
    pub transport: Arc<FakeTransport>,
    router: Router,
    uploads: TempDir,
}

impl TestApp {
    /// No ADMIN_PASSWORD, messaging configured with a fake transport
    pub async fn new() -> Self {
        Self::build(None, Some(FakeTransport::default())).await
    }

    pub async fn with_admin_password(password: &str) -> Self {
        Self::build(Some(password), Some(FakeTransport::default())).await
    }

    pub async fn with_transport(transport: FakeTransport) -> Self {
        Self::build(None, Some(transport)).await
    }

    pub async fn without_messaging() -> Self {
        Self::build(None, None).await
    }

    /// Uploads start failing after `successful_puts` objects have been stored
    pub async fn with_failing_store(successful_puts: usize) -> Self {
        let mut app = Self::build(None, Some(FakeTransport::default())).await;
        let store = FailingStore {
            inner: LocalStore::new(app.uploads.path(), &app.state.config.uploads.public_prefix),
            remaining: AtomicUsize::new(successful_puts),
        };
        app.state.store = Arc::new(store);
        app.router = routes::create_router(app.state.clone());
        app
    }

    async fn build(admin_password: Option<&str>, transport: Option<FakeTransport>) -> Self {
        let uploads = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.auth.session_secret = Some("test-secret-that-is-long-enough-to-sign-cookies".to_string());
        config.auth.admin_password = admin_password.map(str::to_string);
        config.uploads.dir = uploads.path().display().to_string();
        if transport.is_some() {
            config.messaging.account_sid = Some("AC-test".to_string());
            config.messaging.auth_token = Some("token".to_string());
            config.messaging.whatsapp_number = Some("+14155238886".to_string());
        }

        let db = Database::in_memory().await;
        db.ensure_admin(ADMIN_EMAIL, "Admin").await.unwrap();

        let store = Arc::new(LocalStore::new(uploads.path(), &config.uploads.public_prefix));
        let has_transport = transport.is_some();
        let transport = Arc::new(transport.unwrap_or_default());
        let dyn_transport: Option<Arc<dyn MessageTransport>> = if has_transport {
            Some(transport.clone())
        } else {
            None
        };

        let state = AppState::new(db, config, store, dyn_transport).unwrap();
        let router = routes::create_router(state.clone());
        Self {
            state,
            transport,
            router,
            uploads,
        }
    }

    pub async fn call(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Logs in as the bootstrap admin and returns the session token
    pub async fn login(&self, password: &str) -> String {
        let response = self
            .call(json_request(
                Method::POST,
                "/api/admin/login",
                &serde_json::json!({ "email": ADMIN_EMAIL, "password": password }),
            ))
            .await;
        assert!(response.status().is_success(), "login failed: {}", response.status());
        read_json(response).await["token"].as_str().unwrap().to_string()
    }

    pub fn stored_files(&self, kind: &str) -> usize {
        count_files(&self.uploads.path().join(kind))
    }

    pub fn staged_files(&self) -> usize {
        count_files(&self.state.config.uploads.staging_path())
    }
}

struct FailingStore {
    inner: LocalStore,
    remaining: AtomicUsize,
}

#[async_trait]
impl ObjectStore for FailingStore {
    async fn put(&self, key: &str, upload: StagedUpload) -> Result<String, StorageError> {
        let allowed = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(StorageError::S3("bucket unavailable".to_string()));
        }
        self.inner.put(key, upload).await
    }

    async fn remove(&self, url: &str) -> Result<(), StorageError> {
        self.inner.remove(url).await
    }
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok()).filter(|e| e.path().is_file()).count())
        .unwrap_or(0)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: Method, uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Adds a bearer token to any request
pub fn authed(mut request: Request<Body>, token: &str) -> Request<Body> {
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {}", token).parse().unwrap(),
    );
    request
}

/// `files` are `(field, file name, contents)`
pub fn multipart_request(uri: &str, fields: &[(&str, &str)], files: &[(&str, &str, &str)]) -> Request<Body> {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            BOUNDARY, name, value
        ));
    }
    for (name, file_name, contents) in files {
        body.push_str(&format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n{}\r\n",
            BOUNDARY, name, file_name, contents
        ));
    }
    body.push_str(&format!("--{}--\r\n", BOUNDARY));

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn read_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    if bytes.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}
