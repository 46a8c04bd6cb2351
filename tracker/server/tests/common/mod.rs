#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, header};
use axum::response::Response;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracker_server::backend::{Backend, BackendError, ImageUpload};
use tracker_server::config::Config;
use tracker_server::web::{AppState, create_app};

/// Backend double that keeps tables and uploaded objects in memory.
#[derive(Default)]
pub struct InMemoryBackend {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    uploads: Mutex<Vec<(String, String)>>,
    fail_reads: AtomicBool,
    fail_uploads: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemoryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Stores `row` as-is, adding an `id` when it has none. Returns the id.
    pub fn seed(&self, table: &str, mut row: Value) -> String {
        let id = row
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        row["id"] = json!(id);
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push(row);
        id
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Every stored object as `(bucket, file_name)`.
    pub fn uploads(&self) -> Vec<(String, String)> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn fail_uploads(&self) {
        self.fail_uploads.store(true, Ordering::SeqCst);
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, message: &str) -> Result<(), BackendError> {
        if flag.load(Ordering::SeqCst) {
            return Err(BackendError::Api {
                status: 500,
                message: message.to_string(),
            });
        }
        Ok(())
    }
}

fn has_id(row: &Value, id: &str) -> bool {
    row.get("id").and_then(Value::as_str) == Some(id)
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn select(&self, table: &str) -> Result<Vec<Value>, BackendError> {
        Self::check(&self.fail_reads, "connection refused")?;
        Ok(self.rows(table))
    }

    async fn select_by_id(&self, table: &str, id: &str) -> Result<Value, BackendError> {
        Self::check(&self.fail_reads, "connection refused")?;
        self.rows(table)
            .into_iter()
            .find(|row| has_id(row, id))
            .ok_or_else(|| BackendError::NotFound(id.to_string()))
    }

    async fn insert(&self, table: &str, mut record: Value) -> Result<(), BackendError> {
        Self::check(&self.fail_writes, "insert rejected")?;
        record["created_at"] = json!(chrono::Utc::now().to_rfc3339());
        self.seed(table, record);
        Ok(())
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<(), BackendError> {
        Self::check(&self.fail_writes, "update rejected")?;
        let mut tables = self.tables.lock().unwrap();
        let row = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|row| has_id(row, id)))
            .ok_or_else(|| BackendError::NotFound(id.to_string()))?;
        if let (Some(row), Some(patch)) = (row.as_object_mut(), patch.as_object()) {
            for (key, value) in patch {
                row.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), BackendError> {
        Self::check(&self.fail_writes, "delete rejected")?;
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table.to_string()).or_default();
        let before = rows.len();
        rows.retain(|row| !has_id(row, id));
        if rows.len() == before {
            return Err(BackendError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn upload(
        &self,
        bucket: &str,
        file_name: &str,
        _image: ImageUpload,
    ) -> Result<(), BackendError> {
        Self::check(&self.fail_uploads, "storage unavailable")?;
        self.uploads
            .lock()
            .unwrap()
            .push((bucket.to_string(), file_name.to_string()));
        Ok(())
    }

    fn public_url(&self, bucket: &str, file_name: &str) -> String {
        format!("https://storage.test/{}/{}", bucket, file_name)
    }
}

pub fn test_config_with(overrides: &[(&str, &str)]) -> Config {
    let mut builder = config::Config::builder()
        .set_override("supabase_url", "https://example.supabase.co")
        .unwrap()
        .set_override("supabase_key", "anon-key")
        .unwrap();
    for (key, value) in overrides {
        builder = builder.set_override(*key, *value).unwrap();
    }
    Config::from_builder(builder).unwrap()
}

pub fn test_app(backend: Arc<InMemoryBackend>) -> Router {
    test_app_with(backend, test_config_with(&[]))
}

pub fn test_app_with(backend: Arc<InMemoryBackend>, config: Config) -> Router {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    create_app(AppState {
        config: Arc::new(config),
        backend,
    })
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_text(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
}

const BOUNDARY: &str = "tracker-test-boundary";

/// Builds `multipart/form-data` bodies the way a browser submits the record forms.
#[derive(Default)]
pub struct MultipartForm {
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, name, file_name, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// The part a browser sends when no file was picked.
    pub fn no_file(self, name: &str) -> Self {
        self.file(name, "", "application/octet-stream", b"")
    }

    pub fn into_request(mut self, uri: &str) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}
