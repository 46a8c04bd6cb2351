//! Supabase-compatible HTTP client.
//!
//! Tables are reached through PostgREST under `/rest/v1`, objects through the
//! Storage API under `/storage/v1`. Both authenticate with the project key
//! sent as `apikey` and as a bearer token.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;
use std::time::Duration;

use super::{Backend, BackendError, ImageUpload};
use crate::config::Config;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const RETURN_MINIMAL: &str = "return=minimal";
const RETURN_REPRESENTATION: &str = "return=representation";

pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    key: String,
}

impl SupabaseClient {
    pub fn new(
        base_url: &str,
        key: String,
        request_timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            key,
        })
    }

    /// Creates a client from the backend settings in `config`.
    pub fn from_config(config: &Config) -> Result<Self, BackendError> {
        Self::new(
            &config.supabase_url,
            config.supabase_key.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&self.key) {
            headers.insert("apikey", value);
        }
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.key)) {
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }
        headers
    }

    /// Sends the request and returns the body, turning non-2xx answers into
    /// [`BackendError::Api`].
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, BackendError> {
        let response = request.headers(self.auth_headers()).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok(body)
    }

    /// Sends a request expected to answer with a JSON array of rows.
    async fn send_for_rows(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Vec<Value>, BackendError> {
        let body = self.send(request).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Picks the human readable part of an error body. PostgREST and the Storage
/// API both report it as `message`; some gateways only set `error`.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(json) => json
            .get("message")
            .or_else(|| json.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
        Err(_) => body.to_string(),
    }
}

fn id_filter(id: &str) -> (&'static str, String) {
    ("id", format!("eq.{}", id))
}

#[async_trait]
impl Backend for SupabaseClient {
    #[tracing::instrument(skip(self))]
    async fn select(&self, table: &str) -> Result<Vec<Value>, BackendError> {
        let request = self.http.get(self.table_url(table)).query(&[("select", "*")]);
        self.send_for_rows(request).await
    }

    #[tracing::instrument(skip(self))]
    async fn select_by_id(&self, table: &str, id: &str) -> Result<Value, BackendError> {
        let (column, filter) = id_filter(id);
        let request = self
            .http
            .get(self.table_url(table))
            .query(&[("select", "*"), (column, filter.as_str())]);
        self.send_for_rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound(id.to_string()))
    }

    #[tracing::instrument(skip(self, record))]
    async fn insert(&self, table: &str, record: Value) -> Result<(), BackendError> {
        let request = self
            .http
            .post(self.table_url(table))
            .header("Prefer", RETURN_MINIMAL)
            .json(&record);
        self.send(request).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, patch))]
    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<(), BackendError> {
        let (column, filter) = id_filter(id);
        let request = self
            .http
            .patch(self.table_url(table))
            .query(&[(column, filter.as_str())])
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&patch);
        if self.send_for_rows(request).await?.is_empty() {
            return Err(BackendError::NotFound(id.to_string()));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, table: &str, id: &str) -> Result<(), BackendError> {
        let (column, filter) = id_filter(id);
        let request = self
            .http
            .delete(self.table_url(table))
            .query(&[(column, filter.as_str())])
            .header("Prefer", RETURN_REPRESENTATION);
        if self.send_for_rows(request).await?.is_empty() {
            return Err(BackendError::NotFound(id.to_string()));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, image), fields(size = image.bytes.len()))]
    async fn upload(
        &self,
        bucket: &str,
        file_name: &str,
        image: ImageUpload,
    ) -> Result<(), BackendError> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, file_name);
        let request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, image.content_type)
            .header("x-upsert", "false")
            .body(image.bytes);
        self.send(request).await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, file_name: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, bucket, file_name
        )
    }
}
