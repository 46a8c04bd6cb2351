//! Remote backend access for the tracker.
//!
//! Every table and storage operation the application performs goes through the
//! [`Backend`] trait. The production implementation, [`supabase::SupabaseClient`],
//! speaks the PostgREST and Storage HTTP dialects of a hosted Supabase project.
//! One instance is built at startup and shared by every router through
//! [`crate::web::create_app`].

use async_trait::async_trait;
use mockall::automock;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub mod supabase;

/// Errors that can occur while talking to the backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The request never produced a response (connection, timeout, TLS).
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The backend answered with a non-success status.
    #[error("{message}")]
    Api { status: u16, message: String },
    /// No row matched the requested id.
    #[error("Record with ID {0} not found")]
    NotFound(String),
    /// A row could not be converted from or into JSON.
    #[error("Malformed record: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// An image file picked in a form, ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: String, content_type: String, bytes: Vec<u8>) -> Self {
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    /// Whether the browser labelled this file as an image.
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// Table and object storage operations offered by the hosted backend.
///
/// Rows travel as untyped JSON so the trait stays object safe; use
/// [`fetch_all`] and [`fetch_one`] for typed reads.
#[automock]
#[async_trait]
pub trait Backend: Send + Sync {
    /// Fetches every row of `table`.
    async fn select(&self, table: &str) -> Result<Vec<Value>, BackendError>;

    /// Fetches the row of `table` whose `id` equals `id`.
    ///
    /// # Returns
    ///
    /// * `Err(BackendError::NotFound)` when no row matches
    async fn select_by_id(&self, table: &str, id: &str) -> Result<Value, BackendError>;

    /// Inserts one row. The backend assigns `id` and `created_at`.
    async fn insert(&self, table: &str, record: Value) -> Result<(), BackendError>;

    /// Overwrites the fields present in `patch` on the row with `id`.
    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<(), BackendError>;

    /// Removes the row with `id`.
    async fn delete(&self, table: &str, id: &str) -> Result<(), BackendError>;

    /// Stores `image` under `file_name` in `bucket`. Never overwrites.
    async fn upload(
        &self,
        bucket: &str,
        file_name: &str,
        image: ImageUpload,
    ) -> Result<(), BackendError>;

    /// Public URL of an object. Pure derivation, no request is made.
    fn public_url(&self, bucket: &str, file_name: &str) -> String;
}

/// Fetches every row of `table` and decodes it as `R`.
#[tracing::instrument(skip(backend))]
pub async fn fetch_all<R: DeserializeOwned>(
    backend: &dyn Backend,
    table: &str,
) -> Result<Vec<R>, BackendError> {
    backend
        .select(table)
        .await?
        .into_iter()
        .map(|row| serde_json::from_value(row).map_err(BackendError::from))
        .collect()
}

/// Fetches the row with `id` and decodes it as `R`.
#[tracing::instrument(skip(backend))]
pub async fn fetch_one<R: DeserializeOwned>(
    backend: &dyn Backend,
    table: &str,
    id: &str,
) -> Result<R, BackendError> {
    let row = backend.select_by_id(table, id).await?;
    Ok(serde_json::from_value(row)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        id: String,
        name: String,
    }

    #[tokio::test]
    async fn can_decode_all_rows() {
        let mut backend = MockBackend::new();
        backend
            .expect_select()
            .withf(|table: &str| table == "things")
            .times(1)
            .returning(|_| {
                Ok(vec![
                    json!({"id": "a", "name": "first"}),
                    json!({"id": "b", "name": "second"}),
                ])
            });

        let rows: Vec<Row> = fetch_all(&backend, "things").await.unwrap();

        assert_eq!(
            rows,
            vec![
                Row {
                    id: "a".to_string(),
                    name: "first".to_string()
                },
                Row {
                    id: "b".to_string(),
                    name: "second".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn cannot_decode_row_with_wrong_shape() {
        let mut backend = MockBackend::new();
        backend
            .expect_select()
            .returning(|_| Ok(vec![json!({"id": 7})]));

        let result: Result<Vec<Row>, _> = fetch_all(&backend, "things").await;

        assert!(matches!(result, Err(BackendError::Malformed(_))));
    }

    #[tokio::test]
    async fn can_pass_through_not_found() {
        let mut backend = MockBackend::new();
        backend
            .expect_select_by_id()
            .returning(|_, id| Err(BackendError::NotFound(id.to_string())));

        let result: Result<Row, _> = fetch_one(&backend, "things", "missing").await;

        match result {
            Err(BackendError::NotFound(id)) => assert_eq!(id, "missing"),
            other => panic!("expected not found, got {:?}", other),
        }
    }

    #[test]
    fn can_tell_images_from_other_files() {
        let image = ImageUpload::new("a.png".into(), "image/png".into(), vec![1]);
        let text = ImageUpload::new("a.txt".into(), "text/plain".into(), vec![1]);
        assert!(image.is_image());
        assert!(!text.is_image());
    }
}
