use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use std::collections::HashMap;

use crate::backend::ImageUpload;

/// Name of the file input on every record form.
pub const IMAGE_FIELD: &str = "image";

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// A submitted record form: its text fields and the optional image.
#[derive(Debug, Default)]
pub struct Submission {
    pub fields: HashMap<String, String>,
    pub image: Option<ImageUpload>,
}

impl Submission {
    /// Text value of `name`, empty if the field was not sent.
    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or_default()
    }

    /// Whether a field was sent at all. Unchecked checkboxes are not.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}

/// Reads a `multipart/form-data` record form.
///
/// Browsers send an empty file part when no file was picked; that counts as
/// no image.
#[tracing::instrument(skip(multipart))]
pub async fn read_submission(mut multipart: Multipart) -> Result<Submission, MultipartError> {
    let mut submission = Submission::default();
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == IMAGE_FIELD {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field
                .content_type()
                .unwrap_or(FALLBACK_CONTENT_TYPE)
                .to_string();
            let bytes = field.bytes().await?;
            if !file_name.is_empty() && !bytes.is_empty() {
                submission.image = Some(ImageUpload::new(file_name, content_type, bytes.to_vec()));
            }
        } else {
            let value = field.text().await?;
            submission.fields.insert(name, value);
        }
    }
    Ok(submission)
}
