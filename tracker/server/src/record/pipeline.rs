//! The image step of a submission: check the file, name it, upload it and
//! resolve its public URL.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

use super::{FormError, SubmitError};
use crate::backend::{Backend, ImageUpload};

static UNSAFE_FILE_NAME_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-zA-Z0-9._-]").expect("file name pattern is valid")
});

/// Replaces every character storage keys should not carry with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    UNSAFE_FILE_NAME_CHARS.replace_all(name, "_").into_owned()
}

/// Object name for an upload: `<unix millis>_<sanitized original name>`.
pub fn timestamped_file_name(original: &str, now: DateTime<Utc>) -> String {
    format!("{}_{}", now.timestamp_millis(), sanitize_file_name(original))
}

/// Rejects a selected file that is not an image. Runs before any remote call.
pub fn check_image(image: Option<&ImageUpload>) -> Result<(), FormError> {
    match image {
        Some(image) if !image.is_image() => Err(FormError::NotAnImage),
        _ => Ok(()),
    }
}

/// Uploads `image` into `bucket` and returns its public URL.
///
/// Returns `Ok(None)` when no image was selected. A failed upload stops the
/// submission; nothing has been written at that point.
#[tracing::instrument(skip(backend, image))]
pub async fn store_image(
    backend: &dyn Backend,
    bucket: &str,
    image: Option<ImageUpload>,
    now: DateTime<Utc>,
) -> Result<Option<String>, SubmitError> {
    let Some(image) = image else {
        return Ok(None);
    };
    let file_name = timestamped_file_name(&image.file_name, now);
    if let Err(err) = backend.upload(bucket, &file_name, image).await {
        tracing::error!("Failed to upload {} to {}: {}", file_name, bucket, err);
        return Err(SubmitError::Upload(err));
    }
    Ok(Some(backend.public_url(bucket, &file_name)))
}
