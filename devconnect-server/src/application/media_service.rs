use chrono::Utc;
use tracing::{info, warn};

use crate::domain::error::{DomainError, validate_positive_id};
use crate::infrastructure::object_storage::ObjectStorage;

pub(crate) const POST_IMAGES_PREFIX: &str = "post-images";
/// URL path under which stored objects are served.
pub(crate) const PUBLIC_STORAGE_PATH: &str = "/storage";

pub(crate) struct MediaService<S: ObjectStorage> {
    storage: S,
    public_base_url: String,
    max_image_bytes: usize,
}

impl<S: ObjectStorage> MediaService<S> {
    pub(crate) fn new(storage: S, public_base_url: &str, max_image_bytes: usize) -> Self {
        Self {
            storage,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            max_image_bytes,
        }
    }

    pub(crate) fn max_image_bytes(&self) -> usize {
        self.max_image_bytes
    }

    /// Stores an image for `user_id` and returns its public URL.
    pub(crate) async fn upload_image(
        &self,
        user_id: i64,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<String, DomainError> {
        validate_positive_id("user_id", user_id)?;
        let extension = image_extension(content_type)?;
        if bytes.is_empty() {
            return Err(DomainError::Validation {
                field: "file",
                message: "must not be empty",
            });
        }
        if bytes.len() > self.max_image_bytes {
            return Err(DomainError::Validation {
                field: "file",
                message: "image is too large",
            });
        }

        let file_name = format!(
            "{}-{:08x}.{extension}",
            Utc::now().timestamp_millis(),
            rand::random::<u32>()
        );
        let key = format!("{POST_IMAGES_PREFIX}/{user_id}/{file_name}");
        self.storage
            .put(&key, bytes)
            .await
            .map_err(|err| DomainError::Unexpected(err.to_string()))?;

        info!(user_id, key = %key, size = bytes.len(), "image uploaded");
        Ok(format!(
            "{}{PUBLIC_STORAGE_PATH}/{key}",
            self.public_base_url
        ))
    }

    /// Deletes an image previously uploaded by `user_id`.
    ///
    /// Ownership and URL shape are enforced. Storage failures are logged and swallowed
    /// so that an orphaned file never blocks the caller.
    pub(crate) async fn delete_image(&self, user_id: i64, url: &str) -> Result<(), DomainError> {
        let (owner_id, key) = object_key_from_url(url)?;
        if owner_id != user_id {
            return Err(DomainError::Forbidden);
        }

        match self.storage.delete(&key).await {
            Ok(true) => info!(user_id, key = %key, "image deleted"),
            Ok(false) => warn!(user_id, key = %key, "image to delete was already gone"),
            Err(err) => warn!(user_id, key = %key, error = %err, "failed to delete image"),
        }
        Ok(())
    }
}

fn image_extension(content_type: &str) -> Result<String, DomainError> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let Some(subtype) = essence.strip_prefix("image/") else {
        return Err(DomainError::Validation {
            field: "content_type",
            message: "only image uploads are allowed",
        });
    };

    let extension = match subtype {
        "jpeg" | "jpg" | "pjpeg" => "jpg".to_string(),
        "svg+xml" => "svg".to_string(),
        other => other
            .chars()
            .filter(|ch| ch.is_ascii_alphanumeric())
            .take(8)
            .collect(),
    };
    if extension.is_empty() {
        return Err(DomainError::Validation {
            field: "content_type",
            message: "only image uploads are allowed",
        });
    }
    Ok(extension)
}

/// The owner and storage key come from the last two path segments: `{user_id}/{file}`.
fn object_key_from_url(url: &str) -> Result<(i64, String), DomainError> {
    let invalid = || DomainError::Validation {
        field: "url",
        message: "is not a post image url",
    };

    let path = url.split(['?', '#']).next().unwrap_or_default();
    let mut segments = path.rsplit('/');
    let file = segments.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
    let owner = segments.next().ok_or_else(invalid)?;
    if file.starts_with('.') || file.contains("..") {
        return Err(invalid());
    }
    let owner_id: i64 = owner.parse().map_err(|_| invalid())?;
    validate_positive_id("url", owner_id)?;

    Ok((owner_id, format!("{POST_IMAGES_PREFIX}/{owner_id}/{file}")))
}
