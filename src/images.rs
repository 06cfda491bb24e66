use std::path::PathBuf;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::info;
use uuid::Uuid;

use crate::utils::error::{AppError, Result};

/// Storage for images uploaded to a meeting.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Stores the base64 payload and returns the file name to record on the
    /// meeting.
    async fn save(&self, mid: i64, data: &str) -> Result<String>;
}

/// Accepts plain base64 or a `data:image/...;base64,` URL and returns the
/// decoded bytes with a file extension.
pub fn decode(data: &str) -> Result<(Vec<u8>, &'static str)> {
    let (extension, payload) = match data.strip_prefix("data:") {
        Some(rest) => {
            let (media, payload) = rest
                .split_once(";base64,")
                .ok_or_else(|| AppError::ValidationError("Image must be base64 encoded".into()))?;
            let extension = match media {
                "image/png" => "png",
                "image/jpeg" | "image/jpg" => "jpg",
                "image/gif" => "gif",
                "image/webp" => "webp",
                other => {
                    return Err(AppError::ValidationError(format!(
                        "Unsupported image type {other}"
                    )))
                }
            };
            (extension, payload)
        }
        None => ("png", data),
    };

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| AppError::ValidationError(format!("Invalid image data: {e}")))?;
    if bytes.is_empty() {
        return Err(AppError::ValidationError("Image must not be empty".into()));
    }
    Ok((bytes, extension))
}

pub struct FsImageStore {
    folder: PathBuf,
}

impl FsImageStore {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }
}

#[async_trait]
impl ImageStore for FsImageStore {
    async fn save(&self, mid: i64, data: &str) -> Result<String> {
        let (bytes, extension) = decode(data)?;
        let name = format!("{mid}-{}.{extension}", Uuid::new_v4());

        tokio::fs::create_dir_all(&self.folder)
            .await
            .map_err(|e| AppError::InternalServerError(format!("Cannot create image folder: {e}")))?;
        tokio::fs::write(self.folder.join(&name), &bytes)
            .await
            .map_err(|e| AppError::InternalServerError(format!("Cannot write image: {e}")))?;

        info!(meeting_id = mid, file = %name, size = bytes.len(), "Image stored");
        Ok(name)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plain_and_data_url() {
        let (bytes, extension) = decode("aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(extension, "png");

        let (bytes, extension) = decode("data:image/jpeg;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(extension, "jpg");
    }

    #[test]
    fn test_decode_rejects_bad_payloads() {
        assert!(matches!(decode(""), Err(AppError::ValidationError(_))));
        assert!(matches!(decode("not base64!"), Err(AppError::ValidationError(_))));
        assert!(matches!(
            decode("data:text/html;base64,aGVsbG8="),
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_fs_store_writes_file() {
        let folder = std::env::temp_dir().join(format!("evendemy-images-{}", Uuid::new_v4()));
        let store = FsImageStore::new(&folder);

        let name = store.save(7, "aGVsbG8=").await.unwrap();

        assert!(name.starts_with("7-"));
        assert!(name.ends_with(".png"));
        let written = tokio::fs::read(folder.join(&name)).await.unwrap();
        assert_eq!(written, b"hello");
        tokio::fs::remove_dir_all(&folder).await.unwrap();
    }
}
