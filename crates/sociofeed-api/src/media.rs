use std::path::PathBuf;

use async_trait::async_trait;
use axum::Json;
use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use bytes::{Bytes, BytesMut};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use sociofeed_types::api::UploadResponse;

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::state::AppState;

/// Per-file upload limit.
pub const MAX_FILE_SIZE: usize = 25 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("File exceeds the {limit} byte upload limit")]
    TooLarge { limit: usize },

    #[error("Media storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Media host rejected upload: {0}")]
    Upload(String),

    #[error("Media host request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub bytes: Bytes,
    pub content_type: String,
    pub file_name: Option<String>,
    pub folder: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub url: String,
    pub public_id: String,
    pub media_type: String,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload(&self, upload: MediaUpload) -> Result<StoredMedia, MediaError>;
}

/// `image`, `video` or `raw`, following the media host's resource types.
pub fn media_type_for(content_type: &str) -> &'static str {
    if content_type.starts_with("image/") {
        "image"
    } else if content_type.starts_with("video/") {
        "video"
    } else {
        "raw"
    }
}

fn extension_for(upload: &MediaUpload) -> String {
    let known = match upload.content_type.as_str() {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        "video/quicktime" => Some("mov"),
        _ => None,
    };
    if let Some(ext) = known {
        return ext.to_string();
    }

    upload
        .file_name
        .as_deref()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string())
}

// -- Local disk --

/// Writes files under `root/<folder>/` and serves them from `public_url`.
pub struct LocalMediaStore {
    root: PathBuf,
    public_url: String,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn upload(&self, upload: MediaUpload) -> Result<StoredMedia, MediaError> {
        let dir = self.root.join(&upload.folder);
        tokio::fs::create_dir_all(&dir).await?;

        let file_name = format!("{}.{}", Uuid::new_v4(), extension_for(&upload));
        let path = dir.join(&file_name);
        tokio::fs::write(&path, &upload.bytes).await?;
        debug!("Stored {} bytes at {}", upload.bytes.len(), path.display());

        Ok(StoredMedia {
            url: format!("{}/{}/{}", self.public_url, upload.folder, file_name),
            public_id: format!("{}/{}", upload.folder, file_name),
            media_type: media_type_for(&upload.content_type).to_string(),
        })
    }
}

// -- Cloudinary --

#[derive(Debug, Clone)]
pub struct CloudinarySettings {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

pub struct CloudinaryMediaStore {
    client: reqwest::Client,
    settings: CloudinarySettings,
}

#[derive(Deserialize)]
struct CloudinaryResponse {
    secure_url: String,
    public_id: String,
    resource_type: String,
}

impl CloudinaryMediaStore {
    pub fn new(settings: CloudinarySettings) -> Self {
        info!("Cloudinary media store configured for cloud {}", settings.cloud_name);
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }
}

/// SHA-1 over the alphabetically sorted `key=value` pairs joined by `&`,
/// followed by the API secret.
pub fn cloudinary_signature(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<_> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl MediaStore for CloudinaryMediaStore {
    async fn upload(&self, upload: MediaUpload) -> Result<StoredMedia, MediaError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signed = [("folder", upload.folder.clone()), ("timestamp", timestamp.clone())];
        let signature = cloudinary_signature(&signed, &self.settings.api_secret);

        let file_name = upload
            .file_name
            .clone()
            .unwrap_or_else(|| format!("upload.{}", extension_for(&upload)));
        let part = reqwest::multipart::Part::bytes(upload.bytes.to_vec())
            .file_name(file_name)
            .mime_str(&upload.content_type)?;

        let form = reqwest::multipart::Form::new()
            .text("api_key", self.settings.api_key.clone())
            .text("folder", upload.folder.clone())
            .text("timestamp", timestamp)
            .text("signature", signature)
            .part("file", part);

        let url = format!(
            "https://api.cloudinary.com/v1_1/{}/auto/upload",
            self.settings.cloud_name
        );
        let response = self.client.post(&url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::Upload(format!("{status}: {body}")));
        }

        let body: CloudinaryResponse = response.json().await?;
        Ok(StoredMedia {
            url: body.secure_url,
            public_id: body.public_id,
            media_type: body.resource_type,
        })
    }
}

// -- Multipart helpers --

/// Drains one multipart file field, enforcing [`MAX_FILE_SIZE`] as it reads.
pub async fn read_file_field(mut field: Field<'_>, folder: &str) -> ApiResult<MediaUpload> {
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let file_name = field.file_name().map(str::to_string);

    let mut buf = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(|e| {
        ApiError::bad_request(format!("Failed to read upload: {}", e.body_text()))
    })? {
        if buf.len() + chunk.len() > MAX_FILE_SIZE {
            return Err(MediaError::TooLarge {
                limit: MAX_FILE_SIZE,
            }
            .into());
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(MediaUpload {
        bytes: buf.freeze(),
        content_type,
        file_name,
        folder: folder.to_string(),
    })
}

/// Reads a plain text multipart field.
pub async fn read_text_field(field: Field<'_>) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read form field: {}", e.body_text())))
}

pub async fn store(state: &AppState, upload: MediaUpload) -> ApiResult<StoredMedia> {
    state.media.upload(upload).await.map_err(|e| {
        error!("Media upload failed: {}", e);
        ApiError::from(e)
    })
}

/// POST /api/post/media/upload
pub async fn upload(
    State(state): State<AppState>,
    AuthUser { id }: AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e.body_text())))?
    {
        if field.name() == Some("file") {
            file = Some(read_file_field(field, "uploads").await?);
            break;
        }
    }

    let upload = file.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    let stored = store(&state, upload).await?;
    info!("User {} uploaded {}", id, stored.public_id);

    Ok(Json(UploadResponse {
        url: stored.url,
        public_id: stored.public_id,
        media_type: stored.media_type,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_documented_example() {
        let params = [
            ("timestamp", "1315060510".to_string()),
            ("public_id", "sample_image".to_string()),
            ("eager", "w_400,h_300,c_pad|w_260,h_200,c_crop".to_string()),
        ];
        assert_eq!(
            cloudinary_signature(&params, "abcd"),
            "bfd09f95f331f558cbd1320e67aa8d488770583e"
        );
    }

    #[test]
    fn media_types_follow_content_type() {
        assert_eq!(media_type_for("image/png"), "image");
        assert_eq!(media_type_for("video/mp4"), "video");
        assert_eq!(media_type_for("application/pdf"), "raw");
    }

    #[tokio::test]
    async fn local_store_writes_under_folder() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path(), "http://localhost:2000/uploads/");

        let stored = store
            .upload(MediaUpload {
                bytes: Bytes::from_static(b"\x89PNG"),
                content_type: "image/png".into(),
                file_name: Some("cat.png".into()),
                folder: "posts".into(),
            })
            .await
            .unwrap();

        assert_eq!(stored.media_type, "image");
        assert!(stored.url.starts_with("http://localhost:2000/uploads/posts/"));
        assert!(stored.url.ends_with(".png"));
        let written = std::fs::read(dir.path().join(&stored.public_id)).unwrap();
        assert_eq!(written, b"\x89PNG");
    }

    #[test]
    fn unknown_types_fall_back_to_file_extension() {
        let upload = MediaUpload {
            bytes: Bytes::new(),
            content_type: "application/octet-stream".into(),
            file_name: Some("notes.TXT".into()),
            folder: "uploads".into(),
        };
        assert_eq!(extension_for(&upload), "txt");

        let nameless = MediaUpload { file_name: None, ..upload };
        assert_eq!(extension_for(&nameless), "bin");
    }
}
