//! Image upload and delivery.

use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, Path, State, multipart::Field},
    http::header,
    response::IntoResponse,
};
use serde::Serialize;
use tracing::{info, instrument};

use gift_registry_core::BlobKey;

use crate::error::{AppError, Result};
use crate::media::MediaError;
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Multipart field carrying the image bytes.
pub const FILE_FIELD: &str = "file";

/// Response of a successful upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub key: BlobKey,
}

/// Serve an uploaded image.
///
/// Keys are never reused, so responses are cacheable forever.
pub async fn show(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse> {
    let key = BlobKey::parse(&key).map_err(|e| MediaError::InvalidKey(e.to_string()))?;

    let blob = state
        .media()
        .get(&key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("image {key}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, blob.content_type),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable"),
        ],
        blob.bytes,
    ))
}

/// Upload an image and return its generated key.
///
/// Expects a multipart body with a `file` field.
#[instrument(skip(state, multipart), fields(admin_id = %admin.id))]
pub async fn upload(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    while let Some(field) = next_field(&mut multipart).await? {
        if field.name() == Some(FILE_FIELD) {
            let key = store_image(&state, field).await?;
            return Ok(Json(UploadResponse { key }));
        }
    }
    Err(AppError::BadRequest("no file found".to_string()))
}

pub(crate) async fn next_field(multipart: &mut Multipart) -> Result<Option<Field<'_>>> {
    multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {e}")))
}

/// Read an uploaded file field and store it under a fresh key.
pub(crate) async fn store_image(state: &AppState, field: Field<'_>) -> Result<BlobKey> {
    let file_name = field.file_name().map(str::to_owned);
    let bytes = read_limited(field, state.config().media.max_upload_bytes).await?;
    if bytes.is_empty() {
        return Err(AppError::BadRequest("uploaded file is empty".to_string()));
    }
    save_image(state, file_name.as_deref(), bytes).await
}

/// Store image bytes under a key generated from the uploaded file name.
pub(crate) async fn save_image(
    state: &AppState,
    file_name: Option<&str>,
    bytes: Bytes,
) -> Result<BlobKey> {
    let key = BlobKey::generate(file_name);
    let size = bytes.len();
    state.media().put(&key, bytes.to_vec()).await?;
    info!(image_key = %key, size, "Image stored");
    Ok(key)
}

/// Read a file field, refusing anything over `max` bytes.
pub(crate) async fn read_limited(field: Field<'_>, max: usize) -> Result<Bytes> {
    let bytes = field
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(format!("failed to read upload: {e}")))?;
    if bytes.len() > max {
        return Err(MediaError::TooLarge {
            size: bytes.len(),
            max,
        }
        .into());
    }
    Ok(bytes)
}
