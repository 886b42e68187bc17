//! `GET /api/photos` and `POST /api/photos`.

use super::GatewayState;
use crate::{
    errors::AppError,
    models::photo::{NewPhoto, Photo, is_image_reference},
    payload::decode_data_url,
    validation::{PHOTO_CONTENT_TYPES, ValidationError},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use tracing::info;

#[derive(Serialize)]
struct PhotoList {
    photos: Vec<Photo>,
}

/// List every renderable photo, newest first.
pub async fn list_photos(State(state): State<GatewayState>) -> Result<impl IntoResponse, AppError> {
    let mut photos = state.ctx.direct("list_photos", |r| r.list_photos()).await?;
    photos.retain(|p| is_image_reference(&p.image_url));
    Ok(Json(PhotoList { photos }))
}

/// Store one encoded photo. Inline payloads are checked for type and
/// decoded size; URLs are taken as-is.
pub async fn create_photo(
    State(state): State<GatewayState>,
    Json(new): Json<NewPhoto>,
) -> Result<impl IntoResponse, AppError> {
    if !is_image_reference(&new.image_url) {
        return Err(AppError::bad_request("image_url must be an image data URL or http(s) URL"));
    }
    if new.image_url.starts_with("data:") {
        let (content_type, bytes) = decode_data_url(&new.image_url)
            .ok_or_else(|| AppError::bad_request("image_url is not valid base64 data"))?;
        if !PHOTO_CONTENT_TYPES.contains(&content_type.as_str()) {
            return Err(ValidationError::FileType(content_type).into());
        }
        let max = state.ctx.limits.max_photo_bytes;
        if bytes.len() > max {
            return Err(ValidationError::FileTooLarge {
                size: bytes.len(),
                max,
            }
            .into());
        }
    }

    let photo = state
        .ctx
        .direct("insert_photo", move |r| r.insert_photo(new))
        .await?;
    info!(id = %photo.id, uploader = photo.uploader.as_tag(), "photo stored via gateway");
    Ok((StatusCode::CREATED, Json(photo)))
}
