//! `GET`, `POST` and `DELETE /api/invitation`.

use super::GatewayState;
use crate::{
    errors::AppError,
    models::invitation::{InvitationUpload, NewInvitation},
    payload::{checksum, encode_data_url},
    validation::validate_invitation,
};
use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

pub async fn get_invitation(
    State(state): State<GatewayState>,
) -> Result<impl IntoResponse, AppError> {
    let invitation = state
        .ctx
        .direct("current_invitation", |r| r.current_invitation())
        .await?
        .ok_or_else(|| AppError::not_found("no invitation uploaded"))?;
    Ok(Json(invitation))
}

/// Replace the invitation with the multipart `file` field.
pub async fn upload_invitation(
    State(state): State<GatewayState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("multipart error: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(format!("failed to read file: {}", e)))?;

        let upload = InvitationUpload {
            file_name,
            content_type,
            bytes,
        };
        validate_invitation(&upload, &state.ctx.limits)?;
        let new = NewInvitation {
            file_data: encode_data_url(&upload.content_type, &upload.bytes),
            file_name: upload.file_name,
            checksum: checksum(&upload.bytes),
        };

        let invitation = state
            .ctx
            .direct("replace_invitation", move |r| r.replace_invitation(new))
            .await?;
        info!(checksum = %invitation.checksum, "invitation replaced via gateway");
        return Ok((StatusCode::CREATED, Json(invitation)));
    }

    Err(AppError::bad_request("missing `file` field in multipart form"))
}

pub async fn delete_invitation(
    State(state): State<GatewayState>,
) -> Result<impl IntoResponse, AppError> {
    let removed = state
        .ctx
        .direct("delete_invitations", |r| r.delete_invitations())
        .await?;
    info!(removed, "invitation deleted via gateway");
    Ok(StatusCode::NO_CONTENT)
}
