//! `POST /api/notify/rsvp`: forward an RSVP alert to the configured webhook.

use super::GatewayState;
use crate::{errors::AppError, services::notifier::RsvpAlert};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use tracing::debug;

#[derive(Serialize)]
struct DispatchResponse {
    dispatched: bool,
}

pub async fn notify_rsvp(
    State(state): State<GatewayState>,
    Json(alert): Json<RsvpAlert>,
) -> Result<impl IntoResponse, AppError> {
    let Some(webhook) = &state.webhook else {
        debug!(name = %alert.name, "no webhook configured; RSVP alert dropped");
        return Ok((StatusCode::OK, Json(DispatchResponse { dispatched: false })));
    };
    webhook.send_rsvp(&alert).await?;
    Ok((StatusCode::ACCEPTED, Json(DispatchResponse { dispatched: true })))
}
