//! Routes of the remote function gateway.
//!
//! ## Structure
//! - **Probes**
//!   - `GET    /healthz`: liveness
//!   - `GET    /readyz`: datastore and local store readiness
//!
//! - **Photos**
//!   - `GET    /api/photos`: `{ "photos": [...] }`, newest first
//!   - `POST   /api/photos`: store one encoded photo (201)
//!
//! - **Invitation**
//!   - `GET    /api/invitation`: current invitation (404 when none)
//!   - `POST   /api/invitation`: multipart `file`, replaces the current one (201)
//!   - `DELETE /api/invitation`: remove it (204)
//!
//! - **Notifications**
//!   - `POST   /api/notify/rsvp`: forward an RSVP alert to the webhook
//!
//! Any other method on these paths is answered 405 by the router.

use crate::handlers::{
    GatewayState,
    health_handlers::{healthz, readyz},
    invitation_handlers::{delete_invitation, get_invitation, upload_invitation},
    notify_handlers::notify_rsvp,
    photo_handlers::{create_photo, list_photos},
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Inline payloads are base64, about 4/3 of the file, plus JSON framing.
fn body_limit(state: &GatewayState) -> usize {
    let limits = state.ctx.limits;
    let largest = limits.max_photo_bytes.max(limits.max_invitation_bytes);
    largest / 3 * 4 + 64 * 1024
}

/// Build the gateway router with its state attached.
pub fn routes(state: GatewayState) -> Router {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api/photos", get(list_photos).post(create_photo))
        .route(
            "/api/invitation",
            get(get_invitation)
                .post(upload_invitation)
                .delete(delete_invitation),
        )
        .route("/api/notify/rsvp", post(notify_rsvp))
        .layer(DefaultBodyLimit::max(body_limit(&state)))
        .with_state(state)
}
