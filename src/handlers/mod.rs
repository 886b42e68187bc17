//! HTTP handlers for the remote function gateway.
//!
//! The gateway runs next to the datastore and answers for it. It never falls
//! back to the local cache: a datastore failure is reported to the caller,
//! which decides on its own fallback.

pub mod health_handlers;
pub mod invitation_handlers;
pub mod notify_handlers;
pub mod photo_handlers;

use crate::services::{AppContext, notifier::Notifier};
use std::sync::Arc;

/// Shared state for every gateway handler.
#[derive(Clone)]
pub struct GatewayState {
    pub ctx: Arc<AppContext>,

    /// Outbound webhook for RSVP alerts. Never `ctx.notifier`, which may
    /// point back at this gateway.
    pub webhook: Option<Notifier>,
}

impl GatewayState {
    pub fn new(ctx: Arc<AppContext>, webhook: Option<Notifier>) -> Self {
        Self { ctx, webhook }
    }
}
