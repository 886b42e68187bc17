//! Core data models for the wedding site.
//!
//! Each entity maps to a table in the remote datastore via `sqlx::FromRow`
//! and serializes as JSON via `serde` for the local cache and the gateway.

pub mod event_photo;
pub mod guest;
pub mod invitation;
pub mod photo;
pub mod timeline;

/// Records addressable by identifier inside a local cache collection.
pub trait Identified {
    fn id(&self) -> &str;
}
