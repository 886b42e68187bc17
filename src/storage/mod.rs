//! Storage backends: the remote SQL datastore, the HTTP gateway in front of
//! it, and the local JSON cache used when neither is reachable.

pub mod gateway;
pub mod local;
pub mod remote;

use std::{io, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("remote datastore is not configured")]
    RemoteDisabled,
    #[error("gateway is not configured")]
    GatewayDisabled,
    #[error("remote `{op}` timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },
    #[error("gateway responded {status}: {message}")]
    Gateway {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        StorageError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Whether the failure means "this backend is unavailable, try the next
    /// one" rather than a definitive answer.
    pub fn should_fall_back(&self) -> bool {
        match self {
            StorageError::NotFound { .. }
            | StorageError::Io(_)
            | StorageError::Json(_)
            | StorageError::Sqlx(sqlx::Error::RowNotFound) => false,
            StorageError::RemoteDisabled
            | StorageError::GatewayDisabled
            | StorageError::Timeout { .. }
            | StorageError::Gateway { .. }
            | StorageError::Malformed(_)
            | StorageError::Sqlx(_)
            | StorageError::Http(_) => true,
        }
    }

    /// A backend that was never configured; logged once at startup, not per call.
    pub fn is_disabled(&self) -> bool {
        matches!(
            self,
            StorageError::RemoteDisabled | StorageError::GatewayDisabled
        )
    }

    /// Datastore error code, when the datastore reported one.
    pub fn code(&self) -> Option<String> {
        match self {
            StorageError::Sqlx(sqlx::Error::Database(db_err)) => {
                db_err.code().map(|c| c.into_owned())
            }
            StorageError::Gateway { code, .. } => code.clone(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_classification() {
        assert!(StorageError::RemoteDisabled.should_fall_back());
        assert!(
            StorageError::Timeout {
                op: "list_guests",
                after: Duration::from_millis(10)
            }
            .should_fall_back()
        );
        assert!(
            StorageError::Gateway {
                status: 404,
                code: None,
                message: "nope".into()
            }
            .should_fall_back()
        );
        assert!(StorageError::Sqlx(sqlx::Error::PoolClosed).should_fall_back());
        assert!(!StorageError::not_found("guest", "g1").should_fall_back());
        assert!(!StorageError::Sqlx(sqlx::Error::RowNotFound).should_fall_back());
    }
}
