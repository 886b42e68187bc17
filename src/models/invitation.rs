//! The single downloadable invitation file.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// At most one invitation exists at a time; uploads replace it.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct Invitation {
    pub id: String,

    /// Inline `data:application/pdf;base64,...` payload.
    pub file_data: String,

    pub file_name: Option<String>,

    /// Hex MD5 of the decoded file bytes.
    pub checksum: String,

    pub uploaded_at: DateTime<Utc>,
}

/// An encoded invitation ready to be persisted.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewInvitation {
    pub file_data: String,
    pub file_name: Option<String>,
    pub checksum: String,
}

impl NewInvitation {
    pub fn into_invitation(self, id: String, now: DateTime<Utc>) -> Invitation {
        Invitation {
            id,
            file_data: self.file_data,
            file_name: self.file_name,
            checksum: self.checksum,
            uploaded_at: now,
        }
    }
}

/// A raw invitation file before validation and encoding.
#[derive(Clone, Debug)]
pub struct InvitationUpload {
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Bytes,
}
