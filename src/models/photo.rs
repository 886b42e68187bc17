//! Gallery photos.
//!
//! A photo's uploader doubles as its partition: admin uploads form the
//! curated gallery, everything else is the guest-contributed gallery.

use super::Identified;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Value stored in `photos.uploaded_by` for the curated gallery.
pub const ADMIN_UPLOADER: &str = "admin";
/// Value stored in `photos.uploaded_by` for guest contributions.
pub const GUEST_UPLOADER: &str = "guest";

/// Who contributed a photo.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Uploader {
    Admin,
    Guest { name: String },
}

impl Uploader {
    /// Guest attribution with a trimmed, whitespace-collapsed display name.
    pub fn guest(name: &str) -> Self {
        let normalized = name.split_whitespace().collect::<Vec<_>>().join(" ");
        Uploader::Guest { name: normalized }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Uploader::Admin)
    }

    pub fn display_name(&self) -> Option<&str> {
        match self {
            Uploader::Admin => None,
            Uploader::Guest { name } => Some(name),
        }
    }

    /// Column value for `photos.uploaded_by`.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Uploader::Admin => ADMIN_UPLOADER,
            Uploader::Guest { .. } => GUEST_UPLOADER,
        }
    }
}

/// A photo as presented to callers.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Photo {
    pub id: String,

    /// Inline `data:image/...` payload or an http(s) URL to blob storage.
    pub image_url: String,

    pub uploader: Uploader,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Identified for Photo {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Raw row of the `photos` table.
#[derive(Clone, FromRow, Debug)]
pub struct PhotoRow {
    pub id: String,
    pub image_url: String,
    pub uploaded_by: String,
    pub guest_name: Option<String>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<PhotoRow> for Photo {
    fn from(row: PhotoRow) -> Self {
        let uploader = if row.uploaded_by == ADMIN_UPLOADER {
            Uploader::Admin
        } else {
            Uploader::Guest {
                name: row.guest_name.unwrap_or_else(|| "Guest".into()),
            }
        };
        Photo {
            id: row.id,
            image_url: row.image_url,
            uploader,
            message: row.message,
            created_at: row.created_at,
        }
    }
}

/// Local cache shape for guest photos. Admin photos are cached as bare
/// payload strings under a separate key.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GuestPhotoEntry {
    pub id: String,
    pub image_url: String,
    pub guest_name: String,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Identified for GuestPhotoEntry {
    fn id(&self) -> &str {
        &self.id
    }
}

impl GuestPhotoEntry {
    pub fn into_photo(self) -> Photo {
        Photo {
            id: self.id,
            image_url: self.image_url,
            uploader: Uploader::Guest {
                name: self.guest_name,
            },
            message: self.message,
            created_at: self.created_at,
        }
    }
}

/// Sidecar linking a remote admin photo id to the checksum of its cached
/// payload, so remote ids keep working against the bare local array.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AdminPhotoRef {
    pub id: String,
    pub checksum: String,
}

/// An encoded photo ready to be persisted. This is also the JSON body of
/// `POST /api/photos`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewPhoto {
    pub image_url: String,
    pub uploader: Uploader,
    pub message: Option<String>,
}

impl NewPhoto {
    pub fn into_photo(self, id: String, now: DateTime<Utc>) -> Photo {
        Photo {
            id,
            image_url: self.image_url,
            uploader: self.uploader,
            message: self.message,
            created_at: now,
        }
    }
}

/// A raw file selected for upload, before validation and encoding.
#[derive(Clone, Debug)]
pub struct PhotoUpload {
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Bytes,
    pub uploader: Uploader,
    pub message: Option<String>,
}

/// True when the payload is something a gallery can render.
pub fn is_image_reference(payload: &str) -> bool {
    payload.starts_with("data:image/")
        || payload.starts_with("https://")
        || payload.starts_with("http://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guest_name_is_normalized() {
        assert_eq!(
            Uploader::guest("  Jane   Doe "),
            Uploader::Guest {
                name: "Jane Doe".into()
            }
        );
    }

    #[test]
    fn delimiter_characters_survive_in_names() {
        let uploader = Uploader::guest("Anne_Marie_2024");
        assert_eq!(uploader.display_name(), Some("Anne_Marie_2024"));
        assert_eq!(uploader.as_tag(), GUEST_UPLOADER);
    }

    #[test]
    fn row_partition_follows_uploaded_by() {
        let row = PhotoRow {
            id: "p1".into(),
            image_url: "https://cdn.example/p1.jpg".into(),
            uploaded_by: "guest".into(),
            guest_name: Some("Sam".into()),
            message: Some("Congrats!".into()),
            created_at: Utc::now(),
        };
        let photo = Photo::from(row.clone());
        assert!(!photo.uploader.is_admin());

        let admin = Photo::from(PhotoRow {
            uploaded_by: ADMIN_UPLOADER.into(),
            ..row
        });
        assert!(admin.uploader.is_admin());
    }

    #[test]
    fn image_reference_detection() {
        assert!(is_image_reference("data:image/png;base64,AAAA"));
        assert!(is_image_reference("https://cdn.example/a.jpg"));
        assert!(!is_image_reference("data:application/pdf;base64,AAAA"));
        assert!(!is_image_reference(""));
    }

    #[test]
    fn uploader_json_shape() {
        let json = serde_json::to_value(Uploader::guest("Sam")).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "guest", "name": "Sam"}));
        let admin = serde_json::to_value(Uploader::Admin).unwrap();
        assert_eq!(admin, serde_json::json!({"kind": "admin"}));
    }
}
