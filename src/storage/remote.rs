//! src/storage/remote.rs
//!
//! RemoteClient: the authoritative datastore, reached directly through a
//! SQLite pool. Absent or placeholder connection settings yield no client
//! at all, which every caller treats as "remote unavailable".

use super::{StorageError, StorageResult};
use crate::models::{
    event_photo::{EventMessage, EventPhoto, EventTag},
    guest::{Guest, GuestPatch, NewGuest},
    invitation::{Invitation, NewInvitation},
    photo::{NewPhoto, Photo, PhotoRow},
    timeline::{NewTimelineItem, TimelineItem, TimelinePatch},
};
use chrono::Utc;
use sqlx::{
    QueryBuilder, SqlitePool,
    sqlite::{Sqlite, SqliteConnectOptions, SqlitePoolOptions},
};
use std::{str::FromStr, sync::Arc, time::Duration};
use tracing::{debug, info, warn};
use uuid::Uuid;

const MIGRATION_SQL: &str = include_str!("../../migrations/0001_init.sql");

/// Values shipped in sample env files that must never be dialed.
const PLACEHOLDER_MARKERS: [&str; 4] = ["placeholder", "your-database-url", "your_", "changeme"];

const GUEST_COLUMNS: &str = "id, name, email, phone, attending, guests, side, message, \
     dietary_restrictions, needs_accommodation, created_at, updated_at";
const PHOTO_COLUMNS: &str = "id, image_url, uploaded_by, guest_name, message, created_at";
const TIMELINE_COLUMNS: &str =
    "id, time, title, description, duration, event_type, created_at, updated_at";
const INVITATION_COLUMNS: &str = "id, file_data, file_name, checksum, uploaded_at";
const EVENT_PHOTO_COLUMNS: &str =
    "id, event_tag, image_url, guest_name, message, uploaded_by, created_at, updated_at";
const EVENT_MESSAGE_COLUMNS: &str = "id, event_tag, guest_name, message, created_at";

/// Handle to the remote datastore.
#[derive(Clone)]
pub struct RemoteClient {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

/// True for connection strings that are missing in all but name.
pub fn is_placeholder(url: &str) -> bool {
    let lowered = url.trim().to_ascii_lowercase();
    lowered.is_empty()
        || PLACEHOLDER_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
}

impl RemoteClient {
    /// Build a client from optional connection settings.
    ///
    /// Returns `None` (and logs why) when the URL is absent, a placeholder,
    /// or the connection attempt fails. Never returns an error.
    pub async fn connect(url: Option<&str>) -> Option<Self> {
        let Some(url) = url else {
            warn!("remote datastore URL not set; running on local storage only");
            return None;
        };
        if is_placeholder(url) {
            warn!("remote datastore URL is a placeholder; running on local storage only");
            return None;
        }
        match Self::connect_url(url).await {
            Ok(client) => {
                info!("connected to remote datastore");
                Some(client)
            }
            Err(err) => {
                warn!(
                    error = %err,
                    "failed to connect to remote datastore; running on local storage only"
                );
                None
            }
        }
    }

    /// Connect to `url`, surfacing the error.
    pub async fn connect_url(url: &str) -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");

        // Every in-memory connection is its own database, so keep exactly one alive.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;

        Ok(Self { db: Arc::new(pool) })
    }

    /// Apply the embedded schema. Statements are idempotent.
    pub async fn migrate(&self) -> StorageResult<usize> {
        let statements = MIGRATION_SQL
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        info!("Running {} migration statements...", statements.len());
        for stmt in &statements {
            debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(statements.len())
    }

    pub async fn ping(&self) -> StorageResult<()> {
        let value = sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        if value == 1 {
            Ok(())
        } else {
            Err(StorageError::Malformed(format!(
                "unexpected ping result: {value}"
            )))
        }
    }

    /// Close the pool. Subsequent calls fail with `PoolClosed`.
    pub async fn close(&self) {
        self.db.close().await;
    }

    // --- guests ---

    pub async fn list_guests(&self) -> StorageResult<Vec<Guest>> {
        let guests = sqlx::query_as::<_, Guest>(&format!(
            "SELECT {GUEST_COLUMNS} FROM guests ORDER BY created_at ASC"
        ))
        .fetch_all(&*self.db)
        .await?;
        Ok(guests)
    }

    pub async fn insert_guest(&self, new: NewGuest) -> StorageResult<Guest> {
        let guest = new.into_guest(Uuid::new_v4().to_string(), Utc::now());
        let inserted = sqlx::query_as::<_, Guest>(&format!(
            "INSERT INTO guests ({GUEST_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {GUEST_COLUMNS}"
        ))
        .bind(&guest.id)
        .bind(&guest.name)
        .bind(&guest.email)
        .bind(&guest.phone)
        .bind(guest.attending)
        .bind(guest.party_size)
        .bind(guest.side)
        .bind(&guest.message)
        .bind(&guest.dietary_restrictions)
        .bind(guest.needs_accommodation)
        .bind(guest.created_at)
        .bind(guest.updated_at)
        .fetch_one(&*self.db)
        .await?;
        Ok(inserted)
    }

    /// Apply `patch` to guest `id`. Missing rows are `NotFound`.
    pub async fn update_guest(&self, id: &str, patch: &GuestPatch) -> StorageResult<Guest> {
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE guests SET ");
        {
            let mut set = builder.separated(", ");
            if let Some(name) = &patch.name {
                set.push("name = ").push_bind_unseparated(name.clone());
            }
            if let Some(email) = &patch.email {
                set.push("email = ").push_bind_unseparated(email.clone());
            }
            if let Some(phone) = &patch.phone {
                set.push("phone = ").push_bind_unseparated(phone.clone());
            }
            if let Some(attending) = patch.attending {
                set.push("attending = ").push_bind_unseparated(attending);
            }
            if let Some(size) = patch.party_size {
                set.push("guests = ").push_bind_unseparated(size);
            }
            if let Some(side) = patch.side {
                set.push("side = ").push_bind_unseparated(side);
            }
            if let Some(message) = &patch.message {
                set.push("message = ").push_bind_unseparated(message.clone());
            }
            if let Some(dietary) = &patch.dietary_restrictions {
                set.push("dietary_restrictions = ")
                    .push_bind_unseparated(dietary.clone());
            }
            if let Some(accommodation) = patch.needs_accommodation {
                set.push("needs_accommodation = ")
                    .push_bind_unseparated(accommodation);
            }
            set.push("updated_at = ").push_bind_unseparated(Utc::now());
        }
        builder.push(" WHERE id = ");
        builder.push_bind(id.to_string());
        builder.push(format!(" RETURNING {GUEST_COLUMNS}"));

        builder
            .build_query_as::<Guest>()
            .fetch_optional(&*self.db)
            .await?
            .ok_or_else(|| StorageError::not_found("guest", id))
    }

    pub async fn delete_guest(&self, id: &str) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM guests WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- photos ---

    /// All photos, newest first.
    pub async fn list_photos(&self) -> StorageResult<Vec<Photo>> {
        let rows = sqlx::query_as::<_, PhotoRow>(&format!("SELECT {PHOTO_COLUMNS} FROM photos"))
            .fetch_all(&*self.db)
            .await?;
        let mut photos: Vec<Photo> = rows.into_iter().map(Photo::from).collect();
        photos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(photos)
    }

    pub async fn insert_photo(&self, new: NewPhoto) -> StorageResult<Photo> {
        let row = sqlx::query_as::<_, PhotoRow>(&format!(
            "INSERT INTO photos ({PHOTO_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {PHOTO_COLUMNS}"
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(&new.image_url)
        .bind(new.uploader.as_tag())
        .bind(new.uploader.display_name())
        .bind(&new.message)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?;
        Ok(row.into())
    }

    pub async fn delete_photo(&self, id: &str) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM photos WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- timeline ---

    pub async fn list_timeline(&self) -> StorageResult<Vec<TimelineItem>> {
        let items = sqlx::query_as::<_, TimelineItem>(&format!(
            "SELECT {TIMELINE_COLUMNS} FROM wedding_flow ORDER BY time ASC"
        ))
        .fetch_all(&*self.db)
        .await?;
        Ok(items)
    }

    pub async fn insert_timeline_item(&self, new: NewTimelineItem) -> StorageResult<TimelineItem> {
        let item = new.into_item(Uuid::new_v4().to_string(), Utc::now());
        let inserted = sqlx::query_as::<_, TimelineItem>(&format!(
            "INSERT INTO wedding_flow ({TIMELINE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {TIMELINE_COLUMNS}"
        ))
        .bind(&item.id)
        .bind(&item.time)
        .bind(&item.title)
        .bind(&item.description)
        .bind(&item.duration)
        .bind(item.category)
        .bind(item.created_at)
        .bind(item.updated_at)
        .fetch_one(&*self.db)
        .await?;
        Ok(inserted)
    }

    pub async fn update_timeline_item(
        &self,
        id: &str,
        patch: &TimelinePatch,
    ) -> StorageResult<TimelineItem> {
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE wedding_flow SET ");
        {
            let mut set = builder.separated(", ");
            if let Some(time) = &patch.time {
                set.push("time = ").push_bind_unseparated(time.clone());
            }
            if let Some(title) = &patch.title {
                set.push("title = ").push_bind_unseparated(title.clone());
            }
            if let Some(description) = &patch.description {
                set.push("description = ")
                    .push_bind_unseparated(description.clone());
            }
            if let Some(duration) = &patch.duration {
                set.push("duration = ").push_bind_unseparated(duration.clone());
            }
            if let Some(category) = patch.category {
                set.push("event_type = ").push_bind_unseparated(category);
            }
            set.push("updated_at = ").push_bind_unseparated(Utc::now());
        }
        builder.push(" WHERE id = ");
        builder.push_bind(id.to_string());
        builder.push(format!(" RETURNING {TIMELINE_COLUMNS}"));

        builder
            .build_query_as::<TimelineItem>()
            .fetch_optional(&*self.db)
            .await?
            .ok_or_else(|| StorageError::not_found("timeline item", id))
    }

    pub async fn delete_timeline_item(&self, id: &str) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM wedding_flow WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- invitations ---

    pub async fn current_invitation(&self) -> StorageResult<Option<Invitation>> {
        let invitation = sqlx::query_as::<_, Invitation>(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations ORDER BY uploaded_at DESC LIMIT 1"
        ))
        .fetch_optional(&*self.db)
        .await?;
        Ok(invitation)
    }

    /// Delete every existing invitation, then insert `new`, in one transaction.
    pub async fn replace_invitation(&self, new: NewInvitation) -> StorageResult<Invitation> {
        let invitation = new.into_invitation(Uuid::new_v4().to_string(), Utc::now());

        let mut tx = self.db.begin().await?;
        let removed = sqlx::query("DELETE FROM invitations")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let inserted = sqlx::query_as::<_, Invitation>(&format!(
            "INSERT INTO invitations ({INVITATION_COLUMNS}) VALUES (?, ?, ?, ?, ?)
             RETURNING {INVITATION_COLUMNS}"
        ))
        .bind(&invitation.id)
        .bind(&invitation.file_data)
        .bind(&invitation.file_name)
        .bind(&invitation.checksum)
        .bind(invitation.uploaded_at)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(removed, "replaced invitation");
        Ok(inserted)
    }

    pub async fn delete_invitations(&self) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM invitations")
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_invitations(&self) -> StorageResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM invitations")
            .fetch_one(&*self.db)
            .await?;
        Ok(count)
    }

    // --- event photos & messages ---

    pub async fn list_event_photos(&self, tag: EventTag) -> StorageResult<Vec<EventPhoto>> {
        let mut photos = sqlx::query_as::<_, EventPhoto>(&format!(
            "SELECT {EVENT_PHOTO_COLUMNS} FROM event_photos WHERE event_tag = ?"
        ))
        .bind(tag)
        .fetch_all(&*self.db)
        .await?;
        photos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(photos)
    }

    /// Insert a prepared event photo; the remote assigns a fresh id.
    pub async fn insert_event_photo(&self, photo: &EventPhoto) -> StorageResult<EventPhoto> {
        let inserted = sqlx::query_as::<_, EventPhoto>(&format!(
            "INSERT INTO event_photos ({EVENT_PHOTO_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {EVENT_PHOTO_COLUMNS}"
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(photo.event_tag)
        .bind(&photo.image_url)
        .bind(&photo.guest_name)
        .bind(&photo.message)
        .bind(photo.uploaded_by)
        .bind(photo.created_at)
        .bind(photo.updated_at)
        .fetch_one(&*self.db)
        .await?;
        Ok(inserted)
    }

    pub async fn delete_event_photo(&self, id: &str) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM event_photos WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_event_messages(&self, tag: EventTag) -> StorageResult<Vec<EventMessage>> {
        let mut messages = sqlx::query_as::<_, EventMessage>(&format!(
            "SELECT {EVENT_MESSAGE_COLUMNS} FROM event_messages WHERE event_tag = ?"
        ))
        .bind(tag)
        .fetch_all(&*self.db)
        .await?;
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(messages)
    }

    pub async fn insert_event_message(
        &self,
        message: &EventMessage,
    ) -> StorageResult<EventMessage> {
        let inserted = sqlx::query_as::<_, EventMessage>(&format!(
            "INSERT INTO event_messages ({EVENT_MESSAGE_COLUMNS}) VALUES (?, ?, ?, ?, ?)
             RETURNING {EVENT_MESSAGE_COLUMNS}"
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(message.event_tag)
        .bind(&message.guest_name)
        .bind(&message.message)
        .bind(message.created_at)
        .fetch_one(&*self.db)
        .await?;
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{guest::Side, photo::Uploader};

    async fn memory_client() -> RemoteClient {
        let client = RemoteClient::connect_url("sqlite::memory:").await.unwrap();
        client.migrate().await.unwrap();
        client
    }

    fn new_guest(email: &str) -> NewGuest {
        NewGuest {
            name: "Jane Doe".into(),
            email: email.into(),
            phone: "9999999999".into(),
            attending: true,
            party_size: 2,
            side: Side::Bride,
            message: None,
            dietary_restrictions: Some("vegetarian".into()),
            needs_accommodation: true,
        }
    }

    #[test]
    fn placeholders_are_detected() {
        assert!(is_placeholder(""));
        assert!(is_placeholder("   "));
        assert!(is_placeholder("YOUR_DATABASE_URL"));
        assert!(is_placeholder("sqlite://placeholder.db"));
        assert!(!is_placeholder("sqlite://./data/remote.db"));
    }

    #[tokio::test]
    async fn connect_without_url_is_disabled() {
        assert!(RemoteClient::connect(None).await.is_none());
        assert!(RemoteClient::connect(Some("your-database-url")).await.is_none());
    }

    #[tokio::test]
    async fn guest_insert_update_delete() {
        let client = memory_client().await;
        let guest = client.insert_guest(new_guest("jane@x.com")).await.unwrap();
        assert_eq!(guest.dietary_restrictions.as_deref(), Some("vegetarian"));

        let patch = GuestPatch {
            attending: Some(false),
            message: Some(Some("Sorry!".into())),
            ..Default::default()
        };
        let updated = client.update_guest(&guest.id, &patch).await.unwrap();
        assert!(!updated.attending);
        assert_eq!(updated.message.as_deref(), Some("Sorry!"));
        assert_eq!(updated.party_size, 2);

        assert!(client.delete_guest(&guest.id).await.unwrap());
        assert!(client.list_guests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_missing_guest_is_not_found() {
        let client = memory_client().await;
        let err = client
            .update_guest("missing", &GuestPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn photo_partition_round_trips() {
        let client = memory_client().await;
        client
            .insert_photo(NewPhoto {
                image_url: "data:image/png;base64,AAAA".into(),
                uploader: Uploader::guest("Sam"),
                message: Some("Hi".into()),
            })
            .await
            .unwrap();
        client
            .insert_photo(NewPhoto {
                image_url: "https://cdn.example/a.jpg".into(),
                uploader: Uploader::Admin,
                message: None,
            })
            .await
            .unwrap();

        let photos = client.list_photos().await.unwrap();
        assert_eq!(photos.len(), 2);
        assert_eq!(photos.iter().filter(|p| p.uploader.is_admin()).count(), 1);
        let guest = photos.iter().find(|p| !p.uploader.is_admin()).unwrap();
        assert_eq!(guest.uploader.display_name(), Some("Sam"));
    }

    #[tokio::test]
    async fn replacing_invitation_leaves_exactly_one() {
        let client = memory_client().await;
        for name in ["a.pdf", "b.pdf", "c.pdf"] {
            client
                .replace_invitation(NewInvitation {
                    file_data: "data:application/pdf;base64,JVBERi0=".into(),
                    file_name: Some(name.into()),
                    checksum: "abc".into(),
                })
                .await
                .unwrap();
        }
        assert_eq!(client.count_invitations().await.unwrap(), 1);
        let current = client.current_invitation().await.unwrap().unwrap();
        assert_eq!(current.file_name.as_deref(), Some("c.pdf"));
    }

    #[tokio::test]
    async fn closed_pool_fails() {
        let client = memory_client().await;
        client.close().await;
        let err = client.list_guests().await.unwrap_err();
        assert!(err.should_fall_back());
    }
}
