//! Local cache store: a key-namespaced JSON file per domain.
//!
//! This is a non-authoritative mirror of the remote datastore, used when the
//! remote path is unavailable. Every write is flushed to disk immediately
//! (temp file + rename). Writes to the photo keys are broadcast to in-process
//! subscribers so open galleries can refresh.

use super::{StorageError, StorageResult};
use crate::models::Identified;
use serde::{Serialize, de::DeserializeOwned};
use std::{io, path::PathBuf, sync::Arc};
use tokio::{
    fs,
    sync::{Mutex, broadcast},
};
use tracing::{debug, warn};
use uuid::Uuid;

/// Storage namespaces. Admin and guest photos live under different keys with
/// different record shapes: admin photos are a bare array of payload strings,
/// guest photos are `GuestPhotoEntry` objects. `AdminPhotoIds` maps remote
/// admin ids onto payload checksums.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Guests,
    AdminPhotos,
    AdminPhotoIds,
    GuestPhotos,
    Timeline,
    Invitation,
    EventPhotos,
    EventMessages,
    AnalyticsEvents,
    AnalyticsSessions,
    PageViews,
}

impl CacheKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKey::Guests => "wedding_guests",
            CacheKey::AdminPhotos => "wedding_admin_photos",
            CacheKey::AdminPhotoIds => "wedding_admin_photo_ids",
            CacheKey::GuestPhotos => "wedding_guest_photos",
            CacheKey::Timeline => "wedding_flow",
            CacheKey::Invitation => "wedding_invitation",
            CacheKey::EventPhotos => "wedding_event_photos",
            CacheKey::EventMessages => "wedding_event_messages",
            CacheKey::AnalyticsEvents => "wedding_analytics_events",
            CacheKey::AnalyticsSessions => "wedding_analytics_sessions",
            CacheKey::PageViews => "wedding_page_views",
        }
    }

    fn is_photo(&self) -> bool {
        matches!(
            self,
            CacheKey::AdminPhotos | CacheKey::GuestPhotos | CacheKey::EventPhotos
        )
    }
}

/// Broadcast after every write to a photo key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhotoEvent {
    pub key: CacheKey,
}

#[derive(Clone)]
pub struct LocalStore {
    inner: Arc<Inner>,
}

struct Inner {
    root: PathBuf,
    write_lock: Mutex<()>,
    events: broadcast::Sender<PhotoEvent>,
}

impl LocalStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        let (events, _) = broadcast::channel(64);
        Ok(Self {
            inner: Arc::new(Inner {
                root,
                write_lock: Mutex::new(()),
                events,
            }),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PhotoEvent> {
        self.inner.events.subscribe()
    }

    fn path(&self, key: CacheKey) -> PathBuf {
        self.inner.root.join(format!("{}.json", key.as_str()))
    }

    /// Read and parse a key. Missing files are `None`; unreadable or corrupt
    /// files are logged and also `None`.
    async fn read<T: DeserializeOwned>(&self, key: CacheKey) -> Option<T> {
        let bytes = match fs::read(self.path(key)).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(key = key.as_str(), error = %err, "failed to read local cache");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key = key.as_str(), error = %err, "corrupt local cache entry ignored");
                None
            }
        }
    }

    /// Serialize and flush a key, then notify photo subscribers. Callers hold
    /// the write lock.
    async fn write<T: Serialize + ?Sized>(&self, key: CacheKey, value: &T) -> StorageResult<()> {
        let bytes = serde_json::to_vec(value)?;
        let path = self.path(key);
        let tmp_path = self
            .inner
            .root
            .join(format!(".{}.tmp-{}", key.as_str(), Uuid::new_v4()));

        if let Err(err) = fs::write(&tmp_path, &bytes).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        if let Err(err) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        debug!(key = key.as_str(), bytes = bytes.len(), "flushed local cache");

        if key.is_photo() {
            // No receivers is fine.
            let _ = self.inner.events.send(PhotoEvent { key });
        }
        Ok(())
    }

    /// Read-modify-write a collection under the store's write lock.
    pub async fn update<T, R>(
        &self,
        key: CacheKey,
        f: impl FnOnce(&mut Vec<T>) -> R,
    ) -> StorageResult<R>
    where
        T: Serialize + DeserializeOwned,
    {
        let _guard = self.inner.write_lock.lock().await;
        let mut items: Vec<T> = self.read(key).await.unwrap_or_default();
        let result = f(&mut items);
        self.write(key, &items).await?;
        Ok(result)
    }

    pub async fn get_all<T: DeserializeOwned>(&self, key: CacheKey) -> Vec<T> {
        self.read(key).await.unwrap_or_default()
    }

    /// Replace the whole collection, e.g. with a fresh remote snapshot.
    pub async fn put_all<T: Serialize>(&self, key: CacheKey, items: &[T]) -> StorageResult<()> {
        let _guard = self.inner.write_lock.lock().await;
        self.write(key, items).await
    }

    pub async fn append<T>(&self, key: CacheKey, item: T) -> StorageResult<()>
    where
        T: Serialize + DeserializeOwned,
    {
        self.update(key, |items: &mut Vec<T>| items.push(item)).await
    }

    /// Apply `f` to the record with `id`. Missing ids are `NotFound`.
    pub async fn replace_one<T>(
        &self,
        key: CacheKey,
        id: &str,
        f: impl FnOnce(&mut T),
    ) -> StorageResult<T>
    where
        T: Serialize + DeserializeOwned + Identified + Clone,
    {
        let updated = self
            .update(key, |items: &mut Vec<T>| {
                items.iter_mut().find(|item| item.id() == id).map(|item| {
                    f(item);
                    item.clone()
                })
            })
            .await?;
        updated.ok_or_else(|| StorageError::not_found(key.as_str(), id))
    }

    /// Remove the record with `id`; returns whether anything was removed.
    pub async fn remove_one<T>(&self, key: CacheKey, id: &str) -> StorageResult<bool>
    where
        T: Serialize + DeserializeOwned + Identified,
    {
        self.update(key, |items: &mut Vec<T>| {
            let before = items.len();
            items.retain(|item| item.id() != id);
            items.len() != before
        })
        .await
    }

    /// Single-value keys (the invitation).
    pub async fn get_value<T: DeserializeOwned>(&self, key: CacheKey) -> Option<T> {
        self.read(key).await
    }

    pub async fn put_value<T: Serialize>(&self, key: CacheKey, value: &T) -> StorageResult<()> {
        let _guard = self.inner.write_lock.lock().await;
        self.write(key, value).await
    }

    pub async fn remove(&self, key: CacheKey) -> StorageResult<()> {
        let _guard = self.inner.write_lock.lock().await;
        match fs::remove_file(self.path(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    /// Write, read back and delete a scratch file under the root.
    pub async fn probe(&self) -> StorageResult<()> {
        let path = self.inner.root.join(format!(".probe-{}", Uuid::new_v4()));
        fs::write(&path, b"probe").await?;
        let read_back = fs::read(&path).await;
        let _ = fs::remove_file(&path).await;
        if read_back? == b"probe" {
            Ok(())
        } else {
            Err(StorageError::Malformed("probe content mismatch".into()))
        }
    }
}
