//! PhotoService: gallery photos.
//!
//! Probe order for reads and uploads: the HTTP gateway when the deployment
//! is a gateway deployment, otherwise the datastore directly; then the local
//! cache. Each remote step gets one bounded attempt.
//!
//! Locally, admin photos are a bare array of payloads and guest photos are
//! metadata objects under a separate key; reads merge both and sort newest
//! first. Cached admin photos are identified by their remote id when known,
//! otherwise by `local-admin-<md5 of payload>`.

use super::{AppContext, ServiceError, ServiceResult, clean_text, log_fallback, mirror_all};
use crate::{
    deployment::RemotePath,
    models::photo::{
        AdminPhotoRef, GuestPhotoEntry, NewPhoto, Photo, PhotoUpload, Uploader,
        is_image_reference,
    },
    payload::{checksum, encode_data_url},
    storage::{
        StorageResult,
        local::{CacheKey, PhotoEvent},
    },
    validation::validate_photo,
};
use chrono::{Duration as ChronoDuration, Utc};
use futures::{StreamExt, stream};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const DOMAIN: &str = "photos";
const LOCAL_ADMIN_PREFIX: &str = "local-admin-";

/// How a batch upload went overall.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    AllSucceeded,
    Partial,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct BatchFailure {
    pub index: usize,
    pub file_name: Option<String>,
    pub error: String,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct BatchReport {
    pub uploaded: Vec<Photo>,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn outcome(&self) -> BatchOutcome {
        if self.failed.is_empty() {
            BatchOutcome::AllSucceeded
        } else {
            BatchOutcome::Partial
        }
    }
}

#[derive(Clone)]
pub struct PhotoService {
    ctx: Arc<AppContext>,
}

impl PhotoService {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Notifications for local photo writes.
    pub fn subscribe(&self) -> broadcast::Receiver<PhotoEvent> {
        self.ctx.local.subscribe()
    }

    /// All photos, newest first. Never fails.
    pub async fn get_all(&self) -> Vec<Photo> {
        match self.fetch_remote().await {
            Ok(mut photos) => {
                sort_newest_first(&mut photos);
                self.mirror(&photos).await;
                photos
            }
            Err(err) => {
                log_fallback(DOMAIN, "get_all", &err);
                self.local_photos().await
            }
        }
    }

    pub async fn admin_photos(&self) -> Vec<Photo> {
        let mut photos = self.get_all().await;
        photos.retain(|p| p.uploader.is_admin());
        photos
    }

    pub async fn guest_photos(&self) -> Vec<Photo> {
        let mut photos = self.get_all().await;
        photos.retain(|p| !p.uploader.is_admin());
        photos
    }

    async fn fetch_remote(&self) -> StorageResult<Vec<Photo>> {
        match self.ctx.remote_path {
            RemotePath::Gateway => {
                self.ctx
                    .via_gateway("list_photos", |g| g.list_photos())
                    .await
            }
            RemotePath::Direct => {
                let photos = self.ctx.direct("list_photos", |r| r.list_photos()).await?;
                Ok(photos
                    .into_iter()
                    .filter(|p| is_image_reference(&p.image_url))
                    .collect())
            }
        }
    }

    /// Validate, encode and store one photo.
    pub async fn upload(&self, upload: PhotoUpload) -> ServiceResult<Photo> {
        validate_photo(&upload, &self.ctx.limits)?;
        let new = NewPhoto {
            image_url: encode_data_url(&upload.content_type, &upload.bytes),
            uploader: upload.uploader,
            message: clean_text(upload.message),
        };

        let stored = match self.ctx.remote_path {
            RemotePath::Gateway => {
                self.ctx
                    .via_gateway("upload_photo", |g| g.upload_photo(&new))
                    .await
            }
            RemotePath::Direct => {
                let remote_new = new.clone();
                self.ctx
                    .direct("insert_photo", move |r| r.insert_photo(remote_new))
                    .await
            }
        };

        match stored {
            Ok(photo) => {
                if let Err(err) = self.store_local(&photo).await {
                    warn!(error = %err, "failed to mirror photo locally");
                }
                Ok(photo)
            }
            Err(err) if err.should_fall_back() => {
                log_fallback(DOMAIN, "upload", &err);
                let photo = new.into_photo(String::new(), Utc::now());
                Ok(self.store_local(&photo).await?)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Upload each file independently. Partial failure is still a success;
    /// only a batch where every file failed is an error. Nothing is rolled
    /// back.
    pub async fn upload_batch(&self, uploads: Vec<PhotoUpload>) -> ServiceResult<BatchReport> {
        let attempted = uploads.len();
        let results: Vec<(usize, Option<String>, ServiceResult<Photo>)> =
            stream::iter(uploads.into_iter().enumerate())
                .then(|(index, upload)| async move {
                    let file_name = upload.file_name.clone();
                    (index, file_name, self.upload(upload).await)
                })
                .collect()
                .await;

        let mut report = BatchReport {
            uploaded: Vec::new(),
            failed: Vec::new(),
        };
        for (index, file_name, result) in results {
            match result {
                Ok(photo) => report.uploaded.push(photo),
                Err(err) => report.failed.push(BatchFailure {
                    index,
                    file_name,
                    error: err.to_string(),
                }),
            }
        }

        if attempted > 0 && report.uploaded.is_empty() {
            return Err(ServiceError::UploadFailed { attempted });
        }
        info!(
            uploaded = report.uploaded.len(),
            failed = report.failed.len(),
            "photo batch finished"
        );
        Ok(report)
    }

    /// Best-effort delete.
    pub async fn delete(&self, id: &str) {
        if id.starts_with("local-") {
            self.delete_local(id).await;
            return;
        }
        match self.ctx.direct("delete_photo", |r| r.delete_photo(id)).await {
            Ok(removed) => debug!(id, removed, "deleted photo remotely"),
            Err(err) => log_fallback(DOMAIN, "delete", &err),
        }
        self.delete_local(id).await;
    }

    /// Remove a photo from the local partitions. Admin ids resolve to a
    /// payload checksum; every cached copy of that payload goes.
    async fn delete_local(&self, id: &str) {
        let local = &self.ctx.local;
        let checksum = match id.strip_prefix(LOCAL_ADMIN_PREFIX) {
            Some(checksum) => Some(checksum.to_string()),
            None => local
                .get_all::<AdminPhotoRef>(CacheKey::AdminPhotoIds)
                .await
                .into_iter()
                .find(|r| r.id == id)
                .map(|r| r.checksum),
        };

        let result = match checksum {
            Some(checksum) => {
                let removed = local
                    .update(CacheKey::AdminPhotos, |items: &mut Vec<String>| {
                        let before = items.len();
                        items.retain(|url| payload_checksum(url) != checksum);
                        before - items.len()
                    })
                    .await;
                match removed {
                    Ok(removed) => {
                        debug!(id, removed, "deleted cached admin photo");
                        local
                            .update(CacheKey::AdminPhotoIds, |refs: &mut Vec<AdminPhotoRef>| {
                                refs.retain(|r| r.checksum != checksum)
                            })
                            .await
                    }
                    Err(err) => Err(err),
                }
            }
            None => local
                .remove_one::<GuestPhotoEntry>(CacheKey::GuestPhotos, id)
                .await
                .map(|_| ()),
        };
        if let Err(err) = result {
            warn!(id, error = %err, "failed to delete photo locally");
        }
    }

    /// Append a photo to the proper local partition. Admin photos stored
    /// without a remote id get their content-derived id, which is what later
    /// reads will report.
    async fn store_local(&self, photo: &Photo) -> StorageResult<Photo> {
        let mut stored = photo.clone();
        match &photo.uploader {
            Uploader::Admin => {
                let checksum = payload_checksum(&photo.image_url);
                self.ctx
                    .local
                    .append(CacheKey::AdminPhotos, photo.image_url.clone())
                    .await?;
                if stored.id.is_empty() {
                    stored.id = format!("{LOCAL_ADMIN_PREFIX}{checksum}");
                } else {
                    let link = AdminPhotoRef {
                        id: stored.id.clone(),
                        checksum,
                    };
                    self.ctx.local.append(CacheKey::AdminPhotoIds, link).await?;
                }
            }
            Uploader::Guest { name } => {
                if stored.id.is_empty() {
                    stored.id = super::local_id();
                }
                let entry = GuestPhotoEntry {
                    id: stored.id.clone(),
                    image_url: stored.image_url.clone(),
                    guest_name: name.clone(),
                    message: stored.message.clone(),
                    created_at: stored.created_at,
                };
                self.ctx.local.append(CacheKey::GuestPhotos, entry).await?;
            }
        }
        Ok(stored)
    }

    /// Merge both local partitions, newest first.
    async fn local_photos(&self) -> Vec<Photo> {
        let local = &self.ctx.local;
        let admin: Vec<String> = local.get_all(CacheKey::AdminPhotos).await;
        let refs: Vec<AdminPhotoRef> = local.get_all(CacheKey::AdminPhotoIds).await;
        let guests: Vec<GuestPhotoEntry> = local.get_all(CacheKey::GuestPhotos).await;

        // Bare admin payloads carry no timestamp: later entries rank newer.
        let now = Utc::now();
        let last = admin.len().saturating_sub(1);
        let mut photos: Vec<Photo> = admin
            .into_iter()
            .enumerate()
            .map(|(index, image_url)| {
                let checksum = payload_checksum(&image_url);
                let id = refs
                    .iter()
                    .find(|r| r.checksum == checksum)
                    .map(|r| r.id.clone())
                    .unwrap_or_else(|| format!("{LOCAL_ADMIN_PREFIX}{checksum}"));
                Photo {
                    id,
                    image_url,
                    uploader: Uploader::Admin,
                    message: None,
                    created_at: now - ChronoDuration::milliseconds((last - index) as i64),
                }
            })
            .chain(guests.into_iter().map(GuestPhotoEntry::into_photo))
            .filter(|p| is_image_reference(&p.image_url))
            .collect();
        sort_newest_first(&mut photos);
        photos
    }

    /// Write a remote snapshot into both partitions, skipping unchanged keys
    /// so pollers are not woken by their own refresh.
    async fn mirror(&self, photos: &[Photo]) {
        let mut admin: Vec<String> = Vec::new();
        let mut refs: Vec<AdminPhotoRef> = Vec::new();
        let mut guests: Vec<GuestPhotoEntry> = Vec::new();
        for photo in photos.iter().rev() {
            match &photo.uploader {
                Uploader::Admin => {
                    refs.push(AdminPhotoRef {
                        id: photo.id.clone(),
                        checksum: payload_checksum(&photo.image_url),
                    });
                    admin.push(photo.image_url.clone());
                }
                Uploader::Guest { name } => guests.push(GuestPhotoEntry {
                    id: photo.id.clone(),
                    image_url: photo.image_url.clone(),
                    guest_name: name.clone(),
                    message: photo.message.clone(),
                    created_at: photo.created_at,
                }),
            }
        }

        let local = &self.ctx.local;
        if local.get_all::<String>(CacheKey::AdminPhotos).await != admin {
            mirror_all(local, CacheKey::AdminPhotos, &admin).await;
        }
        if local.get_all::<AdminPhotoRef>(CacheKey::AdminPhotoIds).await != refs {
            mirror_all(local, CacheKey::AdminPhotoIds, &refs).await;
        }
        if local.get_all::<GuestPhotoEntry>(CacheKey::GuestPhotos).await != guests {
            mirror_all(local, CacheKey::GuestPhotos, &guests).await;
        }
    }
}

fn payload_checksum(image_url: &str) -> String {
    checksum(image_url.as_bytes())
}

fn sort_newest_first(photos: &mut [Photo]) {
    photos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{services::test_support, validation::ValidationError};
    use bytes::Bytes;

    fn upload(uploader: Uploader, message: Option<&str>) -> PhotoUpload {
        PhotoUpload {
            file_name: Some("pic.png".into()),
            content_type: "image/png".into(),
            bytes: Bytes::from_static(b"\x89PNG\r\n\x1a\n"),
            uploader,
            message: message.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn offline_uploads_are_listed_from_local_cache() {
        let (ctx, _dir) = test_support::local_context().await;
        let service = PhotoService::new(ctx);

        service.upload(upload(Uploader::Admin, None)).await.unwrap();
        service
            .upload(upload(Uploader::guest("Sam"), Some("Congrats!")))
            .await
            .unwrap();

        let photos = service.get_all().await;
        assert_eq!(photos.len(), 2);
        assert_eq!(photos.iter().filter(|p| p.uploader.is_admin()).count(), 1);
        let guest = photos.iter().find(|p| !p.uploader.is_admin()).unwrap();
        assert_eq!(guest.message.as_deref(), Some("Congrats!"));
        assert!(guest.image_url.starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn local_partitions_keep_their_shapes() {
        let (ctx, _dir) = test_support::local_context().await;
        let service = PhotoService::new(ctx.clone());
        service.upload(upload(Uploader::Admin, None)).await.unwrap();
        service.upload(upload(Uploader::guest("Sam"), None)).await.unwrap();

        let admin: Vec<String> = ctx.local.get_all(CacheKey::AdminPhotos).await;
        let guests: Vec<GuestPhotoEntry> = ctx.local.get_all(CacheKey::GuestPhotos).await;
        assert_eq!(admin.len(), 1);
        assert_eq!(guests.len(), 1);
        assert_eq!(guests[0].guest_name, "Sam");
    }

    #[tokio::test]
    async fn guest_uploads_land_in_guest_partition() {
        let (ctx, _remote, _dir) = test_support::remote_context().await;
        let service = PhotoService::new(ctx);
        let photo = service
            .upload(upload(Uploader::guest("Jane_Doe_1700000000"), Some("hi")))
            .await
            .unwrap();

        let guests = service.guest_photos().await;
        assert_eq!(guests.len(), 1);
        assert_eq!(guests[0].id, photo.id);
        assert_eq!(guests[0].uploader.display_name(), Some("Jane_Doe_1700000000"));
        assert!(service.admin_photos().await.is_empty());
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected_before_io() {
        let (ctx, _remote, _dir) = test_support::remote_context().await;
        let service = PhotoService::new(ctx);
        let mut huge = upload(Uploader::Admin, None);
        huge.content_type = "image/jpeg".into();
        huge.bytes = Bytes::from(vec![0u8; 30 * 1024 * 1024]);

        let err = service.upload(huge).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(ValidationError::FileTooLarge { .. })
        ));
        assert!(service.get_all().await.is_empty());
    }

    #[tokio::test]
    async fn remote_snapshot_survives_outage() {
        let (ctx, remote, _dir) = test_support::remote_context().await;
        let service = PhotoService::new(ctx);
        service.upload(upload(Uploader::Admin, None)).await.unwrap();
        service.upload(upload(Uploader::guest("Sam"), None)).await.unwrap();
        assert_eq!(service.get_all().await.len(), 2);

        remote.close().await;
        let cached = service.get_all().await;
        assert_eq!(cached.len(), 2);
        assert_eq!(cached.iter().filter(|p| p.uploader.is_admin()).count(), 1);
    }

    #[tokio::test]
    async fn batch_reports_partial_failure() {
        let (ctx, _dir) = test_support::local_context().await;
        let service = PhotoService::new(ctx);
        let mut bad = upload(Uploader::Admin, None);
        bad.content_type = "text/plain".into();
        bad.file_name = Some("notes.txt".into());

        let report = service
            .upload_batch(vec![upload(Uploader::Admin, None), bad])
            .await
            .unwrap();
        assert_eq!(report.outcome(), BatchOutcome::Partial);
        assert_eq!(report.uploaded.len(), 1);
        assert_eq!(report.failed[0].index, 1);
        assert_eq!(report.failed[0].file_name.as_deref(), Some("notes.txt"));
    }

    #[tokio::test]
    async fn batch_where_everything_fails_is_an_error() {
        let (ctx, _dir) = test_support::local_context().await;
        let service = PhotoService::new(ctx);
        let mut bad = upload(Uploader::Admin, None);
        bad.bytes = Bytes::new();

        let err = service.upload_batch(vec![bad.clone(), bad]).await.unwrap_err();
        assert!(matches!(err, ServiceError::UploadFailed { attempted: 2 }));
    }

    fn admin_png(body: &'static [u8]) -> PhotoUpload {
        PhotoUpload {
            bytes: Bytes::from_static(body),
            ..upload(Uploader::Admin, None)
        }
    }

    #[tokio::test]
    async fn local_admin_photo_can_be_deleted() {
        let (ctx, _dir) = test_support::local_context().await;
        let service = PhotoService::new(ctx);
        let first = service.upload(upload(Uploader::Admin, None)).await.unwrap();
        assert!(first.id.starts_with(LOCAL_ADMIN_PREFIX));
        let guest = service.upload(upload(Uploader::guest("Sam"), None)).await.unwrap();

        let listed = service.get_all().await;
        assert!(listed.iter().any(|p| p.id == first.id));

        service.delete(&first.id).await;
        service.delete(&guest.id).await;
        assert!(service.get_all().await.is_empty());
    }

    #[tokio::test]
    async fn ids_from_one_listing_stay_valid_across_deletes() {
        let (ctx, _dir) = test_support::local_context().await;
        let service = PhotoService::new(ctx.clone());
        let a = service.upload(admin_png(b"AAA")).await.unwrap();
        let b = service.upload(admin_png(b"BBB")).await.unwrap();
        let c = service.upload(admin_png(b"CCC")).await.unwrap();

        let listed: Vec<String> = service.get_all().await.into_iter().map(|p| p.id).collect();
        assert_eq!(listed, [c.id.clone(), b.id.clone(), a.id.clone()]);

        service.delete(&listed[2]).await;
        service.delete(&listed[1]).await;

        let remaining = service.get_all().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, c.id);
        let payloads: Vec<String> = ctx.local.get_all(CacheKey::AdminPhotos).await;
        assert_eq!(payloads, [encode_data_url("image/png", b"CCC")]);
    }

    #[tokio::test]
    async fn remote_delete_clears_cached_copy() {
        let (ctx, _remote, _dir) = test_support::remote_context().await;
        let service = PhotoService::new(ctx.clone());
        let admin = service.upload(upload(Uploader::Admin, None)).await.unwrap();
        service.delete(&admin.id).await;

        assert!(service.get_all().await.is_empty());
        let payloads: Vec<String> = ctx.local.get_all(CacheKey::AdminPhotos).await;
        assert!(payloads.is_empty());
    }

    #[tokio::test]
    async fn remote_admin_id_deletes_cached_copy_during_outage() {
        let (ctx, remote, _dir) = test_support::remote_context().await;
        let service = PhotoService::new(ctx.clone());
        let kept = service.upload(admin_png(b"KEEP")).await.unwrap();
        let gone = service.upload(admin_png(b"GONE")).await.unwrap();
        assert_eq!(service.get_all().await.len(), 2);

        remote.close().await;
        let cached: Vec<String> = service.get_all().await.into_iter().map(|p| p.id).collect();
        assert!(cached.contains(&kept.id));
        assert!(cached.contains(&gone.id));

        service.delete(&gone.id).await;
        let remaining = service.get_all().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, kept.id);
    }
}
