//! EventPhotoService: the date-gated sangeet and haldi galleries.
//!
//! The caller evaluates the gallery state once when the gallery is opened
//! and passes it back in for writes.

use super::{
    AppContext, ServiceError, ServiceResult, clean_text, local_id, log_fallback, mirror_upsert,
};
use crate::{
    access::GalleryState,
    models::{
        event_photo::{EventMessage, EventPhoto, EventTag, UploaderRole},
        photo::{PhotoUpload, Uploader},
    },
    payload::encode_data_url,
    storage::local::CacheKey,
    validation::{ValidationError, validate_photo},
};
use chrono::{NaiveDate, Utc};
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use tracing::{debug, warn};

const DOMAIN: &str = "event_photos";

trait Tagged {
    fn tag(&self) -> EventTag;
}

impl Tagged for EventPhoto {
    fn tag(&self) -> EventTag {
        self.event_tag
    }
}

impl Tagged for EventMessage {
    fn tag(&self) -> EventTag {
        self.event_tag
    }
}

#[derive(Clone)]
pub struct EventPhotoService {
    ctx: Arc<AppContext>,
}

impl EventPhotoService {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Evaluate the gallery for `tag` as of `today`. A correct PIN opens it
    /// regardless of the date.
    pub async fn gallery_state(
        &self,
        tag: EventTag,
        today: NaiveDate,
        pin: Option<&str>,
    ) -> GalleryState {
        let admin = pin.is_some_and(|pin| self.ctx.admin_pin.verify(pin));
        let event_day = self.ctx.calendar.day_of(tag);
        // Only the post-event states depend on whether anything was shared.
        let has_photos = today > event_day && !admin && !self.list(tag).await.is_empty();
        GalleryState::evaluate(today, event_day, admin, has_photos)
    }

    /// Photos for one event, newest first.
    pub async fn list(&self, tag: EventTag) -> Vec<EventPhoto> {
        let mut photos = match self
            .ctx
            .direct("list_event_photos", |r| r.list_event_photos(tag))
            .await
        {
            Ok(photos) => {
                self.mirror_tag(CacheKey::EventPhotos, tag, &photos).await;
                photos
            }
            Err(err) => {
                log_fallback(DOMAIN, "list", &err);
                self.local_for_tag(CacheKey::EventPhotos, tag).await
            }
        };
        photos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        photos
    }

    pub async fn upload(
        &self,
        tag: EventTag,
        state: GalleryState,
        upload: PhotoUpload,
    ) -> ServiceResult<EventPhoto> {
        if !state.can_upload() {
            return Err(ServiceError::GalleryClosed(state));
        }
        validate_photo(&upload, &self.ctx.limits)?;

        let now = Utc::now();
        let (uploaded_by, guest_name) = match &upload.uploader {
            Uploader::Admin => (UploaderRole::Admin, "Admin".to_string()),
            Uploader::Guest { name } => (UploaderRole::Guest, name.clone()),
        };
        let photo = EventPhoto {
            id: String::new(),
            event_tag: tag,
            image_url: encode_data_url(&upload.content_type, &upload.bytes),
            guest_name,
            message: clean_text(upload.message),
            uploaded_by,
            created_at: now,
            updated_at: now,
        };

        match self
            .ctx
            .direct("insert_event_photo", |r| r.insert_event_photo(&photo))
            .await
        {
            Ok(stored) => {
                mirror_upsert(&self.ctx.local, CacheKey::EventPhotos, &stored).await;
                Ok(stored)
            }
            Err(err) if err.should_fall_back() => {
                log_fallback(DOMAIN, "upload", &err);
                let stored = EventPhoto {
                    id: local_id(),
                    ..photo
                };
                self.ctx
                    .local
                    .append(CacheKey::EventPhotos, stored.clone())
                    .await?;
                Ok(stored)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Best-effort delete.
    pub async fn delete(&self, id: &str) {
        match self
            .ctx
            .direct("delete_event_photo", |r| r.delete_event_photo(id))
            .await
        {
            Ok(removed) => debug!(id, removed, "deleted event photo remotely"),
            Err(err) => log_fallback(DOMAIN, "delete", &err),
        }
        if let Err(err) = self
            .ctx
            .local
            .remove_one::<EventPhoto>(CacheKey::EventPhotos, id)
            .await
        {
            warn!(id, error = %err, "failed to delete event photo locally");
        }
    }

    /// Leave a note on an open gallery.
    pub async fn post_message(
        &self,
        tag: EventTag,
        state: GalleryState,
        guest_name: &str,
        text: &str,
    ) -> ServiceResult<EventMessage> {
        if !state.can_upload() {
            return Err(ServiceError::GalleryClosed(state));
        }
        let guest_name = guest_name.split_whitespace().collect::<Vec<_>>().join(" ");
        if guest_name.is_empty() {
            return Err(ValidationError::Missing("guest_name").into());
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::Missing("message").into());
        }

        let message = EventMessage {
            id: String::new(),
            event_tag: tag,
            guest_name,
            message: text.to_string(),
            created_at: Utc::now(),
        };
        match self
            .ctx
            .direct("insert_event_message", |r| r.insert_event_message(&message))
            .await
        {
            Ok(stored) => {
                mirror_upsert(&self.ctx.local, CacheKey::EventMessages, &stored).await;
                Ok(stored)
            }
            Err(err) if err.should_fall_back() => {
                log_fallback(DOMAIN, "post_message", &err);
                let stored = EventMessage {
                    id: local_id(),
                    ..message
                };
                self.ctx
                    .local
                    .append(CacheKey::EventMessages, stored.clone())
                    .await?;
                Ok(stored)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Messages for one event, newest first.
    pub async fn messages(&self, tag: EventTag) -> Vec<EventMessage> {
        let mut messages = match self
            .ctx
            .direct("list_event_messages", |r| r.list_event_messages(tag))
            .await
        {
            Ok(messages) => {
                self.mirror_tag(CacheKey::EventMessages, tag, &messages)
                    .await;
                messages
            }
            Err(err) => {
                log_fallback(DOMAIN, "messages", &err);
                self.local_for_tag(CacheKey::EventMessages, tag).await
            }
        };
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        messages
    }

    async fn local_for_tag<T>(&self, key: CacheKey, tag: EventTag) -> Vec<T>
    where
        T: DeserializeOwned + Tagged,
    {
        let mut items: Vec<T> = self.ctx.local.get_all(key).await;
        items.retain(|item| item.tag() == tag);
        items
    }

    /// Both events share one local key; replace only this event's entries.
    async fn mirror_tag<T>(&self, key: CacheKey, tag: EventTag, fresh: &[T])
    where
        T: Serialize + DeserializeOwned + Tagged + Clone,
    {
        let result = self
            .ctx
            .local
            .update(key, |items: &mut Vec<T>| {
                items.retain(|item| item.tag() != tag);
                items.extend(fresh.iter().cloned());
            })
            .await;
        if let Err(err) = result {
            warn!(key = key.as_str(), %tag, error = %err, "failed to mirror event snapshot");
        }
    }
}
