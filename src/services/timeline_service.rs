//! TimelineService: the reception schedule.

use super::{AppContext, ServiceResult, local_id, log_fallback, mirror_all, mirror_upsert};
use crate::{
    models::timeline::{NewTimelineItem, TimelineItem, TimelinePatch, sort_by_time},
    storage::local::CacheKey,
    validation::{ValidationError, normalize_time, validate_timeline_item},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

const DOMAIN: &str = "timeline";

#[derive(Clone)]
pub struct TimelineService {
    ctx: Arc<AppContext>,
}

impl TimelineService {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// All items, ascending by time of day.
    pub async fn get_all(&self) -> Vec<TimelineItem> {
        let mut items = match self.ctx.direct("list_timeline", |r| r.list_timeline()).await {
            Ok(items) => {
                mirror_all(&self.ctx.local, CacheKey::Timeline, &items).await;
                items
            }
            Err(err) => {
                log_fallback(DOMAIN, "get_all", &err);
                self.ctx.local.get_all(CacheKey::Timeline).await
            }
        };
        sort_by_time(&mut items);
        items
    }

    pub async fn create(&self, new: NewTimelineItem) -> ServiceResult<TimelineItem> {
        let new = validate_timeline_item(new)?;
        let remote_new = new.clone();
        match self
            .ctx
            .direct("insert_timeline_item", move |r| {
                r.insert_timeline_item(remote_new)
            })
            .await
        {
            Ok(item) => {
                mirror_upsert(&self.ctx.local, CacheKey::Timeline, &item).await;
                Ok(item)
            }
            Err(err) if err.should_fall_back() => {
                log_fallback(DOMAIN, "create", &err);
                let item = new.into_item(local_id(), Utc::now());
                self.ctx.local.append(CacheKey::Timeline, item.clone()).await?;
                Ok(item)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn update(&self, id: &str, patch: TimelinePatch) -> ServiceResult<TimelineItem> {
        let patch = validate_patch(patch)?;
        match self
            .ctx
            .direct("update_timeline_item", |r| r.update_timeline_item(id, &patch))
            .await
        {
            Ok(item) => {
                mirror_upsert(&self.ctx.local, CacheKey::Timeline, &item).await;
                Ok(item)
            }
            Err(err) if err.should_fall_back() => {
                log_fallback(DOMAIN, "update", &err);
                let now = Utc::now();
                let item = self
                    .ctx
                    .local
                    .replace_one(CacheKey::Timeline, id, |item: &mut TimelineItem| {
                        patch.apply(item, now)
                    })
                    .await?;
                Ok(item)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Best-effort delete.
    pub async fn delete(&self, id: &str) {
        match self
            .ctx
            .direct("delete_timeline_item", |r| r.delete_timeline_item(id))
            .await
        {
            Ok(removed) => debug!(id, removed, "deleted timeline item remotely"),
            Err(err) => log_fallback(DOMAIN, "delete", &err),
        }
        if let Err(err) = self
            .ctx
            .local
            .remove_one::<TimelineItem>(CacheKey::Timeline, id)
            .await
        {
            warn!(id, error = %err, "failed to delete timeline item locally");
        }
    }
}

fn validate_patch(mut patch: TimelinePatch) -> Result<TimelinePatch, ValidationError> {
    if let Some(time) = &patch.time {
        patch.time = Some(normalize_time(time)?);
    }
    if let Some(title) = &patch.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(ValidationError::Missing("title"));
        }
        patch.title = Some(title.to_string());
    }
    if let Some(Some(duration)) = &patch.duration {
        let duration = duration.trim();
        patch.duration = Some((!duration.is_empty()).then(|| duration.to_string()));
    }
    Ok(patch)
}
