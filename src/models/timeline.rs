//! Reception timeline ("wedding flow") entries.

use super::Identified;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TimelineCategory {
    Ceremony,
    Ritual,
    Reception,
    Dinner,
    Entertainment,
    Other,
}

/// One scheduled moment of the day. Listings are sorted ascending by `time`.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct TimelineItem {
    pub id: String,

    /// Time of day, normalized to zero-padded `HH:MM`.
    pub time: String,

    pub title: String,
    pub description: String,

    /// Free-form label such as "45 min".
    pub duration: Option<String>,

    #[serde(rename = "event_type")]
    #[sqlx(rename = "event_type")]
    pub category: TimelineCategory,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identified for TimelineItem {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewTimelineItem {
    pub time: String,
    pub title: String,
    pub description: String,
    pub duration: Option<String>,
    #[serde(rename = "event_type")]
    pub category: TimelineCategory,
}

impl NewTimelineItem {
    pub fn into_item(self, id: String, now: DateTime<Utc>) -> TimelineItem {
        TimelineItem {
            id,
            time: self.time,
            title: self.title,
            description: self.description,
            duration: self.duration,
            category: self.category,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimelinePatch {
    pub time: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration: Option<Option<String>>,
    pub category: Option<TimelineCategory>,
}

impl TimelinePatch {
    pub fn apply(&self, item: &mut TimelineItem, now: DateTime<Utc>) {
        if let Some(time) = &self.time {
            item.time = time.clone();
        }
        if let Some(title) = &self.title {
            item.title = title.clone();
        }
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        if let Some(duration) = &self.duration {
            item.duration = duration.clone();
        }
        if let Some(category) = self.category {
            item.category = category;
        }
        item.updated_at = now;
    }
}

/// Sort ascending by time string. Stable, so equal times keep insertion order.
pub fn sort_by_time(items: &mut [TimelineItem]) {
    items.sort_by(|a, b| a.time.cmp(&b.time));
}
