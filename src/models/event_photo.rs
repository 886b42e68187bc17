//! Photos and messages scoped to one of the pre-wedding sub-events.

use super::Identified;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum EventTag {
    Sangeet,
    Haldi,
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTag::Sangeet => write!(f, "sangeet"),
            EventTag::Haldi => write!(f, "haldi"),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum UploaderRole {
    Admin,
    Guest,
}

#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct EventPhoto {
    pub id: String,
    pub event_tag: EventTag,
    pub image_url: String,
    pub guest_name: String,
    pub message: Option<String>,
    pub uploaded_by: UploaderRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identified for EventPhoto {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct EventMessage {
    pub id: String,
    pub event_tag: EventTag,
    pub guest_name: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Identified for EventMessage {
    fn id(&self) -> &str {
        &self.id
    }
}
