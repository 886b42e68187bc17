//! Outbound RSVP alerts. Fire-and-forget from the caller's point of view.

use crate::{
    models::guest::{Guest, Side},
    storage::{StorageResult, gateway::check_response},
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RsvpAlert {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub attending: bool,
    #[serde(rename = "guests")]
    pub party_size: i64,
    pub side: Side,
    pub message: Option<String>,
    /// True when an existing RSVP was changed rather than a new one created.
    pub updated: bool,
}

impl RsvpAlert {
    pub fn for_guest(guest: &Guest, updated: bool) -> Self {
        Self {
            name: guest.name.clone(),
            email: guest.email.clone(),
            phone: guest.phone.clone(),
            attending: guest.attending,
            party_size: guest.party_size,
            side: guest.side,
            message: guest.message.clone(),
            updated,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Notifier {
    http: Client,
    url: String,
}

impl Notifier {
    pub fn new(url: &str, timeout: Duration) -> StorageResult<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }

    pub async fn send_rsvp(&self, alert: &RsvpAlert) -> StorageResult<()> {
        let response = self.http.post(&self.url).json(alert).send().await?;
        check_response(response).await?;
        debug!(name = %alert.name, updated = alert.updated, "dispatched RSVP alert");
        Ok(())
    }
}
