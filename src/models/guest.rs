//! A guest's RSVP record.

use super::Identified;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Which family the guest is affiliated with.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Side {
    Bride,
    Groom,
}

/// A single RSVP response.
///
/// Uniqueness is not enforced by storage. `GuestService::submit_rsvp` matches
/// incoming responses against existing guests by name, email or phone.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct Guest {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub attending: bool,

    /// Number of people in the party, including the guest (>= 1).
    #[serde(rename = "guests")]
    #[sqlx(rename = "guests")]
    pub party_size: i64,

    pub side: Side,
    pub message: Option<String>,
    pub dietary_restrictions: Option<String>,
    pub needs_accommodation: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identified for Guest {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Fields submitted for a new guest.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewGuest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub attending: bool,
    #[serde(rename = "guests")]
    pub party_size: i64,
    pub side: Side,
    pub message: Option<String>,
    pub dietary_restrictions: Option<String>,
    pub needs_accommodation: bool,
}

impl NewGuest {
    pub fn into_guest(self, id: String, now: DateTime<Utc>) -> Guest {
        Guest {
            id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            attending: self.attending,
            party_size: self.party_size,
            side: self.side,
            message: self.message,
            dietary_restrictions: self.dietary_restrictions,
            needs_accommodation: self.needs_accommodation,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update. `None` leaves a field untouched; for the optional text
/// fields `Some(None)` clears the value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GuestPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub attending: Option<bool>,
    pub party_size: Option<i64>,
    pub side: Option<Side>,
    pub message: Option<Option<String>>,
    pub dietary_restrictions: Option<Option<String>>,
    pub needs_accommodation: Option<bool>,
}

impl GuestPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the patch in place and bump `updated_at`.
    pub fn apply(&self, guest: &mut Guest, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            guest.name = name.clone();
        }
        if let Some(email) = &self.email {
            guest.email = email.clone();
        }
        if let Some(phone) = &self.phone {
            guest.phone = phone.clone();
        }
        if let Some(attending) = self.attending {
            guest.attending = attending;
        }
        if let Some(size) = self.party_size {
            guest.party_size = size;
        }
        if let Some(side) = self.side {
            guest.side = side;
        }
        if let Some(message) = &self.message {
            guest.message = message.clone();
        }
        if let Some(dietary) = &self.dietary_restrictions {
            guest.dietary_restrictions = dietary.clone();
        }
        if let Some(accommodation) = self.needs_accommodation {
            guest.needs_accommodation = accommodation;
        }
        guest.updated_at = now;
    }
}

/// A resubmitted RSVP overwrites every field of the matched guest.
impl From<&NewGuest> for GuestPatch {
    fn from(new: &NewGuest) -> Self {
        Self {
            name: Some(new.name.clone()),
            email: Some(new.email.clone()),
            phone: Some(new.phone.clone()),
            attending: Some(new.attending),
            party_size: Some(new.party_size),
            side: Some(new.side),
            message: Some(new.message.clone()),
            dietary_restrictions: Some(new.dietary_restrictions.clone()),
            needs_accommodation: Some(new.needs_accommodation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewGuest {
        NewGuest {
            name: "Jane Doe".into(),
            email: "jane@x.com".into(),
            phone: "9999999999".into(),
            attending: true,
            party_size: 2,
            side: Side::Bride,
            message: Some("See you there".into()),
            dietary_restrictions: None,
            needs_accommodation: false,
        }
    }

    #[test]
    fn patch_from_new_guest_overwrites_everything() {
        let now = Utc::now();
        let mut guest = sample().into_guest("g1".into(), now);

        let mut resubmitted = sample();
        resubmitted.attending = false;
        resubmitted.message = None;
        GuestPatch::from(&resubmitted).apply(&mut guest, now);

        assert!(!guest.attending);
        assert_eq!(guest.message, None);
        assert_eq!(guest.id, "g1");
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(GuestPatch::default().is_empty());
        let patch = GuestPatch {
            attending: Some(false),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn party_size_serializes_as_guests() {
        let guest = sample().into_guest("g1".into(), Utc::now());
        let json = serde_json::to_value(&guest).unwrap();
        assert_eq!(json["guests"], 2);
        assert_eq!(json["side"], "bride");
    }
}
