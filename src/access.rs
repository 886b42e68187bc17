//! Date-gated access to the sub-event galleries.
//!
//! Evaluated once when a gallery is opened; there is no re-evaluation at
//! midnight, so a long-open view keeps its state until reopened.

use crate::models::event_photo::EventTag;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GalleryState {
    /// Before the event day.
    Locked,
    /// Event day, or any day with the admin override.
    Open { admin: bool },
    /// After the event, photos exist.
    ViewOnly,
    /// After the event, nothing was shared.
    Hidden,
}

impl GalleryState {
    pub fn evaluate(today: NaiveDate, event_day: NaiveDate, admin: bool, has_photos: bool) -> Self {
        if admin {
            return GalleryState::Open { admin: true };
        }
        if today < event_day {
            GalleryState::Locked
        } else if today == event_day {
            GalleryState::Open { admin: false }
        } else if has_photos {
            GalleryState::ViewOnly
        } else {
            GalleryState::Hidden
        }
    }

    pub fn can_upload(&self) -> bool {
        matches!(self, GalleryState::Open { .. })
    }

    pub fn can_view(&self) -> bool {
        matches!(self, GalleryState::Open { .. } | GalleryState::ViewOnly)
    }
}

/// Fixed dates of the sub-events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventCalendar {
    pub sangeet: NaiveDate,
    pub haldi: NaiveDate,
}

impl Default for EventCalendar {
    fn default() -> Self {
        Self {
            sangeet: NaiveDate::from_ymd_opt(2026, 12, 10).unwrap_or_default(),
            haldi: NaiveDate::from_ymd_opt(2026, 12, 11).unwrap_or_default(),
        }
    }
}

impl EventCalendar {
    pub fn day_of(&self, tag: EventTag) -> NaiveDate {
        match tag {
            EventTag::Sangeet => self.sangeet,
            EventTag::Haldi => self.haldi,
        }
    }
}

/// Numeric PIN that unlocks the admin override.
#[derive(Clone, Debug)]
pub struct AdminPin(String);

impl AdminPin {
    pub fn new(pin: impl Into<String>) -> Self {
        Self(pin.into())
    }

    pub fn verify(&self, attempt: &str) -> bool {
        let attempt = attempt.trim();
        !attempt.is_empty() && attempt.bytes().all(|b| b.is_ascii_digit()) && attempt == self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, d).unwrap()
    }

    #[test]
    fn state_machine_follows_the_calendar() {
        let event = day(20);
        assert_eq!(GalleryState::evaluate(day(19), event, false, false), GalleryState::Locked);
        assert_eq!(
            GalleryState::evaluate(day(20), event, false, false),
            GalleryState::Open { admin: false }
        );
        assert_eq!(GalleryState::evaluate(day(21), event, false, true), GalleryState::ViewOnly);
        assert_eq!(GalleryState::evaluate(day(21), event, false, false), GalleryState::Hidden);
    }

    #[test]
    fn admin_override_opens_early() {
        let state = GalleryState::evaluate(day(1), day(20), true, false);
        assert_eq!(state, GalleryState::Open { admin: true });
        assert!(state.can_upload());
    }

    #[test]
    fn view_only_cannot_upload() {
        assert!(GalleryState::ViewOnly.can_view());
        assert!(!GalleryState::ViewOnly.can_upload());
        assert!(!GalleryState::Hidden.can_view());
    }

    #[test]
    fn pin_must_match_and_be_numeric() {
        let pin = AdminPin::new("2580");
        assert!(pin.verify("2580"));
        assert!(pin.verify(" 2580 "));
        assert!(!pin.verify("2581"));
        assert!(!pin.verify(""));
        assert!(!AdminPin::new("abcd").verify("abcd"));
    }
}
