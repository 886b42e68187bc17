//! GuestService: RSVP records with remote-first, local-fallback storage.

use super::{
    AppContext, ServiceResult, local_id, log_fallback, mirror_all, mirror_upsert,
    notifier::RsvpAlert,
};
use crate::{
    models::guest::{Guest, GuestPatch, NewGuest, Side},
    storage::local::CacheKey,
    validation::{
        ValidationError, normalize_email, phones_match, validate_new_guest, validate_phone,
    },
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

const DOMAIN: &str = "guests";

/// Result of an RSVP submission.
#[derive(Clone, Debug, PartialEq)]
pub enum RsvpOutcome {
    Created(Guest),
    Updated(Guest),
}

impl RsvpOutcome {
    pub fn guest(&self) -> &Guest {
        match self {
            RsvpOutcome::Created(guest) | RsvpOutcome::Updated(guest) => guest,
        }
    }

    pub fn is_update(&self) -> bool {
        matches!(self, RsvpOutcome::Updated(_))
    }
}

/// Headcount for the admin dashboard.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct GuestSummary {
    pub responses: usize,
    pub attending: usize,
    pub declined: usize,
    pub attending_headcount: i64,
    pub bride_side_headcount: i64,
    pub groom_side_headcount: i64,
    pub needs_accommodation: usize,
}

#[derive(Clone)]
pub struct GuestService {
    ctx: Arc<AppContext>,
}

impl GuestService {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// All guests. Never fails: a remote failure serves the local snapshot.
    pub async fn get_all(&self) -> Vec<Guest> {
        match self.ctx.direct("list_guests", |r| r.list_guests()).await {
            Ok(guests) => {
                mirror_all(&self.ctx.local, CacheKey::Guests, &guests).await;
                guests
            }
            Err(err) => {
                log_fallback(DOMAIN, "get_all", &err);
                self.ctx.local.get_all(CacheKey::Guests).await
            }
        }
    }

    pub async fn create(&self, new: NewGuest) -> ServiceResult<Guest> {
        let new = validate_new_guest(new)?;
        let remote_new = new.clone();
        match self
            .ctx
            .direct("insert_guest", move |r| r.insert_guest(remote_new))
            .await
        {
            Ok(guest) => {
                mirror_upsert(&self.ctx.local, CacheKey::Guests, &guest).await;
                Ok(guest)
            }
            Err(err) if err.should_fall_back() => {
                log_fallback(DOMAIN, "create", &err);
                let guest = new.into_guest(local_id(), Utc::now());
                self.ctx.local.append(CacheKey::Guests, guest.clone()).await?;
                Ok(guest)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Update guest `id`. A missing id is `NotFound` on either path.
    pub async fn update(&self, id: &str, patch: GuestPatch) -> ServiceResult<Guest> {
        let patch = validate_patch(patch)?;
        match self
            .ctx
            .direct("update_guest", |r| r.update_guest(id, &patch))
            .await
        {
            Ok(guest) => {
                mirror_upsert(&self.ctx.local, CacheKey::Guests, &guest).await;
                Ok(guest)
            }
            Err(err) if err.should_fall_back() => {
                log_fallback(DOMAIN, "update", &err);
                let now = Utc::now();
                let guest = self
                    .ctx
                    .local
                    .replace_one(CacheKey::Guests, id, |g: &mut Guest| patch.apply(g, now))
                    .await?;
                Ok(guest)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Best-effort delete; failures are logged, never returned.
    pub async fn delete(&self, id: &str) {
        match self.ctx.direct("delete_guest", |r| r.delete_guest(id)).await {
            Ok(removed) => debug!(id, removed, "deleted guest remotely"),
            Err(err) => log_fallback(DOMAIN, "delete", &err),
        }
        if let Err(err) = self
            .ctx
            .local
            .remove_one::<Guest>(CacheKey::Guests, id)
            .await
        {
            warn!(id, error = %err, "failed to delete guest locally");
        }
    }

    /// Validate an RSVP, then update the matching guest or create a new one.
    /// An alert is dispatched afterwards on a best-effort basis.
    pub async fn submit_rsvp(&self, form: NewGuest) -> ServiceResult<RsvpOutcome> {
        let form = validate_new_guest(form)?;
        let existing = self.get_all().await;

        let outcome = match find_match(&existing, &form) {
            Some(matched) => {
                info!(id = %matched.id, "RSVP matches an existing guest; updating");
                RsvpOutcome::Updated(self.update(&matched.id, GuestPatch::from(&form)).await?)
            }
            None => RsvpOutcome::Created(self.create(form).await?),
        };

        if let Some(notifier) = &self.ctx.notifier {
            let alert = RsvpAlert::for_guest(outcome.guest(), outcome.is_update());
            if let Err(err) = notifier.send_rsvp(&alert).await {
                warn!(error = %err, "failed to dispatch RSVP alert");
            }
        }
        Ok(outcome)
    }

    pub async fn summary(&self) -> GuestSummary {
        summarize(&self.get_all().await)
    }
}

fn validate_patch(mut patch: GuestPatch) -> Result<GuestPatch, ValidationError> {
    if let Some(name) = &patch.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::Missing("name"));
        }
        patch.name = Some(name.to_string());
    }
    if let Some(email) = &patch.email {
        patch.email = Some(normalize_email(email)?);
    }
    if let Some(phone) = &patch.phone {
        patch.phone = Some(validate_phone(phone)?);
    }
    if let Some(size) = patch.party_size {
        if size < 1 {
            return Err(ValidationError::PartySize(size));
        }
    }
    Ok(patch)
}

/// First existing guest whose name, email or phone matches the candidate.
/// Names and emails compare case-insensitively; phones ignore formatting and
/// a leading country code.
pub fn find_match<'a>(guests: &'a [Guest], candidate: &NewGuest) -> Option<&'a Guest> {
    let name = candidate.name.trim().to_lowercase();
    let email = candidate.email.trim().to_lowercase();

    guests.iter().find(|guest| {
        (!name.is_empty() && guest.name.trim().to_lowercase() == name)
            || (!email.is_empty() && guest.email.trim().to_lowercase() == email)
            || phones_match(&guest.phone, &candidate.phone)
    })
}

pub fn summarize(guests: &[Guest]) -> GuestSummary {
    guests.iter().fold(GuestSummary::default(), |mut summary, guest| {
        summary.responses += 1;
        if guest.attending {
            summary.attending += 1;
            summary.attending_headcount += guest.party_size;
            match guest.side {
                Side::Bride => summary.bride_side_headcount += guest.party_size,
                Side::Groom => summary.groom_side_headcount += guest.party_size,
            }
            if guest.needs_accommodation {
                summary.needs_accommodation += 1;
            }
        } else {
            summary.declined += 1;
        }
        summary
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        services::{ServiceError, test_support},
        storage::StorageError,
    };

    fn jane() -> NewGuest {
        NewGuest {
            name: "Jane Doe".into(),
            email: "jane@x.com".into(),
            phone: "9999999999".into(),
            attending: true,
            party_size: 2,
            side: Side::Bride,
            message: None,
            dietary_restrictions: None,
            needs_accommodation: false,
        }
    }

    #[tokio::test]
    async fn resubmission_by_email_updates_same_record() {
        let (ctx, _remote, _dir) = test_support::remote_context().await;
        let service = GuestService::new(ctx);

        let first = service.submit_rsvp(jane()).await.unwrap();
        assert!(!first.is_update());
        assert!(first.guest().attending);
        assert_eq!(first.guest().party_size, 2);
        assert_eq!(first.guest().side, Side::Bride);

        let mut again = jane();
        again.name = "J. Doe".into();
        again.phone = "1111111111".into();
        again.attending = false;
        let second = service.submit_rsvp(again).await.unwrap();

        assert!(second.is_update());
        assert_eq!(second.guest().id, first.guest().id);
        assert!(!second.guest().attending);

        let all = service.get_all().await;
        assert_eq!(all.len(), 1);
        assert!(!all[0].attending);
    }

    #[tokio::test]
    async fn resubmission_matches_offline_too() {
        let (ctx, _dir) = test_support::local_context().await;
        let service = GuestService::new(ctx);

        let first = service.submit_rsvp(jane()).await.unwrap();
        let mut again = jane();
        again.email = "other@x.com".into();
        again.phone = "+1 (999) 999-9999".into();
        again.name = "Someone Else".into();
        let second = service.submit_rsvp(again).await.unwrap();

        // matched on phone digits
        assert!(second.is_update());
        assert_eq!(second.guest().id, first.guest().id);
        assert_eq!(service.get_all().await.len(), 1);
    }

    #[tokio::test]
    async fn resubmission_matches_on_name_alone() {
        let (ctx, _remote, _dir) = test_support::remote_context().await;
        let service = GuestService::new(ctx);

        let first = service.submit_rsvp(jane()).await.unwrap();
        let mut again = jane();
        again.name = "  jane DOE ".into();
        again.email = "jd@elsewhere.org".into();
        again.phone = "5555555555".into();
        again.party_size = 4;
        let second = service.submit_rsvp(again).await.unwrap();

        assert!(second.is_update());
        assert_eq!(second.guest().id, first.guest().id);
        assert_eq!(second.guest().party_size, 4);
        assert_eq!(service.get_all().await.len(), 1);
    }

    #[tokio::test]
    async fn distinct_guests_are_not_merged() {
        let (ctx, _dir) = test_support::local_context().await;
        let service = GuestService::new(ctx);

        service.submit_rsvp(jane()).await.unwrap();
        let other = NewGuest {
            name: "Raj Kumar".into(),
            email: "raj@x.com".into(),
            phone: "+91 98765 43210".into(),
            ..jane()
        };
        let second = service.submit_rsvp(other).await.unwrap();

        assert!(!second.is_update());
        assert_eq!(service.get_all().await.len(), 2);
    }

    #[tokio::test]
    async fn remote_failure_serves_last_snapshot() {
        let (ctx, remote, _dir) = test_support::remote_context().await;
        let service = GuestService::new(ctx);

        let created = service.create(jane()).await.unwrap();
        assert_eq!(service.get_all().await.len(), 1);

        remote.close().await;
        let cached = service.get_all().await;
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0], created);
    }

    #[tokio::test]
    async fn created_guest_round_trips() {
        let (ctx, _remote, _dir) = test_support::remote_context().await;
        let service = GuestService::new(ctx);
        let mut form = jane();
        form.message = Some("Can't wait".into());
        form.dietary_restrictions = Some("vegetarian".into());
        form.needs_accommodation = true;

        let created = service.create(form.clone()).await.unwrap();
        let listed = service.get_all().await;
        let found = listed.iter().find(|g| g.id == created.id).unwrap();
        assert_eq!(found.name, form.name);
        assert_eq!(found.email, form.email);
        assert_eq!(found.phone, form.phone);
        assert_eq!(found.message, form.message);
        assert_eq!(found.dietary_restrictions, form.dietary_restrictions);
        assert!(found.needs_accommodation);
    }

    #[tokio::test]
    async fn local_update_of_missing_guest_is_not_found() {
        let (ctx, _dir) = test_support::local_context().await;
        let service = GuestService::new(ctx);
        let patch = GuestPatch {
            attending: Some(false),
            ..Default::default()
        };
        let err = service.update("nobody", patch).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Storage(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn remote_update_of_missing_guest_is_not_found() {
        let (ctx, _remote, _dir) = test_support::remote_context().await;
        let service = GuestService::new(ctx);
        let patch = GuestPatch {
            attending: Some(false),
            ..Default::default()
        };
        let err = service.update("nobody", patch).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Storage(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn invalid_rsvp_is_rejected_before_storage() {
        let (ctx, _dir) = test_support::local_context().await;
        let service = GuestService::new(ctx);
        let mut form = jane();
        form.email = "not-an-email".into();
        let err = service.submit_rsvp(form).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ValidationError::Email(_))));
        assert!(service.get_all().await.is_empty());
    }

    #[tokio::test]
    async fn delete_is_best_effort() {
        let (ctx, remote, _dir) = test_support::remote_context().await;
        let service = GuestService::new(ctx);
        let guest = service.create(jane()).await.unwrap();

        remote.close().await;
        service.delete(&guest.id).await;
        service.delete("never-existed").await;
        assert!(service.get_all().await.is_empty());
    }

    #[test]
    fn summary_counts_headcount_by_side() {
        let now = Utc::now();
        let mut groom = jane();
        groom.side = Side::Groom;
        groom.party_size = 3;
        groom.needs_accommodation = true;
        let mut declined = jane();
        declined.attending = false;

        let guests = vec![
            jane().into_guest("a".into(), now),
            groom.into_guest("b".into(), now),
            declined.into_guest("c".into(), now),
        ];
        let summary = summarize(&guests);
        assert_eq!(summary.responses, 3);
        assert_eq!(summary.attending, 2);
        assert_eq!(summary.declined, 1);
        assert_eq!(summary.attending_headcount, 5);
        assert_eq!(summary.bride_side_headcount, 2);
        assert_eq!(summary.groom_side_headcount, 3);
        assert_eq!(summary.needs_accommodation, 1);
    }
}
