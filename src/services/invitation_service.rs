//! InvitationService: the single downloadable invitation PDF.
//!
//! Uploads replace whatever was there. Locally the invitation is one value,
//! not a collection.

use super::{AppContext, ServiceResult, local_id, log_fallback};
use crate::{
    deployment::RemotePath,
    models::invitation::{Invitation, InvitationUpload, NewInvitation},
    payload::{checksum, encode_data_url},
    storage::{StorageResult, local::CacheKey},
    validation::validate_invitation,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

const DOMAIN: &str = "invitation";

#[derive(Clone)]
pub struct InvitationService {
    ctx: Arc<AppContext>,
}

impl InvitationService {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// The current invitation, if any. Never fails.
    pub async fn get(&self) -> Option<Invitation> {
        let fetched = match self.ctx.remote_path {
            RemotePath::Gateway => {
                self.ctx
                    .via_gateway("get_invitation", |g| g.get_invitation())
                    .await
            }
            RemotePath::Direct => {
                self.ctx
                    .direct("current_invitation", |r| r.current_invitation())
                    .await
            }
        };

        match fetched {
            Ok(Some(invitation)) => {
                self.mirror(&invitation).await;
                Some(invitation)
            }
            Ok(None) => {
                // Remote is authoritative: nothing there means nothing here.
                if let Err(err) = self.ctx.local.remove(CacheKey::Invitation).await {
                    warn!(error = %err, "failed to clear cached invitation");
                }
                None
            }
            Err(err) => {
                log_fallback(DOMAIN, "get", &err);
                self.ctx.local.get_value(CacheKey::Invitation).await
            }
        }
    }

    /// Validate and store a new invitation, replacing the previous one.
    pub async fn upload(&self, upload: InvitationUpload) -> ServiceResult<Invitation> {
        validate_invitation(&upload, &self.ctx.limits)?;
        let new = NewInvitation {
            file_data: encode_data_url(&upload.content_type, &upload.bytes),
            file_name: upload.file_name.clone(),
            checksum: checksum(&upload.bytes),
        };

        let stored: StorageResult<Invitation> = match self.ctx.remote_path {
            RemotePath::Gateway => {
                self.ctx
                    .via_gateway("upload_invitation", |g| g.upload_invitation(&upload))
                    .await
            }
            RemotePath::Direct => {
                let remote_new = new.clone();
                self.ctx
                    .direct("replace_invitation", move |r| {
                        r.replace_invitation(remote_new)
                    })
                    .await
            }
        };

        match stored {
            Ok(invitation) => {
                info!(checksum = %invitation.checksum, "invitation replaced");
                self.mirror(&invitation).await;
                Ok(invitation)
            }
            Err(err) if err.should_fall_back() => {
                log_fallback(DOMAIN, "upload", &err);
                let invitation = new.into_invitation(local_id(), Utc::now());
                self.ctx
                    .local
                    .put_value(CacheKey::Invitation, &invitation)
                    .await?;
                Ok(invitation)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Best-effort delete of the remote and cached copies.
    pub async fn delete(&self) {
        let removed = match self.ctx.remote_path {
            RemotePath::Gateway => {
                self.ctx
                    .via_gateway("delete_invitation", |g| g.delete_invitation())
                    .await
            }
            RemotePath::Direct => self
                .ctx
                .direct("delete_invitations", |r| r.delete_invitations())
                .await
                .map(|count| {
                    debug!(count, "deleted invitations remotely");
                }),
        };
        if let Err(err) = removed {
            log_fallback(DOMAIN, "delete", &err);
        }
        if let Err(err) = self.ctx.local.remove(CacheKey::Invitation).await {
            warn!(error = %err, "failed to delete cached invitation");
        }
    }

    async fn mirror(&self, invitation: &Invitation) {
        let result = self
            .ctx
            .local
            .put_value(CacheKey::Invitation, invitation)
            .await;
        if let Err(err) = result {
            warn!(error = %err, "failed to mirror invitation locally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        payload::decode_data_url,
        services::{ServiceError, test_support},
        validation::ValidationError,
    };
    use bytes::Bytes;

    fn pdf(body: &'static [u8]) -> InvitationUpload {
        InvitationUpload {
            file_name: Some("invite.pdf".into()),
            content_type: "application/pdf".into(),
            bytes: Bytes::from_static(body),
        }
    }

    #[tokio::test]
    async fn repeated_uploads_leave_exactly_one() {
        let (ctx, remote, _dir) = test_support::remote_context().await;
        let service = InvitationService::new(ctx);

        service.upload(pdf(b"%PDF-1.4 first")).await.unwrap();
        let second = service.upload(pdf(b"%PDF-1.4 second")).await.unwrap();

        assert_eq!(remote.count_invitations().await.unwrap(), 1);
        let current = service.get().await.unwrap();
        assert_eq!(current.id, second.id);
        assert_eq!(current.checksum, checksum(b"%PDF-1.4 second"));
    }

    #[tokio::test]
    async fn offline_upload_is_cached_and_decodable() {
        let (ctx, _dir) = test_support::local_context().await;
        let service = InvitationService::new(ctx);
        let stored = service.upload(pdf(b"%PDF-1.7 hello")).await.unwrap();
        assert!(stored.id.starts_with("local-"));

        let cached = service.get().await.unwrap();
        let (content_type, bytes) = decode_data_url(&cached.file_data).unwrap();
        assert_eq!(content_type, "application/pdf");
        assert_eq!(bytes, b"%PDF-1.7 hello");
    }

    #[tokio::test]
    async fn non_pdf_is_rejected() {
        let (ctx, _dir) = test_support::local_context().await;
        let service = InvitationService::new(ctx);
        let mut upload = pdf(b"GIF89a");
        upload.content_type = "image/gif".into();

        let err = service.upload(upload).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ValidationError::FileType(_))));
        assert!(service.get().await.is_none());
    }

    #[tokio::test]
    async fn remote_empty_clears_stale_cache() {
        let (ctx, remote, _dir) = test_support::remote_context().await;
        let service = InvitationService::new(ctx.clone());
        service.upload(pdf(b"%PDF old")).await.unwrap();
        remote.delete_invitations().await.unwrap();

        assert!(service.get().await.is_none());
        assert!(
            ctx.local
                .get_value::<Invitation>(CacheKey::Invitation)
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn remote_outage_serves_cached_invitation() {
        let (ctx, remote, _dir) = test_support::remote_context().await;
        let service = InvitationService::new(ctx);
        let stored = service.upload(pdf(b"%PDF-1.5 cached")).await.unwrap();
        assert!(!stored.id.starts_with("local-"));

        remote.close().await;
        let cached = service.get().await.unwrap();
        assert_eq!(cached, stored);
        let (_, bytes) = decode_data_url(&cached.file_data).unwrap();
        assert_eq!(bytes, b"%PDF-1.5 cached");
    }

    #[tokio::test]
    async fn delete_removes_both_copies() {
        let (ctx, remote, _dir) = test_support::remote_context().await;
        let service = InvitationService::new(ctx);
        service.upload(pdf(b"%PDF bye")).await.unwrap();
        service.delete().await;

        assert_eq!(remote.count_invitations().await.unwrap(), 0);
        remote.close().await;
        assert!(service.get().await.is_none());
    }
}
