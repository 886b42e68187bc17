//! Domain services and the context they share.
//!
//! Every service call picks a backend the same way: try the remote path for
//! this deployment once, with a bounded timeout, and fall back to the local
//! cache when the error says the remote is unavailable. Successful remote
//! results are mirrored into the local cache.

pub mod analytics;
pub mod diagnostics;
pub mod event_photo_service;
pub mod guest_service;
pub mod invitation_service;
pub mod notifier;
pub mod photo_feed;
pub mod photo_service;
pub mod timeline_service;

use crate::{
    access::{AdminPin, EventCalendar, GalleryState},
    config::AppConfig,
    deployment::RemotePath,
    models::Identified,
    storage::{
        StorageError, StorageResult,
        gateway::GatewayClient,
        local::{CacheKey, LocalStore},
        remote::{RemoteClient, is_placeholder},
    },
    validation::{UploadLimits, ValidationError},
};
use chrono::Utc;
use notifier::Notifier;
use serde::{Serialize, de::DeserializeOwned};
use std::{future::Future, time::Duration};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("all {attempted} uploads failed")]
    UploadFailed { attempted: usize },
    #[error("gallery is {0:?}; uploads are closed")]
    GalleryClosed(GalleryState),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Everything a domain service needs, built once at startup.
pub struct AppContext {
    pub remote: Option<RemoteClient>,
    pub gateway: Option<GatewayClient>,
    pub local: LocalStore,
    pub remote_path: RemotePath,
    pub limits: UploadLimits,
    pub remote_timeout: Duration,
    pub notifier: Option<Notifier>,
    pub calendar: EventCalendar,
    pub admin_pin: AdminPin,
}

impl AppContext {
    /// A local-only context with default settings.
    pub fn new(local: LocalStore) -> Self {
        Self {
            remote: None,
            gateway: None,
            local,
            remote_path: RemotePath::Direct,
            limits: UploadLimits::default(),
            remote_timeout: Duration::from_secs(5),
            notifier: None,
            calendar: EventCalendar::default(),
            admin_pin: AdminPin::new("2580"),
        }
    }

    pub fn with_remote(mut self, remote: RemoteClient) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_gateway(mut self, gateway: GatewayClient) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn with_remote_path(mut self, path: RemotePath) -> Self {
        self.remote_path = path;
        self
    }

    pub fn with_limits(mut self, limits: UploadLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_calendar(mut self, calendar: EventCalendar) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn with_admin_pin(mut self, pin: AdminPin) -> Self {
        self.admin_pin = pin;
        self
    }

    /// Build the context from resolved configuration. Missing remote
    /// settings are not an error; they leave that path disabled.
    pub async fn from_config(cfg: &AppConfig) -> StorageResult<Self> {
        let local = LocalStore::open(&cfg.local_dir).await?;
        let remote_path = cfg.remote_path();
        let remote = RemoteClient::connect(cfg.database_url.as_deref()).await;

        let gateway = match cfg.gateway_url.as_deref() {
            Some(url) if !is_placeholder(url) => Some(GatewayClient::new(url, cfg.remote_timeout)?),
            _ => None,
        };
        if remote_path == RemotePath::Gateway && gateway.is_none() {
            warn!("gateway deployment detected but no gateway URL configured");
        }

        // RSVP alerts go straight to the webhook when we have one, otherwise
        // through the gateway's dispatch endpoint.
        let notifier = match (&cfg.notify_webhook, &gateway) {
            (Some(hook), _) => Some(Notifier::new(hook, cfg.remote_timeout)?),
            (None, Some(gateway)) => Some(Notifier::new(
                &format!("{}/api/notify/rsvp", gateway.base_url()),
                cfg.remote_timeout,
            )?),
            (None, None) => None,
        };

        let mut ctx = Self::new(local)
            .with_remote_path(remote_path)
            .with_limits(cfg.limits)
            .with_timeout(cfg.remote_timeout)
            .with_calendar(cfg.calendar)
            .with_admin_pin(AdminPin::new(cfg.admin_pin.clone()));
        ctx.remote = remote;
        ctx.gateway = gateway;
        ctx.notifier = notifier;
        Ok(ctx)
    }

    /// One bounded attempt against the remote datastore.
    pub(crate) async fn direct<'a, T, F, Fut>(&'a self, op: &'static str, f: F) -> StorageResult<T>
    where
        F: FnOnce(&'a RemoteClient) -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        let remote = self.remote.as_ref().ok_or(StorageError::RemoteDisabled)?;
        tokio::time::timeout(self.remote_timeout, f(remote))
            .await
            .unwrap_or(Err(StorageError::Timeout {
                op,
                after: self.remote_timeout,
            }))
    }

    /// One bounded attempt against the HTTP gateway.
    pub(crate) async fn via_gateway<'a, T, F, Fut>(
        &'a self,
        op: &'static str,
        f: F,
    ) -> StorageResult<T>
    where
        F: FnOnce(&'a GatewayClient) -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        let gateway = self.gateway.as_ref().ok_or(StorageError::GatewayDisabled)?;
        tokio::time::timeout(self.remote_timeout, f(gateway))
            .await
            .unwrap_or(Err(StorageError::Timeout {
                op,
                after: self.remote_timeout,
            }))
    }
}

/// Log a remote failure that is about to be served from the local cache.
pub(crate) fn log_fallback(domain: &'static str, op: &'static str, err: &StorageError) {
    if err.is_disabled() {
        debug!(domain, op, "remote disabled; using local cache");
    } else {
        warn!(domain, op, error = %err, "remote unavailable; using local cache");
    }
}

/// Timestamp-derived identifier for records created while offline.
pub(crate) fn local_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("local-{}-{}", Utc::now().timestamp_millis(), &suffix[..8])
}

/// Insert or replace `item` in a mirrored collection. Mirror failures are
/// logged; the remote result is still the answer.
pub(crate) async fn mirror_upsert<T>(local: &LocalStore, key: CacheKey, item: &T)
where
    T: Serialize + DeserializeOwned + Identified + Clone,
{
    let result = local
        .update(key, |items: &mut Vec<T>| {
            match items.iter_mut().find(|existing| existing.id() == item.id()) {
                Some(existing) => *existing = item.clone(),
                None => items.push(item.clone()),
            }
        })
        .await;
    if let Err(err) = result {
        warn!(key = key.as_str(), error = %err, "failed to mirror record locally");
    }
}

/// Replace a mirrored collection with a fresh remote snapshot.
pub(crate) async fn mirror_all<T: Serialize>(local: &LocalStore, key: CacheKey, items: &[T]) {
    if let Err(err) = local.put_all(key, items).await {
        warn!(key = key.as_str(), error = %err, "failed to mirror snapshot locally");
    }
}

/// Trim optional free text, mapping blanks to `None`.
pub(crate) fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Context with no remote configured.
    pub async fn local_context() -> (Arc<AppContext>, TempDir) {
        let dir = TempDir::new().unwrap();
        let local = LocalStore::open(dir.path()).await.unwrap();
        (Arc::new(AppContext::new(local)), dir)
    }

    pub async fn memory_remote() -> RemoteClient {
        let remote = RemoteClient::connect_url("sqlite::memory:").await.unwrap();
        remote.migrate().await.unwrap();
        remote
    }

    /// Context backed by a fresh in-memory remote datastore.
    pub async fn remote_context() -> (Arc<AppContext>, RemoteClient, TempDir) {
        let dir = TempDir::new().unwrap();
        let local = LocalStore::open(dir.path()).await.unwrap();
        let remote = memory_remote().await;
        let ctx = AppContext::new(local).with_remote(remote.clone());
        (Arc::new(ctx), remote, dir)
    }
}
