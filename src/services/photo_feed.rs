//! Background photo polling for open galleries.
//!
//! Refreshes on a fixed interval and whenever a local photo write is
//! broadcast. The latest snapshot is published on a `watch` channel; receivers
//! only wake when the snapshot actually changed.

use super::photo_service::PhotoService;
use crate::models::photo::Photo;
use std::time::Duration;
use tokio::{
    sync::{broadcast::error::RecvError, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct PhotoFeed {
    rx: watch::Receiver<Vec<Photo>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PhotoFeed {
    /// Start polling. Must be called inside a tokio runtime.
    pub fn spawn(service: PhotoService, interval: Duration) -> Self {
        let (tx, rx) = watch::channel(Vec::new());
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let mut writes = service.subscribe();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut listening = true;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                    event = writes.recv(), if listening => match event {
                        Ok(event) => debug!(key = event.key.as_str(), "photo write observed"),
                        Err(RecvError::Lagged(skipped)) => debug!(skipped, "photo feed lagged"),
                        Err(RecvError::Closed) => listening = false,
                    },
                }

                let photos = service.get_all().await;
                tx.send_if_modified(|current| {
                    if *current == photos {
                        false
                    } else {
                        *current = photos;
                        true
                    }
                });
            }
            info!("photo feed stopped");
        });

        Self {
            rx,
            cancel,
            task: Some(task),
        }
    }

    /// Most recent snapshot, newest photo first.
    pub fn latest(&self) -> Vec<Photo> {
        self.rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Photo>> {
        self.rx.clone()
    }

    /// Stop polling and wait for the task to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PhotoFeed {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::photo::{PhotoUpload, Uploader}, services::test_support};
    use bytes::Bytes;

    fn upload() -> PhotoUpload {
        PhotoUpload {
            file_name: None,
            content_type: "image/jpeg".into(),
            bytes: Bytes::from_static(b"\xff\xd8\xff"),
            uploader: Uploader::guest("Priya"),
            message: None,
        }
    }

    #[tokio::test]
    async fn local_write_wakes_the_feed() {
        let (ctx, _dir) = test_support::local_context().await;
        let service = PhotoService::new(ctx);
        let feed = PhotoFeed::spawn(service.clone(), Duration::from_secs(3600));
        let mut rx = feed.subscribe();

        service.upload(upload()).await.unwrap();

        let seen = tokio::time::timeout(
            Duration::from_secs(5),
            rx.wait_for(|photos| photos.len() == 1),
        )
        .await
        .expect("feed did not refresh")
        .unwrap()
        .clone();
        assert_eq!(seen[0].uploader.display_name(), Some("Priya"));
        assert_eq!(feed.latest().len(), 1);

        feed.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_closes_the_channel() {
        let (ctx, _dir) = test_support::local_context().await;
        let feed = PhotoFeed::spawn(PhotoService::new(ctx), Duration::from_millis(10));
        let mut rx = feed.subscribe();
        feed.shutdown().await;

        // Sender dropped with the task; pending changes drain, then error.
        while rx.changed().await.is_ok() {}
        assert!(rx.has_changed().is_err());
    }
}
