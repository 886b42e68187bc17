//! HTTP client for the remote function gateway.
//!
//! Used instead of the direct datastore when the deployment can only reach
//! the datastore through server-side functions. One bounded attempt per
//! call, no retries; any non-2xx status becomes `StorageError::Gateway`.

use super::{StorageError, StorageResult};
use crate::models::{
    invitation::{Invitation, InvitationUpload},
    photo::{NewPhoto, Photo, is_image_reference},
};
use reqwest::{Client, Response, StatusCode, multipart};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone, Debug)]
pub struct GatewayClient {
    http: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    code: Option<String>,
}

/// Turn a non-2xx response into a structured error.
pub(crate) async fn check_response(response: Response) -> StorageResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let (message, code) = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => (body.error, body.code),
        Err(_) if text.is_empty() => (status.to_string(), None),
        Err(_) => (text, None),
    };
    Err(StorageError::Gateway {
        status: status.as_u16(),
        code,
        message,
    })
}

impl GatewayClient {
    pub fn new(base_url: &str, timeout: Duration) -> StorageResult<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn health(&self) -> StorageResult<()> {
        let response = self.http.get(self.url("/healthz")).send().await?;
        check_response(response).await?;
        Ok(())
    }

    /// List photos, dropping entries that are not photo-shaped or whose
    /// payload is not a renderable image reference.
    pub async fn list_photos(&self) -> StorageResult<Vec<Photo>> {
        let response = self.http.get(self.url("/api/photos")).send().await?;
        let body: serde_json::Value = check_response(response).await?.json().await?;

        let entries = body
            .get("photos")
            .and_then(|photos| photos.as_array())
            .ok_or_else(|| StorageError::Malformed("expected a `photos` array".into()))?;

        let mut photos = Vec::with_capacity(entries.len());
        for entry in entries {
            match serde_json::from_value::<Photo>(entry.clone()) {
                Ok(photo) if is_image_reference(&photo.image_url) => photos.push(photo),
                Ok(photo) => debug!(id = %photo.id, "skipping photo without image payload"),
                Err(err) => warn!(error = %err, "skipping malformed photo from gateway"),
            }
        }
        Ok(photos)
    }

    pub async fn upload_photo(&self, photo: &NewPhoto) -> StorageResult<Photo> {
        let response = self
            .http
            .post(self.url("/api/photos"))
            .json(photo)
            .send()
            .await?;
        let created = check_response(response).await?.json::<Photo>().await?;
        Ok(created)
    }

    /// The current invitation, `None` when the gateway reports 404.
    pub async fn get_invitation(&self) -> StorageResult<Option<Invitation>> {
        let response = self.http.get(self.url("/api/invitation")).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let invitation = check_response(response).await?.json::<Invitation>().await?;
        Ok(Some(invitation))
    }

    pub async fn upload_invitation(&self, upload: &InvitationUpload) -> StorageResult<Invitation> {
        let mut part =
            multipart::Part::bytes(upload.bytes.to_vec()).mime_str(&upload.content_type)?;
        if let Some(name) = &upload.file_name {
            part = part.file_name(name.clone());
        }
        let form = multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(self.url("/api/invitation"))
            .multipart(form)
            .send()
            .await?;
        let created = check_response(response).await?.json::<Invitation>().await?;
        Ok(created)
    }

    pub async fn delete_invitation(&self) -> StorageResult<()> {
        let response = self.http.delete(self.url("/api/invitation")).send().await?;
        check_response(response).await?;
        Ok(())
    }
}
