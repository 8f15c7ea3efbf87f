//! The analysis service contract and its HTTP implementation.

use std::path::Path;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::{AnalysisResult, AuthMode, HistoryEntry},
    error::ApiErrorBody,
    protocol::{AuthResponse, CredentialsRequest, HistoryResponse},
};
use tracing::debug;

use crate::error::RemoteFailure;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
const DEFAULT_MEDIA_MIME: &str = "video/mp4";

/// A recorded meeting to be analyzed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl MediaFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        let filename = filename.into();
        let mime_type = guess_mime(&filename);
        Self {
            filename,
            mime_type,
            bytes,
        }
    }

    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "meeting.mp4".to_string());
        Ok(Self::new(filename, bytes))
    }
}

fn guess_mime(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_raw()
        .unwrap_or(DEFAULT_MEDIA_MIME)
        .to_string()
}

#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Logs in or signs up, returning the session identity.
    async fn authenticate(
        &self,
        mode: AuthMode,
        username: &str,
        password: &str,
    ) -> Result<String, RemoteFailure>;
    async fn submit_for_analysis(
        &self,
        user_id: &str,
        media: MediaFile,
    ) -> Result<AnalysisResult, RemoteFailure>;
    async fn fetch_history(&self, user_id: &str) -> Result<Vec<HistoryEntry>, RemoteFailure>;
}

pub struct HttpRemoteService {
    http: Client,
    base_url: String,
}

impl HttpRemoteService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RemoteFailure> {
        let status = response.status();
        if !status.is_success() {
            let body = match response.bytes().await {
                Ok(bytes) => serde_json::from_slice::<ApiErrorBody>(&bytes).ok(),
                Err(err) => {
                    debug!(error = %err, "remote: failed to read error body");
                    None
                }
            };
            return Err(RemoteFailure::status(status.as_u16(), body));
        }
        response
            .json::<T>()
            .await
            .map_err(|err| RemoteFailure::transport(format!("invalid response body: {err}")))
    }
}

impl Default for HttpRemoteService {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL)
    }
}

fn transport_failure(err: reqwest::Error) -> RemoteFailure {
    RemoteFailure::transport(err.to_string())
}

#[async_trait]
impl RemoteService for HttpRemoteService {
    async fn authenticate(
        &self,
        mode: AuthMode,
        username: &str,
        password: &str,
    ) -> Result<String, RemoteFailure> {
        let response = self
            .http
            .post(format!("{}/{}", self.base_url, mode.endpoint()))
            .json(&CredentialsRequest {
                username: username.to_string(),
                password: password.to_string(),
            })
            .send()
            .await
            .map_err(transport_failure)?;
        let body: AuthResponse = Self::decode(response).await?;
        Ok(body.user_id)
    }

    async fn submit_for_analysis(
        &self,
        user_id: &str,
        media: MediaFile,
    ) -> Result<AnalysisResult, RemoteFailure> {
        let size_bytes = media.bytes.len();
        let part = Part::bytes(media.bytes)
            .file_name(media.filename)
            .mime_str(&media.mime_type)
            .map_err(transport_failure)?;
        let form = Form::new()
            .text("user_id", user_id.to_string())
            .part("file", part);
        debug!(user_id, size_bytes, "remote: uploading media for analysis");
        let response = self
            .http
            .post(format!("{}/analyze", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(transport_failure)?;
        Self::decode(response).await
    }

    async fn fetch_history(&self, user_id: &str) -> Result<Vec<HistoryEntry>, RemoteFailure> {
        let response = self
            .http
            .get(format!("{}/history/{user_id}", self.base_url))
            .send()
            .await
            .map_err(transport_failure)?;
        let body: HistoryResponse = Self::decode(response).await?;
        Ok(body.history)
    }
}

#[cfg(test)]
#[path = "tests/remote_tests.rs"]
mod tests;
