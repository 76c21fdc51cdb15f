use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    error::ApiError,
    protocol::{AskRequest, AskResponse, HealthResponse, InitializeResponse, ReloadResponse},
};
use tracing::debug;
use url::Url;

use crate::{error::ClientError, upload::ResumeUpload};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// The resume assistant backend as seen by a chat session.
#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn initialize(&self) -> Result<InitializeResponse, ClientError>;
    async fn ask(&self, question: &str) -> Result<AskResponse, ClientError>;
    async fn reload(&self, upload: ResumeUpload) -> Result<ReloadResponse, ClientError>;
    async fn health(&self) -> Result<HealthResponse, ClientError>;
    /// Base URL shown in connection failure messages.
    fn base_url(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendTimeouts {
    pub request: Duration,
    pub connect: Duration,
}

impl Default for BackendTimeouts {
    fn default() -> Self {
        Self {
            request: DEFAULT_REQUEST_TIMEOUT,
            connect: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

pub struct HttpBackend {
    http: Client,
    base_url: Url,
    display_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_timeouts(base_url, BackendTimeouts::default())
    }

    pub fn with_timeouts(base_url: &str, timeouts: BackendTimeouts) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(timeouts.request)
            .connect_timeout(timeouts.connect)
            .build()?;
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
            display_url: base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|source| ClientError::InvalidBaseUrl {
                url: self.display_url.clone(),
                source,
            })
    }
}

/// Parses the base URL and forces a trailing slash so joins keep any path prefix.
pub fn normalize_base_url(raw: &str) -> Result<Url, ClientError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    Url::parse(&with_slash).map_err(|source| ClientError::InvalidBaseUrl {
        url: trimmed.to_string(),
        source,
    })
}

async fn decode_response<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    let body = response.bytes().await?;
    if status.is_success() {
        return Ok(serde_json::from_slice(&body)?);
    }

    let detail = serde_json::from_slice::<ApiError>(&body)
        .map(|err| err.detail_text())
        .unwrap_or_else(|_| format!("request failed with status {}", status.as_u16()));
    Err(ClientError::Backend {
        status: status.as_u16(),
        detail,
    })
}

#[async_trait]
impl BackendClient for HttpBackend {
    async fn initialize(&self) -> Result<InitializeResponse, ClientError> {
        let url = self.endpoint("initialize")?;
        debug!(%url, "backend: POST /initialize");
        let response = self.http.post(url).send().await?;
        decode_response(response).await
    }

    async fn ask(&self, question: &str) -> Result<AskResponse, ClientError> {
        let url = self.endpoint("ask")?;
        debug!(%url, question_len = question.len(), "backend: POST /ask");
        let response = self
            .http
            .post(url)
            .json(&AskRequest {
                question: question.to_string(),
            })
            .send()
            .await?;
        decode_response(response).await
    }

    async fn reload(&self, upload: ResumeUpload) -> Result<ReloadResponse, ClientError> {
        let url = self.endpoint("reload")?;
        debug!(
            %url,
            filename = %upload.filename,
            size_bytes = upload.bytes.len(),
            "backend: POST /reload"
        );
        let mut part = multipart::Part::bytes(upload.bytes).file_name(upload.filename);
        if let Some(mime_type) = upload.mime_type.as_deref() {
            part = part.mime_str(mime_type)?;
        }
        let form = multipart::Form::new().part("file", part);
        let response = self.http.post(url).multipart(form).send().await?;
        decode_response(response).await
    }

    async fn health(&self) -> Result<HealthResponse, ClientError> {
        let url = self.endpoint("health")?;
        let response = self.http.get(url).send().await?;
        decode_response(response).await
    }

    fn base_url(&self) -> &str {
        &self.display_url
    }
}

#[cfg(test)]
#[path = "tests/backend_tests.rs"]
mod tests;
