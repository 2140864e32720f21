//! Typed client for the question-answering backend.
//!
//! [`Backend`] is the seam between the interaction machines and the network:
//! controllers only ever talk to a `dyn Backend`, and [`ApiClient`] is the
//! `reqwest` implementation used by the CLI.
//!
//! # Endpoints
//!
//! | Method | Path | Auth |
//! |--------|------|------|
//! | `POST` | `/api/query` | none |
//! | `POST` | `/api/login` | none |
//! | `POST` | `/api/admin/upload` | bearer |
//! | `GET`  | `/api/admin/documents` | bearer |
//! | `DELETE` | `/api/admin/documents/{filename}` | bearer |
//! | `POST` | `/api/admin/rebuild-index` | bearer |
//! | `GET`  | `/api/admin/stats` | bearer |
//! | `POST` | `/api/admin/backup` | bearer |
//! | `GET`  | `/health` | none |
//!
//! # Error mapping
//!
//! - HTTP 401 → [`ApiError::Unauthorized`]
//! - other non-2xx → [`ApiError::Status`], message taken from the JSON
//!   `detail` field when the backend provides one
//! - no response → [`ApiError::Transport`]
//! - undecodable 2xx body → [`ApiError::Decode`]
//!
//! Requests are never retried: the backend makes no idempotency promise for
//! query, upload or delete.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::error::ApiError;
use crate::models::{
    Ack, Answer, BackupReceipt, Document, Health, IndexStats, LoginToken, Query, UploadResponse,
};
use crate::upload::UploadFile;

/// Every backend call the front ends make.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn query(&self, query: &Query) -> Result<Answer, ApiError>;
    async fn login(&self, username: &str, password: &str) -> Result<LoginToken, ApiError>;
    async fn upload(&self, token: &str, file: &UploadFile) -> Result<UploadResponse, ApiError>;
    async fn list_documents(&self, token: &str) -> Result<Vec<Document>, ApiError>;
    async fn delete_document(&self, token: &str, filename: &str) -> Result<Ack, ApiError>;
    async fn rebuild_index(&self, token: &str) -> Result<Ack, ApiError>;
    async fn stats(&self, token: &str) -> Result<IndexStats, ApiError>;
    async fn backup(&self, token: &str) -> Result<BackupReceipt, ApiError>;
    async fn health(&self) -> Result<Health, ApiError>;
}

/// HTTP implementation of [`Backend`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.http.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Self::with_client(http, &config.server.base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| anyhow::anyhow!("invalid backend url '{}': {}", base_url, e))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("invalid backend url '{}'", base_url);
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build `<base>/<segments...>`, percent-encoding each segment.
    pub fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str], token: Option<&str>) -> RequestBuilder {
        let url = self.url(segments);
        tracing::debug!(%method, %url, "backend request");
        let builder = self.http.request(method, url);
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl Backend for ApiClient {
    async fn query(&self, query: &Query) -> Result<Answer, ApiError> {
        let resp = self
            .request(Method::POST, &["api", "query"], None)
            .header("Content-Type", "application/json")
            .json(query)
            .send()
            .await?;
        decode(resp).await
    }

    async fn login(&self, username: &str, password: &str) -> Result<LoginToken, ApiError> {
        let resp = self
            .request(Method::POST, &["api", "login"], None)
            .query(&[("username", username), ("password", password)])
            .send()
            .await?;
        decode(resp).await
    }

    async fn upload(&self, token: &str, file: &UploadFile) -> Result<UploadResponse, ApiError> {
        let bytes = tokio::fs::read(&file.path)
            .await
            .map_err(|e| ApiError::Io(format!("{}: {}", file.path.display(), e)))?;
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file.filename.clone())
            .mime_str(file.mime_type())
            .map_err(|e| ApiError::Io(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .request(Method::POST, &["api", "admin", "upload"], Some(token))
            .multipart(form)
            .send()
            .await?;
        decode(resp).await
    }

    async fn list_documents(&self, token: &str) -> Result<Vec<Document>, ApiError> {
        let resp = self
            .request(Method::GET, &["api", "admin", "documents"], Some(token))
            .send()
            .await?;
        decode(resp).await
    }

    async fn delete_document(&self, token: &str, filename: &str) -> Result<Ack, ApiError> {
        let resp = self
            .request(
                Method::DELETE,
                &["api", "admin", "documents", filename],
                Some(token),
            )
            .send()
            .await?;
        decode(resp).await
    }

    async fn rebuild_index(&self, token: &str) -> Result<Ack, ApiError> {
        let resp = self
            .request(Method::POST, &["api", "admin", "rebuild-index"], Some(token))
            .send()
            .await?;
        decode(resp).await
    }

    async fn stats(&self, token: &str) -> Result<IndexStats, ApiError> {
        let resp = self
            .request(Method::GET, &["api", "admin", "stats"], Some(token))
            .send()
            .await?;
        decode(resp).await
    }

    async fn backup(&self, token: &str) -> Result<BackupReceipt, ApiError> {
        let resp = self
            .request(Method::POST, &["api", "admin", "backup"], Some(token))
            .send()
            .await?;
        decode(resp).await
    }

    async fn health(&self) -> Result<Health, ApiError> {
        let resp = self.request(Method::GET, &["health"], None).send().await?;
        decode(resp).await
    }
}

/// Turn a response into `T` or the matching [`ApiError`].
async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    let status = resp.status();
    let body = resp.bytes().await?;
    tracing::debug!(status = status.as_u16(), bytes = body.len(), "backend response");

    if !status.is_success() {
        return Err(status_error(status, &body));
    }

    // An empty acknowledgement decodes like `{}`.
    let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        &body
    };
    serde_json::from_slice(body).map_err(|e| ApiError::Decode(e.to_string()))
}

fn status_error(status: StatusCode, body: &[u8]) -> ApiError {
    let message = error_message(status, body);
    if status == StatusCode::UNAUTHORIZED {
        ApiError::Unauthorized(message)
    } else {
        ApiError::Status {
            status: status.as_u16(),
            message,
        }
    }
}

/// Extract a readable message: the FastAPI `detail` field when present
/// (string, or list of validation errors), otherwise the raw body text,
/// otherwise the canonical reason phrase.
pub fn error_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(json) = serde_json::from_slice::<serde_json::Value>(body) {
        match json.get("detail") {
            Some(serde_json::Value::String(s)) => return s.clone(),
            Some(serde_json::Value::Array(items)) => {
                let msgs: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                    .collect();
                if !msgs.is_empty() {
                    return msgs.join("; ");
                }
            }
            _ => {}
        }
        if let Some(s) = json
            .get("error")
            .and_then(|e| e.get("message").or(Some(e)))
            .and_then(|m| m.as_str())
        {
            return s.to_string();
        }
    }

    let text = String::from_utf8_lossy(body).trim().to_string();
    if !text.is_empty() && text.len() <= 500 {
        return text;
    }
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}
