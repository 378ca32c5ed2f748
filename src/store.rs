//! Object storage interface and the concrete GCS JSON API client.
//!
//! The trait is the seam between the sync engine and the remote store: real
//! runs use [`GcsStore`], tests use the generated `MockObjectStore`.

use async_trait::async_trait;
use mockall::automock;
use tracing::{debug, error};

/// One create-or-overwrite request: bytes plus the metadata the CDN needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObject {
    pub bucket: String,
    pub key: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub cache_control: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Credentials rejected. Fatal: retrying or moving on to the next
    /// object would fail identically.
    #[error("storage credentials rejected (status {status})")]
    Auth { status: u16 },
    /// Network trouble or a 5xx from the store; worth retrying.
    #[error("transient storage failure: {reason}")]
    Transient { reason: String },
    /// Anything else the store refused.
    #[error("storage request failed (status {status}): {body}")]
    Request { status: u16, body: String },
}

/// Capability interface of the remote store: upsert one object by key.
///
/// Upserts are idempotent at the store layer (one write per object, the key
/// addresses the object), so implementations need no cross-call state.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, req: PutObject) -> Result<(), StoreError>;
}

/// Google Cloud Storage client speaking the JSON API multipart upload.
pub struct GcsStore {
    client: reqwest::Client,
    token: String,
    api_base: String,
}

const UPLOAD_API_BASE: &str = "https://storage.googleapis.com/upload/storage/v1";
const MULTIPART_BOUNDARY: &str = "site-sync-multipart-77f1a0c4";

impl GcsStore {
    /// `token` is an OAuth2 bearer token obtained by the config layer; the
    /// store never reads the environment itself.
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            api_base: UPLOAD_API_BASE.to_string(),
        }
    }

    /// Point the client at a different endpoint (local fake in tests).
    pub fn with_api_base(token: String, api_base: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            api_base,
        }
    }

    /// The JSON API insert takes a `multipart/related` body: one JSON part
    /// with the object metadata, one part with the raw media.
    fn multipart_body(req: &PutObject) -> Vec<u8> {
        let metadata = serde_json::json!({
            "name": req.key,
            "contentType": req.content_type,
            "cacheControl": req.cache_control,
        });
        let mut body = Vec::with_capacity(req.bytes.len() + 512);
        body.extend_from_slice(
            format!(
                "--{MULTIPART_BOUNDARY}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(
            format!(
                "--{MULTIPART_BOUNDARY}\r\nContent-Type: {}\r\n\r\n",
                req.content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(&req.bytes);
        body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
        body
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn put_object(&self, req: PutObject) -> Result<(), StoreError> {
        let url = format!("{}/b/{}/o", self.api_base, req.bucket);
        let body = Self::multipart_body(&req);
        debug!(bucket = %req.bucket, key = %req.key, size = req.bytes.len(), "PUT object");

        let response = self
            .client
            .post(&url)
            .query(&[("uploadType", "multipart")])
            .bearer_auth(&self.token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={MULTIPART_BOUNDARY}"),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| StoreError::Transient {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        error!(key = %req.key, status = status.as_u16(), "Object upload rejected");
        match status.as_u16() {
            401 | 403 => Err(StoreError::Auth {
                status: status.as_u16(),
            }),
            408 | 429 | 500..=599 => Err(StoreError::Transient {
                reason: format!("status {status}: {body}"),
            }),
            other => Err(StoreError::Request { status: other, body }),
        }
    }
}

impl StoreError {
    /// Transient failures may be retried; auth and plain rejections not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Transient { .. })
    }
}
