//! HTTP transport for the recognition endpoint.
//!
//! The client talks to a [`Transport`] so the retry logic can be driven by
//! a scripted fake in tests; [`HttpTransport`] is the real reqwest one.

use super::sign::SignedHeaders;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One fully signed multipart upload.
#[derive(Debug, Clone)]
pub struct Upload {
    pub endpoint: String,
    pub headers: SignedHeaders,
    /// Extra form fields; these are also part of the signature.
    pub fields: BTreeMap<String, String>,
    pub file_name: String,
    pub image: Vec<u8>,
}

/// Status and raw body of whatever the server answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{0}")]
    Network(String),

    #[error("timeout of {}ms exceeded", .0.as_millis())]
    Timeout(Duration),

    #[error("Failed to build request: {0}")]
    Build(String),
}

pub trait Transport: Send + Sync {
    fn send(&self, upload: &Upload) -> impl Future<Output = Result<HttpReply, TransportError>> + Send;
}

pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;
        Ok(Self { client, timeout })
    }
}

impl Transport for HttpTransport {
    async fn send(&self, upload: &Upload) -> Result<HttpReply, TransportError> {
        let part = reqwest::multipart::Part::bytes(upload.image.clone())
            .file_name(upload.file_name.clone())
            .mime_str("image/png")
            .map_err(|e| TransportError::Build(e.to_string()))?;

        let mut form = reqwest::multipart::Form::new().part("file", part);
        for (key, value) in &upload.fields {
            form = form.text(key.clone(), value.clone());
        }

        let mut request = self.client.post(&upload.endpoint).multipart(form);
        for (name, value) in upload.headers.as_pairs() {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout)
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(HttpReply { status, body })
    }
}
