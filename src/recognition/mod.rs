//! Formula recognition: signed upload of a captured image to the remote
//! OCR endpoint, with bounded retry on rate limiting.
//!
//! Every outcome is a [`RecognitionResult`] value; nothing here returns an
//! error or panics across the module boundary.

mod client;
pub mod sign;
pub mod transport;

pub use client::{RecognitionClient, RetryPolicy};
pub use transport::{HttpReply, HttpTransport, Transport, TransportError, Upload};

use serde::{Deserialize, Serialize};

pub const DEFAULT_ENDPOINT: &str = "https://server.simpletex.cn/api/latex_ocr";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCredentials {
    pub app_id: String,
    pub app_secret: String,
    #[serde(default)]
    pub endpoint: String,
}

impl ApiCredentials {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            endpoint: String::new(),
        }
    }

    /// Both id and secret present after trimming.
    pub fn is_complete(&self) -> bool {
        !self.app_id.trim().is_empty() && !self.app_secret.trim().is_empty()
    }

    pub fn endpoint(&self) -> &str {
        match self.endpoint.trim() {
            "" => DEFAULT_ENDPOINT,
            e => e,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureCode {
    /// Credentials are missing; the caller should open the API settings
    /// instead of offering a retry.
    #[serde(rename = "NO_API_CONFIG")]
    NoApiConfig,
}

impl FailureCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCode::NoApiConfig => "NO_API_CONFIG",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RecognitionResult {
    Success {
        markup: String,
        confidence: f64,
    },
    Failure {
        message: String,
        code: Option<FailureCode>,
    },
}

impl RecognitionResult {
    pub fn failure(message: impl Into<String>) -> Self {
        RecognitionResult::Failure {
            message: message.into(),
            code: None,
        }
    }

    pub fn no_api_config() -> Self {
        RecognitionResult::Failure {
            message: "API credentials are not configured".to_string(),
            code: Some(FailureCode::NoApiConfig),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RecognitionResult::Success { .. })
    }

    pub fn markup(&self) -> Option<&str> {
        match self {
            RecognitionResult::Success { markup, .. } => Some(markup),
            RecognitionResult::Failure { .. } => None,
        }
    }
}
