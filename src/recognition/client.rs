//! Recognition client: preconditions, signing, retry, response mapping.
//!
//! The retry loop is an explicit state machine:
//!
//! ```text
//! Attempt(n) --ok/permanent error--> Done
//! Attempt(n) --429, n < max--> wait --> Attempt(n + 1)   (fresh nonce, timestamp, sign)
//! Attempt(n) --429, n = max--> Done(Failure)
//! ```

use super::sign;
use super::transport::{HttpReply, HttpTransport, Transport, TransportError, Upload};
use super::{ApiCredentials, RecognitionResult};
use crate::config;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const GENERIC_FAILURE: &str = "Network request failed";
const HTTP_TOO_MANY_REQUESTS: u16 = 429;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first, only for HTTP 429.
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    res: Option<ApiResult>,
    #[serde(default)]
    request_id: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResult {
    #[serde(default)]
    latex: String,
    #[serde(default)]
    conf: f64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

enum Step {
    Attempt(u32),
    Done(RecognitionResult),
}

enum AttemptOutcome {
    Finished(RecognitionResult),
    RateLimited(String),
}

pub struct RecognitionClient<T = HttpTransport> {
    transport: T,
    retry: RetryPolicy,
    fallback_config: Option<PathBuf>,
    fields: BTreeMap<String, String>,
}

impl RecognitionClient<HttpTransport> {
    pub fn http() -> Result<Self, TransportError> {
        Ok(Self::new(HttpTransport::new()?))
    }
}

impl<T: Transport> RecognitionClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
            fallback_config: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Settings file to read credentials from when the caller passes none.
    pub fn with_fallback_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.fallback_config = Some(path.into());
        self
    }

    /// Extra form field sent with the image and covered by the signature.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Recognizes the formula in `image_path`.
    ///
    /// Never fails: configuration, file, network and server problems all come
    /// back as [`RecognitionResult::Failure`].
    pub async fn recognize(
        &self,
        image_path: &Path,
        credentials: &ApiCredentials,
    ) -> RecognitionResult {
        let Some(credentials) = self.effective_credentials(credentials) else {
            log::warn!("[OCR] No API credentials configured");
            return RecognitionResult::no_api_config();
        };

        if !image_path.exists() {
            log::warn!("[OCR] Image file not found: {}", image_path.display());
            return RecognitionResult::failure("Image file does not exist");
        }

        let image = match std::fs::read(image_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::error!("[OCR] Failed to read {}: {}", image_path.display(), e);
                return RecognitionResult::failure(format!("Failed to read image file: {}", e));
            }
        };
        if image.is_empty() {
            log::warn!("[OCR] Image file is empty: {}", image_path.display());
            return RecognitionResult::failure("Image file is empty");
        }

        let file_name = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.png".to_string());

        log::info!(
            "[OCR] Recognizing {} ({} bytes) via {}",
            file_name,
            image.len(),
            credentials.endpoint()
        );

        let mut step = Step::Attempt(0);
        loop {
            step = match step {
                Step::Done(result) => return result,
                Step::Attempt(n) => {
                    let upload = self.build_upload(&credentials, &file_name, &image);
                    let start = Instant::now();
                    let reply = self.transport.send(&upload).await;
                    log::info!(
                        "[OCR] Attempt {} finished in {}ms",
                        n + 1,
                        start.elapsed().as_millis()
                    );

                    match interpret(reply) {
                        AttemptOutcome::Finished(result) => Step::Done(result),
                        AttemptOutcome::RateLimited(_) if n < self.retry.max_retries => {
                            log::warn!(
                                "[OCR] Rate limited (429), retry {}/{} in {}ms",
                                n + 1,
                                self.retry.max_retries,
                                self.retry.delay.as_millis()
                            );
                            tokio::time::sleep(self.retry.delay).await;
                            Step::Attempt(n + 1)
                        }
                        AttemptOutcome::RateLimited(message) => {
                            log::error!("[OCR] Still rate limited after {} attempts", n + 1);
                            Step::Done(RecognitionResult::failure(message))
                        }
                    }
                }
            };
        }
    }

    fn effective_credentials(&self, given: &ApiCredentials) -> Option<ApiCredentials> {
        if given.is_complete() {
            return Some(trimmed(given));
        }

        let path = self.fallback_config.as_ref()?;
        let loaded = config::load_credentials(path)?;
        log::info!("[OCR] Using credentials from {}", path.display());
        let mut merged = trimmed(&loaded);
        if merged.endpoint.is_empty() {
            merged.endpoint = given.endpoint.trim().to_string();
        }
        Some(merged)
    }

    /// Fresh nonce, timestamp and signature on every call.
    fn build_upload(&self, credentials: &ApiCredentials, file_name: &str, image: &[u8]) -> Upload {
        let headers = sign::sign(&self.fields, &credentials.app_id, &credentials.app_secret);
        Upload {
            endpoint: credentials.endpoint().to_string(),
            headers,
            fields: self.fields.clone(),
            file_name: file_name.to_string(),
            image: image.to_vec(),
        }
    }
}

fn trimmed(c: &ApiCredentials) -> ApiCredentials {
    ApiCredentials {
        app_id: c.app_id.trim().to_string(),
        app_secret: c.app_secret.trim().to_string(),
        endpoint: c.endpoint.trim().to_string(),
    }
}

fn interpret(reply: Result<HttpReply, TransportError>) -> AttemptOutcome {
    let reply = match reply {
        Ok(reply) => reply,
        Err(e) => {
            log::error!("[OCR] Request failed: {}", e);
            let message = e.to_string();
            let message = if message.trim().is_empty() {
                GENERIC_FAILURE.to_string()
            } else {
                message
            };
            return AttemptOutcome::Finished(RecognitionResult::failure(message));
        }
    };

    if !(200..300).contains(&reply.status) {
        let message = body_message(&reply.body)
            .unwrap_or_else(|| format!("Request failed with status code {}", reply.status));
        log::error!("[OCR] Server returned {}: {}", reply.status, message);
        return if reply.status == HTTP_TOO_MANY_REQUESTS {
            AttemptOutcome::RateLimited(message)
        } else {
            AttemptOutcome::Finished(RecognitionResult::failure(message))
        };
    }

    let parsed: ApiResponse = match serde_json::from_str(&reply.body) {
        Ok(p) => p,
        Err(e) => {
            log::error!("[OCR] Malformed response: {}", e);
            return AttemptOutcome::Finished(RecognitionResult::failure(format!(
                "Malformed response from recognition service: {}",
                e
            )));
        }
    };

    let result = match parsed.res {
        Some(res) if parsed.status && !res.latex.is_empty() => {
            log::info!(
                "[OCR] Recognized {} chars, confidence {:.3} (request {})",
                res.latex.len(),
                res.conf,
                parsed.request_id
            );
            RecognitionResult::Success {
                markup: res.latex,
                confidence: res.conf,
            }
        }
        _ => {
            let message = parsed
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "Recognition returned no result".to_string());
            log::warn!("[OCR] No result (request {}): {}", parsed.request_id, message);
            RecognitionResult::failure(message)
        }
    };
    AttemptOutcome::Finished(result)
}

fn body_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()?
        .message
        .filter(|m| !m.trim().is_empty())
}
