//! The predict call: request shape, auth, and the 429 retry loop.
//!
//! The request the endpoint accepts is fixed:
//!
//! ```json
//! {
//!   "instances":  [ { "image": { "bytesBase64Encoded": "..." } } ],
//!   "parameters": { "sampleCount": 1, "language": "en" }
//! }
//! ```
//!
//! ## Retry strategy
//!
//! Only HTTP 429 is retried, with a fixed delay and a bounded budget — the
//! quota window the endpoint enforces is itself fixed, so exponential
//! backoff buys nothing here. 401/403 aborts the whole run (the token will
//! not get better by itself), and every other non-2xx becomes a structured
//! per-image error instead of being swallowed.

use crate::config::CaptionConfig;
use crate::error::{CaptionError, DeckAltError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::encode::encode_image_file;

#[derive(Debug, Serialize)]
struct PredictRequest {
    instances: Vec<Instance>,
    parameters: Parameters,
}

#[derive(Debug, Serialize)]
struct Instance {
    image: ImagePayload,
}

#[derive(Debug, Serialize)]
struct ImagePayload {
    #[serde(rename = "bytesBase64Encoded")]
    bytes_base64_encoded: String,
}

#[derive(Debug, Serialize)]
struct Parameters {
    #[serde(rename = "sampleCount")]
    sample_count: u32,
    language: String,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<String>,
}

/// A configured captioning client.
///
/// Cheap to construct; holds the reqwest client (connection pool) and the
/// settings, nothing else.
#[derive(Debug)]
pub struct CaptionClient {
    http: reqwest::Client,
    config: CaptionConfig,
}

impl CaptionClient {
    /// Build a client from a validated config.
    ///
    /// Fails fast on a missing access token so a directory run does not
    /// discover the problem one sleep-delay in.
    pub fn new(config: CaptionConfig) -> Result<Self, DeckAltError> {
        if config.access_token.as_deref().unwrap_or("").is_empty() {
            return Err(DeckAltError::AccessTokenMissing);
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| DeckAltError::Internal(format!("http client: {e}")))?;
        Ok(Self { http, config })
    }

    /// The config this client was built with.
    pub fn config(&self) -> &CaptionConfig {
        &self.config
    }

    /// Caption one image file.
    ///
    /// Returns the first prediction, or the empty string when the endpoint
    /// returns zero predictions (it does, for images it declines to
    /// describe). The distinction between "empty caption" and "failed" is
    /// load-bearing: both the original workflow and the ledger treat an
    /// empty caption as a processed image.
    ///
    /// # Errors
    /// * `Err(DeckAltError::AuthRejected)` on 401/403 — callers must abort
    ///   the whole run.
    /// * `Err(DeckAltError::CaptionFailed)` for everything else; directory
    ///   runs unwrap the inner [`CaptionError`] and continue.
    pub async fn caption_image(&self, image_path: &Path) -> Result<String, DeckAltError> {
        let file_name = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| image_path.display().to_string());

        let b64 = encode_image_file(image_path).map_err(|source| DeckAltError::CaptionFailed {
            file_name: file_name.clone(),
            source,
        })?;

        let body = PredictRequest {
            instances: vec![Instance {
                image: ImagePayload {
                    bytes_base64_encoded: b64,
                },
            }],
            parameters: Parameters {
                sample_count: self.config.sample_count,
                language: self.config.language.clone(),
            },
        };

        match self.post_with_retry(&body, &file_name).await {
            Ok(caption) => Ok(caption),
            Err(RequestFailure::Auth { status, detail }) => {
                Err(DeckAltError::AuthRejected { status, detail })
            }
            Err(RequestFailure::PerImage(source)) => {
                Err(DeckAltError::CaptionFailed { file_name, source })
            }
        }
    }

    async fn post_with_retry(
        &self,
        body: &PredictRequest,
        file_name: &str,
    ) -> Result<String, RequestFailure> {
        let url = self.config.endpoint_url();
        // unwrap_or_default is unreachable: new() rejects a missing token.
        let token = self.config.access_token.clone().unwrap_or_default();
        let attempts = self.config.max_retries + 1;

        for attempt in 0..attempts {
            if attempt > 0 {
                warn!(
                    "'{}': rate limited, retry {}/{} after {}ms",
                    file_name, attempt, self.config.max_retries, self.config.retry_delay_ms
                );
                sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
            }

            let response = self
                .http
                .post(&url)
                .bearer_auth(&token)
                .json(body)
                .send()
                .await
                .map_err(|e| {
                    RequestFailure::PerImage(CaptionError::Transport {
                        detail: e.to_string(),
                    })
                })?;

            let status = response.status();
            debug!("'{}': HTTP {}", file_name, status.as_u16());

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                continue;
            }
            if status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN
            {
                let detail = truncated_body(response).await;
                return Err(RequestFailure::Auth {
                    status: status.as_u16(),
                    detail,
                });
            }
            if !status.is_success() {
                let detail = truncated_body(response).await;
                return Err(RequestFailure::PerImage(CaptionError::RequestFailed {
                    status: status.as_u16(),
                    detail,
                }));
            }

            let parsed: PredictResponse = response.json().await.map_err(|e| {
                RequestFailure::PerImage(CaptionError::BadResponse {
                    detail: e.to_string(),
                })
            })?;
            return Ok(parsed.predictions.into_iter().next().unwrap_or_default());
        }

        Err(RequestFailure::PerImage(CaptionError::RateLimited {
            attempts,
        }))
    }
}

/// Internal split of failures into "abort the run" and "skip this image".
enum RequestFailure {
    Auth { status: u16, detail: String },
    PerImage(CaptionError),
}

/// First 200 chars of an error body; endpoint errors are JSON walls.
async fn truncated_body(response: reqwest::Response) -> String {
    let text = response.text().await.unwrap_or_default();
    let mut detail: String = text.chars().take(200).collect();
    if detail.len() < text.len() {
        detail.push('\u{2026}');
    }
    detail
}
