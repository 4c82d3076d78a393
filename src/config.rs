//! Configuration for the captioning side of the tool.
//!
//! Everything the HTTP captioning path can vary lives in [`CaptionConfig`],
//! built via its [`CaptionConfigBuilder`]. Keeping the knobs in one struct
//! makes it trivial to pass the same settings to a single-image call and a
//! directory run, and to diff two runs when their ledgers disagree.
//!
//! The deck-manipulation operations (extract, apply, list, reset) need no
//! configuration at all — they take plain paths.

use crate::error::DeckAltError;
use crate::progress::ProgressCallback;
use std::fmt;

/// Default fixed delay between successive captioning calls, in milliseconds.
///
/// The endpoint is rate-limited per project; a 2 s gap keeps a directory run
/// comfortably under the default quota without ever seeing a 429.
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 2_000;

/// Default fixed delay before retrying after an HTTP 429, in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 15_000;

/// Configuration for caption requests.
///
/// Built via [`CaptionConfig::builder()`].
///
/// # Example
/// ```rust
/// use deckalt::CaptionConfig;
///
/// let config = CaptionConfig::builder()
///     .project("my-gcp-project")
///     .access_token("ya29.abc...")
///     .language("en")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct CaptionConfig {
    /// Google Cloud project ID the endpoint URL is built from. Required
    /// unless [`Self::endpoint_override`] is set.
    pub project: String,

    /// Endpoint location/region. Default: `us-central1`.
    pub location: String,

    /// Published model name in the predict URL. Default: `imagetext`.
    pub model: String,

    /// Full URL to POST to instead of the derived Vertex URL.
    ///
    /// Exists for tests and proxies; when set, `project` may be empty.
    pub endpoint_override: Option<String>,

    /// OAuth2 bearer token. The original workflow obtains one with
    /// `gcloud auth print-access-token`.
    pub access_token: Option<String>,

    /// Number of caption candidates to request. Range: 1–4. Default: 1.
    ///
    /// Only the first prediction is ledgered; values above 1 exist because
    /// the endpoint accepts them, not because the tool uses the extras.
    pub sample_count: u32,

    /// BCP-47 language code for the generated caption. Default: `en`.
    pub language: String,

    /// Fixed sleep between successive captioning calls in a directory run,
    /// in milliseconds. Default: [`DEFAULT_REQUEST_DELAY_MS`].
    pub request_delay_ms: u64,

    /// Fixed sleep before retrying a 429, in milliseconds.
    /// Default: [`DEFAULT_RETRY_DELAY_MS`].
    ///
    /// The delay is fixed rather than exponential: the quota window the
    /// endpoint enforces is itself fixed, so backing off further buys
    /// nothing.
    pub retry_delay_ms: u64,

    /// Retry budget for HTTP 429 responses, per image. Default: 3.
    ///
    /// When the budget is exhausted the image fails with
    /// [`crate::error::CaptionError::RateLimited`]; a directory run records
    /// it and moves on.
    pub max_retries: u32,

    /// Per-request HTTP timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Progress events for directory runs. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            project: String::new(),
            location: "us-central1".to_string(),
            model: "imagetext".to_string(),
            endpoint_override: None,
            access_token: None,
            sample_count: 1,
            language: "en".to_string(),
            request_delay_ms: DEFAULT_REQUEST_DELAY_MS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            max_retries: 3,
            api_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for CaptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptionConfig")
            .field("project", &self.project)
            .field("location", &self.location)
            .field("model", &self.model)
            .field("endpoint_override", &self.endpoint_override)
            // Never log credentials.
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("sample_count", &self.sample_count)
            .field("language", &self.language)
            .field("request_delay_ms", &self.request_delay_ms)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn CaptionProgressCallback>"),
            )
            .finish()
    }
}

impl CaptionConfig {
    /// Create a new builder for `CaptionConfig`.
    pub fn builder() -> CaptionConfigBuilder {
        CaptionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The URL caption requests are POSTed to.
    pub fn endpoint_url(&self) -> String {
        if let Some(ref url) = self.endpoint_override {
            return url.clone();
        }
        format!(
            "https://{location}-aiplatform.googleapis.com/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:predict",
            location = self.location,
            project = self.project,
            model = self.model,
        )
    }
}

/// Builder for [`CaptionConfig`].
#[derive(Debug)]
pub struct CaptionConfigBuilder {
    config: CaptionConfig,
}

impl CaptionConfigBuilder {
    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.config.project = project.into();
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.config.location = location.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn endpoint_override(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint_override = Some(url.into());
        self
    }

    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.config.access_token = Some(token.into());
        self
    }

    pub fn sample_count(mut self, n: u32) -> Self {
        self.config.sample_count = n.clamp(1, 4);
        self
    }

    pub fn language(mut self, code: impl Into<String>) -> Self {
        self.config.language = code.into();
        self
    }

    pub fn request_delay_ms(mut self, ms: u64) -> Self {
        self.config.request_delay_ms = ms;
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_delay_ms = ms;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<CaptionConfig, DeckAltError> {
        let c = &self.config;
        if c.project.trim().is_empty() && c.endpoint_override.is_none() {
            return Err(DeckAltError::InvalidConfig(
                "A Google Cloud project ID is required (or set an endpoint override)".into(),
            ));
        }
        if !(1..=4).contains(&c.sample_count) {
            return Err(DeckAltError::InvalidConfig(format!(
                "sample_count must be 1–4, got {}",
                c.sample_count
            )));
        }
        if c.language.trim().is_empty() {
            return Err(DeckAltError::InvalidConfig(
                "language code must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_from_project_and_location() {
        let config = CaptionConfig::builder()
            .project("rising-analogy-272214")
            .build()
            .unwrap();
        assert_eq!(
            config.endpoint_url(),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/rising-analogy-272214/locations/us-central1/publishers/google/models/imagetext:predict"
        );
    }

    #[test]
    fn endpoint_override_wins() {
        let config = CaptionConfig::builder()
            .endpoint_override("http://127.0.0.1:9999/predict")
            .build()
            .unwrap();
        assert_eq!(config.endpoint_url(), "http://127.0.0.1:9999/predict");
    }

    #[test]
    fn project_required_without_override() {
        let err = CaptionConfig::builder().build().unwrap_err();
        assert!(err.to_string().contains("project"));
    }

    #[test]
    fn sample_count_clamped() {
        let config = CaptionConfig::builder()
            .project("p")
            .sample_count(99)
            .build()
            .unwrap();
        assert_eq!(config.sample_count, 4);
    }

    #[test]
    fn debug_redacts_token() {
        let config = CaptionConfig::builder()
            .project("p")
            .access_token("ya29.secret")
            .build()
            .unwrap();
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("ya29.secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
