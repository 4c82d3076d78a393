//! Error types for the deckalt library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`DeckAltError`] — **Fatal**: the operation cannot proceed at all
//!   (bad input file, unreadable archive, rejected access token). Returned as
//!   `Err(DeckAltError)` from the top-level operations in [`crate::ops`].
//!
//! * [`CaptionError`] — **Non-fatal**: a single image failed (transient API
//!   error, exhausted rate-limit retries) but the rest of a directory run is
//!   fine. Stored inside [`crate::ops::CaptionOutcome`] so callers can
//!   inspect partial success rather than losing the whole run to one image.
//!
//! Authentication rejections are deliberately on the fatal side: a 401 on the
//! first image will be a 401 on every image, so the run aborts immediately.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the deckalt library.
///
/// Per-image captioning failures use [`CaptionError`] and are stored in
/// [`crate::ops::CaptionOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum DeckAltError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file or directory was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a ZIP archive (PPTX container).
    #[error("File is not a PPTX archive: '{path}'\nFirst bytes: {magic:?}")]
    NotAPptx { path: PathBuf, magic: [u8; 4] },

    // ── Archive / XML errors ──────────────────────────────────────────────
    /// The ZIP container could not be read or written.
    #[error("Archive error in '{path}': {detail}")]
    Archive { path: PathBuf, detail: String },

    /// A part the OOXML structure requires is missing from the archive.
    #[error("Missing part '{part}' in the PPTX archive")]
    MissingPart { part: String },

    /// A slide or relationships part contained XML we could not parse.
    #[error("XML error in part '{part}': {detail}")]
    Xml { part: String, detail: String },

    // ── Captioning errors ─────────────────────────────────────────────────
    /// No access token was configured for the captioning endpoint.
    #[error(
        "No access token configured for the captioning endpoint.\n\
         Pass --token or set DECKALT_ACCESS_TOKEN (obtain one with: gcloud auth print-access-token)."
    )]
    AccessTokenMissing,

    /// The captioning endpoint rejected our credentials (401/403).
    ///
    /// Aborts the whole run: retrying other images with the same token
    /// cannot succeed.
    #[error("Captioning endpoint rejected the access token (HTTP {status}): {detail}\nThe token may have expired; refresh it with: gcloud auth print-access-token")]
    AuthRejected { status: u16, detail: String },

    /// A single-image captioning request failed.
    ///
    /// Directory runs store this per image instead (see [`CaptionError`]).
    #[error("Captioning failed for '{file_name}': {source}")]
    CaptionFailed {
        file_name: String,
        #[source]
        source: CaptionError,
    },

    // ── Ledger errors ─────────────────────────────────────────────────────
    /// The caption ledger CSV could not be read or written.
    #[error("Ledger error in '{path}': {detail}")]
    Ledger { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single image caption request.
///
/// Stored in [`crate::ops::CaptionOutcome`] when an image fails; the
/// directory run continues with the next image.
#[derive(Debug, Clone, Error)]
pub enum CaptionError {
    /// The image file could not be read from disk.
    #[error("could not read image: {detail}")]
    ReadFailed { detail: String },

    /// The endpoint kept answering HTTP 429 until the retry budget ran out.
    #[error("rate limited; gave up after {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// The endpoint answered with a non-retryable, non-auth error status.
    #[error("endpoint returned HTTP {status}: {detail}")]
    RequestFailed { status: u16, detail: String },

    /// The request never reached the endpoint (connect, TLS, timeout).
    #[error("transport error: {detail}")]
    Transport { detail: String },

    /// The 2xx response body did not have the expected shape.
    #[error("unexpected response body: {detail}")]
    BadResponse { detail: String },
}
