//! # deckalt
//!
//! Auto-generate accessibility alt-text for the images in PowerPoint decks.
//!
//! ## Why this crate?
//!
//! Writing alt-text for a deck with dozens of embedded images is the chore
//! nobody does, so the images ship without it. This crate extracts every
//! picture from a `.pptx`, asks an image-captioning endpoint (Google Vertex
//! AI `imagetext`) to describe each one, records the captions in a CSV
//! ledger a human can review and correct, and writes the approved captions
//! back into the deck as alt-text (`cNvPr/@descr`).
//!
//! ## Pipeline Overview
//!
//! ```text
//! deck.pptx
//!  │
//!  ├─ 1. Extract  picture shapes → image_pg<slide>_idx<shape>.<ext> files
//!  ├─ 2. Caption  one predict call per image, 429-aware, rate-limited
//!  ├─ 3. Ledger   append (fileName, caption) CSV rows as they arrive
//!  ├─ 4. Review   a human edits the CSV (outside this tool)
//!  └─ 5. Apply    captions → cNvPr/@descr, deck rewritten atomically
//! ```
//!
//! The positional file name is the only key joining the three stores (disk,
//! ledger, deck); see [`naming`] for the convention and its stability
//! caveat.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use deckalt::{ops, CaptionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 1. Extract.
//!     ops::extract_images("deck.pptx", "deck_images")?;
//!
//!     // 2-3. Caption everything the ledger doesn't cover yet.
//!     let config = CaptionConfig::builder()
//!         .project("my-gcp-project")
//!         .access_token(std::env::var("DECKALT_ACCESS_TOKEN")?)
//!         .build()?;
//!     let summary =
//!         ops::caption_directory("deck_images", "deck_images/captions.csv", &config).await?;
//!     eprintln!("{} captioned, {} failed", summary.success_count(), summary.failure_count());
//!
//!     // 5. Apply (after reviewing captions.csv).
//!     ops::apply_captions("deck.pptx", "deck_images/captions.csv", None)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `deckalt` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `web`   | off     | Enables [`web::serve`], a one-page upload form (axum) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! deckalt = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod caption;
pub mod config;
pub mod error;
pub mod ledger;
pub mod naming;
pub mod ops;
pub mod pptx;
pub mod progress;
#[cfg(feature = "web")]
pub mod web;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use caption::CaptionClient;
pub use config::{CaptionConfig, CaptionConfigBuilder};
pub use error::{CaptionError, DeckAltError};
pub use ledger::{CaptionLedger, CaptionRecord};
pub use ops::{
    apply_captions, caption_directory, caption_file, extract_images, list_alt_text,
    missing_captions, reset_alt_text, AltTextEntry, CaptionOutcome, CaptionRunSummary,
    ExtractedImage,
};
pub use pptx::PptxPackage;
pub use progress::{CaptionProgressCallback, NoopProgressCallback, ProgressCallback};
