//! The captioning side-utility: image bytes → cloud caption.
//!
//! Two stages, matching the request the endpoint expects:
//!
//! 1. [`encode`] — read the image file and base64-wrap its bytes for the
//!    JSON request body
//! 2. [`client`] — drive the predict call with bearer auth, a bounded
//!    fixed-delay retry on HTTP 429, and a hard abort on auth rejection
//!
//! This half of the tool shares nothing with the deck manipulation in
//! [`crate::pptx`] except the filename convention — exactly the coupling the
//! ledger encodes.

pub mod client;
pub mod encode;

pub use client::CaptionClient;
