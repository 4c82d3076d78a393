//! Image encoding: file bytes → base64 payload for the predict request.
//!
//! The endpoint takes the raw image bytes base64-encoded inside the JSON
//! body (`bytesBase64Encoded`); the image format travels implicitly in the
//! bytes themselves, so nothing here decodes or re-encodes pixels.

use crate::error::CaptionError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::debug;

/// Read an image file and return its bytes base64-encoded.
pub fn encode_image_file(path: impl AsRef<Path>) -> Result<String, CaptionError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| CaptionError::ReadFailed {
        detail: format!("{}: {e}", path.display()),
    })?;
    let b64 = STANDARD.encode(&bytes);
    debug!(
        "Encoded '{}' ({} bytes) → {} bytes base64",
        path.display(),
        bytes.len(),
        b64.len()
    );
    Ok(b64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn encode_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tiny.png");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\nfakepixels").unwrap();

        let b64 = encode_image_file(&path).expect("encode should succeed");
        let decoded = STANDARD.decode(&b64).expect("valid base64");
        assert_eq!(decoded, b"\x89PNG\r\n\x1a\nfakepixels");
    }

    #[test]
    fn missing_file_is_read_failed() {
        let err = encode_image_file("/definitely/not/here.png").unwrap_err();
        assert!(matches!(err, CaptionError::ReadFailed { .. }));
    }
}
