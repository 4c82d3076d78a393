//! Top-level operations: extract, caption, apply, list, reset.
//!
//! These are the functions the CLI (and the web form) call. Each one is a
//! complete workflow step over a deck, an image directory, or a ledger; the
//! modules below them ([`crate::pptx`], [`crate::caption`], [`crate::ledger`])
//! carry no workflow knowledge of their own.
//!
//! The deck-side operations are synchronous — they touch only local files.
//! Only the captioning operations are async, because they talk to the
//! endpoint.

use crate::caption::CaptionClient;
use crate::config::CaptionConfig;
use crate::error::{CaptionError, DeckAltError};
use crate::ledger::{self, CaptionLedger};
use crate::naming;
use crate::pptx::{media_extension, parse_pictures, PptxPackage};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

// ── Extraction ───────────────────────────────────────────────────────────

/// One image written (or found already present) by [`extract_images`].
#[derive(Debug, Clone)]
pub struct ExtractedImage {
    /// Positional file name, e.g. `image_pg0_idx1.png`.
    pub file_name: String,
    /// 0-based slide index in presentation order.
    pub slide_index: usize,
    /// 0-based index among the slide's top-level pictures.
    pub shape_index: usize,
    /// Archive part the bytes came from, e.g. `ppt/media/image3.png`.
    pub media_part: String,
    /// False when the file already existed and was left untouched.
    pub written: bool,
}

/// Extract every picture-shape image from a deck into `out_dir`.
///
/// File names follow the positional convention (see [`crate::naming`]), so
/// the same deck always produces the same names. Extraction is idempotent:
/// an image whose file already exists is skipped, which lets an interrupted
/// extract-caption-apply cycle be rerun without clobbering files a previous
/// run already captioned.
///
/// `out_dir` is created if missing. Pictures without an embedded image
/// relationship (rare, e.g. linked-only media) are skipped with a warning;
/// they still occupy their shape index.
pub fn extract_images(
    pptx_path: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
) -> Result<Vec<ExtractedImage>, DeckAltError> {
    let out_dir = out_dir.as_ref();
    let package = PptxPackage::open(&pptx_path)?;

    std::fs::create_dir_all(out_dir).map_err(|e| DeckAltError::OutputWriteFailed {
        path: out_dir.to_path_buf(),
        source: e,
    })?;

    let mut extracted = Vec::new();
    for (slide_index, slide_part) in package.slide_parts().iter().enumerate() {
        let rels: HashMap<String, String> = package
            .slide_relationships(slide_part)?
            .into_iter()
            .map(|rel| (rel.id, rel.target))
            .collect();

        let xml = package.require_part(slide_part)?;
        for pic in parse_pictures(xml, slide_part)? {
            let Some(rel_id) = pic.embed_rel_id.as_deref() else {
                warn!(
                    "Slide {}: picture {} has no embedded image, skipping",
                    slide_index, pic.shape_index
                );
                continue;
            };
            let Some(target) = rels.get(rel_id) else {
                warn!(
                    "Slide {}: relationship '{}' not found in rels part, skipping",
                    slide_index, rel_id
                );
                continue;
            };

            let media_part = PptxPackage::resolve_target(slide_part, target);
            let bytes = package.require_part(&media_part)?;
            let ext = media_extension(target);
            let file_name = naming::image_file_name(slide_index, pic.shape_index, &ext);

            let dest = out_dir.join(&file_name);
            let written = if dest.exists() {
                debug!("'{}' already exists, keeping it", file_name);
                false
            } else {
                std::fs::write(&dest, bytes).map_err(|e| DeckAltError::OutputWriteFailed {
                    path: dest.clone(),
                    source: e,
                })?;
                true
            };

            extracted.push(ExtractedImage {
                file_name,
                slide_index,
                shape_index: pic.shape_index,
                media_part,
                written,
            });
        }
    }

    info!(
        "Extracted {} images ({} new) from '{}' into '{}'",
        extracted.len(),
        extracted.iter().filter(|e| e.written).count(),
        package.path().display(),
        out_dir.display()
    );
    Ok(extracted)
}

// ── Captioning ───────────────────────────────────────────────────────────

/// Outcome of one image in a directory captioning run.
#[derive(Debug, Clone)]
pub struct CaptionOutcome {
    pub file_name: String,
    /// The recorded caption; may be the empty string when the endpoint
    /// returned no predictions.
    pub caption: Option<String>,
    /// Set instead of `caption` when this image failed.
    pub error: Option<CaptionError>,
}

impl CaptionOutcome {
    pub fn succeeded(&self) -> bool {
        self.caption.is_some()
    }
}

/// Summary of a [`caption_directory`] run.
#[derive(Debug)]
pub struct CaptionRunSummary {
    /// One entry per image that was actually attempted, in run order.
    pub outcomes: Vec<CaptionOutcome>,
    /// Images the ledger already covered; never re-requested.
    pub already_recorded: usize,
}

impl CaptionRunSummary {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }
}

/// Caption a single image file and append the result to the ledger.
///
/// Returns the caption (possibly empty). Pass `None` for `ledger_path` to
/// skip the ledger append — useful for previewing a caption.
pub async fn caption_file(
    image_path: impl AsRef<Path>,
    ledger_path: Option<&Path>,
    config: &CaptionConfig,
) -> Result<String, DeckAltError> {
    let image_path = image_path.as_ref();
    let client = CaptionClient::new(config.clone())?;
    let caption = client.caption_image(image_path).await?;

    if let Some(ledger_path) = ledger_path {
        let file_name = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| image_path.display().to_string());
        ledger::append_record(ledger_path, &file_name, &caption)?;
    }

    Ok(caption)
}

/// Caption every not-yet-ledgered image in a directory.
///
/// The set to caption is the difference between the image files present in
/// `dir` and the file names already in the ledger, so a rerun after an
/// interruption (or after extraction added new slides) only pays for the
/// missing captions. Each caption is appended to the ledger immediately
/// after its request succeeds.
///
/// A per-image failure is recorded in the summary and the run continues; an
/// authentication rejection (401/403) aborts the run, because every further
/// request with the same token would fail the same way.
pub async fn caption_directory(
    dir: impl AsRef<Path>,
    ledger_path: impl AsRef<Path>,
    config: &CaptionConfig,
) -> Result<CaptionRunSummary, DeckAltError> {
    let dir = dir.as_ref();
    let ledger_path = ledger_path.as_ref();

    let present = scan_image_dir(dir)?;
    let ledger = CaptionLedger::load_or_default(ledger_path)?;
    let missing: Vec<String> = ledger
        .missing_from(&present)
        .into_iter()
        .map(str::to_owned)
        .collect();
    let already_recorded = present.len() - missing.len();

    info!(
        "Captioning '{}': {} images present, {} already recorded, {} to caption",
        dir.display(),
        present.len(),
        already_recorded,
        missing.len()
    );

    let total = missing.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total);
    }
    if total == 0 {
        if let Some(ref cb) = config.progress_callback {
            cb.on_run_complete(0, 0);
        }
        return Ok(CaptionRunSummary {
            outcomes: Vec::new(),
            already_recorded,
        });
    }

    let client = CaptionClient::new(config.clone())?;
    let mut outcomes = Vec::with_capacity(total);

    for (index, file_name) in missing.iter().enumerate() {
        if index > 0 && config.request_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(config.request_delay_ms)).await;
        }
        if let Some(ref cb) = config.progress_callback {
            cb.on_image_start(index, total, file_name);
        }

        match client.caption_image(&dir.join(file_name)).await {
            Ok(caption) => {
                ledger::append_record(ledger_path, file_name, &caption)?;
                info!("'{}': \"{}\"", file_name, caption);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_image_complete(index, total, file_name, &caption);
                }
                outcomes.push(CaptionOutcome {
                    file_name: file_name.clone(),
                    caption: Some(caption),
                    error: None,
                });
            }
            Err(DeckAltError::CaptionFailed { source, .. }) => {
                warn!("'{}' failed: {}", file_name, source);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_image_error(index, total, file_name, &source.to_string());
                }
                outcomes.push(CaptionOutcome {
                    file_name: file_name.clone(),
                    caption: None,
                    error: Some(source),
                });
            }
            // AuthRejected, ledger failures and the like are fatal.
            Err(e) => {
                if let Some(ref cb) = config.progress_callback {
                    let successes = outcomes.iter().filter(|o| o.succeeded()).count();
                    cb.on_run_complete(total, successes);
                }
                return Err(e);
            }
        }
    }

    let summary = CaptionRunSummary {
        outcomes,
        already_recorded,
    };
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(total, summary.success_count());
    }
    info!(
        "Run complete: {} captioned, {} failed, {} already recorded",
        summary.success_count(),
        summary.failure_count(),
        summary.already_recorded
    );
    Ok(summary)
}

/// Image files in `dir` that have no row in the ledger yet.
///
/// Read-only version of the reconciliation [`caption_directory`] performs;
/// lets a user see what a run would cost before starting it.
pub fn missing_captions(
    dir: impl AsRef<Path>,
    ledger_path: impl AsRef<Path>,
) -> Result<Vec<String>, DeckAltError> {
    let present = scan_image_dir(dir.as_ref())?;
    let ledger = CaptionLedger::load_or_default(ledger_path)?;
    Ok(ledger
        .missing_from(&present)
        .into_iter()
        .map(str::to_owned)
        .collect())
}

/// Image files in a directory, sorted positionally.
///
/// Names that follow the positional convention sort by (slide, shape); any
/// stray image files sort after them, lexicographically.
fn scan_image_dir(dir: &Path) -> Result<Vec<String>, DeckAltError> {
    let entries = std::fs::read_dir(dir).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DeckAltError::FileNotFound {
            path: dir.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => DeckAltError::PermissionDenied {
            path: dir.to_path_buf(),
        },
        _ => DeckAltError::Internal(format!("reading '{}': {e}", dir.display())),
    })?;

    let mut names: Vec<String> = entries
        .flatten()
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| naming::is_image_file_name(name))
        .collect();
    names.sort_by(|a, b| position_key(a).cmp(&position_key(b)).then(a.cmp(b)));
    Ok(names)
}

/// `(slide, shape)` parsed from a positional name; non-conforming names get
/// `usize::MAX` so they sort last.
fn position_key(name: &str) -> (usize, usize) {
    let parse = || -> Option<(usize, usize)> {
        let rest = name.strip_prefix("image_pg")?;
        let (slide, rest) = rest.split_once("_idx")?;
        let (shape, _ext) = rest.split_once('.')?;
        Some((slide.parse().ok()?, shape.parse().ok()?))
    };
    parse().unwrap_or((usize::MAX, usize::MAX))
}

// ── Alt-text application ─────────────────────────────────────────────────

/// Write ledgered captions into the deck's picture alt-text.
///
/// For every picture shape, the positional file name is re-derived from the
/// shape's current position and looked up in the ledger; the first matching
/// row wins. A picture with no ledger row gets an empty alt-text rather
/// than keeping a stale one — after an apply, every picture's alt-text
/// reflects the ledger and nothing else.
///
/// Saves over the input deck, or to `output` when given. Returns the number
/// of pictures whose alt-text was written.
pub fn apply_captions(
    pptx_path: impl AsRef<Path>,
    ledger_path: impl AsRef<Path>,
    output: Option<&Path>,
) -> Result<usize, DeckAltError> {
    let ledger = CaptionLedger::load(ledger_path)?;
    let mut package = PptxPackage::open(&pptx_path)?;

    let mut applied = 0usize;
    for (slide_index, slide_part) in package.slide_parts().to_vec().iter().enumerate() {
        let rels: HashMap<String, String> = package
            .slide_relationships(slide_part)?
            .into_iter()
            .map(|rel| (rel.id, rel.target))
            .collect();

        let xml = package.require_part(slide_part)?;
        let mut edits: HashMap<usize, String> = HashMap::new();
        for pic in parse_pictures(xml, slide_part)? {
            let ext = pic
                .embed_rel_id
                .as_deref()
                .and_then(|id| rels.get(id))
                .map(|target| media_extension(target));
            let Some(ext) = ext else {
                // No embedded image means no extracted file and no ledger
                // row; leave this shape's alt-text alone.
                continue;
            };
            let file_name = naming::image_file_name(slide_index, pic.shape_index, &ext);
            let caption = match ledger.lookup(&file_name) {
                Some(caption) => caption.to_string(),
                None => {
                    debug!("No ledger row for '{}', writing empty alt-text", file_name);
                    String::new()
                }
            };
            edits.insert(pic.shape_index, caption);
        }

        if edits.is_empty() {
            continue;
        }
        let (rewritten, count) = crate::pptx::alttext::rewrite_alt_text(xml, &edits, slide_part)?;
        package.set_part(slide_part, rewritten)?;
        applied += count;
    }

    match output {
        Some(path) => package.save(path)?,
        None => package.save_in_place()?,
    }
    info!(
        "Applied alt-text to {} pictures in '{}'",
        applied,
        output.unwrap_or_else(|| package.path()).display()
    );
    Ok(applied)
}

// ── Listing and resetting ────────────────────────────────────────────────

/// One picture's alt-text as reported by [`list_alt_text`].
#[derive(Debug, Clone)]
pub struct AltTextEntry {
    pub slide_index: usize,
    pub shape_index: usize,
    /// Positional file name extraction would use; `None` for a picture
    /// without an embedded image.
    pub file_name: Option<String>,
    /// `cNvPr/@name` from the deck.
    pub shape_name: String,
    pub alt_text: String,
}

/// Read the current alt-text of every top-level picture shape.
pub fn list_alt_text(pptx_path: impl AsRef<Path>) -> Result<Vec<AltTextEntry>, DeckAltError> {
    let package = PptxPackage::open(&pptx_path)?;

    let mut entries = Vec::new();
    for (slide_index, slide_part) in package.slide_parts().iter().enumerate() {
        let rels: HashMap<String, String> = package
            .slide_relationships(slide_part)?
            .into_iter()
            .map(|rel| (rel.id, rel.target))
            .collect();

        let xml = package.require_part(slide_part)?;
        for pic in parse_pictures(xml, slide_part)? {
            let file_name = pic
                .embed_rel_id
                .as_deref()
                .and_then(|id| rels.get(id))
                .map(|target| {
                    naming::image_file_name(slide_index, pic.shape_index, &media_extension(target))
                });
            entries.push(AltTextEntry {
                slide_index,
                shape_index: pic.shape_index,
                file_name,
                shape_name: pic.name,
                alt_text: pic.alt_text,
            });
        }
    }
    Ok(entries)
}

/// Clear the alt-text of every top-level picture shape.
///
/// Every picture gets `descr=""`; pictures that never had a `descr` gain an
/// empty one, which reads back identically. Saves over the input deck, or
/// to `output` when given. Returns the number of pictures cleared.
pub fn reset_alt_text(
    pptx_path: impl AsRef<Path>,
    output: Option<&Path>,
) -> Result<usize, DeckAltError> {
    let mut package = PptxPackage::open(&pptx_path)?;

    let mut cleared = 0usize;
    for slide_part in package.slide_parts().to_vec() {
        let xml = package.require_part(&slide_part)?;
        let pics = parse_pictures(xml, &slide_part)?;
        if pics.is_empty() {
            continue;
        }
        let edits: HashMap<usize, String> = pics
            .iter()
            .map(|pic| (pic.shape_index, String::new()))
            .collect();
        let (rewritten, count) = crate::pptx::alttext::rewrite_alt_text(xml, &edits, &slide_part)?;
        package.set_part(&slide_part, rewritten)?;
        cleared += count;
    }

    match output {
        Some(path) => package.save(path)?,
        None => package.save_in_place()?,
    }
    info!("Cleared alt-text on {} pictures", cleared);
    Ok(cleared)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_key_parses_conforming_names() {
        assert_eq!(position_key("image_pg0_idx2.png"), (0, 2));
        assert_eq!(position_key("image_pg12_idx0.jpeg"), (12, 0));
    }

    #[test]
    fn position_key_pushes_strays_last() {
        assert_eq!(position_key("logo.png"), (usize::MAX, usize::MAX));
        let mut names = vec![
            "logo.png".to_string(),
            "image_pg10_idx0.png".to_string(),
            "image_pg2_idx1.png".to_string(),
        ];
        names.sort_by(|a, b| position_key(a).cmp(&position_key(b)).then(a.cmp(b)));
        assert_eq!(
            names,
            vec!["image_pg2_idx1.png", "image_pg10_idx0.png", "logo.png"]
        );
    }

}
