//! The PPTX archive: loading, slide ordering, part replacement, saving.
//!
//! The whole archive is held in memory as an ordered `(partName, bytes)`
//! list. Decks are small (tens of MB at worst) and holding every part lets
//! `save` rewrite the container in one pass while preserving the original
//! part order, which keeps diffs between the input and output archives
//! minimal.
//!
//! ## Slide ordering
//!
//! The presentation's slide sequence lives in `ppt/presentation.xml` as a
//! `p:sldIdLst` of relationship IDs, which resolve to slide parts through
//! `ppt/_rels/presentation.xml.rels`. Entry order inside the ZIP means
//! nothing. The positional slide index every filename is derived from is the
//! `sldIdLst` order — the same order the original enumeration walked.

use crate::error::DeckAltError;
use crate::pptx::slide::{self, Relationship};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// ZIP local-file-header magic; anything else is not a PPTX container.
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// An opened PPTX archive with its parts in memory.
pub struct PptxPackage {
    path: PathBuf,
    /// Every archive entry, in original order.
    parts: Vec<(String, Vec<u8>)>,
    /// Slide part names in presentation order.
    slide_parts: Vec<String>,
}

impl std::fmt::Debug for PptxPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Part bytes are megabytes of binary; show counts, not content.
        f.debug_struct("PptxPackage")
            .field("path", &self.path)
            .field("parts", &self.parts.len())
            .field("slide_parts", &self.slide_parts)
            .finish()
    }
}

impl PptxPackage {
    /// Open a deck from disk.
    ///
    /// Validates the ZIP magic bytes before handing the file to the archive
    /// reader so a renamed PDF or plain-text file produces a meaningful
    /// error rather than a container parse failure.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DeckAltError> {
        let path = path.as_ref().to_path_buf();

        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DeckAltError::FileNotFound { path });
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(DeckAltError::PermissionDenied { path });
            }
            Err(e) => {
                return Err(DeckAltError::Archive {
                    path,
                    detail: e.to_string(),
                });
            }
        };

        if data.len() < 4 || data[..4] != ZIP_MAGIC {
            let mut magic = [0u8; 4];
            let n = data.len().min(4);
            magic[..n].copy_from_slice(&data[..n]);
            return Err(DeckAltError::NotAPptx { path, magic });
        }

        let mut archive = ZipArchive::new(Cursor::new(data)).map_err(|e| DeckAltError::Archive {
            path: path.clone(),
            detail: e.to_string(),
        })?;

        let mut parts = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|e| DeckAltError::Archive {
                path: path.clone(),
                detail: e.to_string(),
            })?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut bytes)
                .map_err(|e| DeckAltError::Archive {
                    path: path.clone(),
                    detail: format!("reading '{name}': {e}"),
                })?;
            parts.push((name, bytes));
        }

        let mut package = Self {
            path,
            parts,
            slide_parts: Vec::new(),
        };
        package.slide_parts = package.resolve_slide_order()?;

        tracing::debug!(
            "Opened '{}': {} parts, {} slides",
            package.path.display(),
            package.parts.len(),
            package.slide_parts.len()
        );
        Ok(package)
    }

    /// Path this deck was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Slide part names in presentation order.
    pub fn slide_parts(&self) -> &[String] {
        &self.slide_parts
    }

    /// Number of slides.
    pub fn slide_count(&self) -> usize {
        self.slide_parts.len()
    }

    /// Raw bytes of a part, if present.
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, bytes)| bytes.as_slice())
    }

    /// Raw bytes of a part, or a `MissingPart` error.
    pub fn require_part(&self, name: &str) -> Result<&[u8], DeckAltError> {
        self.part(name).ok_or_else(|| DeckAltError::MissingPart {
            part: name.to_string(),
        })
    }

    /// Replace the bytes of an existing part.
    pub fn set_part(&mut self, name: &str, bytes: Vec<u8>) -> Result<(), DeckAltError> {
        match self.parts.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => {
                *existing = bytes;
                Ok(())
            }
            None => Err(DeckAltError::MissingPart {
                part: name.to_string(),
            }),
        }
    }

    /// Relationships of a slide part (`ppt/slides/_rels/slideN.xml.rels`).
    ///
    /// A slide without a rels part has no embedded media; that is returned
    /// as an empty list, not an error.
    pub fn slide_relationships(&self, slide_part: &str) -> Result<Vec<Relationship>, DeckAltError> {
        let rels_part = rels_part_for(slide_part);
        match self.part(&rels_part) {
            Some(xml) => slide::parse_relationships(xml, &rels_part),
            None => Ok(Vec::new()),
        }
    }

    /// Resolve a relationship target against the directory of `base_part`.
    ///
    /// `../media/image1.png` relative to `ppt/slides/slide1.xml` becomes
    /// `ppt/media/image1.png`; a leading `/` marks an absolute part name.
    pub fn resolve_target(base_part: &str, target: &str) -> String {
        if let Some(absolute) = target.strip_prefix('/') {
            return absolute.to_string();
        }
        let mut segments: Vec<&str> = match base_part.rsplit_once('/') {
            Some((dir, _)) => dir.split('/').collect(),
            None => Vec::new(),
        };
        for seg in target.split('/') {
            match seg {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }
        segments.join("/")
    }

    /// Write the archive to `path`, replacing any existing file atomically
    /// (temp file in the same directory, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DeckAltError> {
        let path = path.as_ref();

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = ZipWriter::new(&mut cursor);
            let options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            for (name, bytes) in &self.parts {
                writer
                    .start_file(name.clone(), options)
                    .and_then(|_| writer.write_all(bytes).map_err(Into::into))
                    .map_err(|e| DeckAltError::Archive {
                        path: path.to_path_buf(),
                        detail: format!("writing '{name}': {e}"),
                    })?;
            }
            writer.finish().map_err(|e| DeckAltError::Archive {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        }

        let tmp_path = path.with_extension("pptx.tmp");
        std::fs::write(&tmp_path, cursor.get_ref()).map_err(|e| DeckAltError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::rename(&tmp_path, path).map_err(|e| DeckAltError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        tracing::debug!("Saved deck to '{}'", path.display());
        Ok(())
    }

    /// Save back over the file the deck was opened from.
    pub fn save_in_place(&self) -> Result<(), DeckAltError> {
        self.save(self.path.clone())
    }

    // ── Slide ordering ───────────────────────────────────────────────────

    fn resolve_slide_order(&self) -> Result<Vec<String>, DeckAltError> {
        const PRES_PART: &str = "ppt/presentation.xml";
        const PRES_RELS: &str = "ppt/_rels/presentation.xml.rels";

        let rels_xml = self.require_part(PRES_RELS)?;
        let slide_rels: HashMap<String, String> = slide::parse_relationships(rels_xml, PRES_RELS)?
            .into_iter()
            .filter(|rel| is_slide_relationship(&rel.rel_type))
            .map(|rel| (rel.id, rel.target))
            .collect();

        let pres_xml = self.require_part(PRES_PART)?;
        let mut order = Vec::new();
        let mut reader = Reader::from_reader(pres_xml);
        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                    if local_name(e.name().as_ref()) == b"sldId" =>
                {
                    for attr in e.attributes().with_checks(false).flatten() {
                        // r:id is the relationship; the plain id attribute is
                        // the slide's numeric ID and is not a join key here.
                        if attr.key.as_ref() == b"r:id" {
                            let rel_id = String::from_utf8_lossy(&attr.value).into_owned();
                            if let Some(target) = slide_rels.get(&rel_id) {
                                order.push(Self::resolve_target(PRES_PART, target));
                            }
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(DeckAltError::Xml {
                        part: PRES_PART.to_string(),
                        detail: e.to_string(),
                    });
                }
                _ => {}
            }
        }

        // Decks written by some tools omit sldIdLst; fall back to sorting
        // the slide-typed relationship targets numerically.
        if order.is_empty() && !slide_rels.is_empty() {
            let mut targets: Vec<String> = slide_rels
                .values()
                .map(|t| Self::resolve_target(PRES_PART, t))
                .collect();
            targets.sort_by_key(|t| trailing_number(t).unwrap_or(usize::MAX));
            order = targets;
        }

        Ok(order)
    }
}

/// `ppt/slides/slide1.xml` → `ppt/slides/_rels/slide1.xml.rels`
pub fn rels_part_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

fn is_slide_relationship(rel_type: &str) -> bool {
    // ".../relationships/slide" but not slideLayout / slideMaster / notesSlide
    rel_type.ends_with("/slide")
}

/// Digits immediately before the extension: "slide12.xml" → 12.
fn trailing_number(s: &str) -> Option<usize> {
    let stem = s.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(s);
    let digits: String = stem
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.chars().rev().collect::<String>().parse().ok()
}

fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().position(|&b| b == b':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_target_relative() {
        assert_eq!(
            PptxPackage::resolve_target("ppt/slides/slide1.xml", "../media/image1.png"),
            "ppt/media/image1.png"
        );
        assert_eq!(
            PptxPackage::resolve_target("ppt/presentation.xml", "slides/slide2.xml"),
            "ppt/slides/slide2.xml"
        );
    }

    #[test]
    fn resolve_target_absolute() {
        assert_eq!(
            PptxPackage::resolve_target("ppt/slides/slide1.xml", "/ppt/media/image9.gif"),
            "ppt/media/image9.gif"
        );
    }

    #[test]
    fn rels_part_path() {
        assert_eq!(
            rels_part_for("ppt/slides/slide3.xml"),
            "ppt/slides/_rels/slide3.xml.rels"
        );
    }

    #[test]
    fn slide_relationship_type_filter() {
        assert!(is_slide_relationship(
            "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide"
        ));
        assert!(!is_slide_relationship(
            "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout"
        ));
        assert!(!is_slide_relationship(
            "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster"
        ));
    }

    #[test]
    fn trailing_number_extraction() {
        assert_eq!(trailing_number("ppt/slides/slide12.xml"), Some(12));
        assert_eq!(trailing_number("slide1.xml"), Some(1));
        assert_eq!(trailing_number("nodigits.xml"), None);
    }
}
