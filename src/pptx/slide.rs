//! Slide-part parsing: picture shapes and relationships.
//!
//! Both parsers are single-pass event streams over the part bytes; no DOM is
//! built. The picture walk keeps a stack of open element names so it can tell
//! a top-level `p:pic` (direct child of `p:spTree`) from one nested inside a
//! group shape — only the former are enumerated, and the enumeration order
//! is the positional shape index used in image filenames.

use crate::error::DeckAltError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// One `<Relationship>` from a `.rels` part.
#[derive(Debug, Clone)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
}

/// A top-level picture shape found on a slide.
#[derive(Debug, Clone)]
pub struct PictureShape {
    /// Positional index among the slide's top-level pictures (0-based).
    pub shape_index: usize,
    /// `cNvPr/@name`, informational only.
    pub name: String,
    /// `cNvPr/@descr` — the alt-text. Empty when absent.
    pub alt_text: String,
    /// `a:blip/@r:embed` — relationship ID of the image media part.
    pub embed_rel_id: Option<String>,
}

/// Parse a `.rels` part into its relationships.
pub fn parse_relationships(xml: &[u8], part: &str) -> Result<Vec<Relationship>, DeckAltError> {
    let mut reader = Reader::from_reader(xml);
    let mut rels = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if local_name(e.name().as_ref()) == b"Relationship" =>
            {
                let mut rel = Relationship {
                    id: String::new(),
                    rel_type: String::new(),
                    target: String::new(),
                };
                for attr in e.attributes().with_checks(false).flatten() {
                    let value = String::from_utf8_lossy(&attr.value).into_owned();
                    match attr.key.as_ref() {
                        b"Id" => rel.id = value,
                        b"Type" => rel.rel_type = value,
                        b"Target" => rel.target = value,
                        _ => {}
                    }
                }
                if !rel.id.is_empty() {
                    rels.push(rel);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(DeckAltError::Xml {
                    part: part.to_string(),
                    detail: e.to_string(),
                });
            }
            _ => {}
        }
    }

    Ok(rels)
}

/// Parse a slide part into its top-level picture shapes, in document order.
pub fn parse_pictures(xml: &[u8], part: &str) -> Result<Vec<PictureShape>, DeckAltError> {
    let mut reader = Reader::from_reader(xml);
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut pictures: Vec<PictureShape> = Vec::new();
    let mut current: Option<PictureShape> = None;
    // Only the first cNvPr inside a pic is the picture's own (from
    // p:nvPicPr); later ones would belong to nested structures.
    let mut saw_cnvpr = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let local = local_name(e.name().as_ref()).to_vec();
                if is_top_level_pic(&local, current.is_some(), &stack) {
                    current = Some(PictureShape {
                        shape_index: pictures.len(),
                        name: String::new(),
                        alt_text: String::new(),
                        embed_rel_id: None,
                    });
                    saw_cnvpr = false;
                } else if let Some(ref mut pic) = current {
                    inspect_picture_child(e, &local, pic, &mut saw_cnvpr, part)?;
                }
                stack.push(local);
            }
            Ok(Event::Empty(ref e)) => {
                let local = local_name(e.name().as_ref()).to_vec();
                if let Some(ref mut pic) = current {
                    inspect_picture_child(e, &local, pic, &mut saw_cnvpr, part)?;
                }
            }
            Ok(Event::End(ref e)) => {
                let local = local_name(e.name().as_ref()).to_vec();
                stack.pop();
                if local == b"pic" && parent_is_sp_tree(&stack) {
                    if let Some(pic) = current.take() {
                        pictures.push(pic);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(DeckAltError::Xml {
                    part: part.to_string(),
                    detail: e.to_string(),
                });
            }
            _ => {}
        }
    }

    Ok(pictures)
}

/// Image file extension implied by a media part target, lowercase.
///
/// `../media/image1.PNG` → `png`. Falls back to `bin` for extension-less
/// targets, which should not occur in decks written by real tools.
pub fn media_extension(target: &str) -> String {
    match target.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && !ext.contains('/') => ext.to_ascii_lowercase(),
        _ => "bin".to_string(),
    }
}

// ── Internals ────────────────────────────────────────────────────────────

fn inspect_picture_child(
    e: &BytesStart<'_>,
    local: &[u8],
    pic: &mut PictureShape,
    saw_cnvpr: &mut bool,
    part: &str,
) -> Result<(), DeckAltError> {
    if local == b"cNvPr" && !*saw_cnvpr {
        *saw_cnvpr = true;
        for attr in e.attributes().with_checks(false).flatten() {
            let value = attr
                .unescape_value()
                .map_err(|err| DeckAltError::Xml {
                    part: part.to_string(),
                    detail: err.to_string(),
                })?
                .into_owned();
            match attr.key.as_ref() {
                b"name" => pic.name = value,
                b"descr" => pic.alt_text = value,
                _ => {}
            }
        }
    } else if local == b"blip" && pic.embed_rel_id.is_none() {
        for attr in e.attributes().with_checks(false).flatten() {
            if attr.key.as_ref() == b"r:embed" {
                pic.embed_rel_id = Some(String::from_utf8_lossy(&attr.value).into_owned());
            }
        }
    }
    Ok(())
}

fn is_top_level_pic(local: &[u8], inside_pic: bool, stack: &[Vec<u8>]) -> bool {
    local == b"pic" && !inside_pic && parent_is_sp_tree(stack)
}

fn parent_is_sp_tree(stack: &[Vec<u8>]) -> bool {
    stack.last().map(|n| n.as_slice()) == Some(b"spTree".as_slice())
}

pub(crate) fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().position(|&b| b == b':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}
