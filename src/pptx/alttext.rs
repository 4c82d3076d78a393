//! Alt-text rewriting for a slide part.
//!
//! Alt-text lives in the `descr` attribute of the `p:cNvPr` element inside a
//! picture's `p:nvPicPr` block. Rewriting streams the part through a
//! reader/writer pair and rebuilds only the one element per targeted picture,
//! so the rest of the slide XML (whitespace, attribute order, namespaces,
//! comments) round-trips byte-for-byte. PowerPoint is tolerant, but the less
//! the tool perturbs a deck it did not author, the better.

use crate::error::DeckAltError;
use crate::pptx::slide::local_name;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;
use std::io::Cursor;

/// Rewrite a slide part, setting `descr` on the targeted pictures.
///
/// `edits` maps the positional picture index (same enumeration as
/// [`crate::pptx::slide::parse_pictures`]) to the new alt-text. An empty
/// string is a valid edit — that is how reset works: the attribute stays
/// present with an empty value, matching what PowerPoint itself writes.
///
/// Returns the rewritten bytes and the number of pictures actually edited
/// (indices beyond the slide's picture count are ignored).
pub fn rewrite_alt_text(
    xml: &[u8],
    edits: &HashMap<usize, String>,
    part: &str,
) -> Result<(Vec<u8>, usize), DeckAltError> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Cursor::new(Vec::with_capacity(xml.len())));
    let mut stack: Vec<Vec<u8>> = Vec::new();

    let mut pic_count = 0usize;
    let mut in_pic = false;
    // Pending edit for the picture currently open, cleared once its cNvPr
    // has been rewritten.
    let mut pending: Option<String> = None;
    let mut applied = 0usize;

    loop {
        let event = reader.read_event().map_err(|e| xml_error(part, e))?;

        match event {
            Event::Start(e) => {
                let local = local_name(e.name().as_ref()).to_vec();
                if local == b"pic"
                    && !in_pic
                    && stack.last().map(|n| n.as_slice()) == Some(b"spTree".as_slice())
                {
                    in_pic = true;
                    pending = edits.get(&pic_count).cloned();
                    pic_count += 1;
                }

                if in_pic && local == b"cNvPr" && pending.is_some() {
                    let descr = pending.take().unwrap_or_default();
                    writer
                        .write_event(Event::Start(with_descr(&e, &descr)))
                        .map_err(|e| xml_error(part, e))?;
                    applied += 1;
                } else {
                    writer.write_event(Event::Start(e)).map_err(|e| xml_error(part, e))?;
                }
                stack.push(local);
            }
            Event::Empty(e) => {
                let local = local_name(e.name().as_ref()).to_vec();
                if in_pic && local == b"cNvPr" && pending.is_some() {
                    let descr = pending.take().unwrap_or_default();
                    writer
                        .write_event(Event::Empty(with_descr(&e, &descr)))
                        .map_err(|e| xml_error(part, e))?;
                    applied += 1;
                } else {
                    writer.write_event(Event::Empty(e)).map_err(|e| xml_error(part, e))?;
                }
            }
            Event::End(e) => {
                let local = local_name(e.name().as_ref()).to_vec();
                stack.pop();
                if local == b"pic"
                    && in_pic
                    && stack.last().map(|n| n.as_slice()) == Some(b"spTree".as_slice())
                {
                    in_pic = false;
                    pending = None;
                }
                writer.write_event(Event::End(e)).map_err(|e| xml_error(part, e))?;
            }
            Event::Eof => break,
            other => writer.write_event(other).map_err(|e| xml_error(part, e))?,
        }
    }

    Ok((writer.into_inner().into_inner(), applied))
}

fn xml_error(part: &str, e: impl std::fmt::Display) -> DeckAltError {
    DeckAltError::Xml {
        part: part.to_string(),
        detail: e.to_string(),
    }
}

/// Rebuild a `cNvPr` element with every original attribute except `descr`,
/// then append the new `descr`. Attribute values coming from the original
/// element are already escaped; the new value is escaped by the
/// `(&str, &str)` attribute conversion.
fn with_descr(e: &BytesStart<'_>, descr: &str) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    for attr in e.attributes().with_checks(false).flatten() {
        if attr.key.as_ref() != b"descr" {
            out.push_attribute(attr);
        }
    }
    out.push_attribute(("descr", descr));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pptx::slide::parse_pictures;

    const SLIDE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">
  <p:cSld><p:spTree>
    <p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>
    <p:pic>
      <p:nvPicPr><p:cNvPr id="2" name="Picture 1" descr="stale"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr>
      <p:blipFill><a:blip r:embed="rId2"/></p:blipFill>
      <p:spPr/>
    </p:pic>
    <p:pic>
      <p:nvPicPr><p:cNvPr id="3" name="Picture 2"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr>
      <p:blipFill><a:blip r:embed="rId3"/></p:blipFill>
      <p:spPr/>
    </p:pic>
  </p:spTree></p:cSld>
</p:sld>"#;

    fn edits(pairs: &[(usize, &str)]) -> HashMap<usize, String> {
        pairs
            .iter()
            .map(|(i, s)| (*i, s.to_string()))
            .collect()
    }

    #[test]
    fn sets_descr_on_targeted_picture() {
        let (out, applied) = rewrite_alt_text(
            SLIDE_XML.as_bytes(),
            &edits(&[(0, "a cat on a mat")]),
            "slide1.xml",
        )
        .unwrap();
        assert_eq!(applied, 1);

        let pics = parse_pictures(&out, "slide1.xml").unwrap();
        assert_eq!(pics[0].alt_text, "a cat on a mat");
        // The untargeted picture keeps its (absent) descr.
        assert_eq!(pics[1].alt_text, "");
    }

    #[test]
    fn replaces_existing_descr_without_duplicating() {
        let (out, _) = rewrite_alt_text(
            SLIDE_XML.as_bytes(),
            &edits(&[(0, "fresh")]),
            "slide1.xml",
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("stale"));
        assert_eq!(text.matches("descr=").count(), 1);
    }

    #[test]
    fn empty_edit_clears_alt_text() {
        let (out, applied) = rewrite_alt_text(
            SLIDE_XML.as_bytes(),
            &edits(&[(0, ""), (1, "")]),
            "slide1.xml",
        )
        .unwrap();
        assert_eq!(applied, 2);
        let pics = parse_pictures(&out, "slide1.xml").unwrap();
        assert!(pics.iter().all(|p| p.alt_text.is_empty()));
    }

    #[test]
    fn escapes_special_characters() {
        let (out, _) = rewrite_alt_text(
            SLIDE_XML.as_bytes(),
            &edits(&[(1, r#"bread & "butter" <jam>"#)]),
            "slide1.xml",
        )
        .unwrap();
        let pics = parse_pictures(&out, "slide1.xml").unwrap();
        assert_eq!(pics[1].alt_text, r#"bread & "butter" <jam>"#);
    }

    #[test]
    fn out_of_range_index_is_ignored() {
        let (out, applied) =
            rewrite_alt_text(SLIDE_XML.as_bytes(), &edits(&[(7, "nope")]), "slide1.xml").unwrap();
        assert_eq!(applied, 0);
        assert_eq!(out, SLIDE_XML.as_bytes());
    }

    #[test]
    fn untouched_input_round_trips() {
        let (out, applied) =
            rewrite_alt_text(SLIDE_XML.as_bytes(), &HashMap::new(), "slide1.xml").unwrap();
        assert_eq!(applied, 0);
        assert_eq!(out, SLIDE_XML.as_bytes());
    }
}
