//! The positional image-filename convention.
//!
//! `image_pg<slideIndex>_idx<shapeIndex>.<ext>` is the sole correlation key
//! between three places: the extracted image files on disk, the rows in the
//! caption ledger, and the picture shapes inside the deck. Extraction writes
//! these names, captioning records them, and the apply step re-derives them
//! from each shape's *current* position. Nothing else joins the three, so the
//! whole tool depends on shape ordering staying stable between runs — reorder
//! the slides and the captions land on the wrong pictures.
//!
//! Indices are 0-based for both slide and shape.

/// Build the deterministic file name for the image of a picture shape.
///
/// `shape_index` counts picture shapes only (text shapes on the same slide
/// do not shift it).
pub fn image_file_name(slide_index: usize, shape_index: usize, ext: &str) -> String {
    format!("image_pg{slide_index}_idx{shape_index}.{ext}")
}

/// File extensions the extractor can produce, lowercase.
///
/// Used by the directory-captioning scan so ledger reconciliation sees the
/// same file set extraction wrote.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "tiff", "emf", "wmf"];

/// Whether a directory entry looks like an image the tool may have extracted.
pub fn is_image_file_name(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((_, ext)) => IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn file_name_matches_convention() {
        assert_eq!(image_file_name(0, 0, "png"), "image_pg0_idx0.png");
        assert_eq!(image_file_name(3, 12, "jpeg"), "image_pg3_idx12.jpeg");
    }

    #[test]
    fn name_set_is_collision_free() {
        // Property (a) from the round-trip checks: distinct positions give
        // distinct names, even across slides with many shapes.
        let mut names = HashSet::new();
        for slide in 0..25 {
            for shape in 0..25 {
                assert!(names.insert(image_file_name(slide, shape, "png")));
            }
        }
        assert_eq!(names.len(), 625);
    }

    #[test]
    fn image_file_detection() {
        assert!(is_image_file_name("image_pg0_idx0.png"));
        assert!(is_image_file_name("photo.JPG"));
        assert!(!is_image_file_name("record_captions.csv"));
        assert!(!is_image_file_name("noextension"));
    }
}
