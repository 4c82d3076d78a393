//! PPTX container and slide-XML handling.
//!
//! A PPTX deck is a ZIP archive of XML parts plus media blobs. The ZIP
//! container itself is an external collaborator (the `zip` crate); the three
//! submodules here cover exactly the OOXML surface this tool needs and no
//! more:
//!
//! 1. [`package`] — load the archive into ordered in-memory parts, derive the
//!    slide order from `p:sldIdLst`, replace parts, save atomically
//! 2. [`slide`]   — stream-parse one slide part into its top-level picture
//!    shapes (`descr` alt-text, `r:embed` media relationship)
//! 3. [`alttext`] — stream-rewrite one slide part, setting `descr` on
//!    selected pictures while leaving every other byte untouched
//!
//! Only top-level `p:pic` children of `p:spTree` count as picture shapes;
//! pictures nested inside group shapes are not enumerated. The positional
//! shape index that results is the join key the whole tool hangs on
//! (see [`crate::naming`]).

pub mod alttext;
pub mod package;
pub mod slide;

pub use package::PptxPackage;
pub use slide::{media_extension, parse_pictures, parse_relationships, PictureShape, Relationship};
