//! # mp4ilst
//!
//! Read and rewrite iTunes-style metadata in QuickTime/MP4 files.
//!
//! Tags live in `moov.udta.meta.ilst`, one box per tag holding a `data`
//! box with the encoded value. Reading walks the box tree and decodes every
//! supported tag. Writing copies the file box by box while payloads are
//! replaced, removed or appended; container sizes are recomputed on the way
//! and the chunk offset tables (`stco`/`co64`) are shifted by the net size
//! change, so audio data stays addressable.
//!
//! ## Features
//!
//! - **Streaming**: media data is copied through, never held in memory
//! - **Typed values**: each tag maps to a fixed value kind (text, track
//!   number, genre, ...)
//! - **Round-trip safe**: an unmodified file is written back byte for byte
//!
//! ## Example
//!
//! ```no_run
//! use mp4ilst::{ItemList, TagValue, InternationalText};
//! use std::path::Path;
//!
//! let tags = mp4ilst::read_tags(Path::new("song.m4a")).unwrap();
//! for (spec, value) in tags.iter() {
//!     println!("{}: {}", spec.id, value);
//! }
//!
//! let mut changes = ItemList::new();
//! changes
//!     .set("(c)nam", TagValue::Text(InternationalText::new("New Title")))
//!     .unwrap();
//! let report = mp4ilst::write_tags(
//!     Path::new("song.m4a"),
//!     Path::new("song.new.m4a"),
//!     &changes,
//!     &["(c)cmt"],
//! )
//! .unwrap();
//! println!("size changed by {:+} bytes", report.size_delta);
//! ```
//!
//! ## Technical Details
//!
//! Box headers are 32-bit only; a leading `0xA9` byte in a box name is shown
//! as `(c)` (so `©nam` is `(c)nam`).

pub mod binary;
pub mod boxes;
pub mod chunk_offset;
pub mod error;
pub mod ilst;
pub mod reader;
pub mod rewrite;
pub mod walk;
pub mod writer;

#[cfg(test)]
mod test_utils;

use std::path::Path;

pub use boxes::BoxInfo;
pub use error::{Error, Result};
pub use ilst::{InternationalText, ItemList, TagSpec, TagValue, ValueKind};
pub use reader::Tagger;
pub use rewrite::{rewrite, WritableBox};
pub use walk::walk;
pub use writer::{OffsetPatch, TempPaths, WriteReport};

/// Read every supported tag from the file at `path`
pub fn read_tags(path: &Path) -> Result<ItemList> {
    Tagger::new().read_file(path)
}

/// Write `source` to `dest` with `tags` set and `delete` removed.
///
/// Intermediate files are created next to `dest` and removed afterwards.
/// `dest` is only replaced when the write succeeds.
pub fn write_tags<S: AsRef<str>>(
    source: &Path,
    dest: &Path,
    tags: &ItemList,
    delete: &[S],
) -> Result<WriteReport> {
    let temp = TempPaths::beside(dest);
    let result = match Tagger::new().write_file(source, dest, &temp, tags, delete) {
        // nothing was created and a temp path may be the source itself
        Err(e @ Error::SamePath { .. }) => return Err(e),
        result => result,
    };
    let cleanup = temp.remove();
    let report = result?;
    cleanup?;
    Ok(report)
}
