//! Error types for mp4ilst

use std::io;
use std::path::PathBuf;

use crate::ilst::{ValueError, ValueKind};

/// Result type for mp4ilst operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while walking, reading or rewriting a file
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error on the source, a temp stream or the destination
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Box header is truncated or its size does not fit its parent
    #[error("Malformed box at offset {offset}: {reason}")]
    MalformedBox { offset: u64, reason: String },

    /// Box name does not map back to exactly four raw bytes
    #[error("Invalid box name {0:?}")]
    InvalidBoxName(String),

    /// Tag identifier is not part of the item list schema
    #[error("Unsupported item list tag `{0}`")]
    UnknownTag(String),

    /// Stored tag payload could not be decoded
    #[error("Failed to decode `{id}`: {source}")]
    Decode {
        id: String,
        #[source]
        source: ValueError,
    },

    /// Text given for a tag could not be turned into a value
    #[error("Invalid value for `{id}`: {source}")]
    InvalidValue {
        id: String,
        #[source]
        source: ValueError,
    },

    /// Value shape does not match the schema for the tag
    #[error("Tag `{id}` holds {expected} values, got {actual}")]
    KindMismatch {
        id: String,
        expected: ValueKind,
        actual: ValueKind,
    },

    /// Payload of a box was replaced twice during one rewrite
    #[error("`{0}` already written")]
    AlreadyWritten(String),

    /// Container boxes only accept inserted children
    #[error("`{0}` is a container box, its payload cannot be replaced")]
    NotWritable(String),

    /// Only container boxes accept inserted children
    #[error("`{0}` is not a container box")]
    NotContainer(String),

    /// The item list container is missing
    #[error(".moov.udta.meta.ilst does not exist")]
    IlstNotFound,

    /// Shifted chunk offset falls outside the table's integer range
    #[error("Chunk offset {offset} cannot be shifted by {delta:+}")]
    OffsetOverflow { offset: u64, delta: i64 },

    /// Two of the source, destination and temp paths name the same file
    #[error("`{}` and `{}` are the same file", .first.display(), .second.display())]
    SamePath { first: PathBuf, second: PathBuf },

    /// Rebuilt box no longer fits a 32-bit size header
    #[error("Box `{path}` is too large: {size} bytes")]
    BoxTooLarge { path: String, size: u64 },
}

impl Error {
    pub(crate) fn malformed(offset: u64, reason: impl Into<String>) -> Self {
        Error::MalformedBox {
            offset,
            reason: reason.into(),
        }
    }
}
