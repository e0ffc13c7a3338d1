//! Structured error types for the ramdisk engine.
//!
//! The original tool reported failure with a bare `bool` or `None`; this
//! collapses the five error kinds spec.md §7 calls out (format, invariant,
//! user, capacity, I/O) into enums callers can match on.

use std::fmt;

/// Raised by [`crate::image::Image::load`] when the input isn't a
/// well-formed `RD_v1.2` image.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("bad magic: expected {expected:?}, found {found:?}")]
    BadMagic { expected: [u8; 8], found: [u8; 8] },

    #[error("checkval mismatch on base entry: expected {expected:#06x}, found {found:#06x}")]
    BadCheckval { expected: u16, found: u16 },

    #[error("image too short to contain a header ({len} bytes)")]
    Truncated { len: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Raised while mutating an [`Entry`](crate::entry::Entry)'s fields.
#[derive(Debug, thiserror::Error)]
pub enum EntryError {
    #[error("cannot change the kind of a non-empty entry")]
    NotEmpty,
}

/// Raised by `Engine` operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no such {kind} entry: {name:?}")]
    NotFound { kind: &'static str, name: String },

    #[error("entry already exists: {0:?}")]
    AlreadyExists(String),

    #[error("directory not empty: {0:?}")]
    DirectoryNotEmpty(String),

    #[error("not enough free sectors (need {needed}, have {available})")]
    InsufficientSpace { needed: usize, available: usize },

    #[error("flags value {0:#06x} is not in the known allow-list")]
    InvalidFlags(u16),

    #[error("invalid entry name: {0:?}")]
    InvalidName(String),

    #[error("no such directory: {0:?}")]
    NoSuchDirectory(String),

    #[error("filesystem inconsistency: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl fmt::Display for crate::entry::EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised by [`crate::codec::enigma::decode`] on a malformed segment.
#[derive(Debug, thiserror::Error)]
pub enum EnigmaError {
    #[error("segment table did not terminate at index 256 (got {0})")]
    BadTableIndex(usize),

    #[error("unexpected end of stream while decoding segment")]
    UnexpectedEof,
}
