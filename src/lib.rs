//! Sector-based filesystem engine for the QNX 4.05 Demodisk `RD_v1.2`
//! ramdisk: a small, self-contained format where every sector doubles as
//! either a directory table or file body and the only indirection is a
//! 4-byte "next sector" pointer at the head of each one.
//!
//! [`image`] parses and validates the on-disk header; [`entry`] is the
//! 119-byte directory record; [`sectormap`] tracks free/occupied sectors;
//! [`engine`] ties them together into the operations a caller drives
//! (`ls`, `cd`, `inject`, `rm`, ...). [`codec`] holds the two wire-format
//! collaborators this format depends on for a faithful round trip: XOR
//! obfuscation and the (decode-only) `Enigma` bootloader decompressor.

pub mod codec;
pub mod engine;
pub mod entry;
pub mod error;
pub mod image;
pub mod sectormap;
mod util;

pub use engine::Engine;
pub use entry::{Entry, EntryKind};
pub use error::{EngineError, EnigmaError, EntryError, LoadError};
pub use image::Image;
