//! The raw byte image: header parsing and little-endian field access.
//!
//! Modeled on the teacher's `fat::boot_sector::BiosParameterBlock::read`,
//! which reads a fixed-layout header off a byte slice field-by-field with
//! an `e!` macro. There's no on-disk structure worth a macro here (the
//! header is six scalar fields), so the fields are read directly, but the
//! little-endian-at-offset idiom carries over.

use crate::error::LoadError;
use crate::entry::{Entry, ENTRY_SIZE};

const MAGIC: &[u8; 8] = b"RD_v1.2\0";
const MAGIC_START: usize = 0;
const SIZE_START: usize = 8;
const SECTOR_SIZE_START: usize = 12;
const BASE_OFFSET: usize = 14;
const CHECKVAL_START: usize = 22;
const CHECKVAL: u16 = 0x0016;
pub const SECTOR_MAP_START: usize = 133;

/// An in-memory `RD_v1.2` ramdisk image.
///
/// Owns the entire disk as one contiguous buffer, matching the teacher's
/// `Storage` abstraction collapsed down to the one backing store this
/// format actually needs: a flat `Vec<u8>`, no cluster/sector indirection.
pub struct Image {
    raw: Vec<u8>,
    size: u32,
    sector_size: u16,
}

impl Image {
    /// Validates magic and checkval, then wraps `raw` for use.
    pub fn load(raw: Vec<u8>) -> Result<Self, LoadError> {
        if raw.len() < BASE_OFFSET + ENTRY_SIZE {
            return Err(LoadError::Truncated { len: raw.len() });
        }

        let mut found = [0u8; 8];
        found.copy_from_slice(&raw[MAGIC_START..MAGIC_START + 8]);
        if &found != MAGIC {
            return Err(LoadError::BadMagic { expected: *MAGIC, found });
        }

        let checkval = u16::from_le_bytes(raw[CHECKVAL_START..CHECKVAL_START + 2].try_into().unwrap());
        if checkval != CHECKVAL {
            return Err(LoadError::BadCheckval { expected: CHECKVAL, found: checkval });
        }

        let size = u32::from_le_bytes(raw[SIZE_START..SIZE_START + 4].try_into().unwrap());
        let sector_size = u16::from_le_bytes(raw[SECTOR_SIZE_START..SECTOR_SIZE_START + 2].try_into().unwrap());

        log::debug!("loaded image: size={size} sector_size={sector_size}");

        Ok(Self { raw, size, sector_size })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn sector_size(&self) -> u16 {
        self.sector_size
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn raw_mut(&mut self) -> &mut [u8] {
        &mut self.raw
    }

    /// Copies out the root directory's entry, stored inline in the header
    /// at [`BASE_OFFSET`].
    pub fn base_entry(&self) -> Entry {
        Entry::from_bytes(&self.raw[BASE_OFFSET..BASE_OFFSET + ENTRY_SIZE])
    }

    pub fn base_offset(&self) -> usize {
        BASE_OFFSET
    }

    pub fn read_entry(&self, offset: usize) -> Entry {
        Entry::from_bytes(&self.raw[offset..offset + ENTRY_SIZE])
    }

    pub fn write_entry(&mut self, offset: usize, entry: &Entry) {
        self.raw[offset..offset + ENTRY_SIZE].copy_from_slice(entry.raw());
    }

    pub fn read_u32(&self, offset: usize) -> u32 {
        u32::from_le_bytes(self.raw[offset..offset + 4].try_into().unwrap())
    }

    pub fn write_u32(&mut self, offset: usize, value: u32) {
        self.raw[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn zero_sector(&mut self, offset: usize) {
        let end = offset + self.sector_size as usize;
        self.raw[offset..end].fill(0);
    }

    /// Serializes to whatever a caller wants to commit the image to — a
    /// file, a socket, a test buffer.
    pub fn commit(&self, sink: &mut dyn std::io::Write) -> std::io::Result<()> {
        sink.write_all(&self.raw)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.raw
    }
}
