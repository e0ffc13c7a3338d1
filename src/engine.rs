//! The ramdisk engine: directory traversal, file injection/removal, and
//! the `optimize` compactor that keeps a directory's table and header
//! entry consistent after either.
//!
//! Modeled on the teacher's `fat::mod::FatFs` (owns the mounted state and
//! exposes the operations a caller drives) plus `fat::dir::DirIter` (walks
//! a directory's entries) and `fat::table::FatEntryTracer` (follows a
//! chain of next-pointers) — collapsed into one type because `RD_v1.2`
//! sectors double as both directory table and file body, so there's no
//! separate FAT-style allocation table to track.

use crate::codec::xor;
use crate::entry::{Entry, EntryKind, ENTRY_SIZE};
use crate::error::EngineError;
use crate::image::Image;
use crate::sectormap;

/// For some reason the disk-utilization accounting in a directory's `size`
/// field uses 105 rather than `ENTRY_SIZE` (119). Left exactly as observed
/// — see `SPEC_FULL.md` §9.
const ENTRY_SIZE_MAGIC: usize = 105;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub size: u32,
    pub sector_size: u16,
    pub free_bytes: usize,
}

pub struct Engine {
    image: Image,
    path: Vec<Entry>,
}

impl Engine {
    pub fn mount(image: Image) -> Self {
        let base = image.base_entry();
        Self { image, path: vec![base] }
    }

    pub fn into_image(self) -> Image {
        self.image
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    fn sector_size(&self) -> usize {
        self.image.sector_size() as usize
    }

    fn current_dir(&self) -> &Entry {
        self.path.last().expect("path always has at least the root")
    }

    /// Follows `entry`'s `dest_offset` chain via each sector's leading
    /// 4-byte next-pointer, stopping at (and excluding) the terminating 0.
    fn sector_list(&self, entry: &Entry) -> Vec<usize> {
        let mut sectors = vec![entry.dest_offset() as usize];
        while *sectors.last().unwrap() != 0 {
            let last = *sectors.last().unwrap();
            sectors.push(self.image.read_u32(last) as usize);
        }
        sectors.pop();
        sectors
    }

    /// Materializes every `Entry` stored across a directory's sector
    /// chain. Unlike the teacher's `DirIter`, this isn't lazy — the owned-
    /// snapshot design makes an eager `Vec` the natural shape here.
    ///
    /// An unrecognized type tag (`EntryKind::Bad`) mid-traversal is an
    /// on-disk invariant violation, not a recoverable condition — the
    /// original hard-stops with `quit("Something went wrong.")` on exactly
    /// this; here it surfaces as `EngineError::Corrupt` instead.
    fn dir_contents(&self, dir: &Entry) -> Result<Vec<Entry>, EngineError> {
        let sector_size = self.sector_size();
        let mut entries = Vec::new();
        for sector in self.sector_list(dir) {
            let raw = &self.image.raw()[sector + 4..sector + sector_size - 4];
            let count = raw.len() / ENTRY_SIZE;
            for i in 0..count {
                let entry = Entry::from_bytes(&raw[i * ENTRY_SIZE..(i + 1) * ENTRY_SIZE]);
                if entry.kind() == EntryKind::Bad {
                    return Err(EngineError::Corrupt(format!(
                        "unrecognized entry type tag in sector at offset {sector}"
                    )));
                }
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// Lists the current directory's non-empty entries.
    pub fn ls(&self) -> Result<Vec<Entry>, EngineError> {
        Ok(self
            .dir_contents(self.current_dir())?
            .into_iter()
            .filter(|e| e.kind() != EntryKind::Empty)
            .collect())
    }

    fn get_entry(&self, name: &str, kind: EntryKind) -> Result<Option<Entry>, EngineError> {
        for entry in self.dir_contents(self.current_dir())? {
            if entry.kind() == kind {
                if kind == EntryKind::Empty {
                    return Ok(Some(entry));
                }
                if entry.name() == name {
                    return Ok(Some(entry));
                }
            }
        }
        Ok(None)
    }

    /// Checks `dir`/`file` only. The original checked `["links", "dir",
    /// "file"]`, but `"links"` never matches the singular `"link"` kind, so
    /// a link by that name is never reported as existing; reproduced here
    /// rather than corrected.
    fn entry_exists(&self, name: &str) -> Result<bool, EngineError> {
        Ok(self.get_entry(name, EntryKind::Dir)?.is_some() || self.get_entry(name, EntryKind::File)?.is_some())
    }

    fn write_entry(&mut self, mut entry: Entry, offset: usize) {
        if entry.kind() != EntryKind::Empty {
            entry.set_fat_offset(offset as u32);
        }
        self.image.write_entry(offset, &entry);
    }

    /// Rebuilds the current directory's table and header entry after an
    /// add/remove: separates its entries into the fixed `[., ..]` link
    /// pair plus sorted dirs and sorted files, rewrites them back to back
    /// across the directory's sectors, zeroes the remainder of each
    /// sector, drops a trailing sector if it's no longer needed, and
    /// refreshes the persisted sector map.
    fn optimize(&mut self) -> Result<(), EngineError> {
        let dir = self.current_dir().clone();
        let sectors = self.sector_list(&dir);
        let mut entries = self.dir_contents(&dir)?.into_iter();
        let links = vec![
            entries.next().expect("directory always has . and .."),
            entries.next().expect("directory always has . and .."),
        ];

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        for e in entries {
            match e.kind() {
                EntryKind::Dir => dirs.push(e),
                EntryKind::File => files.push(e),
                _ => {}
            }
        }

        let total_count = links.len() + dirs.len() + files.len();
        dirs.sort_by(|a, b| a.name().cmp(&b.name()));
        files.sort_by(|a, b| a.name().cmp(&b.name()));

        let entries_per_sector = (self.sector_size() - 4) / ENTRY_SIZE;
        let dir_offset = dir.fat_offset() as usize;

        let mut dir_entry = dir.clone();
        dir_entry.set_contains((links.len() + dirs.len()) as u32);
        dir_entry.set_size((total_count * ENTRY_SIZE_MAGIC) as u32);
        dir_entry.set_max_size((sectors.len() * entries_per_sector) as u32);
        self.write_entry(dir_entry.clone(), dir_offset);

        let mut links = links.into_iter();
        let mut dirs = dirs.into_iter();
        let mut files = files.into_iter();

        for &sector in &sectors {
            let mut tmp_offset = 4;
            while tmp_offset + ENTRY_SIZE < self.sector_size() {
                let next = links.next().or_else(|| dirs.next()).or_else(|| files.next());
                let Some(next) = next else { break };
                self.write_entry(next, sector + tmp_offset);
                tmp_offset += ENTRY_SIZE;
            }
            let sector_size = self.sector_size();
            self.image.raw_mut()[sector + tmp_offset..sector + sector_size].fill(0);
        }

        if entries_per_sector * (sectors.len() - 1) >= total_count {
            let dropped = *sectors.last().unwrap();
            let second_to_last = sectors[sectors.len() - 2];
            self.image.zero_sector(dropped);
            self.image.write_u32(second_to_last, 0);
            dir_entry.set_max_size(dir_entry.max_size() - entries_per_sector as u32);
            self.write_entry(dir_entry, dir_offset);
        }

        sectormap::write_bitmap(self.image.raw_mut(), crate::image::SECTOR_MAP_START, self.sector_size());

        *self.path.last_mut().unwrap() = self.image.read_entry(dir_offset);
        Ok(())
    }

    fn rm_entry(&mut self, entry: &Entry) -> Result<(), EngineError> {
        for sector in self.sector_list(entry) {
            self.image.zero_sector(sector);
        }
        self.write_entry(Entry::empty(), entry.fat_offset() as usize);
        self.optimize()
    }

    pub fn cd(&mut self, name: &str) -> Result<(), EngineError> {
        match name {
            "/" => {
                self.path.truncate(1);
                Ok(())
            }
            "." => Ok(()),
            ".." => {
                if self.path.len() > 1 {
                    self.path.pop();
                }
                Ok(())
            }
            _ => {
                let Some(entry) = self.get_entry(name, EntryKind::Dir)? else {
                    return Err(EngineError::NoSuchDirectory(name.to_string()));
                };
                self.path.push(self.image.read_entry(entry.fat_offset() as usize));
                Ok(())
            }
        }
    }

    pub fn pwd(&self) -> String {
        let names: Vec<String> = self.path[1..].iter().map(|e| e.name()).collect();
        format!("/{}", names.join("/"))
    }

    pub fn info(&self) -> ImageInfo {
        ImageInfo {
            size: self.image.size(),
            sector_size: self.image.sector_size(),
            free_bytes: sectormap::free_bytes(self.image.raw(), self.sector_size()),
        }
    }

    pub fn dump(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        let entry = self
            .get_entry(name, EntryKind::File)?
            .ok_or_else(|| EngineError::NotFound { kind: "file", name: name.to_string() })?;

        let sector_size = self.sector_size();
        let mut out = Vec::with_capacity(entry.size() as usize);
        let mut remaining = entry.size() as usize;
        for sector in self.sector_list(&entry) {
            let take = if remaining < sector_size - 4 { remaining } else { sector_size - 4 };
            out.extend_from_slice(&self.image.raw()[sector + 4..sector + 4 + take]);
            remaining -= take;
        }
        Ok(out)
    }

    /// Injects `data` as a new file named `name` into the current
    /// directory, growing the directory's sector chain first if its
    /// entry table is already full.
    pub fn inject(&mut self, name: &str, data: &[u8]) -> Result<(), EngineError> {
        if !Entry::name_is_valid(name) {
            return Err(EngineError::InvalidName(name.to_string()));
        }
        if self.entry_exists(name)? {
            return Err(EngineError::AlreadyExists(name.to_string()));
        }

        let sector_size = self.sector_size();
        let mut sectors_needed = (data.len() + sector_size - 5) / (sector_size - 4);
        if data.is_empty() {
            sectors_needed = 1;
        }

        let dir = self.current_dir().clone();
        let grow_dir = (dir.size() as usize / ENTRY_SIZE_MAGIC) == dir.max_size() as usize;
        if grow_dir {
            sectors_needed += 1;
        }

        let mut allocated = sectormap::alloc(self.image.raw(), sector_size, sectors_needed);
        if allocated.is_empty() {
            let available = sectormap::list_free_offsets(self.image.raw(), sector_size).len();
            return Err(EngineError::InsufficientSpace { needed: sectors_needed, available });
        }

        let dir_sectors = self.sector_list(&dir);
        let entry_offset = if grow_dir {
            let new_sector = allocated.remove(0);
            self.image.write_u32(*dir_sectors.last().unwrap(), new_sector as u32);
            new_sector + 4
        } else {
            let entries_per_sector = (sector_size - 4) / ENTRY_SIZE;
            let mut offset = dir.size() as usize / ENTRY_SIZE_MAGIC;
            offset %= entries_per_sector;
            offset *= ENTRY_SIZE;
            offset + dir_sectors[dir_sectors.len() - 1] + 4
        };

        let file_entry = Entry::new_file(
            name,
            data.len() as u32,
            (sectors_needed * (sector_size - 4)) as u32,
            allocated[0] as u32,
        );
        self.write_entry(file_entry, entry_offset);

        let mut read_offset = 0;
        for (i, &sector) in allocated.iter().enumerate() {
            if i < allocated.len() - 1 {
                self.image.write_u32(sector, allocated[i + 1] as u32);
                let chunk = &data[read_offset..read_offset + (sector_size - 4)];
                self.image.raw_mut()[sector + 4..sector + sector_size].copy_from_slice(chunk);
                read_offset += sector_size - 4;
            } else {
                let remaining = &data[read_offset..];
                self.image.raw_mut()[sector + 4..sector + 4 + remaining.len()].copy_from_slice(remaining);
            }
        }

        self.optimize()?;
        Ok(())
    }

    pub fn rm(&mut self, name: &str) -> Result<(), EngineError> {
        let entry = self
            .get_entry(name, EntryKind::File)?
            .ok_or_else(|| EngineError::NotFound { kind: "file", name: name.to_string() })?;
        self.rm_entry(&entry)
    }

    pub fn rmdir(&mut self, name: &str) -> Result<(), EngineError> {
        let entry = self
            .get_entry(name, EntryKind::Dir)?
            .ok_or_else(|| EngineError::NotFound { kind: "dir", name: name.to_string() })?;

        let has_contents = self
            .dir_contents(&entry)?
            .iter()
            .any(|e| matches!(e.kind(), EntryKind::File | EntryKind::Dir));
        if has_contents {
            return Err(EngineError::DirectoryNotEmpty(name.to_string()));
        }

        self.rm_entry(&entry)
    }

    pub fn flags(&mut self, name: &str, flags: u16) -> Result<(), EngineError> {
        if !crate::entry::KNOWN_FLAGS.contains(&flags) {
            return Err(EngineError::InvalidFlags(flags));
        }
        let mut entry = self
            .get_entry(name, EntryKind::File)?
            .ok_or_else(|| EngineError::NotFound { kind: "file", name: name.to_string() })?;
        entry.set_flags(flags);
        let offset = entry.fat_offset() as usize;
        self.write_entry(entry, offset);
        Ok(())
    }

    pub fn showfat(&self, name: &str) -> Result<Option<[u8; ENTRY_SIZE]>, EngineError> {
        for kind in [EntryKind::Link, EntryKind::Dir, EntryKind::File] {
            if let Some(entry) = self.get_entry(name, kind)? {
                return Ok(Some(*entry.raw()));
            }
        }
        Ok(None)
    }

    /// Indices (not byte offsets) of every free sector, per spec: the
    /// original's `listfree` returns `free_sectors.index(True)` values.
    pub fn listfree(&self) -> Vec<usize> {
        sectormap::list_free_sectors(self.image.raw(), self.sector_size())
    }

    pub fn commit(&self, sink: &mut dyn std::io::Write) -> std::io::Result<()> {
        self.image.commit(sink)
    }

    /// XOR-obfuscates the entire image, in place semantics aside — returns
    /// a fresh buffer rather than mutating, since obfuscation is applied
    /// to whole images at rest, not to a mounted `Engine`'s live buffer.
    pub fn obfuscate(raw: &[u8]) -> Vec<u8> {
        xor::xor_cipher(raw)
    }
}
