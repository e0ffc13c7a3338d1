//! Sector occupancy: scanning, allocation, and the persisted bitmap cache.
//!
//! Generalizes the teacher's `util::bitmap::BitMap<LEN>` (a fixed,
//! compile-time-sized bitset over a `GenericArray`) to a runtime-sized
//! bitmap sized off the image header, and reuses `util::bits::Bits` for
//! the actual bit twiddling.
//!
//! Occupancy here is never read back off the persisted bitmap at
//! [`crate::image::SECTOR_MAP_START`] — like the original tool, free/used
//! status is always recomputed by walking sector headers and, for
//! single-sector entries, sniffing for non-zero content (see
//! [`scan_occupancy`]). The persisted bitmap is write-only output, kept in
//! sync by [`write_bitmap`] whenever the engine commits a change.

use crate::util::bits::Bits;

/// `true` means the sector at that index is free.
///
/// This is the heuristic spec.md calls out as possibly imperfect
/// (SPEC_FULL.md §9 open question): a sector whose 4-byte header is zero
/// and whose body is a single repeated byte value is assumed free, since a
/// genuinely-occupied single-sector file/dir would (almost always) vary in
/// content. Preserved verbatim rather than replaced with a proper
/// reachability walk from the root directory.
pub fn scan_occupancy(raw: &[u8], sector_size: usize) -> Vec<bool> {
    let sector_count = raw.len() / sector_size;
    let mut headers = Vec::with_capacity(sector_count);
    for i in 0..sector_count {
        let offset = i * sector_size;
        let next = u32::from_le_bytes(raw[offset..offset + 4].try_into().unwrap());
        headers.push(next as usize / sector_size);
    }

    let mut free = vec![true; sector_count];
    for (i, &target) in headers.iter().enumerate() {
        if target != 0 || headers.contains(&i) {
            free[i] = false;
        } else {
            let offset = i * sector_size;
            let distinct = raw[offset..offset + sector_size]
                .iter()
                .collect::<std::collections::HashSet<_>>()
                .len();
            if distinct > 1 {
                free[i] = false;
            }
        }
    }

    free
}

/// Byte offsets of every free sector, in ascending order.
pub fn list_free_offsets(raw: &[u8], sector_size: usize) -> Vec<usize> {
    scan_occupancy(raw, sector_size)
        .iter()
        .enumerate()
        .filter(|(_, &free)| free)
        .map(|(i, _)| i * sector_size)
        .collect()
}

/// Indices (not byte offsets) of every free sector, in ascending order.
pub fn list_free_sectors(raw: &[u8], sector_size: usize) -> Vec<usize> {
    scan_occupancy(raw, sector_size)
        .iter()
        .enumerate()
        .filter(|(_, &free)| free)
        .map(|(i, _)| i)
        .collect()
}

pub fn free_bytes(raw: &[u8], sector_size: usize) -> usize {
    list_free_offsets(raw, sector_size).len() * sector_size
}

/// First-fit allocation of `count` free sectors, returned as byte offsets.
/// Empty if fewer than `count` sectors are free.
pub fn alloc(raw: &[u8], sector_size: usize, count: usize) -> Vec<usize> {
    let free = list_free_offsets(raw, sector_size);
    if free.len() < count {
        Vec::new()
    } else {
        free[..count].to_vec()
    }
}

/// Serializes current occupancy into the header's sector map, LSB-first
/// within each byte (sector index `map_start * 8 + b` -> bit `b` of byte
/// `map_start`). A free sector is bit `0`; an occupied one is bit `1`,
/// matching the original's `"1" if occupied else "0"` string-then-reversed
/// encoding.
pub fn write_bitmap(raw: &mut [u8], map_start: usize, sector_size: usize) {
    let free = scan_occupancy(raw, sector_size);
    let map_len = (free.len() + 7) / 8;
    let mut map = vec![0u8; map_len];

    for (i, &is_free) in free.iter().enumerate() {
        map[i / 8].set_bit((i % 8) as u32, !is_free);
    }

    raw[map_start..map_start + map_len].copy_from_slice(&map);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(sector_count: usize, sector_size: usize) -> Vec<u8> {
        vec![0u8; sector_count * sector_size]
    }

    #[test]
    fn all_zero_sectors_are_free() {
        let raw = fixture(4, 512);
        let free = scan_occupancy(&raw, 512);
        assert_eq!(free, vec![true; 4]);
    }

    #[test]
    fn sector_pointed_at_by_another_is_occupied() {
        let mut raw = fixture(4, 512);
        raw[0..4].copy_from_slice(&(512u32).to_le_bytes());
        let free = scan_occupancy(&raw, 512);
        assert_eq!(free, vec![false, false, true, true]);
    }

    #[test]
    fn single_sector_with_varied_content_is_occupied() {
        let mut raw = fixture(2, 512);
        raw[4] = 0xAB;
        let free = scan_occupancy(&raw, 512);
        assert_eq!(free, vec![false, true]);
    }

    #[test]
    fn list_free_sectors_returns_indices_not_offsets() {
        let mut raw = fixture(4, 512);
        raw[0..4].copy_from_slice(&(512u32).to_le_bytes());
        assert_eq!(list_free_sectors(&raw, 512), vec![2, 3]);
    }

    #[test]
    fn alloc_returns_empty_when_insufficient() {
        let raw = fixture(2, 512);
        assert!(alloc(&raw, 512, 3).is_empty());
    }

    #[test]
    fn alloc_returns_requested_offsets_in_order() {
        let raw = fixture(3, 512);
        assert_eq!(alloc(&raw, 512, 2), vec![0, 512]);
    }

    #[test]
    fn write_bitmap_sets_occupied_bits() {
        let mut raw = fixture(3, 512);
        raw[0..4].copy_from_slice(&(512u32).to_le_bytes());
        let map_start = 3 * 512;
        raw.extend_from_slice(&[0u8; 16]);
        write_bitmap(&mut raw, map_start, 512);
        assert_eq!(raw[map_start] & 0b111, 0b011);
    }
}
