//! TMS1100 mask-ROM image handling.
//!
//! The program counter inside the TMS1100 is a feedback shift register, not a
//! binary adder: within a 64-word page it walks a fixed non-linear sequence.
//! A raw ROM dump stores each page in that physical counter order, and the
//! low 6 bits of every branch/call word name their target in the same order.
//! [`Rom::from_raw`] rewrites both into plain sequential addressing once, so
//! the execution engine can treat the image as ordinary linear memory.

use log::info;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RomError {
    #[error("invalid ROM size: {0} bytes (expected a non-zero multiple of 64)")]
    InvalidSize(usize),
    #[error("PC sequence table has no entry for word {0:#04x}")]
    MalformedSequenceTable(u8),
}

/// Words per ROM page, the reach of the 6-bit program counter.
pub const PAGE_WORDS: usize = 64;

/// Physical traversal order of the 6-bit program counter.
const PC_SEQUENCE: [u8; PAGE_WORDS] = [
    0x00, 0x01, 0x03, 0x07, 0x0F, 0x1F, 0x3F, 0x3E, //
    0x3D, 0x3B, 0x37, 0x2F, 0x1E, 0x3C, 0x39, 0x33, //
    0x27, 0x0E, 0x1D, 0x3A, 0x35, 0x2B, 0x16, 0x2C, //
    0x18, 0x30, 0x21, 0x02, 0x05, 0x0B, 0x17, 0x2E, //
    0x1C, 0x38, 0x31, 0x23, 0x06, 0x0D, 0x1B, 0x36, //
    0x2D, 0x1A, 0x34, 0x29, 0x12, 0x24, 0x08, 0x11, //
    0x22, 0x04, 0x09, 0x13, 0x26, 0x0C, 0x19, 0x32, //
    0x25, 0x0A, 0x15, 0x2A, 0x14, 0x28, 0x10, 0x20, //
];

/// Position of `word` within the counter sequence, i.e. the logical address
/// that fetches it. The table is a total permutation of `0..64`, so a miss
/// can only mean the table itself is broken.
fn logical_position(word: u8) -> Result<u8, RomError> {
    PC_SEQUENCE
        .iter()
        .position(|&w| w == word)
        .map(|i| i as u8)
        .ok_or(RomError::MalformedSequenceTable(word))
}

/// A descrambled, logically addressed TMS1100 ROM image.
///
/// Immutable after construction. Reads mirror modulo the image length, so a
/// partial image repeats across the 11-bit address space the way a partially
/// decoded ROM does.
#[derive(Debug, Clone)]
pub struct Rom {
    data: Vec<u8>,
}

impl Rom {
    /// Build an image from a raw dump in physical counter order.
    pub fn from_raw(raw: &[u8]) -> Result<Self, RomError> {
        if raw.is_empty() || raw.len() % PAGE_WORDS != 0 {
            return Err(RomError::InvalidSize(raw.len()));
        }

        let mut data = vec![0u8; raw.len()];
        for (i, slot) in data.iter_mut().enumerate() {
            let mut word = raw[(i & !0x3F) | PC_SEQUENCE[i & 0x3F] as usize];
            // Branch and call operands (high bit set) carry a counter-order
            // word address; rewrite it to the logical one.
            if word & 0x80 != 0 {
                word = (word & 0xC0) | logical_position(word & 0x3F)?;
            }
            *slot = word;
        }

        info!(
            "descrambled {} byte ROM image ({} pages)",
            data.len(),
            data.len() / PAGE_WORDS
        );
        Ok(Self { data })
    }

    /// Build an image that is already in logical order. Only the size is
    /// checked; useful for tests and tooling.
    pub fn from_logical(data: Vec<u8>) -> Result<Self, RomError> {
        if data.is_empty() || data.len() % PAGE_WORDS != 0 {
            return Err(RomError::InvalidSize(data.len()));
        }
        Ok(Self { data })
    }

    /// Fetch the word at an 11-bit chapter/page/word address.
    pub fn read(&self, addr: u16) -> u8 {
        self.data[addr as usize % self.data.len()]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Inverse of the loader transform: lay a logical image out in physical
/// counter order, branch/call targets included. Test fixture builder.
#[cfg(test)]
pub(crate) fn scramble(logical: &[u8]) -> Vec<u8> {
    let mut raw = vec![0u8; logical.len()];
    for (i, &byte) in logical.iter().enumerate() {
        let mut word = byte;
        if word & 0x80 != 0 {
            word = (word & 0xC0) | PC_SEQUENCE[(word & 0x3F) as usize];
        }
        raw[(i & !0x3F) | PC_SEQUENCE[i & 0x3F] as usize] = word;
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_table_is_a_permutation() {
        let mut seen = [false; PAGE_WORDS];
        for &w in &PC_SEQUENCE {
            assert!(!seen[w as usize], "duplicate entry {w:#04x}");
            seen[w as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn descramble_round_trips_plain_opcodes() {
        // One page of distinct non-branch bytes.
        let logical: Vec<u8> = (0u8..64).collect();
        let rom = Rom::from_raw(&scramble(&logical)).unwrap();
        for (addr, &expected) in logical.iter().enumerate() {
            assert_eq!(rom.read(addr as u16), expected);
        }
    }

    #[test]
    fn descramble_round_trips_branch_targets() {
        // Fill a page with branches to every word plus calls to a few.
        let mut logical: Vec<u8> = (0u8..64).map(|w| 0x80 | w).collect();
        logical[10] = 0xC0 | 0x15;
        logical[11] = 0xC0 | 0x3F;
        let rom = Rom::from_raw(&scramble(&logical)).unwrap();
        for (addr, &expected) in logical.iter().enumerate() {
            assert_eq!(rom.read(addr as u16), expected);
        }
    }

    #[test]
    fn descramble_handles_multiple_pages_independently() {
        let mut logical = vec![0u8; 128];
        for (i, b) in logical.iter_mut().enumerate() {
            *b = (i % 64) as u8;
        }
        logical[0] = 0x99; // page 0 differs from page 1
        let rom = Rom::from_raw(&scramble(&logical)).unwrap();
        assert_eq!(rom.read(0), 0x99);
        assert_eq!(rom.read(64), 0x00);
        assert_eq!(rom.read(65), 0x01);
    }

    #[test]
    fn rejects_bad_sizes() {
        assert!(matches!(Rom::from_raw(&[]), Err(RomError::InvalidSize(0))));
        assert!(matches!(
            Rom::from_raw(&[0u8; 65]),
            Err(RomError::InvalidSize(65))
        ));
        assert!(matches!(
            Rom::from_logical(vec![0u8; 100]),
            Err(RomError::InvalidSize(100))
        ));
    }

    #[test]
    fn reads_mirror_over_short_images() {
        let logical: Vec<u8> = (0u8..64).collect();
        let rom = Rom::from_logical(logical).unwrap();
        assert_eq!(rom.read(64), rom.read(0));
        assert_eq!(rom.read(0x3C5), rom.read(0x05));
    }
}
