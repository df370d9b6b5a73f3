//! Merlin front-panel keypad.
//!
//! The keypad has no dedicated input pins: the game program drives the O
//! register to one of four scan values and samples the K lines, and each scan
//! value selects one row of switches. The playfield buttons share their row
//! wiring with the R lines that light them.

use serde::Serialize;

/// A front-panel button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MerlinKey {
    /// One of the eleven playfield buttons, 0 (top) through 10 (bottom).
    /// Button `n` sits on the LED driven by R line `n`.
    Pad(u8),
    SameGame,
    ComputerTurn,
    NewGame,
    HitMe,
}

/// K-line column pattern of the four switches in a scanned row.
const K_COLUMNS: [u8; 4] = [1, 2, 8, 4];

/// K-line response of `key` when the program scans with `scan` in the O
/// register. Zero when the key is not in the scanned row (or not a key at
/// all: pad numbers above 10 match nothing).
pub fn k_lines(key: MerlinKey, scan: u8) -> u8 {
    match (scan, key) {
        (0, MerlinKey::Pad(n @ 0..=3)) => K_COLUMNS[n as usize],
        (4, MerlinKey::Pad(n @ 4..=7)) => K_COLUMNS[n as usize - 4],
        (8, MerlinKey::Pad(n @ 8..=10)) => K_COLUMNS[n as usize - 8],
        (8, MerlinKey::SameGame) => 4,
        (12, MerlinKey::ComputerTurn) => 2,
        (12, MerlinKey::NewGame) => 8,
        (12, MerlinKey::HitMe) => 4,
        _ => 0,
    }
}
