//! Milton Bradley Merlin system emulation.
//!
//! Wires a [`tms_core`] TMS1100 to the handheld's hardware: eleven playfield
//! LEDs on the R lines, a speaker on O line 0 and the scanned keypad on the
//! K lines. Frontends poll the board state between steps and feed key
//! presses in; rendering and pacing are theirs.

mod board;
mod keypad;

pub use board::{MerlinBoard, LED_COUNT};
pub use keypad::{k_lines, MerlinKey};

use serde_json::Value;
use thiserror::Error;
use tms_core::{Cpu, Rom, RomError, Tms1100, Tms1100Error};

/// RAM cells fitted on the game's die.
const MERLIN_RAM_CELLS: usize = 128;

#[derive(Debug, Error)]
pub enum MerlinError {
    #[error("ROM image error: {0}")]
    Rom(#[from] RomError),
    #[error("CPU fault: {0}")]
    Cpu(#[from] Tms1100Error),
}

/// The Merlin handheld.
pub struct MerlinSystem {
    cpu: Tms1100<MerlinBoard>,
    steps: u64,
}

impl MerlinSystem {
    /// Build a system around an already-descrambled ROM image.
    pub fn new(rom: Rom) -> Self {
        Self::with_ram_cells(rom, MERLIN_RAM_CELLS)
    }

    /// Build a system with a non-standard RAM fit. The core clamps the
    /// allocation up to the addressable window.
    pub fn with_ram_cells(rom: Rom, ram_cells: usize) -> Self {
        Self {
            cpu: Tms1100::new(rom, ram_cells, MerlinBoard::new()),
            steps: 0,
        }
    }

    /// Build a system from a raw ROM dump in physical word order.
    pub fn from_raw_image(image: &[u8]) -> Result<Self, MerlinError> {
        Ok(Self::new(Rom::from_raw(image)?))
    }

    /// Power-cycle the whole board.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.cpu.ports = MerlinBoard::new();
        self.steps = 0;
    }

    /// Run one CPU instruction.
    pub fn step(&mut self) -> Result<(), MerlinError> {
        self.cpu.step()?;
        self.steps += 1;
        Ok(())
    }

    /// Press a front-panel button.
    pub fn press_key(&mut self, key: MerlinKey) {
        self.cpu.ports.press(key);
    }

    pub fn board(&self) -> &MerlinBoard {
        &self.cpu.ports
    }

    pub fn board_mut(&mut self) -> &mut MerlinBoard {
        &mut self.cpu.ports
    }

    /// Instructions executed since power-on or the last reset.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// JSON snapshot for debugging; inspection only, never loaded back.
    pub fn debug_state(&self) -> Value {
        serde_json::json!({
            "system": "merlin",
            "steps": self.steps,
            "cpu": self.cpu.debug_state(),
            "board": self.cpu.ports,
        })
    }
}
