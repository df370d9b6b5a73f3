//! Core emulator primitives for TMS1100-family handhelds.

pub mod rom;
pub mod tms1100;

pub use rom::{Rom, RomError};
pub use tms1100::{Registers, Tms1100, Tms1100Error, Tms1100Io};

/// A CPU-like component that can be stepped one instruction at a time.
pub trait Cpu {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Return to the power-on state.
    fn reset(&mut self);

    /// Execute one fetch-decode-execute cycle.
    fn step(&mut self) -> Result<(), Self::Error>;
}
