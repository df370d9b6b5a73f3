//! The Merlin board behind the CPU's I/O ports: LED latches, the speaker
//! line and the keypad.

use crate::keypad::{self, MerlinKey};
use log::debug;
use serde::Serialize;
use tms_core::Tms1100Io;

/// Playfield LEDs, one per R output line.
pub const LED_COUNT: usize = tms_core::tms1100::R_LINES;

/// How many matching K-line reads a pressed key stays closed for. Real
/// switches stay closed across many scans; the game debounces by re-reading,
/// so a single event-driven press must persist a while.
const KEY_HOLD_READS: u8 = 32;

/// Merlin hardware state as seen through the CPU's ports.
#[derive(Debug, Default, Serialize)]
pub struct MerlinBoard {
    leds: [bool; LED_COUNT],
    o: u8,
    sound: bool,
    pressed: Option<MerlinKey>,
    hold: u8,
}

impl MerlinBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close a button. It stays closed for a fixed number of matching scans.
    pub fn press(&mut self, key: MerlinKey) {
        debug!("key pressed: {key:?}");
        self.pressed = Some(key);
        self.hold = KEY_HOLD_READS;
    }

    pub fn leds(&self) -> &[bool; LED_COUNT] {
        &self.leds
    }

    /// Latest value the program drove onto the O register.
    pub fn o_register(&self) -> u8 {
        self.o
    }

    /// True once if the speaker line was driven since the last call.
    pub fn take_sound_trigger(&mut self) -> bool {
        std::mem::take(&mut self.sound)
    }
}

impl Tms1100Io for MerlinBoard {
    fn r_line_changed(&mut self, index: u8, on: bool) {
        if let Some(led) = self.leds.get_mut(index as usize) {
            *led = on;
        }
    }

    fn o_register_changed(&mut self, value: u8) {
        self.o = value;
        // O line 0 drives the speaker.
        if value & 0x01 != 0 {
            self.sound = true;
        }
    }

    fn read_k_lines(&mut self, o_register: u8) -> u8 {
        let Some(key) = self.pressed else {
            return 0;
        };
        let k = keypad::k_lines(key, o_register);
        if k != 0 {
            self.hold -= 1;
            if self.hold == 0 {
                self.pressed = None;
            }
        }
        k
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn led_latches_follow_the_r_lines() {
        let mut board = MerlinBoard::new();
        board.r_line_changed(3, true);
        board.r_line_changed(10, true);
        assert!(board.leds()[3]);
        assert!(board.leds()[10]);
        board.r_line_changed(3, false);
        assert!(!board.leds()[3]);
    }

    #[test]
    fn sound_trigger_is_consumed_once() {
        let mut board = MerlinBoard::new();
        board.o_register_changed(0x01);
        assert_eq!(board.o_register(), 0x01);
        assert!(board.take_sound_trigger());
        assert!(!board.take_sound_trigger());

        board.o_register_changed(0x10);
        assert!(!board.take_sound_trigger(), "bit 0 clear is silence");
    }

    #[test]
    fn pressed_key_answers_its_row_only() {
        let mut board = MerlinBoard::new();
        board.press(MerlinKey::Pad(5));
        assert_eq!(board.read_k_lines(0), 0);
        assert_eq!(board.read_k_lines(4), 2);
        assert_eq!(board.read_k_lines(12), 0);
    }

    #[test]
    fn key_releases_after_the_hold_window() {
        let mut board = MerlinBoard::new();
        board.press(MerlinKey::NewGame);
        for _ in 0..32 {
            assert_eq!(board.read_k_lines(12), 8);
        }
        assert_eq!(board.read_k_lines(12), 0, "held reads are used up");
    }

    #[test]
    fn non_matching_scans_do_not_consume_the_hold() {
        let mut board = MerlinBoard::new();
        board.press(MerlinKey::Pad(0));
        for _ in 0..100 {
            assert_eq!(board.read_k_lines(12), 0);
        }
        assert_eq!(board.read_k_lines(0), 1, "key is still closed");
    }

    #[test]
    fn a_new_press_replaces_the_old_one() {
        let mut board = MerlinBoard::new();
        board.press(MerlinKey::Pad(0));
        board.press(MerlinKey::HitMe);
        assert_eq!(board.read_k_lines(0), 0);
        assert_eq!(board.read_k_lines(12), 4);
    }
}
