//! TMS1100 CPU core.
//!
//! A 4-bit microcontroller: 2K of mask ROM addressed as chapter/page/word,
//! 128 nibbles of RAM addressed through the X/Y register pair, an accumulator,
//! a single status flag and a one-deep subroutine return slot. Hardware boards
//! attach through the [`Tms1100Io`] trait; the Merlin handheld wires its LEDs,
//! speaker and keypad there.
//!
//! The instruction set is dispatched through a 256-entry table built once at
//! construction. Families that embed a constant in the opcode (TCY, YNEC,
//! TCMIY, LDP, LDX and the bit instructions) carry that constant in their
//! table entry; branch and call words carry their 6-bit target.

use crate::rom::Rom;
use log::trace;
use serde::Serialize;
use thiserror::Error;

/// Number of R output lines latched by the CPU.
pub const R_LINES: usize = 11;

/// Reach of the X/Y register pair into the RAM array: X loads values up to
/// 7, so the window spans 128 cells.
const RAM_WINDOW: usize = 128;

/// Power-on fill pattern of the RAM cells.
const RAM_POWER_ON: u8 = 0x0A;

#[derive(Debug, Error)]
pub enum Tms1100Error {
    #[error("undefined opcode {opcode:#04x} fetched at ROM address {addr:#05x}")]
    UndefinedOpcode { opcode: u8, addr: u16 },
}

/// I/O ports of the TMS1100.
///
/// Implementations supply the board hardware around the CPU. Every method has
/// a no-op default, so a bare CPU (or one with only some lines wired) runs
/// without further ceremony. All calls happen synchronously on the stepping
/// thread and must return promptly.
pub trait Tms1100Io {
    /// An R output line changed state. `index` is `0..=10`.
    fn r_line_changed(&mut self, index: u8, on: bool) {
        let _ = (index, on);
    }

    /// The O output register was rewritten. `value` is `0..=31`.
    fn o_register_changed(&mut self, value: u8) {
        let _ = value;
    }

    /// Sample the K input lines. The current O register value selects which
    /// switch row is being scanned.
    fn read_k_lines(&mut self, o_register: u8) -> u8 {
        let _ = o_register;
        0
    }
}

/// No hardware attached; all ports keep their default behavior.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIo;

impl Tms1100Io for NoIo {}

#[inline]
fn set1(v: u8) -> u8 {
    v & 0x01
}

#[inline]
fn set2(v: u8) -> u8 {
    v & 0x03
}

#[inline]
fn set3(v: u8) -> u8 {
    v & 0x07
}

#[inline]
fn set4(v: u8) -> u8 {
    v & 0x0F
}

#[inline]
fn set6(v: u8) -> u8 {
    v & 0x3F
}

/// Four's complement, the 4-bit adder's view of `-v - 1`.
#[inline]
fn not4(v: u8) -> u8 {
    !v & 0x0F
}

/// TMS1100 register file.
///
/// Every field stays masked to its hardware width; the execution engine only
/// writes through the masking helpers above.
#[derive(Debug, Clone, Serialize)]
pub struct Registers {
    /// RAM file address, 3 bits. Only files 0..=3 reach the R output lines.
    pub x: u8,
    /// RAM word address and R line selector, 4 bits.
    pub y: u8,
    /// Accumulator, 4 bits.
    pub a: u8,
    /// Status flag. Every instruction defaults it to true and the
    /// arithmetic/compare instructions recompute it.
    pub s: bool,
    /// Status latch, written only by YNEA.
    pub sl: bool,
    /// Latched K input value, 4 bits.
    pub k: u8,
    /// Latched O output value, 5 bits.
    pub o: u8,
    /// Current ROM page, 4 bits.
    pub pa: u8,
    /// Page buffer: the page a branch or call will land in, 4 bits.
    pub pb: u8,
    /// Program counter within the page, 6 bits.
    pub pc: u8,
    /// Saved subroutine return address, 6 bits.
    pub sr: u8,
    /// Call latch: true while the single return slot is occupied.
    pub cl: bool,
    /// Current chapter, 1 bit.
    pub ca: u8,
    /// Chapter buffer: the chapter a branch or call will land in, 1 bit.
    pub cb: u8,
    /// Saved subroutine chapter, 1 bit.
    pub cs: u8,
    /// R output line latches.
    pub r: [bool; R_LINES],
}

impl Registers {
    /// Register values as the silicon comes up.
    pub fn power_on() -> Self {
        Self {
            x: set2(0xAA),
            y: set4(0xAA),
            a: set4(0xAA),
            s: false,
            sl: false,
            k: 0,
            o: 0,
            pa: set4(0xFF),
            pb: set4(0xFF),
            pc: 0,
            sr: 0,
            cl: false,
            ca: 0,
            cb: 0,
            cs: 0,
            r: [false; R_LINES],
        }
    }

    /// Effective 11-bit ROM fetch address: chapter, page, word.
    pub fn rom_address(&self) -> u16 {
        ((self.ca as u16) << 10) | ((self.pa as u16) << 6) | self.pc as u16
    }

    /// Effective RAM address: `(X << 4) | Y`.
    pub fn ram_address(&self) -> usize {
        ((self.x as usize) << 4) | self.y as usize
    }
}

/// Decoded operation. Constant-carrying families keep their embedded value
/// here; branch and call keep their word target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    // register transfers
    Tay,
    Tya,
    Cla,
    // accumulator to memory
    Tam,
    Tamiyc,
    Tamdyn,
    Tamza,
    // memory to register
    Tmy,
    Tma,
    Xma,
    // arithmetic
    Amaac,
    Saman,
    Imac,
    Dman,
    Iac,
    Dan,
    Aac(u8),
    Iyc,
    Dyn,
    Cpaiz,
    // compares
    Alem,
    Mnea,
    Mnez,
    Ynea,
    Ynec(u8),
    // RAM bits
    Sbit(u8),
    Rbit(u8),
    Tbit1(u8),
    // constants into registers
    Tcy(u8),
    Tcmiy(u8),
    Ldx(u8),
    Ldp(u8),
    // I/O
    Setr,
    Rstr,
    Knez,
    Tka,
    Tdo,
    // ROM addressing
    Br(u8),
    Call(u8),
    Retn,
    Comc,
    Comx,
}

/// Constant order for the 16-wide TCY/YNEC/TCMIY/LDP families: the low
/// opcode nibble addresses its constant with the bits reversed.
const NIBBLE_BITREV: [u8; 16] = [0, 8, 4, 12, 2, 10, 6, 14, 1, 9, 5, 13, 3, 11, 7, 15];

/// Bit index order for SBIT/RBIT/TBIT1.
const BIT_ORDER: [u8; 4] = [0, 2, 1, 3];

/// Embedded X value order for LDX.
const X_ORDER: [u8; 8] = [0, 4, 2, 6, 1, 5, 3, 7];

fn build_opcode_table() -> [Option<Op>; 256] {
    let mut t = [None; 256];

    t[0x00] = Some(Op::Mnea);
    t[0x01] = Some(Op::Alem);
    t[0x02] = Some(Op::Ynea);
    t[0x03] = Some(Op::Xma);
    t[0x04] = Some(Op::Dyn);
    t[0x05] = Some(Op::Iyc);
    t[0x06] = Some(Op::Amaac);
    t[0x07] = Some(Op::Dman);
    t[0x08] = Some(Op::Tka);
    t[0x09] = Some(Op::Comx);
    t[0x0A] = Some(Op::Tdo);
    t[0x0B] = Some(Op::Comc);
    t[0x0C] = Some(Op::Rstr);
    t[0x0D] = Some(Op::Setr);
    t[0x0E] = Some(Op::Knez);
    t[0x0F] = Some(Op::Retn);

    for (i, &k) in NIBBLE_BITREV.iter().enumerate() {
        t[0x10 + i] = Some(Op::Ldp(k));
        t[0x40 + i] = Some(Op::Tcy(k));
        t[0x50 + i] = Some(Op::Ynec(k));
        t[0x60 + i] = Some(Op::Tcmiy(k));
    }

    t[0x20] = Some(Op::Tay);
    t[0x21] = Some(Op::Tma);
    t[0x22] = Some(Op::Tmy);
    t[0x23] = Some(Op::Tya);
    t[0x24] = Some(Op::Tamdyn);
    t[0x25] = Some(Op::Tamiyc);
    t[0x26] = Some(Op::Tamza);
    t[0x27] = Some(Op::Tam);

    for (i, &x) in X_ORDER.iter().enumerate() {
        t[0x28 + i] = Some(Op::Ldx(x));
    }

    for (i, &bit) in BIT_ORDER.iter().enumerate() {
        t[0x30 + i] = Some(Op::Sbit(bit));
        t[0x34 + i] = Some(Op::Rbit(bit));
        t[0x38 + i] = Some(Op::Tbit1(bit));
    }

    t[0x3C] = Some(Op::Saman);
    t[0x3D] = Some(Op::Cpaiz);
    t[0x3E] = Some(Op::Imac);
    t[0x3F] = Some(Op::Mnez);

    // The constant-add block interleaves its addends the same way the 16-wide
    // families do. 0x70 and 0x77 are the increment/decrement mnemonics,
    // 0x7F clears instead of adding.
    t[0x70] = Some(Op::Iac);
    t[0x71] = Some(Op::Aac(9));
    t[0x72] = Some(Op::Aac(5));
    t[0x73] = Some(Op::Aac(13));
    t[0x74] = Some(Op::Aac(3));
    t[0x75] = Some(Op::Aac(11));
    t[0x76] = Some(Op::Aac(7));
    t[0x77] = Some(Op::Dan);
    t[0x78] = Some(Op::Aac(2));
    t[0x79] = Some(Op::Aac(10));
    t[0x7A] = Some(Op::Aac(6));
    t[0x7B] = Some(Op::Aac(14));
    t[0x7C] = Some(Op::Aac(4));
    t[0x7D] = Some(Op::Aac(12));
    t[0x7E] = Some(Op::Aac(8));
    t[0x7F] = Some(Op::Cla);

    for w in 0..0x40u8 {
        t[0x80 + w as usize] = Some(Op::Br(w));
        t[0xC0 + w as usize] = Some(Op::Call(w));
    }

    t
}

/// TMS1100 CPU with its ROM, RAM and attached I/O ports.
pub struct Tms1100<P: Tms1100Io> {
    /// Register file.
    pub regs: Registers,
    /// Attached board hardware.
    pub ports: P,
    ram: Vec<u8>,
    rom: Rom,
    table: [Option<Op>; 256],
}

impl<P: Tms1100Io> Tms1100<P> {
    /// Create a CPU around a descrambled ROM image.
    ///
    /// `ram_cells` is the fitted RAM capacity; the X/Y window always reaches
    /// 128 cells, so at least that many are allocated. Surplus cells are
    /// unreachable through the addressing scheme and stay at the power-on
    /// pattern.
    pub fn new(rom: Rom, ram_cells: usize, ports: P) -> Self {
        Self {
            regs: Registers::power_on(),
            ports,
            ram: vec![RAM_POWER_ON; ram_cells.max(RAM_WINDOW)],
            rom,
            table: build_opcode_table(),
        }
    }

    /// Execute one fetch-decode-execute cycle.
    ///
    /// The program counter advances page-locally before the operation runs;
    /// page and chapter only change through branch, call and return. The
    /// status flag observed by a branch or call is the one the previous
    /// instruction left behind.
    pub fn step(&mut self) -> Result<(), Tms1100Error> {
        let addr = self.regs.rom_address();
        let opcode = self.rom.read(addr);
        let op = self.table[opcode as usize]
            .ok_or(Tms1100Error::UndefinedOpcode { opcode, addr })?;

        trace!(
            "{:X}:{:02X} op {:02X} x:{:X} y:{:X} a:{:X} s:{} cl:{}",
            self.regs.pa,
            self.regs.pc,
            opcode,
            self.regs.x,
            self.regs.y,
            self.regs.a,
            u8::from(self.regs.s),
            u8::from(self.regs.cl),
        );

        self.regs.pc = set6(self.regs.pc + 1);
        let last_status = self.regs.s;
        self.regs.s = true;
        self.exec(op, last_status);
        Ok(())
    }

    fn exec(&mut self, op: Op, last_status: bool) {
        match op {
            Op::Tay => self.regs.y = self.regs.a,
            Op::Tya => self.regs.a = self.regs.y,
            Op::Cla => self.regs.a = 0,

            Op::Tam => self.write_ram(self.regs.a),
            Op::Tamiyc => {
                self.write_ram(self.regs.a);
                self.regs.s = self.regs.y == 0x0F;
                self.regs.y = set4(self.regs.y + 1);
            }
            Op::Tamdyn => {
                self.write_ram(self.regs.a);
                self.regs.s = self.regs.y >= 1;
                self.regs.y = set4(self.regs.y.wrapping_sub(1));
            }
            Op::Tamza => {
                self.write_ram(self.regs.a);
                self.regs.a = 0;
            }

            Op::Tmy => self.regs.y = self.read_ram(),
            Op::Tma => self.regs.a = self.read_ram(),
            Op::Xma => {
                let m = self.read_ram();
                self.write_ram(self.regs.a);
                self.regs.a = m;
            }

            Op::Amaac => {
                let m = self.read_ram();
                self.acc_add(m);
            }
            Op::Saman => {
                let sum = not4(self.regs.a) + self.read_ram() + 1;
                self.regs.s = sum > 0x0F;
                self.regs.a = set4(sum);
            }
            Op::Imac => {
                self.regs.a = self.read_ram();
                self.acc_add(1);
            }
            Op::Dman => {
                self.regs.a = self.read_ram();
                self.acc_add(0x0F);
            }
            Op::Iac => self.acc_add(1),
            Op::Dan => self.acc_add(0x0F),
            Op::Aac(k) => self.acc_add(k),
            Op::Iyc => {
                let sum = self.regs.y + 1;
                self.regs.s = sum > 0x0F;
                self.regs.y = set4(sum);
            }
            Op::Dyn => {
                let sum = self.regs.y + 0x0F;
                self.regs.s = sum > 0x0F;
                self.regs.y = set4(sum);
            }
            Op::Cpaiz => {
                let sum = not4(self.regs.a) + 1;
                self.regs.s = sum > 0x0F;
                self.regs.a = set4(sum);
            }

            Op::Alem => {
                // A <= memory, computed as a four's-complement add so the
                // status is the adder's carry-out; registers are untouched.
                let sum = not4(self.regs.a) + self.read_ram() + 1;
                self.regs.s = sum > 0x0F;
            }
            Op::Mnea => self.regs.s = self.read_ram() != self.regs.a,
            Op::Mnez => self.regs.s = self.read_ram() != 0,
            Op::Ynea => {
                self.regs.s = self.regs.a != self.regs.y;
                self.regs.sl = self.regs.s;
            }
            Op::Ynec(k) => self.regs.s = self.regs.y != k,

            Op::Sbit(bit) => {
                let m = self.read_ram();
                self.write_ram(m | 1 << bit);
            }
            Op::Rbit(bit) => {
                let m = self.read_ram();
                self.write_ram(m & set4(!(1 << bit)));
            }
            Op::Tbit1(bit) => self.regs.s = self.read_ram() & (1 << bit) != 0,

            Op::Tcy(k) => self.regs.y = k,
            Op::Tcmiy(k) => {
                self.write_ram(k);
                self.regs.y = set4(self.regs.y + 1);
            }
            Op::Ldx(x) => self.regs.x = set3(x),
            Op::Ldp(p) => self.regs.pb = p,

            Op::Setr => self.write_r_line(true),
            Op::Rstr => self.write_r_line(false),
            Op::Knez => {
                self.latch_k();
                self.regs.s = self.regs.k != 0;
            }
            Op::Tka => {
                self.latch_k();
                self.regs.a = self.regs.k;
            }
            Op::Tdo => {
                // SL rides on the high bit of the 5-bit output.
                self.regs.o = self.regs.a | if self.regs.sl { 0x10 } else { 0 };
                self.ports.o_register_changed(self.regs.o);
            }

            Op::Br(target) => {
                if last_status {
                    self.regs.ca = self.regs.cb;
                    self.regs.pc = target;
                    // Inside an active call the page is pinned; the branch
                    // stays within the subroutine's page.
                    if !self.regs.cl {
                        self.regs.pa = self.regs.pb;
                    }
                }
            }
            Op::Call(target) => {
                if last_status {
                    if self.regs.cl {
                        // The single return slot is occupied: only the page
                        // buffer follows, SR and CS keep the outer context.
                        self.regs.pb = self.regs.pa;
                    } else {
                        self.regs.cs = self.regs.ca;
                        self.regs.sr = self.regs.pc;
                        std::mem::swap(&mut self.regs.pa, &mut self.regs.pb);
                        self.regs.cl = true;
                    }
                    self.regs.ca = self.regs.cb;
                    self.regs.pc = target;
                }
            }
            Op::Retn => {
                self.regs.pa = self.regs.pb;
                if self.regs.cl {
                    self.regs.ca = self.regs.cs;
                    self.regs.pc = self.regs.sr;
                    self.regs.cl = false;
                }
            }
            Op::Comc => self.regs.cb = set1(!self.regs.cb),
            // Complement-X exists in the instruction map but is not wired on
            // this RAM geometry; the Merlin program never issues it.
            Op::Comx => {}
        }
    }

    /// RAM cell at the current X/Y address.
    fn read_ram(&self) -> u8 {
        self.ram[self.regs.ram_address()]
    }

    fn write_ram(&mut self, value: u8) {
        let addr = self.regs.ram_address();
        self.ram[addr] = set4(value);
    }

    /// Add through the 4-bit adder: carry-out becomes the status flag.
    /// Decrements come through here as adds of 0x0F, which inverts the
    /// status convention relative to naive subtraction.
    fn acc_add(&mut self, addend: u8) {
        let sum = self.regs.a + addend;
        self.regs.s = sum > 0x0F;
        self.regs.a = set4(sum);
    }

    fn latch_k(&mut self) {
        self.regs.k = set4(self.ports.read_k_lines(self.regs.o));
    }

    fn write_r_line(&mut self, on: bool) {
        // Only the 11 physical lines exist; other X/Y combinations are
        // silently dropped by the output PLA.
        if self.regs.x <= 3 && self.regs.y <= 10 {
            self.regs.r[self.regs.y as usize] = on;
            self.ports.r_line_changed(self.regs.y, on);
        }
    }

    /// The RAM array, surplus cells included. Debug inspection only.
    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    /// The descrambled ROM image.
    pub fn rom(&self) -> &Rom {
        &self.rom
    }

    /// JSON snapshot of registers and RAM for debugging. Never loaded back.
    pub fn debug_state(&self) -> serde_json::Value {
        serde_json::json!({
            "regs": self.regs,
            "ram": self.ram,
            "rom_words": self.rom.len(),
        })
    }
}

impl<P: Tms1100Io> crate::Cpu for Tms1100<P> {
    type Error = Tms1100Error;

    fn reset(&mut self) {
        self.regs = Registers::power_on();
        self.ram.fill(RAM_POWER_ON);
    }

    fn step(&mut self) -> Result<(), Tms1100Error> {
        Tms1100::step(self)
    }
}
