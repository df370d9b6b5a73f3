use anyhow::{Context, Result};
use clap::Parser;
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Color, ResetColor, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use emu_merlin::{MerlinKey, MerlinSystem, LED_COUNT};
use std::fs;
use std::io::{stdout, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tms_core::Rom;

/// The console art. LEDs and the speaker bars are repainted in place over
/// this template.
const BOARD_ART: [&str; 21] = [
    "  ┌─────────┐",
    "  │---------│",
    "  │---------│",
    "  │---------│",
    "  └─────────┘",
    " /   ┌───┐   \\",
    " │   │ ~ │   │",
    " ├───┼───┼───┤",
    " │ 1 │ 2 │ 3 │",
    " ├───┼───┼───┤",
    " │ 4 │ 5 │ 6 │",
    " ├───┼───┼───┤",
    " │ 7 │ 8 │ 9 │",
    " ├───┼───┼───┤",
    " │   │ 0 │   │",
    " \\   └───┘   /",
    "  ┌─────────┐",
    "  │  N   S  │",
    "  │         │",
    "  │  H   C  │",
    "  └─────────┘",
];

/// Screen row the art starts at.
const BOARD_TOP: u16 = 1;

/// (row, col) of each playfield LED, top pad first.
const LED_CELLS: [(u16, u16); LED_COUNT] = [
    (7, 7),
    (9, 3),
    (9, 7),
    (9, 11),
    (11, 3),
    (11, 7),
    (11, 11),
    (13, 3),
    (13, 7),
    (13, 11),
    (15, 7),
];

/// Button legend shown when an LED is dark.
const LED_DARK: [&str; LED_COUNT] = ["~", "1", "2", "3", "4", "5", "6", "7", "8", "9", "0"];

const SPEAKER_ON: [&str; 3] = ["  │=========│", "  │=========│", "  │=========│"];
const SPEAKER_OFF: [&str; 3] = ["  │---------│", "  │---------│", "  │---------│"];
const SPEAKER_TOP: u16 = 2;

/// How long the speaker bars stay lit after a buzz.
const SPEAKER_HOLD: Duration = Duration::from_millis(50);

const HELP_ROW: u16 = 23;

#[derive(Parser)]
#[command(
    name = "merlin",
    about = "Milton Bradley Merlin (TMS1100, MP3404) in the terminal"
)]
struct Args {
    /// Raw TMS1100 ROM dump, physical word order
    #[arg(default_value = "mp3404.bin")]
    rom: PathBuf,

    /// Run this many instructions without the terminal UI, then dump the
    /// debug state as JSON
    #[arg(long, value_name = "STEPS")]
    headless: Option<u64>,

    /// RAM cells to allocate (the game fits 128)
    #[arg(long, default_value_t = 128)]
    ram_cells: usize,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let image = fs::read(&args.rom)
        .with_context(|| format!("reading ROM image {}", args.rom.display()))?;
    let rom = Rom::from_raw(&image).context("descrambling ROM image")?;
    let mut sys = MerlinSystem::with_ram_cells(rom, args.ram_cells);

    if let Some(steps) = args.headless {
        for _ in 0..steps {
            sys.step()?;
        }
        println!("{}", serde_json::to_string_pretty(&sys.debug_state())?);
        return Ok(());
    }

    let mut console = Console::enter()?;
    console.draw_board()?;
    console.run(&mut sys)
}

/// Raw-mode terminal session. Dropping it restores the caller's screen.
struct Console {
    leds: [bool; LED_COUNT],
    speaker_until: Option<Instant>,
}

impl Console {
    fn enter() -> Result<Self> {
        let mut out = stdout();
        crossterm::terminal::enable_raw_mode()?;
        crossterm::execute!(out, EnterAlternateScreen, Hide, Clear(ClearType::All))?;
        Ok(Self {
            leds: [false; LED_COUNT],
            speaker_until: None,
        })
    }

    fn draw_board(&mut self) -> Result<()> {
        let mut out = stdout();
        crossterm::queue!(out, Clear(ClearType::All), ResetColor)?;
        for (i, line) in BOARD_ART.iter().enumerate() {
            crossterm::queue!(out, MoveTo(0, BOARD_TOP + i as u16))?;
            write!(out, "{line}")?;
        }
        crossterm::queue!(out, MoveTo(0, HELP_ROW))?;
        write!(out, " keys: ~ 0-9, s=same game, c=comp turn, n=new game, h=hit me, q=quit")?;
        out.flush()?;
        Ok(())
    }

    /// The free-running console loop: poll one key, step the CPU once,
    /// repaint whatever changed.
    fn run(&mut self, sys: &mut MerlinSystem) -> Result<()> {
        loop {
            if event::poll(Duration::from_micros(2))? {
                if let Event::Key(KeyEvent {
                    code,
                    modifiers,
                    kind: KeyEventKind::Press,
                    ..
                }) = event::read()?
                {
                    match code {
                        KeyCode::Char('q') | KeyCode::Esc => break,
                        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => break,
                        KeyCode::Char(c) => {
                            if let Some(key) = key_for(c) {
                                sys.press_key(key);
                            }
                        }
                        _ => {}
                    }
                }
            }

            sys.step()?;
            self.repaint(sys)?;
        }
        Ok(())
    }

    fn repaint(&mut self, sys: &mut MerlinSystem) -> Result<()> {
        let mut out = stdout();
        let mut dirty = false;

        let leds = *sys.board().leds();
        for (i, &on) in leds.iter().enumerate() {
            if on == self.leds[i] {
                continue;
            }
            self.leds[i] = on;
            let (row, col) = LED_CELLS[i];
            crossterm::queue!(out, MoveTo(col, row))?;
            if on {
                crossterm::queue!(out, SetForegroundColor(Color::Red))?;
                write!(out, "■")?;
                crossterm::queue!(out, ResetColor)?;
            } else {
                write!(out, "{}", LED_DARK[i])?;
            }
            dirty = true;
        }

        if sys.board_mut().take_sound_trigger() && self.speaker_until.is_none() {
            self.paint_speaker(&mut out, &SPEAKER_ON)?;
            self.speaker_until = Some(Instant::now() + SPEAKER_HOLD);
            dirty = true;
        } else if self.speaker_until.is_some_and(|t| Instant::now() >= t) {
            self.paint_speaker(&mut out, &SPEAKER_OFF)?;
            self.speaker_until = None;
            dirty = true;
        }

        if dirty {
            out.flush()?;
        }
        Ok(())
    }

    fn paint_speaker(&self, out: &mut impl Write, lines: &[&str; 3]) -> Result<()> {
        for (i, line) in lines.iter().enumerate() {
            crossterm::queue!(out, MoveTo(0, SPEAKER_TOP + i as u16))?;
            write!(out, "{line}")?;
        }
        Ok(())
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        let mut out = stdout();
        let _ = crossterm::execute!(out, Show, LeaveAlternateScreen);
        let _ = crossterm::terminal::disable_raw_mode();
    }
}

/// Keyboard to front panel. The board art labels the top pad `~` and the
/// bottom pad `0`.
fn key_for(c: char) -> Option<MerlinKey> {
    match c.to_ascii_lowercase() {
        '~' => Some(MerlinKey::Pad(0)),
        '0' => Some(MerlinKey::Pad(10)),
        d @ '1'..='9' => Some(MerlinKey::Pad(d as u8 - b'0')),
        's' => Some(MerlinKey::SameGame),
        'c' => Some(MerlinKey::ComputerTurn),
        'n' => Some(MerlinKey::NewGame),
        'h' => Some(MerlinKey::HitMe),
        _ => None,
    }
}
