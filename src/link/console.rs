// Terminal operator link for bench use without a serial cable
//
// Puts the terminal in raw mode so single keystrokes arrive immediately,
// matching the one-byte-per-command serial protocol. Raw mode means no
// echo; gain entry input is typed blind.

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use super::{LinkError, OperatorLink};

pub struct ConsoleLink {
    _raw: RawModeGuard,
}

impl ConsoleLink {
    pub fn new() -> Result<Self, LinkError> {
        enable_raw_mode()?;
        Ok(Self {
            _raw: RawModeGuard,
        })
    }
}

impl OperatorLink for ConsoleLink {
    fn readable(&mut self) -> bool {
        event::poll(Duration::ZERO).unwrap_or(false)
    }

    fn read_byte(&mut self) -> Result<u8, LinkError> {
        loop {
            match event::read()? {
                Event::Key(KeyEvent { code, kind, .. })
                    if kind == KeyEventKind::Press || kind == KeyEventKind::Repeat =>
                {
                    match code {
                        KeyCode::Char(c) if c.is_ascii() => return Ok(c as u8),
                        KeyCode::Enter => return Ok(b'\n'),
                        _ => continue,
                    }
                }
                _ => continue,
            }
        }
    }
}

struct RawModeGuard;

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}
