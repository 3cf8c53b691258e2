use std::collections::VecDeque;
use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::event::{DisableMouseCapture, EnableMouseCapture, Event};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, terminal};
use ratatui::backend::{Backend, ClearType, CrosstermBackend};
use ratatui::buffer::Cell as TermCell;
use ratatui::layout::Size;

use super::keyboard::{KeyRepeat, KeyboardNormalizer};
use crate::config::DeskConfig;
use super::{InputDriver, OutputDriver};
use crate::compositor::CellWrite;

pub struct ConsoleInputDriver {
    normalizer: KeyboardNormalizer,
    event_queue: VecDeque<Event>,
}

impl Default for ConsoleInputDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleInputDriver {
    pub fn new() -> Self {
        Self {
            normalizer: KeyboardNormalizer::new(),
            event_queue: VecDeque::new(),
        }
    }

    /// Driver with the keyboard settings from `config`.
    pub fn from_config(config: &DeskConfig) -> Self {
        Self::new().with_key_repeat(config.key_repeat)
    }

    pub fn with_key_repeat(mut self, repeat: KeyRepeat) -> Self {
        self.normalizer = KeyboardNormalizer::new().with_repeat(repeat);
        self
    }

    fn read_internal(&mut self) -> io::Result<Event> {
        loop {
            let evt = crossterm::event::read()?;
            if let Some(normalized) = self.normalizer.normalize(evt) {
                return Ok(normalized);
            }
        }
    }

    /// Queue an event ahead of the terminal's own, e.g. one forwarded from
    /// another thread.
    pub fn push_event(&mut self, event: Event) {
        if let Some(normalized) = self.normalizer.normalize(event) {
            self.event_queue.push_back(normalized);
        }
    }
}

impl InputDriver for ConsoleInputDriver {
    fn poll(&mut self, timeout: Duration) -> io::Result<bool> {
        if !self.event_queue.is_empty() {
            return Ok(true);
        }
        crossterm::event::poll(timeout)
    }

    fn read(&mut self) -> io::Result<Event> {
        if let Some(evt) = self.event_queue.pop_front() {
            return Ok(evt);
        }
        self.read_internal()
    }

    fn set_mouse_capture(&mut self, enabled: bool) -> io::Result<()> {
        if enabled {
            execute!(io::stdout(), EnableMouseCapture)
        } else {
            execute!(io::stdout(), DisableMouseCapture)
        }
    }
}

/// Paints cell writes on the real terminal through ratatui's crossterm
/// backend. `enter` switches to the alternate screen in raw mode; `exit`
/// (also run on drop) restores the terminal.
pub struct ConsoleOutputDriver {
    backend: CrosstermBackend<Stdout>,
    entered: bool,
}

impl ConsoleOutputDriver {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            backend: CrosstermBackend::new(io::stdout()),
            entered: false,
        })
    }
}

impl OutputDriver for ConsoleOutputDriver {
    fn enter(&mut self) -> io::Result<()> {
        if self.entered {
            return Ok(());
        }
        execute!(&mut self.backend, EnterAlternateScreen)?;
        terminal::enable_raw_mode()?;
        self.backend.hide_cursor()?;
        self.entered = true;
        Ok(())
    }

    fn exit(&mut self) -> io::Result<()> {
        if !self.entered {
            return Ok(());
        }
        terminal::disable_raw_mode()?;
        execute!(&mut self.backend, DisableMouseCapture, LeaveAlternateScreen)?;
        self.backend.show_cursor()?;
        self.entered = false;
        Ok(())
    }

    fn size(&self) -> io::Result<Size> {
        let (width, height) = terminal::size()?;
        Ok(Size::new(width, height))
    }

    fn clear(&mut self) -> io::Result<()> {
        self.backend.clear_region(ClearType::All)
    }

    fn write_cells(&mut self, cells: &[CellWrite]) -> io::Result<()> {
        // Continuation cells are painted by their lead glyph.
        let converted: Vec<(u16, u16, TermCell)> = cells
            .iter()
            .filter(|write| !write.cell.is_continuation())
            .map(|write| {
                let mut cell = TermCell::default();
                cell.set_symbol(write.cell.symbol());
                cell.set_style(write.cell.style());
                (write.col, write.row, cell)
            })
            .collect();
        self.backend
            .draw(converted.iter().map(|(x, y, cell)| (*x, *y, cell)))
    }

    fn flush(&mut self) -> io::Result<()> {
        Backend::flush(&mut self.backend)
    }
}

impl Drop for ConsoleOutputDriver {
    fn drop(&mut self) {
        let _ = self.exit();
    }
}
