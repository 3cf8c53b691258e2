//! In-memory drivers for tests and benchmarks.
//!
//! [`ScriptedInput`] replays a queue of events; [`HeadlessScreen`] applies
//! cell writes to a [`CellBuffer`] exactly as a terminal would, and can be
//! told to fail so error paths are testable.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use crossterm::event::Event;
use ratatui::layout::Size;

use super::keyboard::{KeyRepeat, KeyboardNormalizer};
use super::{InputDriver, OutputDriver};
use crate::buffer::CellBuffer;
use crate::compositor::CellWrite;

#[derive(Debug, Default)]
pub struct ScriptedInput {
    events: VecDeque<Event>,
    normalizer: KeyboardNormalizer,
    mouse_capture: bool,
}

impl ScriptedInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key_repeat(mut self, repeat: KeyRepeat) -> Self {
        self.normalizer = KeyboardNormalizer::new().with_repeat(repeat);
        self
    }

    pub fn push(&mut self, event: Event) {
        self.events.push_back(event);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn mouse_capture(&self) -> bool {
        self.mouse_capture
    }
}

impl Extend<Event> for ScriptedInput {
    fn extend<I: IntoIterator<Item = Event>>(&mut self, iter: I) {
        self.events.extend(iter);
    }
}

impl FromIterator<Event> for ScriptedInput {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        let mut input = Self::new();
        input.extend(iter);
        input
    }
}

impl InputDriver for ScriptedInput {
    fn poll(&mut self, _timeout: Duration) -> io::Result<bool> {
        Ok(!self.events.is_empty())
    }

    /// Events the normalizer swallows are skipped; an exhausted script reads
    /// as end of input.
    fn read(&mut self) -> io::Result<Event> {
        while let Some(event) = self.events.pop_front() {
            if let Some(event) = self.normalizer.normalize(event) {
                return Ok(event);
            }
        }
        Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "scripted input exhausted",
        ))
    }

    fn set_mouse_capture(&mut self, enabled: bool) -> io::Result<()> {
        self.mouse_capture = enabled;
        Ok(())
    }
}

#[derive(Debug)]
pub struct HeadlessScreen {
    screen: CellBuffer,
    batches: Vec<Vec<CellWrite>>,
    clears: usize,
    flushes: usize,
    entered: bool,
    failures_left: u32,
}

impl HeadlessScreen {
    pub fn new(size: Size) -> Self {
        Self {
            screen: CellBuffer::new(size.width, size.height),
            batches: Vec::new(),
            clears: 0,
            flushes: 0,
            entered: false,
            failures_left: 0,
        }
    }

    /// What a terminal showing every accepted write would display.
    pub fn screen(&self) -> &CellBuffer {
        &self.screen
    }

    /// Simulate a terminal resize. The contents are lost, as they would be
    /// once the host clears and repaints.
    pub fn set_size(&mut self, size: Size) {
        self.screen = CellBuffer::new(size.width, size.height);
    }

    /// Make the next `count` calls to `write_cells` fail.
    pub fn fail_writes(&mut self, count: u32) {
        self.failures_left = count;
    }

    /// Every accepted `write_cells` batch, oldest first.
    pub fn batches(&self) -> &[Vec<CellWrite>] {
        &self.batches
    }

    pub fn last_batch(&self) -> &[CellWrite] {
        self.batches.last().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn total_writes(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    pub fn clears(&self) -> usize {
        self.clears
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    pub fn is_entered(&self) -> bool {
        self.entered
    }
}

impl OutputDriver for HeadlessScreen {
    fn enter(&mut self) -> io::Result<()> {
        self.entered = true;
        Ok(())
    }

    fn exit(&mut self) -> io::Result<()> {
        self.entered = false;
        Ok(())
    }

    fn size(&self) -> io::Result<Size> {
        Ok(self.screen.size())
    }

    fn clear(&mut self) -> io::Result<()> {
        self.clears += 1;
        self.screen = CellBuffer::new(self.screen.width(), self.screen.height());
        Ok(())
    }

    fn write_cells(&mut self, cells: &[CellWrite]) -> io::Result<()> {
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "headless screen rejected the write",
            ));
        }
        for write in cells {
            self.screen.set_raw(write.col, write.row, write.cell.clone());
        }
        self.batches.push(cells.to_vec());
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

/// A scripted input and a headless screen, for hosts that want one value
/// to pass around.
#[derive(Debug)]
pub struct HeadlessDriver {
    pub input: ScriptedInput,
    pub output: HeadlessScreen,
}

impl HeadlessDriver {
    pub fn new(size: Size) -> Self {
        Self {
            input: ScriptedInput::new(),
            output: HeadlessScreen::new(size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

    #[test]
    fn scripted_input_delivers_repeats_unless_told_not_to() {
        let mut repeat = KeyEvent::new(KeyCode::Up, KeyModifiers::NONE);
        repeat.kind = KeyEventKind::Repeat;
        let mut input = ScriptedInput::new();
        input.push(Event::Key(repeat));
        assert!(matches!(input.read().unwrap(), Event::Key(k) if k.kind == KeyEventKind::Press));

        let mut input = ScriptedInput::new().with_key_repeat(KeyRepeat::Drop);
        input.push(Event::Key(repeat));
        assert_eq!(
            input.read().unwrap_err().kind(),
            io::ErrorKind::UnexpectedEof
        );
    }

    #[test]
    fn scripted_input_drains_in_order_then_reports_eof() {
        let mut release = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        let mut input: ScriptedInput = [
            Event::Resize(3, 4),
            Event::Key(release),
            Event::Key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)),
        ]
        .into_iter()
        .collect();
        assert!(input.poll(Duration::ZERO).unwrap());
        assert_eq!(input.read().unwrap(), Event::Resize(3, 4));
        assert!(matches!(input.read().unwrap(), Event::Key(k) if k.code == KeyCode::Enter));
        assert!(!input.poll(Duration::ZERO).unwrap());
        assert_eq!(
            input.read().unwrap_err().kind(),
            io::ErrorKind::UnexpectedEof
        );
    }

    #[test]
    fn screen_applies_writes_and_can_fail() {
        let mut screen = HeadlessScreen::new(Size::new(4, 2));
        let write = CellWrite {
            row: 1,
            col: 2,
            cell: Cell::new("q"),
        };
        screen.fail_writes(1);
        assert!(screen.write_cells(std::slice::from_ref(&write)).is_err());
        assert_eq!(screen.screen().row_text(1), "    ");
        screen.write_cells(&[write]).unwrap();
        assert_eq!(screen.screen().row_text(1), "  q ");
        assert_eq!(screen.total_writes(), 1);
        screen.clear().unwrap();
        assert_eq!(screen.screen().row_text(1), "    ");
    }
}
