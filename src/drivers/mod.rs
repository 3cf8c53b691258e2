//! Terminal I/O seams.
//!
//! The core never talks to a terminal directly: it reads events from an
//! [`InputDriver`] and hands cell writes to an [`OutputDriver`]. The console
//! drivers speak to the real terminal through crossterm; the headless ones
//! keep everything in memory for tests and benchmarks.

pub mod console;
pub mod headless;
pub mod keyboard;

use ::crossterm::event::Event;
use ratatui::layout::Size;
use std::io;
use std::time::Duration;

use crate::compositor::CellWrite;

pub trait InputDriver {
    fn poll(&mut self, timeout: Duration) -> io::Result<bool>;
    fn read(&mut self) -> io::Result<Event>;
    fn set_mouse_capture(&mut self, _enabled: bool) -> io::Result<()> {
        Ok(())
    }
}

impl<T: InputDriver + ?Sized> InputDriver for &mut T {
    fn poll(&mut self, timeout: Duration) -> io::Result<bool> {
        (**self).poll(timeout)
    }

    fn read(&mut self) -> io::Result<Event> {
        (**self).read()
    }

    fn set_mouse_capture(&mut self, enabled: bool) -> io::Result<()> {
        (**self).set_mouse_capture(enabled)
    }
}

/// Receives composed frames. Writes may arrive in any order and are never
/// deduplicated by the caller beyond what the diff already did.
pub trait OutputDriver {
    fn enter(&mut self) -> io::Result<()>;
    fn exit(&mut self) -> io::Result<()>;
    fn size(&self) -> io::Result<Size>;
    fn clear(&mut self) -> io::Result<()>;
    fn write_cells(&mut self, cells: &[CellWrite]) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}

impl<T: OutputDriver + ?Sized> OutputDriver for &mut T {
    fn enter(&mut self) -> io::Result<()> {
        (**self).enter()
    }

    fn exit(&mut self) -> io::Result<()> {
        (**self).exit()
    }

    fn size(&self) -> io::Result<Size> {
        (**self).size()
    }

    fn clear(&mut self) -> io::Result<()> {
        (**self).clear()
    }

    fn write_cells(&mut self, cells: &[CellWrite]) -> io::Result<()> {
        (**self).write_cells(cells)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}
