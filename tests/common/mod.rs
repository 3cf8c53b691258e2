#![allow(dead_code)]

use std::cell::{Cell as StdCell, RefCell};
use std::rc::Rc;

use crossterm::event::KeyCode;
use ratatui::layout::Size;
use term_desk::layout::LayoutHints;
use term_desk::{
    Cell, CellBuffer, Control, ControlError, DeskConfig, KeyEventArgs, MouseEventArgs, Session,
};

pub type Log = Rc<RefCell<Vec<String>>>;

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn session(width: u16, height: u16) -> Session {
    Session::new(DeskConfig::default(), Size::new(width, height)).unwrap()
}

/// Fills its area with a glyph that can be swapped from outside, and logs
/// the input it sees. Consumes character keys only.
pub struct Probe {
    name: &'static str,
    glyph: Rc<StdCell<char>>,
    drawn: Option<char>,
    focusable: bool,
    log: Log,
}

impl Probe {
    pub fn new(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            glyph: Rc::new(StdCell::new(name.chars().next().unwrap_or('?'))),
            drawn: None,
            focusable: false,
            log: Rc::clone(log),
        }
    }

    pub fn focusable(mut self) -> Self {
        self.focusable = true;
        self
    }

    /// Handle for changing what the probe draws.
    pub fn glyph(&self) -> Rc<StdCell<char>> {
        Rc::clone(&self.glyph)
    }
}

impl Control for Probe {
    fn render(&mut self, width: u16, height: u16) -> Result<CellBuffer, ControlError> {
        let glyph = self.glyph.get();
        self.drawn = Some(glyph);
        Ok(CellBuffer::filled(width, height, Cell::new(glyph.to_string())))
    }

    fn accepts_input(&self) -> bool {
        self.focusable
    }

    fn layout(&self) -> LayoutHints {
        LayoutHints::fill()
    }

    fn handle_key(&mut self, event: &mut KeyEventArgs) -> bool {
        self.log
            .borrow_mut()
            .push(format!("{}:key:{:?}", self.name, event.key.code));
        matches!(event.key.code, KeyCode::Char(_))
    }

    fn handle_mouse(&mut self, event: &mut MouseEventArgs) -> bool {
        self.log
            .borrow_mut()
            .push(format!("{}:{:?}", self.name, event.action));
        true
    }

    fn on_focus_changed(&mut self, focused: bool) {
        let verb = if focused { "gained" } else { "lost" };
        self.log.borrow_mut().push(format!("{}:{verb}", self.name));
    }

    fn needs_redraw(&self) -> bool {
        self.drawn != Some(self.glyph.get())
    }
}
