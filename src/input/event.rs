//! Structured events handed to controls.

use crossterm::event::{KeyEvent, KeyModifiers, MouseButton};
use ratatui::layout::{Position, Rect};

use crate::control::ControlId;
use crate::window::WindowId;

#[derive(Debug, Clone)]
pub struct KeyEventArgs {
    pub key: KeyEvent,
    pub window: WindowId,
    /// The control currently receiving the event while it bubbles.
    pub target: Option<ControlId>,
    pub handled: bool,
}

impl KeyEventArgs {
    pub fn new(key: KeyEvent, window: WindowId) -> Self {
        Self {
            key,
            window,
            target: None,
            handled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseAction {
    Down,
    Up,
    /// Down and up on the same control, close together in time and space.
    Click,
    DoubleClick,
    Move,
    /// Movement with a button held.
    Drag,
    Enter,
    Leave,
    ScrollUp,
    ScrollDown,
    ScrollLeft,
    ScrollRight,
}

#[derive(Debug, Clone)]
pub struct MouseEventArgs {
    pub action: MouseAction,
    pub button: Option<MouseButton>,
    pub modifiers: KeyModifiers,
    pub window: WindowId,
    pub target: ControlId,
    /// Desktop-absolute.
    pub desktop: Position,
    /// Relative to the window's top-left corner.
    pub window_position: Position,
    /// Relative to `target`'s top-left corner.
    pub position: Position,
    /// 1 for single clicks, 2 for double clicks, 0 otherwise.
    pub click_count: u8,
    pub handled: bool,
}

impl MouseEventArgs {
    /// Point the event at another control, recomputing only the
    /// control-relative position.
    pub(crate) fn retarget(&mut self, target: ControlId, bounds: Rect) {
        self.target = target;
        self.position = Position::new(
            self.window_position.x.saturating_sub(bounds.x),
            self.window_position.y.saturating_sub(bounds.y),
        );
    }
}
