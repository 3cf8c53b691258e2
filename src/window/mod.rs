pub mod decorator;

mod window_manager;

use std::fmt;

use ratatui::layout::{Rect, Size};

use crate::buffer::CellBuffer;
use crate::cell::Cell;
use crate::constants::{MIN_WINDOW_HEIGHT, MIN_WINDOW_WIDTH};
use crate::control::{Control, ControlId, ControlTree};
use crate::error::ControlError;
use crate::input::shortcuts::ShortcutRegistry;

pub use decorator::{ChromeHit, DefaultDecorator, WindowDecorator};
pub use window_manager::WindowManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(u32);

impl WindowId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WindowState {
    #[default]
    Normal,
    Minimized,
    Maximized,
    /// Sits in the modal layer and blocks input to everything but itself
    /// and its descendants while open.
    Modal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCapabilities {
    pub resizable: bool,
    pub movable: bool,
    pub closable: bool,
    pub minimizable: bool,
    pub maximizable: bool,
}

impl Default for WindowCapabilities {
    fn default() -> Self {
        Self {
            resizable: true,
            movable: true,
            closable: true,
            minimizable: true,
            maximizable: true,
        }
    }
}

impl WindowCapabilities {
    /// Movable and closable, nothing else. Typical for dialogs.
    pub fn dialog() -> Self {
        Self {
            resizable: false,
            movable: true,
            closable: true,
            minimizable: false,
            maximizable: false,
        }
    }
}

/// Notification raised after a window has been removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowClosed {
    pub id: WindowId,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed,
    /// The window exists but is not closable.
    Rejected,
    NotFound,
}

/// A top-level surface: chrome, geometry and the controls inside it.
///
/// Geometry and state are changed through the [`WindowManager`] so that the
/// right regions are marked dirty; the builder methods here only describe
/// the window before it is added.
#[derive(Debug)]
pub struct Window {
    title: String,
    rect: Rect,
    min_size: Size,
    state: WindowState,
    caps: WindowCapabilities,
    parent: Option<WindowId>,
    controls: ControlTree,
    shortcuts: ShortcutRegistry,
    pub(crate) last_focused: Option<ControlId>,
    pub(crate) restore_rect: Option<Rect>,
    pub(crate) restore_state: WindowState,
    cache: Option<CellBuffer>,
    /// Client rectangle the control tree was last laid out for.
    laid_out: Option<Rect>,
}

impl Window {
    pub fn new(title: impl Into<String>, rect: Rect) -> Self {
        Self {
            title: title.into(),
            rect,
            min_size: Size::new(MIN_WINDOW_WIDTH, MIN_WINDOW_HEIGHT),
            state: WindowState::Normal,
            caps: WindowCapabilities::default(),
            parent: None,
            controls: ControlTree::new(),
            shortcuts: ShortcutRegistry::default(),
            last_focused: None,
            restore_rect: None,
            restore_state: WindowState::Normal,
            cache: None,
            laid_out: None,
        }
    }

    /// Open as a modal dialog.
    pub fn modal(mut self) -> Self {
        self.state = WindowState::Modal;
        self
    }

    pub fn maximized(mut self) -> Self {
        self.state = WindowState::Maximized;
        self
    }

    pub fn with_parent(mut self, parent: WindowId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_min_size(mut self, size: Size) -> Self {
        self.min_size = size;
        self
    }

    pub fn with_capabilities(mut self, caps: WindowCapabilities) -> Self {
        self.caps = caps;
        self
    }

    pub fn closable(mut self, closable: bool) -> Self {
        self.caps.closable = closable;
        self
    }

    pub fn with_control(mut self, control: impl Control) -> Self {
        self.controls.add_root(control);
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub(crate) fn set_title_raw(&mut self, title: String) {
        self.title = title;
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub(crate) fn set_rect(&mut self, rect: Rect) {
        self.rect = rect;
    }

    pub fn min_size(&self) -> Size {
        self.min_size
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: WindowState) {
        self.state = state;
    }

    pub fn is_modal(&self) -> bool {
        self.state == WindowState::Modal
    }

    pub fn is_minimized(&self) -> bool {
        self.state == WindowState::Minimized
    }

    pub fn capabilities(&self) -> WindowCapabilities {
        self.caps
    }

    pub fn parent(&self) -> Option<WindowId> {
        self.parent
    }

    pub fn controls(&self) -> &ControlTree {
        &self.controls
    }

    /// Direct access to the control tree. The layout is redone on next
    /// use, but nothing is marked dirty and focus is not repaired; go
    /// through the manager's `add_control`/`remove_control` for that.
    pub fn controls_mut(&mut self) -> &mut ControlTree {
        self.laid_out = None;
        &mut self.controls
    }

    pub fn shortcuts_mut(&mut self) -> &mut ShortcutRegistry {
        &mut self.shortcuts
    }

    pub(crate) fn take_shortcuts(&mut self) -> ShortcutRegistry {
        std::mem::take(&mut self.shortcuts)
    }

    pub(crate) fn put_shortcuts(&mut self, mut shortcuts: ShortcutRegistry) {
        // Anything registered while the handlers were running is kept.
        shortcuts.absorb(std::mem::take(&mut self.shortcuts));
        self.shortcuts = shortcuts;
    }

    /// Control that held focus when this window was last active.
    pub fn last_focused(&self) -> Option<ControlId> {
        self.last_focused
    }

    /// The composed buffer from the last render, if it still matches the
    /// window's size.
    pub fn cached_buffer(&self) -> Option<&CellBuffer> {
        self.cache
            .as_ref()
            .filter(|buffer| buffer.size() == self.rect.as_size())
    }

    pub(crate) fn has_valid_cache(&self) -> bool {
        self.cached_buffer().is_some()
    }

    /// Lay out and render chrome plus controls into the cached buffer.
    pub(crate) fn compose(
        &mut self,
        decorator: &dyn WindowDecorator,
        focused: bool,
    ) -> Vec<(ControlId, ControlError)> {
        let size = self.rect.as_size();
        let mut buffer = CellBuffer::filled(size.width, size.height, Cell::blank());
        decorator.render(&mut buffer, &self.title, focused, self.caps);
        let mut failures = self.relayout(decorator.client_area(size));
        failures.extend(self.controls.render_into(&mut buffer));
        self.cache = Some(buffer);
        failures
    }

    /// Lay out the control tree unless it already matches the current
    /// client area. Control bounds are valid afterwards.
    pub(crate) fn ensure_layout(
        &mut self,
        decorator: &dyn WindowDecorator,
    ) -> Vec<(ControlId, ControlError)> {
        let client = self.client_area(decorator);
        if self.laid_out == Some(client) {
            return Vec::new();
        }
        self.relayout(client)
    }

    pub(crate) fn invalidate_layout(&mut self) {
        self.laid_out = None;
    }

    fn relayout(&mut self, client: Rect) -> Vec<(ControlId, ControlError)> {
        let failures = self.controls.layout(client);
        self.laid_out = Some(client);
        failures
    }

    /// Window-relative client rectangle for the given decorator.
    pub fn client_area(&self, decorator: &dyn WindowDecorator) -> Rect {
        decorator.client_area(self.rect.as_size())
    }
}
