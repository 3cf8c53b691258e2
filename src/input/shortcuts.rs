//! Keyboard shortcuts.
//!
//! A registry maps key combinations to handlers. The session owns one global
//! registry and every window owns its own; window shortcuts are consulted
//! first.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::window::{WindowId, WindowManager};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    pub code: KeyCode,
    pub mods: KeyModifiers,
}

impl KeyCombo {
    pub fn new(code: KeyCode, mods: KeyModifiers) -> Self {
        Self { code, mods }
    }

    pub fn plain(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::NONE)
    }

    pub fn ctrl(c: char) -> Self {
        Self::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    pub fn matches(&self, key: &KeyEvent) -> bool {
        key.code == self.code && key.modifiers == self.mods
    }

    pub fn display(&self) -> String {
        let mut parts = Vec::new();
        if self.mods.contains(KeyModifiers::CONTROL) {
            parts.push("Ctrl".to_string());
        }
        if self.mods.contains(KeyModifiers::SHIFT) {
            parts.push("Shift".to_string());
        }
        if self.mods.contains(KeyModifiers::ALT) {
            parts.push("Alt".to_string());
        }
        let code = match self.code {
            KeyCode::Char(' ') => "Space".to_string(),
            KeyCode::Char(c) => c.to_ascii_uppercase().to_string(),
            KeyCode::Esc => "Esc".to_string(),
            KeyCode::Enter => "Enter".to_string(),
            KeyCode::Tab => "Tab".to_string(),
            KeyCode::BackTab => "Shift+Tab".to_string(),
            KeyCode::Backspace => "Backspace".to_string(),
            KeyCode::Left => "Left".to_string(),
            KeyCode::Right => "Right".to_string(),
            KeyCode::Up => "Up".to_string(),
            KeyCode::Down => "Down".to_string(),
            KeyCode::Home => "Home".to_string(),
            KeyCode::End => "End".to_string(),
            KeyCode::PageUp => "PageUp".to_string(),
            KeyCode::PageDown => "PageDown".to_string(),
            KeyCode::Delete => "Delete".to_string(),
            KeyCode::Insert => "Insert".to_string(),
            KeyCode::F(n) => format!("F{n}"),
            _ => format!("{:?}", self.code),
        };
        parts.push(code);
        parts.join("+")
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// What a shortcut handler gets to work with.
pub struct ShortcutContext<'a> {
    pub windows: &'a mut WindowManager,
    /// The window holding focus when the key arrived.
    pub window: Option<WindowId>,
    pub key: KeyEvent,
}

pub type ShortcutHandler = Box<dyn FnMut(&mut ShortcutContext<'_>) -> bool>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShortcutId(u64);

static NEXT_SHORTCUT_ID: AtomicU64 = AtomicU64::new(1);

struct Shortcut {
    id: ShortcutId,
    combo: KeyCombo,
    description: String,
    handler: ShortcutHandler,
}

#[derive(Default)]
pub struct ShortcutRegistry {
    entries: Vec<Shortcut>,
}

impl fmt::Debug for ShortcutRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|entry| entry.combo.display()))
            .finish()
    }
}

impl ShortcutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handlers for the same combination are tried in registration order
    /// until one returns `true`.
    pub fn register(
        &mut self,
        combo: KeyCombo,
        description: impl Into<String>,
        handler: impl FnMut(&mut ShortcutContext<'_>) -> bool + 'static,
    ) -> ShortcutId {
        let id = ShortcutId(NEXT_SHORTCUT_ID.fetch_add(1, Ordering::Relaxed));
        self.entries.push(Shortcut {
            id,
            combo,
            description: description.into(),
            handler: Box::new(handler),
        });
        id
    }

    pub fn unregister(&mut self, id: ShortcutId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(combo, description)` pairs in registration order, for help screens.
    pub fn bindings(&self) -> Vec<(KeyCombo, &str)> {
        self.entries
            .iter()
            .map(|entry| (entry.combo.clone(), entry.description.as_str()))
            .collect()
    }

    pub fn dispatch(&mut self, ctx: &mut ShortcutContext<'_>) -> bool {
        for entry in &mut self.entries {
            if entry.combo.matches(&ctx.key) && (entry.handler)(ctx) {
                return true;
            }
        }
        false
    }

    /// Append another registry's shortcuts after this one's.
    pub(crate) fn absorb(&mut self, other: ShortcutRegistry) {
        self.entries.extend(other.entries);
    }
}
