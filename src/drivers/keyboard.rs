//! Key event cleanup applied by the input drivers before the router sees
//! anything.
//!
//! Terminals disagree on how much they report. Plain VT terminals send
//! presses only; Windows consoles and terminals speaking the kitty keyboard
//! protocol also send releases and auto-repeats. The normalizer folds all of
//! them into a stream of presses. It does not assume a platform: the first
//! release it sees tells it that presses and releases come paired.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// What becomes of auto-repeat reports from a held key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyRepeat {
    /// Deliver each repeat as another press, the way a plain terminal
    /// would.
    #[default]
    AsPress,
    Drop,
}

#[derive(Debug, Default)]
pub struct KeyboardNormalizer {
    repeat: KeyRepeat,
    paired_releases: bool,
    esc_held: bool,
}

impl KeyboardNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repeat(mut self, repeat: KeyRepeat) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn repeat(&self) -> KeyRepeat {
        self.repeat
    }

    /// `true` once a release has been seen on this stream.
    pub fn reports_releases(&self) -> bool {
        self.paired_releases
    }

    /// Clean up one event. `None` means the event is swallowed.
    pub fn normalize(&mut self, evt: Event) -> Option<Event> {
        match evt {
            Event::Key(key) => self.normalize_key(key).map(Event::Key),
            other => Some(other),
        }
    }

    fn normalize_key(&mut self, mut key: KeyEvent) -> Option<KeyEvent> {
        if matches!(key.code, KeyCode::Tab | KeyCode::BackTab)
            && key.modifiers.contains(KeyModifiers::SHIFT)
        {
            key.code = KeyCode::BackTab;
            key.modifiers.remove(KeyModifiers::SHIFT);
        }
        match key.kind {
            KeyEventKind::Release => {
                self.paired_releases = true;
                if key.code == KeyCode::Esc {
                    self.esc_held = false;
                }
                None
            }
            KeyEventKind::Repeat => match self.repeat {
                KeyRepeat::Drop => None,
                KeyRepeat::AsPress => {
                    key.kind = KeyEventKind::Press;
                    Some(key)
                }
            },
            KeyEventKind::Press => {
                // Consoles that pair releases also send Esc twice per press.
                if self.paired_releases {
                    if key.code == KeyCode::Esc {
                        if self.esc_held {
                            return None;
                        }
                        self.esc_held = true;
                    } else {
                        self.esc_held = false;
                    }
                }
                Some(key)
            }
        }
    }
}
