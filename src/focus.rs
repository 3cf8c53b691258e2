//! Focus snapshots.
//!
//! The input router is the only writer. Every transition builds a new
//! [`FocusState`] and swaps it in whole; readers keep cheap `Arc` clones and
//! compare old against new instead of watching fields change.

use std::sync::Arc;
use std::time::Instant;

use crate::control::ControlId;
use crate::window::WindowId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusReason {
    Programmatic,
    Keyboard,
    Mouse,
    WindowActivation,
    ControlRemoved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusState {
    window: Option<WindowId>,
    control: Option<ControlId>,
    reason: FocusReason,
    timestamp: Instant,
}

impl FocusState {
    pub fn new(
        window: Option<WindowId>,
        control: Option<ControlId>,
        reason: FocusReason,
        timestamp: Instant,
    ) -> Self {
        Self {
            window,
            control,
            reason,
            timestamp,
        }
    }

    /// Nothing focused.
    pub fn empty(timestamp: Instant) -> Self {
        Self::new(None, None, FocusReason::Programmatic, timestamp)
    }

    pub fn window(&self) -> Option<WindowId> {
        self.window
    }

    /// `None` while focus rests on the window itself.
    pub fn control(&self) -> Option<ControlId> {
        self.control
    }

    pub fn reason(&self) -> FocusReason {
        self.reason
    }

    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Same window and control, regardless of why or when.
    pub fn same_target(&self, other: &FocusState) -> bool {
        self.window == other.window && self.control == other.control
    }
}

/// Delivered to focus-changed subscribers.
#[derive(Debug, Clone)]
pub struct FocusChange {
    pub previous: Arc<FocusState>,
    pub current: Arc<FocusState>,
}

impl FocusChange {
    pub fn window_changed(&self) -> bool {
        self.previous.window != self.current.window
    }

    pub fn control_changed(&self) -> bool {
        self.previous.control != self.current.control || self.window_changed()
    }
}
