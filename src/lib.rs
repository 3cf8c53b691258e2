//! A windowing compositor and input router for terminal applications.
//!
//! `term-desk` keeps a z-ordered set of overlapping windows, each owning a
//! tree of controls, and turns them into the smallest set of cell writes the
//! terminal needs each frame. Keyboard and mouse input is hit-tested against
//! the same z-order and delivered to exactly one control, bubbling upward
//! until something handles it.
//!
//! The [`session::Session`] ties the pieces together and is the single writer
//! of all UI state; background threads talk to it through a
//! [`session::SessionHandle`].

pub mod buffer;
pub mod cell;
pub mod compositor;
pub mod config;
pub mod constants;
pub mod control;
pub mod dirty;
pub mod drivers;
pub mod error;
pub mod event_loop;
pub mod focus;
pub mod input;
pub mod layout;
pub mod logging;
pub mod observer;
pub mod scheduler;
pub mod session;
pub mod window;

pub use buffer::CellBuffer;
pub use cell::Cell;
pub use compositor::{CellWrite, Compositor, FrameReport};
pub use config::DeskConfig;
pub use control::{Control, ControlId, ControlTree};
pub use dirty::{DirtyGranularity, DirtyRegion, DirtyTracker, Invalidate};
pub use drivers::keyboard::KeyRepeat;
pub use error::{ControlError, DeskError, DeskResult};
pub use focus::{FocusChange, FocusReason, FocusState};
pub use input::{InputRouter, KeyEventArgs, MouseAction, MouseEventArgs, RouteOutcome};
pub use session::{MutationRequest, Session, SessionHandle};
pub use window::{
    CloseOutcome, Window, WindowCapabilities, WindowClosed, WindowId, WindowManager, WindowState,
};
