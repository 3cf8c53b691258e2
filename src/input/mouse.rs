//! Click synthesis and hover tracking.
//!
//! The tracker is pure bookkeeping: the router feeds it raw presses,
//! releases and pointer targets with an explicit `now`, and it answers with
//! the synthesized actions.

use std::time::{Duration, Instant};

use ratatui::layout::Position;

use super::event::MouseAction;
use crate::config::DeskConfig;
use crate::control::ControlId;
use crate::window::WindowId;

pub type Target = (WindowId, ControlId);

#[derive(Debug, Clone, Copy)]
struct Press {
    target: Option<Target>,
    at: Position,
    time: Instant,
}

#[derive(Debug, Clone, Copy)]
struct LastClick {
    target: Target,
    time: Instant,
}

#[derive(Debug, Clone)]
pub struct MouseTracker {
    click_timeout: Duration,
    double_click_timeout: Duration,
    max_distance: u16,
    press: Option<Press>,
    last_click: Option<LastClick>,
    hover: Option<Target>,
}

/// Hover transition produced by a pointer move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HoverChange {
    pub leave: Option<Target>,
    pub enter: Option<Target>,
}

impl MouseTracker {
    pub fn new(config: &DeskConfig) -> Self {
        Self {
            click_timeout: config.click_timeout,
            double_click_timeout: config.double_click_timeout,
            max_distance: config.click_max_distance,
            press: None,
            last_click: None,
            hover: None,
        }
    }

    pub fn press(&mut self, target: Option<Target>, at: Position, now: Instant) {
        self.press = Some(Press { target, at, time: now });
    }

    /// Control that received the last press, while a button is held.
    pub fn pressed_target(&self) -> Option<Target> {
        self.press.and_then(|press| press.target)
    }

    /// Actions to synthesize after `Up`: nothing, `Click`, or `Click`
    /// followed by `DoubleClick`.
    pub fn release(&mut self, target: Option<Target>, at: Position, now: Instant) -> Vec<MouseAction> {
        let Some(press) = self.press.take() else {
            return Vec::new();
        };
        let Some(target) = target else {
            return Vec::new();
        };
        let distance = press.at.x.abs_diff(at.x).max(press.at.y.abs_diff(at.y));
        let is_click = press.target == Some(target)
            && now.saturating_duration_since(press.time) <= self.click_timeout
            && distance <= self.max_distance;
        if !is_click {
            return Vec::new();
        }
        let is_double = self.last_click.is_some_and(|last| {
            last.target == target
                && now.saturating_duration_since(last.time) <= self.double_click_timeout
        });
        if is_double {
            self.last_click = None;
            vec![MouseAction::Click, MouseAction::DoubleClick]
        } else {
            self.last_click = Some(LastClick { target, time: now });
            vec![MouseAction::Click]
        }
    }

    /// Record the control under the pointer. Enter and leave fire only when
    /// it actually changes.
    pub fn hover(&mut self, target: Option<Target>) -> HoverChange {
        if self.hover == target {
            return HoverChange::default();
        }
        let change = HoverChange {
            leave: self.hover,
            enter: target,
        };
        self.hover = target;
        change
    }

    pub fn hovered(&self) -> Option<Target> {
        self.hover
    }

    /// Drop any state that points at a control no longer present.
    pub fn forget(&mut self, keep: impl Fn(Target) -> bool) {
        if self.hover.is_some_and(|t| !keep(t)) {
            self.hover = None;
        }
        if self.last_click.is_some_and(|c| !keep(c.target)) {
            self.last_click = None;
        }
        if let Some(press) = &mut self.press
            && press.target.is_some_and(|t| !keep(t))
        {
            press.target = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlTree;
    use crate::control::testing::{Fill, new_log};

    fn targets() -> (Target, Target) {
        let log = new_log();
        let mut tree = ControlTree::new();
        let a = tree.add_root(Fill::new("a", " ", &log));
        let b = tree.add_root(Fill::new("b", " ", &log));
        (
            (WindowId::new(1), a),
            (WindowId::new(1), b),
        )
    }

    fn tracker() -> MouseTracker {
        MouseTracker::new(&DeskConfig::default())
    }

    #[test]
    fn press_and_release_on_same_control_clicks() {
        let (a, _) = targets();
        let mut mouse = tracker();
        let t0 = Instant::now();
        mouse.press(Some(a), Position::new(3, 3), t0);
        let out = mouse.release(Some(a), Position::new(4, 3), t0 + Duration::from_millis(80));
        assert_eq!(out, vec![MouseAction::Click]);
    }

    #[test]
    fn release_elsewhere_or_late_or_far_is_no_click() {
        let (a, b) = targets();
        let mut mouse = tracker();
        let t0 = Instant::now();
        mouse.press(Some(a), Position::new(3, 3), t0);
        assert!(mouse.release(Some(b), Position::new(3, 3), t0).is_empty());

        mouse.press(Some(a), Position::new(3, 3), t0);
        assert!(
            mouse
                .release(Some(a), Position::new(3, 3), t0 + Duration::from_secs(2))
                .is_empty()
        );

        mouse.press(Some(a), Position::new(3, 3), t0);
        assert!(mouse.release(Some(a), Position::new(9, 3), t0).is_empty());
    }

    #[test]
    fn two_quick_clicks_make_a_double_click() {
        let (a, _) = targets();
        let mut mouse = tracker();
        let t0 = Instant::now();
        let pos = Position::new(1, 1);
        mouse.press(Some(a), pos, t0);
        mouse.release(Some(a), pos, t0);
        let t1 = t0 + Duration::from_millis(150);
        mouse.press(Some(a), pos, t1);
        assert_eq!(
            mouse.release(Some(a), pos, t1),
            vec![MouseAction::Click, MouseAction::DoubleClick]
        );
        // A third click starts a new pair.
        mouse.press(Some(a), pos, t1);
        assert_eq!(mouse.release(Some(a), pos, t1), vec![MouseAction::Click]);
    }

    #[test]
    fn slow_second_click_is_single() {
        let (a, _) = targets();
        let mut mouse = tracker();
        let t0 = Instant::now();
        let pos = Position::new(1, 1);
        mouse.press(Some(a), pos, t0);
        mouse.release(Some(a), pos, t0);
        let t1 = t0 + Duration::from_millis(900);
        mouse.press(Some(a), pos, t1);
        assert_eq!(mouse.release(Some(a), pos, t1), vec![MouseAction::Click]);
    }

    #[test]
    fn hover_fires_enter_once() {
        let (a, b) = targets();
        let mut mouse = tracker();
        assert_eq!(
            mouse.hover(Some(a)),
            HoverChange {
                leave: None,
                enter: Some(a)
            }
        );
        assert_eq!(mouse.hover(Some(a)), HoverChange::default());
        assert_eq!(
            mouse.hover(Some(b)),
            HoverChange {
                leave: Some(a),
                enter: Some(b)
            }
        );
        assert_eq!(
            mouse.hover(None),
            HoverChange {
                leave: Some(b),
                enter: None
            }
        );
    }

    #[test]
    fn forget_drops_stale_targets() {
        let (a, b) = targets();
        let mut mouse = tracker();
        mouse.hover(Some(a));
        mouse.press(Some(a), Position::new(0, 0), Instant::now());
        mouse.forget(|t| t == b);
        assert_eq!(mouse.hovered(), None);
        assert_eq!(mouse.pressed_target(), None);
    }
}
