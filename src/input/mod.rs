//! Focus tracking and input dispatch.
//!
//! The [`InputRouter`] turns raw `crossterm` events into [`KeyEventArgs`] and
//! [`MouseEventArgs`] delivered to exactly one control, then bubbled to its
//! ancestors until something handles them. It is the only writer of the
//! focus snapshot.

pub mod event;
pub mod mouse;
pub mod shortcuts;

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{Event, KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::{Position, Size};

pub use event::{KeyEventArgs, MouseAction, MouseEventArgs};
pub use mouse::{HoverChange, MouseTracker};
pub use shortcuts::{KeyCombo, ShortcutContext, ShortcutId, ShortcutRegistry};

use crate::config::DeskConfig;
use crate::control::ControlId;
use crate::focus::{FocusChange, FocusReason, FocusState};
use crate::observer::{ObserverList, SubscriptionId};
use crate::window::{ChromeHit, WindowId, WindowManager, WindowState};

/// What happened to one raw event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Handled,
    /// Delivered but nobody handled it.
    Unhandled,
    /// Aimed at a window a modal dialog is blocking.
    Rejected,
    /// The terminal was resized; the caller re-reads the size.
    Resized(Size),
    Ignored,
}

#[derive(Debug, Clone, Copy)]
enum ChromeDrag {
    Move {
        window: WindowId,
        start: Position,
        origin: Position,
    },
    Resize {
        window: WindowId,
        start: Position,
        size: Size,
    },
}

#[derive(Debug)]
pub struct InputRouter {
    focus: Arc<FocusState>,
    focus_observers: ObserverList<FocusChange>,
    shortcuts: ShortcutRegistry,
    mouse: MouseTracker,
    drag: Option<ChromeDrag>,
    last_title_click: Option<(WindowId, Instant)>,
    double_click_timeout: Duration,
}

impl InputRouter {
    pub fn new(config: &DeskConfig) -> Self {
        Self {
            focus: Arc::new(FocusState::empty(Instant::now())),
            focus_observers: ObserverList::new(),
            shortcuts: ShortcutRegistry::new(),
            mouse: MouseTracker::new(config),
            drag: None,
            last_title_click: None,
            double_click_timeout: config.double_click_timeout,
        }
    }

    /// The current focus snapshot.
    pub fn focus(&self) -> Arc<FocusState> {
        Arc::clone(&self.focus)
    }

    pub fn on_focus_changed(&self, handler: impl FnMut(&FocusChange) + 'static) -> SubscriptionId {
        self.focus_observers.subscribe(handler)
    }

    pub fn unsubscribe_focus_changed(&self, id: SubscriptionId) -> bool {
        self.focus_observers.unsubscribe(id)
    }

    /// Global shortcuts, consulted after the focused window's own.
    pub fn shortcuts_mut(&mut self) -> &mut ShortcutRegistry {
        &mut self.shortcuts
    }

    pub fn route(&mut self, wm: &mut WindowManager, event: &Event, now: Instant) -> RouteOutcome {
        self.sync(wm, now);
        let outcome = match event {
            Event::Key(key) => self.route_key(wm, *key, now),
            Event::Mouse(mouse) => self.route_mouse(wm, *mouse, now),
            Event::Resize(width, height) => RouteOutcome::Resized(Size::new(*width, *height)),
            _ => RouteOutcome::Ignored,
        };
        self.sync(wm, now);
        outcome
    }

    /// Bring the focus snapshot in line with the window manager: follow
    /// activation changes and drop focus from controls that went away.
    pub fn sync(&mut self, wm: &mut WindowManager, now: Instant) {
        self.mouse.forget(|(window, control)| {
            wm.window(window)
                .is_some_and(|w| w.controls().contains(control))
        });
        if let Some(ChromeDrag::Move { window, .. } | ChromeDrag::Resize { window, .. }) = self.drag
            && !wm.contains(window)
        {
            self.drag = None;
        }

        let active = wm.active_window();
        if self.focus.window() != active {
            let control = active.and_then(|id| Self::activation_target(wm, id));
            self.transition(wm, active, control, FocusReason::WindowActivation, now);
            return;
        }
        if let (Some(window), Some(control)) = (self.focus.window(), self.focus.control()) {
            let still_focusable = wm
                .window(window)
                .is_some_and(|w| w.controls().is_focusable(control));
            if !still_focusable {
                self.transition(wm, Some(window), None, FocusReason::ControlRemoved, now);
            }
        }
    }

    fn activation_target(wm: &WindowManager, id: WindowId) -> Option<ControlId> {
        let window = wm.window(id)?;
        let tree = window.controls();
        window
            .last_focused()
            .filter(|control| tree.is_focusable(*control))
            .or_else(|| tree.focusable_order().first().copied())
    }

    /// Swap in a new snapshot: focus-lost on the old control, focus-gained
    /// on the new one, then subscribers. No-op if nothing moves.
    fn transition(
        &mut self,
        wm: &mut WindowManager,
        window: Option<WindowId>,
        control: Option<ControlId>,
        reason: FocusReason,
        now: Instant,
    ) -> bool {
        if self.focus.window() == window && self.focus.control() == control {
            return false;
        }
        let previous = Arc::clone(&self.focus);
        if let (Some(old_window), Some(old_control)) = (previous.window(), previous.control()) {
            if let Some(target) = wm
                .window_mut(old_window)
                .and_then(|w| w.controls_mut().get_mut(old_control))
            {
                target.on_focus_changed(false);
            }
            wm.invalidate_control(old_window, old_control);
        }
        let current = Arc::new(FocusState::new(window, control, reason, now));
        self.focus = Arc::clone(&current);
        if let (Some(new_window), Some(new_control)) = (window, control) {
            if let Some(w) = wm.window_mut(new_window) {
                w.last_focused = Some(new_control);
                if let Some(target) = w.controls_mut().get_mut(new_control) {
                    target.on_focus_changed(true);
                }
            }
            wm.invalidate_control(new_window, new_control);
        }
        tracing::trace!(?window, ?control, ?reason, "focus changed");
        self.focus_observers.emit(&FocusChange { previous, current });
        true
    }

    /// Focus a control on request. Rejected when a modal dialog blocks the
    /// window or the control cannot take focus.
    pub fn focus_control(
        &mut self,
        wm: &mut WindowManager,
        window: WindowId,
        control: ControlId,
        now: Instant,
    ) -> bool {
        let focusable = wm
            .window(window)
            .is_some_and(|w| w.controls().is_focusable(control));
        if !focusable || !wm.set_active_window(window) {
            return false;
        }
        self.transition(wm, Some(window), Some(control), FocusReason::Programmatic, now);
        true
    }

    /// Move focus along the Tab order of the focused window, wrapping at
    /// either end. A window with nothing focusable keeps focus on itself.
    pub fn focus_next(&mut self, wm: &mut WindowManager, forward: bool, now: Instant) -> bool {
        let Some(window) = self.focus.window().or(wm.active_window()) else {
            return false;
        };
        let Some(order) = wm.window(window).map(|w| w.controls().focusable_order()) else {
            return false;
        };
        if order.is_empty() {
            self.transition(wm, Some(window), None, FocusReason::Keyboard, now);
            return true;
        }
        let len = order.len() as isize;
        let next = match self
            .focus
            .control()
            .and_then(|current| order.iter().position(|id| *id == current))
        {
            Some(idx) => {
                let step = if forward { 1 } else { -1 };
                (idx as isize + step).rem_euclid(len) as usize
            }
            None if forward => 0,
            None => order.len() - 1,
        };
        self.transition(wm, Some(window), Some(order[next]), FocusReason::Keyboard, now);
        true
    }

    fn route_key(&mut self, wm: &mut WindowManager, key: KeyEvent, now: Instant) -> RouteOutcome {
        let window = self.focus.window();
        if let Some(window) = window {
            let mut args = KeyEventArgs::new(key, window);
            let mut cursor = self.focus.control();
            while let Some(id) = cursor {
                let Some(w) = wm.window_mut(window) else {
                    break;
                };
                let tree = w.controls_mut();
                cursor = tree.parent(id);
                if !tree.is_live(id) {
                    continue;
                }
                args.target = Some(id);
                let handled = tree
                    .get_mut(id)
                    .is_some_and(|control| control.handle_key(&mut args));
                if handled || args.handled {
                    wm.invalidate_control(window, id);
                    return RouteOutcome::Handled;
                }
            }

            if let Some(mut registry) = wm.window_mut(window).map(|w| w.take_shortcuts()) {
                let handled = registry.dispatch(&mut ShortcutContext {
                    windows: &mut *wm,
                    window: Some(window),
                    key,
                });
                if let Some(w) = wm.window_mut(window) {
                    w.put_shortcuts(registry);
                }
                if handled {
                    return RouteOutcome::Handled;
                }
            }
        }

        if self.shortcuts.dispatch(&mut ShortcutContext {
            windows: &mut *wm,
            window,
            key,
        }) {
            return RouteOutcome::Handled;
        }

        match key.code {
            KeyCode::Tab if self.focus_next(wm, true, now) => RouteOutcome::Handled,
            KeyCode::BackTab if self.focus_next(wm, false, now) => RouteOutcome::Handled,
            _ => RouteOutcome::Unhandled,
        }
    }

    fn route_mouse(&mut self, wm: &mut WindowManager, mouse: MouseEvent, now: Instant) -> RouteOutcome {
        let pos = Position::new(mouse.column, mouse.row);

        if let Some(drag) = self.drag {
            match mouse.kind {
                MouseEventKind::Drag(_) => {
                    Self::apply_chrome_drag(wm, drag, pos);
                    return RouteOutcome::Handled;
                }
                MouseEventKind::Up(_) => {
                    self.drag = None;
                    return RouteOutcome::Handled;
                }
                _ => {}
            }
        }

        let Some(window) = wm.window_at(pos.x, pos.y) else {
            self.update_hover(wm, None, &mouse, pos);
            if matches!(mouse.kind, MouseEventKind::Up(_)) {
                self.mouse.release(None, pos, now);
            }
            if let Some(blocked) = wm.topmost_at(pos.x, pos.y) {
                tracing::debug!(window_id = %blocked, "input rejected by modal window");
                return RouteOutcome::Rejected;
            }
            return RouteOutcome::Unhandled;
        };
        let Some((rect, caps)) = wm.window(window).map(|w| (w.rect(), w.capabilities())) else {
            return RouteOutcome::Ignored;
        };
        let local = Position::new(pos.x - rect.x, pos.y - rect.y);
        let chrome = wm
            .decorator()
            .hit_test(rect.as_size(), local.x, local.y, caps);

        if let MouseEventKind::Down(button) = mouse.kind {
            wm.set_active_window(window);
            if chrome != ChromeHit::Client {
                self.update_hover(wm, None, &mouse, pos);
                if button == MouseButton::Left {
                    self.press_chrome(wm, window, chrome, pos, now);
                }
                return RouteOutcome::Handled;
            }
        }

        let target = if chrome == ChromeHit::Client {
            wm.layout_window(window);
            wm.window(window)
                .and_then(|w| w.controls().hit_test(local.x, local.y))
        } else {
            None
        };
        let hit = target.map(|control| (window, control));

        match mouse.kind {
            MouseEventKind::Down(_) => {
                self.update_hover(wm, hit, &mouse, pos);
                let focusable = target.is_some_and(|control| {
                    wm.window(window)
                        .is_some_and(|w| w.controls().is_focusable(control))
                });
                if focusable {
                    self.transition(wm, Some(window), target, FocusReason::Mouse, now);
                } else {
                    self.sync(wm, now);
                }
                self.mouse.press(hit, pos, now);
                self.deliver(wm, hit, MouseAction::Down, &mouse, pos, 0)
            }
            MouseEventKind::Up(_) => {
                let mut outcome = self.deliver(wm, hit, MouseAction::Up, &mouse, pos, 0);
                for action in self.mouse.release(hit, pos, now) {
                    let count = if action == MouseAction::DoubleClick { 2 } else { 1 };
                    if self.deliver(wm, hit, action, &mouse, pos, count) == RouteOutcome::Handled {
                        outcome = RouteOutcome::Handled;
                    }
                }
                outcome
            }
            MouseEventKind::Moved => {
                self.update_hover(wm, hit, &mouse, pos);
                self.deliver(wm, hit, MouseAction::Move, &mouse, pos, 0)
            }
            MouseEventKind::Drag(_) => {
                self.update_hover(wm, hit, &mouse, pos);
                let captured = self.mouse.pressed_target().or(hit);
                self.deliver(wm, captured, MouseAction::Drag, &mouse, pos, 0)
            }
            MouseEventKind::ScrollUp => self.deliver(wm, hit, MouseAction::ScrollUp, &mouse, pos, 0),
            MouseEventKind::ScrollDown => {
                self.deliver(wm, hit, MouseAction::ScrollDown, &mouse, pos, 0)
            }
            MouseEventKind::ScrollLeft => {
                self.deliver(wm, hit, MouseAction::ScrollLeft, &mouse, pos, 0)
            }
            MouseEventKind::ScrollRight => {
                self.deliver(wm, hit, MouseAction::ScrollRight, &mouse, pos, 0)
            }
        }
    }

    fn press_chrome(
        &mut self,
        wm: &mut WindowManager,
        window: WindowId,
        hit: ChromeHit,
        pos: Position,
        now: Instant,
    ) {
        let Some((rect, state, caps)) = wm
            .window(window)
            .map(|w| (w.rect(), w.state(), w.capabilities()))
        else {
            return;
        };
        match hit {
            ChromeHit::Close => {
                wm.remove_window(window);
                self.last_title_click = None;
            }
            ChromeHit::Minimize => {
                wm.minimize_window(window);
                self.last_title_click = None;
            }
            ChromeHit::Maximize => {
                wm.toggle_maximize(window);
                self.last_title_click = None;
            }
            ChromeHit::Title => {
                if let Some((prev, at)) = self.last_title_click
                    && prev == window
                    && now.saturating_duration_since(at) <= self.double_click_timeout
                {
                    self.last_title_click = None;
                    if caps.maximizable {
                        wm.toggle_maximize(window);
                    }
                    return;
                }
                self.last_title_click = Some((window, now));
                if caps.movable && state != WindowState::Maximized {
                    self.drag = Some(ChromeDrag::Move {
                        window,
                        start: pos,
                        origin: Position::new(rect.x, rect.y),
                    });
                }
            }
            ChromeHit::ResizeCorner => {
                if caps.resizable && state != WindowState::Maximized {
                    self.drag = Some(ChromeDrag::Resize {
                        window,
                        start: pos,
                        size: rect.as_size(),
                    });
                }
            }
            ChromeHit::Border | ChromeHit::Client | ChromeHit::Outside => {}
        }
    }

    fn apply_chrome_drag(wm: &mut WindowManager, drag: ChromeDrag, pos: Position) {
        let offset = |from: u16, to: u16, base: u16| -> u16 {
            let value = base as i32 + to as i32 - from as i32;
            value.clamp(0, u16::MAX as i32) as u16
        };
        match drag {
            ChromeDrag::Move {
                window,
                start,
                origin,
            } => {
                wm.move_window(
                    window,
                    offset(start.x, pos.x, origin.x),
                    offset(start.y, pos.y, origin.y),
                );
            }
            ChromeDrag::Resize {
                window,
                start,
                size,
            } => {
                wm.resize_window(
                    window,
                    offset(start.x, pos.x, size.width),
                    offset(start.y, pos.y, size.height),
                );
            }
        }
    }

    fn update_hover(
        &mut self,
        wm: &mut WindowManager,
        hit: Option<(WindowId, ControlId)>,
        mouse: &MouseEvent,
        pos: Position,
    ) {
        let change = self.mouse.hover(hit);
        if let Some(leave) = change.leave {
            Self::deliver_to(wm, leave, MouseAction::Leave, mouse, pos, 0, false);
        }
        if let Some(enter) = change.enter {
            Self::deliver_to(wm, enter, MouseAction::Enter, mouse, pos, 0, false);
        }
    }

    fn deliver(
        &mut self,
        wm: &mut WindowManager,
        target: Option<(WindowId, ControlId)>,
        action: MouseAction,
        mouse: &MouseEvent,
        pos: Position,
        click_count: u8,
    ) -> RouteOutcome {
        match target {
            Some(target) => Self::deliver_to(wm, target, action, mouse, pos, click_count, true),
            None => RouteOutcome::Unhandled,
        }
    }

    /// Hand a mouse event to `target`, then to its ancestors while nobody
    /// handles it (when `bubble` is set).
    fn deliver_to(
        wm: &mut WindowManager,
        (window, control): (WindowId, ControlId),
        action: MouseAction,
        mouse: &MouseEvent,
        pos: Position,
        click_count: u8,
        bubble: bool,
    ) -> RouteOutcome {
        let Some(rect) = wm.window(window).map(|w| w.rect()) else {
            return RouteOutcome::Ignored;
        };
        let button = match mouse.kind {
            MouseEventKind::Down(b) | MouseEventKind::Up(b) | MouseEventKind::Drag(b) => Some(b),
            _ => None,
        };
        let window_position = Position::new(
            pos.x.saturating_sub(rect.x),
            pos.y.saturating_sub(rect.y),
        );
        let mut args = MouseEventArgs {
            action,
            button,
            modifiers: mouse.modifiers,
            window,
            target: control,
            desktop: pos,
            window_position,
            position: window_position,
            click_count,
            handled: false,
        };
        let mut cursor = Some(control);
        while let Some(id) = cursor {
            let Some(w) = wm.window_mut(window) else {
                break;
            };
            let tree = w.controls_mut();
            cursor = if bubble { tree.parent(id) } else { None };
            if !tree.is_live(id) {
                continue;
            }
            let Some(bounds) = tree.bounds(id) else {
                continue;
            };
            args.retarget(id, bounds);
            let handled = tree
                .get_mut(id)
                .is_some_and(|target| target.handle_mouse(&mut args));
            if handled || args.handled {
                wm.invalidate_control(window, id);
                return RouteOutcome::Handled;
            }
        }
        RouteOutcome::Unhandled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::testing::{Fill, Log, new_log};
    use crate::window::Window;
    use crossterm::event::KeyModifiers;
    use ratatui::layout::Rect;

    fn setup() -> (WindowManager, InputRouter) {
        let config = DeskConfig::default();
        (
            WindowManager::new(Size::new(80, 24), &config),
            InputRouter::new(&config),
        )
    }

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    /// A window at (0,0,20,10) with two focusable rows.
    fn two_field_window(log: &Log) -> (Window, [ControlId; 2]) {
        let mut window = Window::new("form", Rect::new(0, 0, 20, 10));
        let tree = window.controls_mut();
        let a = tree.add_root(Fill::new("a", "a", log).focusable().rows(1));
        let b = tree.add_root(Fill::new("b", "b", log).focusable().rows(1));
        (window, [a, b])
    }

    #[test]
    fn activation_focuses_first_focusable_control() {
        let (mut wm, mut router) = setup();
        let log = new_log();
        let (window, [a, _]) = two_field_window(&log);
        let id = wm.add_window(window);
        router.sync(&mut wm, Instant::now());
        let focus = router.focus();
        assert_eq!(focus.window(), Some(id));
        assert_eq!(focus.control(), Some(a));
        assert_eq!(focus.reason(), FocusReason::WindowActivation);
        assert_eq!(*log.borrow(), vec!["a:gained"]);
    }

    #[test]
    fn tab_traversal_wraps_both_ways() {
        let (mut wm, mut router) = setup();
        let log = new_log();
        let (window, [a, b]) = two_field_window(&log);
        let id = wm.add_window(window);
        let now = Instant::now();
        router.sync(&mut wm, now);

        assert_eq!(router.route(&mut wm, &key(KeyCode::Tab), now), RouteOutcome::Handled);
        assert_eq!(router.focus().control(), Some(b));
        assert_eq!(router.focus().reason(), FocusReason::Keyboard);
        router.route(&mut wm, &key(KeyCode::Tab), now);
        assert_eq!(router.focus().control(), Some(a));
        router.route(&mut wm, &key(KeyCode::BackTab), now);
        assert_eq!(router.focus().control(), Some(b));
    }

    #[test]
    fn tab_without_focusables_stays_on_window() {
        let (mut wm, mut router) = setup();
        let id = wm.add_window(Window::new("empty", Rect::new(0, 0, 20, 10)));
        let now = Instant::now();
        router.route(&mut wm, &key(KeyCode::Tab), now);
        assert_eq!(router.focus().window(), Some(id));
        assert_eq!(router.focus().control(), None);
    }

    #[test]
    fn keys_bubble_to_ancestors_then_shortcuts() {
        let (mut wm, mut router) = setup();
        let log = new_log();
        let mut window = Window::new("w", Rect::new(0, 0, 20, 10));
        let mut parent = Fill::new("parent", " ", &log);
        parent.consume_keys = true;
        let tree = window.controls_mut();
        let parent = tree.add_root(parent);
        let child = tree
            .add_child(parent, Fill::new("child", " ", &log).focusable())
            .unwrap();
        let id = wm.add_window(window);
        let now = Instant::now();
        router.sync(&mut wm, now);
        assert_eq!(router.focus().control(), Some(child));
        log.borrow_mut().clear();

        let outcome = router.route(&mut wm, &key(KeyCode::Char('x')), now);
        assert_eq!(outcome, RouteOutcome::Handled);
        assert_eq!(
            *log.borrow(),
            vec!["child:key:Char('x')", "parent:key:Char('x')"]
        );

        if let Some(p) = wm
            .window_mut(id)
            .and_then(|w| w.controls_mut().downcast_mut::<Fill>(parent))
        {
            p.consume_keys = false;
        }
        let hits = std::rc::Rc::new(std::cell::Cell::new(0));
        let seen = std::rc::Rc::clone(&hits);
        wm.window_mut(id).unwrap().shortcuts_mut().register(
            KeyCombo::plain(KeyCode::Char('x')),
            "window x",
            move |ctx| {
                seen.set(seen.get() + 1);
                ctx.window.is_some()
            },
        );
        router
            .shortcuts_mut()
            .register(KeyCombo::plain(KeyCode::Char('x')), "global x", |_| {
                panic!("window shortcut should win")
            });
        assert_eq!(
            router.route(&mut wm, &key(KeyCode::Char('x')), now),
            RouteOutcome::Handled
        );
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn unhandled_keys_are_dropped() {
        let (mut wm, mut router) = setup();
        wm.add_window(Window::new("w", Rect::new(0, 0, 20, 10)));
        let outcome = router.route(&mut wm, &key(KeyCode::Char('z')), Instant::now());
        assert_eq!(outcome, RouteOutcome::Unhandled);
    }

    #[test]
    fn click_focuses_and_synthesizes_click() {
        let (mut wm, mut router) = setup();
        let log = new_log();
        let (window, [_, b]) = two_field_window(&log);
        let id = wm.add_window(window);
        let now = Instant::now();
        router.sync(&mut wm, now);
        log.borrow_mut().clear();

        // Row 3 is the second field: border, header, then one row each.
        router.route(&mut wm, &mouse(MouseEventKind::Down(MouseButton::Left), 5, 3), now);
        router.route(&mut wm, &mouse(MouseEventKind::Up(MouseButton::Left), 5, 3), now);
        assert_eq!(router.focus().control(), Some(b));
        assert_eq!(router.focus().reason(), FocusReason::Mouse);
        assert_eq!(
            *log.borrow(),
            vec![
                "b:Enter@4,0",
                "a:lost",
                "b:gained",
                "b:Down@4,0",
                "b:Up@4,0",
                "b:Click@4,0",
            ]
        );
    }

    #[test]
    fn clicks_follow_a_move_and_resize_made_since_the_last_frame() {
        let (mut wm, mut router) = setup();
        let log = new_log();
        let (window, [a, b]) = two_field_window(&log);
        let id = wm.add_window(window);
        let now = Instant::now();
        router.sync(&mut wm, now);

        wm.move_window(id, 30, 8);
        wm.resize_window(id, 40, 12);
        log.borrow_mut().clear();
        // Client area now starts at (31, 10); the second field is on row 11
        // and spans the new width.
        router.route(&mut wm, &mouse(MouseEventKind::Down(MouseButton::Left), 65, 11), now);
        assert_eq!(router.focus().control(), Some(b));
        assert!(log.borrow().contains(&"b:Down@34,0".to_string()));
        router.route(&mut wm, &mouse(MouseEventKind::Up(MouseButton::Left), 65, 11), now);

        router.route(&mut wm, &mouse(MouseEventKind::Down(MouseButton::Left), 31, 10), now);
        assert_eq!(router.focus().control(), Some(a));
    }

    #[test]
    fn hover_enter_fires_once_per_control() {
        let (mut wm, mut router) = setup();
        let log = new_log();
        let (window, _) = two_field_window(&log);
        let id = wm.add_window(window);
        let now = Instant::now();
        router.sync(&mut wm, now);
        log.borrow_mut().clear();

        router.route(&mut wm, &mouse(MouseEventKind::Moved, 2, 2), now);
        router.route(&mut wm, &mouse(MouseEventKind::Moved, 3, 2), now);
        router.route(&mut wm, &mouse(MouseEventKind::Moved, 3, 3), now);
        let enters: Vec<_> = log
            .borrow()
            .iter()
            .filter(|line| line.contains("Enter") || line.contains("Leave"))
            .cloned()
            .collect();
        assert_eq!(enters, vec!["a:Enter@1,0", "a:Leave@2,1", "b:Enter@2,0"]);
    }

    #[test]
    fn modal_blocks_clicks_on_windows_below() {
        let (mut wm, mut router) = setup();
        let log = new_log();
        let (window, _) = two_field_window(&log);
        let main = wm.add_window(window);
        wm.add_window(Window::new("dialog", Rect::new(30, 5, 20, 8)).modal().with_parent(main));
        let now = Instant::now();
        log.borrow_mut().clear();
        let outcome = router.route(
            &mut wm,
            &mouse(MouseEventKind::Down(MouseButton::Left), 5, 2),
            now,
        );
        assert_eq!(outcome, RouteOutcome::Rejected);
        assert!(log.borrow().iter().all(|line| !line.contains("Down")));
    }

    #[test]
    fn title_drag_moves_window_and_close_glyph_closes() {
        let (mut wm, mut router) = setup();
        let id = wm.add_window(Window::new("w", Rect::new(0, 0, 20, 10)));
        let now = Instant::now();
        router.route(&mut wm, &mouse(MouseEventKind::Down(MouseButton::Left), 4, 1), now);
        router.route(&mut wm, &mouse(MouseEventKind::Drag(MouseButton::Left), 10, 4), now);
        router.route(&mut wm, &mouse(MouseEventKind::Up(MouseButton::Left), 10, 4), now);
        assert_eq!(wm.window(id).unwrap().rect(), Rect::new(6, 3, 20, 10));

        let later = now + Duration::from_secs(5);
        router.route(&mut wm, &mouse(MouseEventKind::Down(MouseButton::Left), 24, 4), later);
        assert!(!wm.contains(id));
    }

    #[test]
    fn corner_drag_resizes() {
        let (mut wm, mut router) = setup();
        let id = wm.add_window(Window::new("w", Rect::new(0, 0, 20, 10)));
        let now = Instant::now();
        router.route(&mut wm, &mouse(MouseEventKind::Down(MouseButton::Left), 19, 9), now);
        router.route(&mut wm, &mouse(MouseEventKind::Drag(MouseButton::Left), 24, 11), now);
        router.route(&mut wm, &mouse(MouseEventKind::Up(MouseButton::Left), 24, 11), now);
        assert_eq!(wm.window(id).unwrap().rect(), Rect::new(0, 0, 25, 12));
    }

    #[test]
    fn double_click_on_title_toggles_maximize() {
        let (mut wm, mut router) = setup();
        let id = wm.add_window(Window::new("w", Rect::new(2, 2, 20, 10)));
        let now = Instant::now();
        let down = mouse(MouseEventKind::Down(MouseButton::Left), 5, 3);
        let up = mouse(MouseEventKind::Up(MouseButton::Left), 5, 3);
        router.route(&mut wm, &down, now);
        router.route(&mut wm, &up, now);
        router.route(&mut wm, &down, now + Duration::from_millis(100));
        assert_eq!(wm.window(id).unwrap().state(), WindowState::Maximized);
    }

    #[test]
    fn removing_focused_control_falls_back_to_window() {
        let (mut wm, mut router) = setup();
        let log = new_log();
        let (window, [a, _]) = two_field_window(&log);
        let id = wm.add_window(window);
        let now = Instant::now();
        router.sync(&mut wm, now);
        assert_eq!(router.focus().control(), Some(a));
        wm.remove_control(id, a);
        router.sync(&mut wm, now);
        assert_eq!(router.focus().window(), Some(id));
        assert_eq!(router.focus().control(), None);
        assert_eq!(router.focus().reason(), FocusReason::ControlRemoved);
    }

    #[test]
    fn focus_changed_subscribers_see_old_and_new() {
        let (mut wm, mut router) = setup();
        let log = new_log();
        let (window, [a, b]) = two_field_window(&log);
        let id = wm.add_window(window);
        let now = Instant::now();
        router.sync(&mut wm, now);
        let changes = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = std::rc::Rc::clone(&changes);
        router.on_focus_changed(move |change| {
            sink.borrow_mut()
                .push((change.previous.control(), change.current.control()));
        });
        assert!(router.focus_control(&mut wm, id, b, now));
        assert_eq!(*changes.borrow(), vec![(Some(a), Some(b))]);
        assert_eq!(router.focus().reason(), FocusReason::Programmatic);
    }
}
