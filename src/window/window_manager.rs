use std::collections::BTreeMap;
use std::sync::Arc;

use ratatui::layout::{Rect, Size};

use super::decorator::{DefaultDecorator, WindowDecorator};
use super::{CloseOutcome, Window, WindowClosed, WindowId, WindowState};
use crate::config::DeskConfig;
use crate::control::{Control, ControlId};
use crate::dirty::{DirtyRegion, DirtyTracker, Invalidate};
use crate::error::ControlError;
use crate::layout::{fit_within, rect_contains};
use crate::observer::{ObserverList, SubscriptionId};
use crate::session::{UiBlocked, UiBlockedGuard};

#[derive(Debug)]
struct ModalEntry {
    id: WindowId,
    _guard: UiBlockedGuard,
}

/// Owns every window, their stacking order, the active window, the modal
/// stack, the desktop size and the dirty tracker.
///
/// `z_order` runs bottom to top and is split in two layers: every window in
/// the modal layer (modal windows and anything parented to one) sits above
/// every window in the normal layer.
#[derive(Debug)]
pub struct WindowManager {
    windows: BTreeMap<WindowId, Window>,
    z_order: Vec<WindowId>,
    active: Option<WindowId>,
    modal_stack: Vec<ModalEntry>,
    desktop: Size,
    dirty: DirtyTracker,
    decorator: Arc<dyn WindowDecorator>,
    closed_observers: ObserverList<WindowClosed>,
    ui_blocked: UiBlocked,
    min_window: Size,
    next_id: u32,
}

impl WindowManager {
    pub fn new(desktop: Size, config: &DeskConfig) -> Self {
        Self {
            windows: BTreeMap::new(),
            z_order: Vec::new(),
            active: None,
            modal_stack: Vec::new(),
            desktop,
            dirty: DirtyTracker::new(config.granularity),
            decorator: Arc::new(DefaultDecorator),
            closed_observers: ObserverList::new(),
            ui_blocked: UiBlocked::default(),
            min_window: config.min_window_size,
            next_id: 1,
        }
    }

    pub fn set_decorator(&mut self, decorator: Arc<dyn WindowDecorator>) {
        self.decorator = decorator;
        let ids: Vec<WindowId> = self.windows.keys().copied().collect();
        for id in ids {
            if let Some(window) = self.windows.get_mut(&id) {
                window.invalidate_layout();
            }
            self.layout_window(id);
        }
        self.dirty.mark_all_full();
    }

    pub fn decorator(&self) -> &dyn WindowDecorator {
        self.decorator.as_ref()
    }

    pub(crate) fn decorator_arc(&self) -> Arc<dyn WindowDecorator> {
        Arc::clone(&self.decorator)
    }

    pub fn ui_blocked(&self) -> &UiBlocked {
        &self.ui_blocked
    }

    pub fn desktop_size(&self) -> Size {
        self.desktop
    }

    pub fn desktop_area(&self) -> Rect {
        Rect::new(0, 0, self.desktop.width, self.desktop.height)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.windows.contains_key(&id)
    }

    pub fn window(&self, id: WindowId) -> Option<&Window> {
        self.windows.get(&id)
    }

    /// Mutable access for control-level work. Geometry and state changes go
    /// through the manager's methods instead.
    pub fn window_mut(&mut self, id: WindowId) -> Option<&mut Window> {
        self.windows.get_mut(&id)
    }

    pub fn windows(&self) -> impl Iterator<Item = (WindowId, &Window)> {
        self.windows.iter().map(|(id, window)| (*id, window))
    }

    /// Bottom to top.
    pub fn z_order(&self) -> &[WindowId] {
        &self.z_order
    }

    pub fn active_window(&self) -> Option<WindowId> {
        self.active
    }

    /// Bottom to top; the last entry is the modal currently holding input.
    pub fn modal_stack(&self) -> Vec<WindowId> {
        self.modal_stack.iter().map(|entry| entry.id).collect()
    }

    pub fn top_modal(&self) -> Option<WindowId> {
        self.modal_stack.last().map(|entry| entry.id)
    }

    pub fn dirty_tracker(&self) -> &DirtyTracker {
        &self.dirty
    }

    /// `true` if `id` is `ancestor` or a (transitive) child window of it.
    pub fn is_descendant(&self, id: WindowId, ancestor: WindowId) -> bool {
        let mut cursor = Some(id);
        let mut hops = 0;
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            hops += 1;
            if hops > self.windows.len() {
                break;
            }
            cursor = self.windows.get(&current).and_then(Window::parent);
        }
        false
    }

    fn in_modal_layer(&self, id: WindowId) -> bool {
        let mut cursor = Some(id);
        let mut hops = 0;
        while let Some(current) = cursor {
            let Some(window) = self.windows.get(&current) else {
                return false;
            };
            if window.is_modal() {
                return true;
            }
            hops += 1;
            if hops > self.windows.len() {
                break;
            }
            cursor = window.parent();
        }
        false
    }

    /// Whether input may reach `id` under the current modal stack.
    pub fn is_input_eligible(&self, id: WindowId) -> bool {
        if !self.windows.contains_key(&id) {
            return false;
        }
        match self.top_modal() {
            Some(top) => self.is_descendant(id, top),
            None => true,
        }
    }

    /// Grow `rect` to the larger of `min` and the session-wide minimum,
    /// then pull it inside the desktop. The desktop wins when it is smaller
    /// than either.
    fn clamp_rect(&self, rect: Rect, min: Size) -> Rect {
        let desktop = self.desktop_area();
        let min_w = min.width.max(self.min_window.width).min(desktop.width);
        let min_h = min.height.max(self.min_window.height).min(desktop.height);
        let sized = Rect {
            width: rect.width.max(min_w),
            height: rect.height.max(min_h),
            ..rect
        };
        fit_within(sized, desktop)
    }

    /// Add a window, assign its id and place it on top of its layer. It
    /// becomes active when input can reach it.
    pub fn add_window(&mut self, mut window: Window) -> WindowId {
        let id = WindowId::new(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);

        let rect = self.clamp_rect(window.rect(), window.min_size());
        window.set_rect(rect);
        if window.state() == WindowState::Maximized {
            window.restore_rect = Some(rect);
            window.set_rect(self.desktop_area());
        }
        let modal = window.is_modal();
        let minimized = window.is_minimized();
        tracing::debug!(window_id = %id, title = window.title(), modal, "opened window");
        self.windows.insert(id, window);
        self.layout_window(id);
        self.z_order.push(id);
        self.raise(id);
        self.dirty.register(id);
        if minimized {
            self.dirty.clear(id);
        }

        if modal {
            self.modal_stack.push(ModalEntry {
                id,
                _guard: self.ui_blocked.enter(),
            });
            tracing::debug!(window_id = %id, depth = self.modal_stack.len(), "modal pushed");
        }
        if !minimized && self.is_input_eligible(id) {
            self.set_active_window(id);
        }
        id
    }

    /// Close a window. Non-closable windows are left alone.
    pub fn remove_window(&mut self, id: WindowId) -> CloseOutcome {
        let Some(window) = self.windows.get(&id) else {
            return CloseOutcome::NotFound;
        };
        if !window.capabilities().closable {
            tracing::debug!(window_id = %id, "close rejected: window is not closable");
            return CloseOutcome::Rejected;
        }
        self.force_remove_window(id)
    }

    /// Close a window regardless of its capabilities, along with every
    /// window parented to it.
    pub fn force_remove_window(&mut self, id: WindowId) -> CloseOutcome {
        if !self.windows.contains_key(&id) {
            return CloseOutcome::NotFound;
        }
        let children: Vec<WindowId> = self
            .windows
            .iter()
            .filter(|(_, window)| window.parent() == Some(id))
            .map(|(child, _)| *child)
            .collect();
        for child in children {
            self.force_remove_window(child);
        }

        let Some(window) = self.windows.remove(&id) else {
            return CloseOutcome::NotFound;
        };
        tracing::debug!(window_id = %id, "closing window");
        self.z_order.retain(|other| *other != id);
        if !window.is_minimized() {
            self.dirty.expose(window.rect());
        }
        self.dirty.unregister(id);
        let was_modal = self.modal_stack.iter().any(|entry| entry.id == id);
        self.modal_stack.retain(|entry| entry.id != id);
        if was_modal {
            tracing::debug!(window_id = %id, depth = self.modal_stack.len(), "modal popped");
        }
        if self.active == Some(id) {
            self.active = None;
            self.activate_fallback(window.parent());
        } else if was_modal {
            self.activate_fallback(window.parent());
        }

        let closed = WindowClosed {
            id,
            title: window.title().to_string(),
        };
        self.closed_observers.emit(&closed);
        CloseOutcome::Closed
    }

    /// Activate the best remaining candidate: `preferred` if input may reach
    /// it, otherwise the highest visible eligible window.
    fn activate_fallback(&mut self, preferred: Option<WindowId>) {
        let usable = |wm: &Self, id: WindowId| {
            wm.is_input_eligible(id) && wm.windows.get(&id).is_some_and(|w| !w.is_minimized())
        };
        let target = preferred
            .filter(|id| usable(self, *id))
            .or_else(|| {
                self.z_order
                    .iter()
                    .rev()
                    .copied()
                    .find(|id| usable(self, *id))
            });
        match target {
            Some(target) => {
                self.set_active_window(target);
            }
            None => {
                if let Some(old) = self.active.take() {
                    self.mark_full(old);
                }
            }
        }
    }

    /// Make `id` the active window and raise it within its layer. Rejected
    /// (returns `false`) when a modal window blocks it.
    pub fn set_active_window(&mut self, id: WindowId) -> bool {
        if !self.windows.contains_key(&id) {
            return false;
        }
        if !self.is_input_eligible(id) {
            tracing::debug!(window_id = %id, "activation rejected by modal window");
            return false;
        }
        if self.windows.get(&id).is_some_and(Window::is_minimized) {
            self.restore_window(id);
        }
        self.bring_to_front(id);
        if self.active != Some(id) {
            if let Some(old) = self.active {
                self.mark_full(old);
            }
            self.active = Some(id);
            self.mark_full(id);
            tracing::debug!(window_id = %id, "activated window");
        }
        true
    }

    /// Raise `id` to the top of its layer.
    pub fn bring_to_front(&mut self, id: WindowId) -> bool {
        if !self.windows.contains_key(&id) {
            return false;
        }
        let before = self.z_order.clone();
        self.raise(id);
        if before != self.z_order {
            self.mark_full(id);
        }
        true
    }

    fn raise(&mut self, id: WindowId) {
        let Some(pos) = self.z_order.iter().position(|other| *other == id) else {
            return;
        };
        let item = self.z_order.remove(pos);
        if self.in_modal_layer(item) {
            self.z_order.push(item);
        } else {
            let boundary = self
                .z_order
                .iter()
                .position(|other| self.in_modal_layer(*other))
                .unwrap_or(self.z_order.len());
            self.z_order.insert(boundary, item);
        }
    }

    fn mark_full(&mut self, id: WindowId) {
        if self.windows.get(&id).is_some_and(|w| !w.is_minimized()) {
            self.dirty.mark_dirty(id, Invalidate::Window);
        }
    }

    /// Record that part of a window changed. Unknown or minimized windows
    /// are ignored.
    pub fn mark_dirty(&mut self, id: WindowId, what: Invalidate) {
        if self.windows.get(&id).is_some_and(|w| !w.is_minimized()) {
            self.dirty.mark_dirty(id, what);
        }
    }

    /// Bring a window's control bounds up to date with its geometry and
    /// tree. Cheap when nothing changed since the last layout.
    pub fn layout_window(&mut self, id: WindowId) {
        let decorator = Arc::clone(&self.decorator);
        if let Some(window) = self.windows.get_mut(&id) {
            window.ensure_layout(decorator.as_ref());
        }
    }

    /// Mark the area occupied by a control as dirty.
    pub fn invalidate_control(&mut self, id: WindowId, control: ControlId) {
        self.layout_window(id);
        let Some(bounds) = self
            .windows
            .get(&id)
            .and_then(|window| window.controls().bounds(control))
        else {
            return;
        };
        self.mark_dirty(id, Invalidate::Rect(bounds));
    }

    /// Turn `needs_redraw` flags into dirty regions.
    pub fn poll_control_redraws(&mut self) {
        let pending: Vec<(WindowId, ControlId)> = self
            .windows
            .iter()
            .filter(|(_, window)| !window.is_minimized())
            .flat_map(|(id, window)| {
                window
                    .controls()
                    .pending_redraws()
                    .into_iter()
                    .map(move |control| (*id, control))
            })
            .collect();
        for (id, control) in pending {
            // A control with no area left after layout has nothing to
            // narrow the damage to; the window is redrawn whole.
            match self
                .windows
                .get(&id)
                .and_then(|window| window.controls().bounds(control))
            {
                Some(bounds) if !bounds.is_empty() => {
                    self.mark_dirty(id, Invalidate::Rect(bounds))
                }
                _ => self.mark_dirty(id, Invalidate::Window),
            }
        }
    }

    pub fn add_control(
        &mut self,
        id: WindowId,
        parent: Option<ControlId>,
        control: Box<dyn Control>,
    ) -> Option<ControlId> {
        let window = self.windows.get_mut(&id)?;
        let control_id = match parent {
            Some(parent) => window.controls_mut().add_child_boxed(parent, control)?,
            None => window.controls_mut().add_root_boxed(control),
        };
        self.layout_window(id);
        self.mark_dirty(id, Invalidate::Window);
        Some(control_id)
    }

    /// Remove a control subtree. Returns the removed ids; the input router
    /// repairs focus on its next sync.
    pub fn remove_control(&mut self, id: WindowId, control: ControlId) -> Vec<ControlId> {
        let Some(window) = self.windows.get_mut(&id) else {
            return Vec::new();
        };
        let removed = window.controls_mut().remove(control);
        if window
            .last_focused
            .is_some_and(|focused| removed.contains(&focused))
        {
            window.last_focused = None;
        }
        if !removed.is_empty() {
            self.layout_window(id);
            self.mark_dirty(id, Invalidate::Window);
        }
        removed
    }

    pub fn set_title(&mut self, id: WindowId, title: impl Into<String>) -> bool {
        let Some(window) = self.windows.get_mut(&id) else {
            return false;
        };
        window.set_title_raw(title.into());
        self.mark_dirty(id, Invalidate::Window);
        true
    }

    fn apply_rect(&mut self, id: WindowId, rect: Rect) {
        let Some(window) = self.windows.get_mut(&id) else {
            return;
        };
        let old = window.rect();
        if old == rect {
            return;
        }
        window.set_rect(rect);
        if !window.is_minimized() {
            self.dirty.expose(old);
            self.dirty.mark_dirty(id, Invalidate::Window);
        }
        self.layout_window(id);
    }

    /// Move a window's top-left corner, keeping it on the desktop.
    pub fn move_window(&mut self, id: WindowId, x: u16, y: u16) -> bool {
        let Some(window) = self.windows.get(&id) else {
            return false;
        };
        if !window.capabilities().movable
            || matches!(
                window.state(),
                WindowState::Minimized | WindowState::Maximized
            )
        {
            return false;
        }
        let rect = fit_within(Rect { x, y, ..window.rect() }, self.desktop_area());
        self.apply_rect(id, rect);
        true
    }

    /// Resize a window, honoring its minimum size and the desktop bounds.
    pub fn resize_window(&mut self, id: WindowId, width: u16, height: u16) -> bool {
        let Some(window) = self.windows.get(&id) else {
            return false;
        };
        if !window.capabilities().resizable
            || matches!(
                window.state(),
                WindowState::Minimized | WindowState::Maximized
            )
        {
            return false;
        }
        let requested = Rect {
            width,
            height,
            ..window.rect()
        };
        let rect = self.clamp_rect(requested, window.min_size());
        self.apply_rect(id, rect);
        true
    }

    pub fn minimize_window(&mut self, id: WindowId) -> bool {
        let Some(window) = self.windows.get_mut(&id) else {
            return false;
        };
        if !window.capabilities().minimizable || window.is_modal() {
            return false;
        }
        if window.is_minimized() {
            return true;
        }
        window.restore_state = window.state();
        window.set_state(WindowState::Minimized);
        let rect = window.rect();
        self.dirty.clear(id);
        self.dirty.expose(rect);
        tracing::debug!(window_id = %id, "minimized window");
        if self.active == Some(id) {
            self.active = None;
            self.activate_fallback(None);
        }
        true
    }

    pub fn maximize_window(&mut self, id: WindowId) -> bool {
        let desktop = self.desktop_area();
        let Some(window) = self.windows.get_mut(&id) else {
            return false;
        };
        if !window.capabilities().maximizable || window.is_modal() {
            return false;
        }
        match window.state() {
            WindowState::Maximized => return true,
            WindowState::Minimized => {
                window.restore_state = WindowState::Maximized;
                if window.restore_rect.is_none() {
                    window.restore_rect = Some(window.rect());
                }
                window.set_rect(desktop);
                self.layout_window(id);
                return true;
            }
            _ => {}
        }
        window.restore_rect = Some(window.rect());
        window.set_state(WindowState::Maximized);
        self.apply_rect(id, desktop);
        self.mark_full(id);
        true
    }

    /// Undo minimize or maximize.
    pub fn restore_window(&mut self, id: WindowId) -> bool {
        let desktop = self.desktop_area();
        let Some(window) = self.windows.get_mut(&id) else {
            return false;
        };
        match window.state() {
            WindowState::Minimized => {
                let state = window.restore_state;
                window.set_state(state);
                self.dirty.mark_dirty(id, Invalidate::Window);
                tracing::debug!(window_id = %id, "restored minimized window");
            }
            WindowState::Maximized => {
                window.set_state(WindowState::Normal);
                let target = window.restore_rect.take().unwrap_or(window.rect());
                let rect = fit_within(target, desktop);
                self.apply_rect(id, rect);
                self.mark_full(id);
            }
            WindowState::Normal | WindowState::Modal => {}
        }
        true
    }

    pub fn toggle_maximize(&mut self, id: WindowId) -> bool {
        match self.windows.get(&id).map(Window::state) {
            Some(WindowState::Maximized) => self.restore_window(id),
            Some(_) => self.maximize_window(id),
            None => false,
        }
    }

    /// Resize the desktop, pulling every window back inside it. Maximized
    /// windows track the desktop. Every window is marked fully dirty.
    pub fn set_desktop_size(&mut self, size: Size) -> bool {
        if size == self.desktop {
            return false;
        }
        tracing::debug!(
            width = size.width,
            height = size.height,
            "desktop resized"
        );
        self.desktop = size;
        let desktop = self.desktop_area();
        let ids: Vec<WindowId> = self.windows.keys().copied().collect();
        for id in ids {
            let Some(window) = self.windows.get(&id) else {
                continue;
            };
            let rect = match window.state() {
                WindowState::Maximized => desktop,
                WindowState::Minimized if window.restore_state == WindowState::Maximized => {
                    desktop
                }
                _ => self.clamp_rect(window.rect(), window.min_size()),
            };
            if let Some(window) = self.windows.get_mut(&id) {
                window.set_rect(rect);
                if let Some(restore) = window.restore_rect {
                    window.restore_rect = Some(fit_within(restore, desktop));
                }
            }
            self.layout_window(id);
        }
        self.dirty.mark_all_full();
        for id in self.windows.iter().filter(|(_, w)| w.is_minimized()).map(|(id, _)| *id) {
            self.dirty.clear(id);
        }
        self.dirty.expose(desktop);
        true
    }

    /// Topmost input-eligible window under a desktop point. Windows a modal
    /// dialog blocks are skipped.
    pub fn window_at(&self, x: u16, y: u16) -> Option<WindowId> {
        self.z_order.iter().rev().copied().find(|id| {
            self.is_input_eligible(*id)
                && self
                    .windows
                    .get(id)
                    .is_some_and(|w| !w.is_minimized() && rect_contains(w.rect(), x, y))
        })
    }

    /// Topmost visible window under a desktop point, eligible or not.
    pub fn topmost_at(&self, x: u16, y: u16) -> Option<WindowId> {
        self.z_order.iter().rev().copied().find(|id| {
            self.windows
                .get(id)
                .is_some_and(|w| !w.is_minimized() && rect_contains(w.rect(), x, y))
        })
    }

    pub fn on_window_closed(&self, handler: impl FnMut(&WindowClosed) + 'static) -> SubscriptionId {
        self.closed_observers.subscribe(handler)
    }

    pub fn unsubscribe_window_closed(&self, id: SubscriptionId) -> bool {
        self.closed_observers.unsubscribe(id)
    }

    pub(crate) fn closed_observers(&self) -> ObserverList<WindowClosed> {
        self.closed_observers.clone()
    }

    pub(crate) fn take_dirty(&mut self, id: WindowId) -> DirtyRegion {
        self.dirty.take_dirty(id)
    }

    pub(crate) fn take_exposed(&mut self) -> Vec<Rect> {
        self.dirty.take_exposed()
    }

    pub(crate) fn mark_all_full(&mut self) {
        self.dirty.mark_all_full();
    }

    /// Render a window's chrome and controls into its cached buffer.
    pub(crate) fn compose_window(&mut self, id: WindowId) -> Vec<(ControlId, ControlError)> {
        let focused = self.active == Some(id);
        let decorator = Arc::clone(&self.decorator);
        match self.windows.get_mut(&id) {
            Some(window) => window.compose(decorator.as_ref(), focused),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::testing::{Fill, new_log};
    use crate::dirty::DirtyGranularity;
    use crate::window::WindowCapabilities;

    fn manager(width: u16, height: u16) -> WindowManager {
        WindowManager::new(Size::new(width, height), &DeskConfig::default())
    }

    fn drain(wm: &mut WindowManager) {
        let ids: Vec<_> = wm.z_order().to_vec();
        for id in ids {
            wm.take_dirty(id);
        }
        wm.take_exposed();
    }

    fn bounds(wm: &WindowManager, id: WindowId, control: ControlId) -> Option<Rect> {
        wm.window(id).and_then(|window| window.controls().bounds(control))
    }

    #[test]
    fn new_windows_are_active_and_on_top() {
        let mut wm = manager(80, 24);
        let a = wm.add_window(Window::new("a", Rect::new(0, 0, 20, 10)));
        let b = wm.add_window(Window::new("b", Rect::new(5, 5, 20, 10)));
        assert_eq!(wm.z_order(), &[a, b]);
        assert_eq!(wm.active_window(), Some(b));
        assert!(wm.set_active_window(a));
        assert_eq!(wm.z_order(), &[b, a]);
    }

    #[test]
    fn closing_active_window_activates_next_highest() {
        let mut wm = manager(80, 24);
        let a = wm.add_window(Window::new("a", Rect::new(0, 0, 20, 10)));
        let b = wm.add_window(Window::new("b", Rect::new(5, 5, 20, 10)));
        let c = wm.add_window(Window::new("c", Rect::new(9, 9, 20, 10)));
        wm.minimize_window(b);
        assert_eq!(wm.remove_window(c), CloseOutcome::Closed);
        assert_eq!(wm.active_window(), Some(a));
        assert_eq!(wm.remove_window(c), CloseOutcome::NotFound);
    }

    #[test]
    fn non_closable_windows_reject_close() {
        let mut wm = manager(80, 24);
        let a = wm.add_window(Window::new("a", Rect::new(0, 0, 20, 10)).closable(false));
        assert_eq!(wm.remove_window(a), CloseOutcome::Rejected);
        assert!(wm.contains(a));
        assert_eq!(wm.remove_window(WindowId::new(77)), CloseOutcome::NotFound);
        assert_eq!(wm.force_remove_window(a), CloseOutcome::Closed);
    }

    #[test]
    fn capability_flags_gate_geometry_changes() {
        let mut wm = manager(80, 24);
        let caps = WindowCapabilities {
            movable: false,
            resizable: false,
            minimizable: false,
            maximizable: false,
            closable: true,
        };
        let a = wm.add_window(Window::new("a", Rect::new(0, 0, 20, 10)).with_capabilities(caps));
        assert!(!wm.move_window(a, 3, 3));
        assert!(!wm.resize_window(a, 30, 12));
        assert!(!wm.minimize_window(a));
        assert!(!wm.maximize_window(a));
        assert_eq!(wm.window(a).unwrap().rect(), Rect::new(0, 0, 20, 10));
    }

    #[test]
    fn modal_layer_stays_above_normal_windows() {
        let mut wm = manager(80, 24);
        let main = wm.add_window(Window::new("main", Rect::new(0, 0, 40, 20)));
        let dialog = wm.add_window(
            Window::new("dialog", Rect::new(10, 5, 20, 6))
                .modal()
                .with_parent(main),
        );
        assert_eq!(wm.active_window(), Some(dialog));
        assert!(wm.ui_blocked().is_blocked());

        let late = wm.add_window(Window::new("late", Rect::new(2, 2, 20, 6)));
        assert_eq!(wm.z_order(), &[main, late, dialog]);
        assert_eq!(wm.active_window(), Some(dialog));
        assert!(!wm.set_active_window(main));
        wm.bring_to_front(late);
        assert_eq!(wm.z_order().last(), Some(&dialog));

        assert_eq!(wm.remove_window(dialog), CloseOutcome::Closed);
        assert!(!wm.ui_blocked().is_blocked());
        assert_eq!(wm.active_window(), Some(main));
        assert!(wm.modal_stack().is_empty());
    }

    #[test]
    fn child_of_modal_is_eligible() {
        let mut wm = manager(80, 24);
        let dialog = wm.add_window(Window::new("dialog", Rect::new(10, 5, 20, 6)).modal());
        let child = wm.add_window(Window::new("picker", Rect::new(12, 7, 10, 5)).with_parent(dialog));
        assert!(wm.is_input_eligible(child));
        assert_eq!(wm.active_window(), Some(child));
        assert_eq!(wm.z_order(), &[dialog, child]);
        let normal = wm.add_window(Window::new("normal", Rect::new(0, 0, 10, 5)));
        assert_eq!(wm.z_order(), &[normal, dialog, child]);
    }

    #[test]
    fn window_at_skips_windows_blocked_by_modal() {
        let mut wm = manager(80, 24);
        let main = wm.add_window(Window::new("main", Rect::new(0, 0, 40, 20)));
        assert_eq!(wm.window_at(1, 1), Some(main));
        let dialog = wm.add_window(Window::new("dialog", Rect::new(10, 5, 20, 6)).modal());
        assert_eq!(wm.window_at(1, 1), None);
        assert_eq!(wm.topmost_at(1, 1), Some(main));
        assert_eq!(wm.window_at(12, 6), Some(dialog));
    }

    #[test]
    fn hit_test_prefers_last_added_overlap() {
        let mut wm = manager(80, 24);
        wm.add_window(Window::new("a", Rect::new(0, 0, 20, 10)));
        let b = wm.add_window(Window::new("b", Rect::new(0, 0, 20, 10)));
        assert_eq!(wm.window_at(5, 5), Some(b));
    }

    #[test]
    fn move_exposes_old_rect_and_marks_full() {
        let mut wm = manager(80, 24);
        let a = wm.add_window(Window::new("a", Rect::new(0, 0, 20, 10)));
        drain(&mut wm);
        assert!(wm.move_window(a, 10, 4));
        assert_eq!(wm.window(a).unwrap().rect(), Rect::new(10, 4, 20, 10));
        assert_eq!(wm.take_exposed(), vec![Rect::new(0, 0, 20, 10)]);
        assert!(wm.take_dirty(a).is_full());
    }

    #[test]
    fn move_is_clamped_to_desktop() {
        let mut wm = manager(80, 24);
        let a = wm.add_window(Window::new("a", Rect::new(0, 0, 20, 10)));
        wm.move_window(a, 75, 30);
        assert_eq!(wm.window(a).unwrap().rect(), Rect::new(60, 14, 20, 10));
    }

    #[test]
    fn resize_honors_minimum_size() {
        let mut wm = manager(80, 24);
        let a = wm.add_window(
            Window::new("a", Rect::new(0, 0, 20, 10)).with_min_size(Size::new(10, 5)),
        );
        wm.resize_window(a, 2, 2);
        assert_eq!(wm.window(a).unwrap().rect(), Rect::new(0, 0, 10, 5));
    }

    #[test]
    fn minimize_clears_dirty_and_exposes() {
        let mut wm = manager(80, 24);
        let a = wm.add_window(Window::new("a", Rect::new(0, 0, 20, 10)));
        let b = wm.add_window(Window::new("b", Rect::new(30, 0, 20, 10)));
        drain(&mut wm);
        wm.mark_dirty(b, Invalidate::Lines(vec![3]));
        assert!(wm.minimize_window(b));
        assert!(wm.take_dirty(b).is_none());
        assert_eq!(wm.take_exposed(), vec![Rect::new(30, 0, 20, 10)]);
        assert_eq!(wm.active_window(), Some(a));
        assert_eq!(wm.window_at(35, 5), None);

        assert!(wm.set_active_window(b));
        assert_eq!(wm.window(b).unwrap().state(), WindowState::Normal);
    }

    #[test]
    fn maximize_and_restore_round_trip_geometry() {
        let mut wm = manager(80, 24);
        let a = wm.add_window(Window::new("a", Rect::new(3, 3, 20, 10)));
        assert!(wm.maximize_window(a));
        assert_eq!(wm.window(a).unwrap().rect(), Rect::new(0, 0, 80, 24));
        assert!(!wm.move_window(a, 1, 1));
        assert!(wm.restore_window(a));
        assert_eq!(wm.window(a).unwrap().rect(), Rect::new(3, 3, 20, 10));
    }

    #[test]
    fn desktop_shrink_clamps_windows_and_marks_full() {
        let mut wm = manager(100, 30);
        let a = wm.add_window(Window::new("a", Rect::new(90, 5, 20, 10)));
        assert_eq!(wm.window(a).unwrap().rect(), Rect::new(80, 5, 20, 10));
        let m = wm.add_window(Window::new("m", Rect::new(0, 0, 10, 10)).maximized());
        drain(&mut wm);

        assert!(wm.set_desktop_size(Size::new(80, 24)));
        assert_eq!(wm.window(a).unwrap().rect(), Rect::new(60, 5, 20, 10));
        assert_eq!(wm.window(m).unwrap().rect(), Rect::new(0, 0, 80, 24));
        assert!(wm.take_dirty(a).is_full());
        assert!(wm.take_dirty(m).is_full());
    }

    #[test]
    fn desktop_smaller_than_minimum_wins() {
        let mut wm = manager(80, 24);
        let a = wm.add_window(
            Window::new("a", Rect::new(0, 0, 20, 10)).with_min_size(Size::new(20, 10)),
        );
        wm.set_desktop_size(Size::new(12, 4));
        assert_eq!(wm.window(a).unwrap().rect(), Rect::new(0, 0, 12, 4));
    }

    #[test]
    fn closing_parent_closes_children() {
        let mut wm = manager(80, 24);
        let main = wm.add_window(Window::new("main", Rect::new(0, 0, 40, 20)));
        let child = wm.add_window(Window::new("child", Rect::new(5, 5, 10, 5)).with_parent(main));
        let closed = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = std::rc::Rc::clone(&closed);
        wm.on_window_closed(move |event| sink.borrow_mut().push(event.id));
        wm.remove_window(main);
        assert!(!wm.contains(child));
        assert_eq!(*closed.borrow(), vec![child, main]);
    }

    #[test]
    fn closed_observers_fire_in_order() {
        let mut wm = manager(80, 24);
        let a = wm.add_window(Window::new("alpha", Rect::new(0, 0, 20, 10)));
        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = std::rc::Rc::clone(&seen);
        wm.on_window_closed(move |closed| sink.borrow_mut().push(closed.title.clone()));
        wm.remove_window(a);
        assert_eq!(*seen.borrow(), vec!["alpha".to_string()]);
    }

    #[test]
    fn control_invalidation_marks_its_lines() {
        let mut wm = WindowManager::new(
            Size::new(80, 24),
            &DeskConfig::default().with_granularity(DirtyGranularity::Line),
        );
        let log = new_log();
        let mut window = Window::new("a", Rect::new(0, 0, 20, 10));
        let label = window
            .controls_mut()
            .add_root(Fill::new("label", "x", &log).rows(1));
        let a = wm.add_window(window);
        drain(&mut wm);
        wm.invalidate_control(a, label);
        assert_eq!(
            wm.take_dirty(a),
            DirtyRegion::Lines(std::collections::BTreeSet::from([2]))
        );
    }

    #[test]
    fn control_bounds_track_geometry_without_a_render() {
        let mut wm = manager(80, 24);
        let log = new_log();
        let mut window = Window::new("a", Rect::new(0, 0, 20, 10));
        let body = window.controls_mut().add_root(Fill::new("body", ".", &log));
        let a = wm.add_window(window);
        assert_eq!(bounds(&wm, a, body), Some(Rect::new(1, 2, 18, 7)));

        wm.resize_window(a, 40, 16);
        assert_eq!(bounds(&wm, a, body), Some(Rect::new(1, 2, 38, 13)));

        wm.maximize_window(a);
        assert_eq!(bounds(&wm, a, body), Some(Rect::new(1, 2, 78, 21)));
        wm.set_desktop_size(Size::new(60, 20));
        assert_eq!(bounds(&wm, a, body), Some(Rect::new(1, 2, 58, 17)));

        let footer = wm
            .add_control(a, None, Box::new(Fill::new("footer", "_", &log).rows(1)))
            .unwrap();
        assert_eq!(bounds(&wm, a, footer), Some(Rect::new(1, 18, 58, 1)));
        wm.remove_control(a, footer);
        assert_eq!(bounds(&wm, a, body), Some(Rect::new(1, 2, 58, 17)));
    }
}
