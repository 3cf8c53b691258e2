//! The control capability contract and the per-window control arena.
//!
//! A window owns exactly one [`ControlTree`]. Nodes live in a slot arena
//! and refer to each other by [`ControlId`]; a child only knows its parent's
//! id, never a reference to it. Ids carry a generation so a stale id left
//! behind by a removed control never resolves to a newer one in the same
//! slot.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use ratatui::layout::{Rect, Size};
use ratatui::style::{Color, Style};

use crate::buffer::CellBuffer;
use crate::cell::Cell;
use crate::error::ControlError;
use crate::input::{KeyEventArgs, MouseEventArgs};
use crate::layout::{self, LayoutHints, LayoutItem};

/// Everything the core needs from a widget.
///
/// Only `render` is required. A control that wants input must return
/// `true` from `accepts_input`; it is then a focus and hit-test target.
pub trait Control: Any {
    /// Preferred size given the space on offer. Defaults to all of it.
    fn measure(&self, max_width: u16, max_height: u16) -> Size {
        Size::new(max_width, max_height)
    }

    fn render(&mut self, width: u16, height: u16) -> Result<CellBuffer, ControlError>;

    fn accepts_input(&self) -> bool {
        false
    }

    fn visible(&self) -> bool {
        true
    }

    fn enabled(&self) -> bool {
        true
    }

    fn layout(&self) -> LayoutHints {
        LayoutHints::default()
    }

    /// Return `true` (or set `event.handled`) to stop propagation.
    fn handle_key(&mut self, _event: &mut KeyEventArgs) -> bool {
        false
    }

    fn handle_mouse(&mut self, _event: &mut MouseEventArgs) -> bool {
        false
    }

    fn on_focus_changed(&mut self, _focused: bool) {}

    /// Polled once per frame. A control whose content changed without an
    /// explicit invalidation reports it here and clears the flag when it
    /// next renders.
    fn needs_redraw(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlId {
    index: u32,
    generation: u32,
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

struct Node {
    control: Box<dyn Control>,
    parent: Option<ControlId>,
    children: Vec<ControlId>,
    bounds: Rect,
}

#[derive(Default)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

#[derive(Default)]
pub struct ControlTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    roots: Vec<ControlId>,
}

impl fmt::Debug for ControlTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlTree")
            .field("len", &self.len())
            .field("roots", &self.roots)
            .finish()
    }
}

impl ControlTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    fn insert(&mut self, control: Box<dyn Control>, parent: Option<ControlId>) -> ControlId {
        let node = Node {
            control,
            parent,
            children: Vec::new(),
            bounds: Rect::default(),
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.node = Some(node);
            ControlId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            ControlId {
                index,
                generation: 0,
            }
        }
    }

    fn node(&self, id: ControlId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, id: ControlId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Add a top-level control laid out directly in the window's client area.
    pub fn add_root(&mut self, control: impl Control) -> ControlId {
        self.add_root_boxed(Box::new(control))
    }

    pub fn add_root_boxed(&mut self, control: Box<dyn Control>) -> ControlId {
        let id = self.insert(control, None);
        self.roots.push(id);
        id
    }

    /// `None` if `parent` is not in the tree.
    pub fn add_child(&mut self, parent: ControlId, control: impl Control) -> Option<ControlId> {
        self.add_child_boxed(parent, Box::new(control))
    }

    pub fn add_child_boxed(
        &mut self,
        parent: ControlId,
        control: Box<dyn Control>,
    ) -> Option<ControlId> {
        if !self.contains(parent) {
            return None;
        }
        let id = self.insert(control, Some(parent));
        if let Some(node) = self.node_mut(parent) {
            node.children.push(id);
        }
        Some(id)
    }

    /// Remove `id` and its whole subtree. Returns every removed id, children
    /// before their parents.
    pub fn remove(&mut self, id: ControlId) -> Vec<ControlId> {
        let Some(parent) = self.node(id).map(|node| node.parent) else {
            return Vec::new();
        };
        match parent {
            Some(parent) => {
                if let Some(node) = self.node_mut(parent) {
                    node.children.retain(|child| *child != id);
                }
            }
            None => self.roots.retain(|root| *root != id),
        }
        let mut removed = Vec::new();
        self.remove_subtree(id, &mut removed);
        removed
    }

    fn remove_subtree(&mut self, id: ControlId, removed: &mut Vec<ControlId>) {
        let children = self
            .node(id)
            .map(|node| node.children.clone())
            .unwrap_or_default();
        for child in children {
            self.remove_subtree(child, removed);
        }
        if let Some(slot) = self.slots.get_mut(id.index as usize)
            && slot.generation == id.generation
            && slot.node.take().is_some()
        {
            self.free.push(id.index);
            removed.push(id);
        }
    }

    pub fn contains(&self, id: ControlId) -> bool {
        self.node(id).is_some()
    }

    pub fn get(&self, id: ControlId) -> Option<&dyn Control> {
        self.node(id).map(|node| node.control.as_ref())
    }

    pub fn get_mut(&mut self, id: ControlId) -> Option<&mut dyn Control> {
        let node = self.node_mut(id)?;
        Some(node.control.as_mut())
    }

    /// Borrow a control as its concrete type.
    pub fn downcast_ref<T: Control>(&self, id: ControlId) -> Option<&T> {
        let any: &dyn Any = self.node(id)?.control.as_ref();
        any.downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Control>(&mut self, id: ControlId) -> Option<&mut T> {
        let any: &mut dyn Any = self.node_mut(id)?.control.as_mut();
        any.downcast_mut::<T>()
    }

    pub fn parent(&self, id: ControlId) -> Option<ControlId> {
        self.node(id).and_then(|node| node.parent)
    }

    pub fn children(&self, id: ControlId) -> &[ControlId] {
        self.node(id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn roots(&self) -> &[ControlId] {
        &self.roots
    }

    /// Window-relative rectangle assigned by the last layout pass.
    pub fn bounds(&self, id: ControlId) -> Option<Rect> {
        self.node(id).map(|node| node.bounds)
    }

    /// `true` if `ancestor` is `id` itself or above it.
    pub fn is_ancestor(&self, ancestor: ControlId, id: ControlId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Visible along with every ancestor, so it gets painted.
    pub fn is_shown(&self, id: ControlId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(node) = self.node(current) else {
                return false;
            };
            if !node.control.visible() {
                return false;
            }
            cursor = node.parent;
        }
        true
    }

    /// Visible and enabled, along with every ancestor.
    pub fn is_live(&self, id: ControlId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(node) = self.node(current) else {
                return false;
            };
            if !node.control.visible() || !node.control.enabled() {
                return false;
            }
            cursor = node.parent;
        }
        true
    }

    pub fn is_focusable(&self, id: ControlId) -> bool {
        self.get(id).is_some_and(|control| control.accepts_input()) && self.is_live(id)
    }

    /// Focusable controls in tree order (pre-order, insertion order among
    /// siblings). This is the Tab order.
    pub fn focusable_order(&self) -> Vec<ControlId> {
        let mut out = Vec::new();
        for root in &self.roots {
            self.collect_focusable(*root, &mut out);
        }
        out
    }

    fn collect_focusable(&self, id: ControlId, out: &mut Vec<ControlId>) {
        let Some(node) = self.node(id) else {
            return;
        };
        if !node.control.visible() || !node.control.enabled() {
            return;
        }
        if node.control.accepts_input() {
            out.push(id);
        }
        for child in &node.children {
            self.collect_focusable(*child, out);
        }
    }

    /// Shown controls whose `needs_redraw` is set. Hidden ones are never
    /// painted, so their flag would never clear.
    pub fn pending_redraws(&self) -> Vec<ControlId> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let node = slot.node.as_ref()?;
                node.control.needs_redraw().then_some(ControlId {
                    index: index as u32,
                    generation: slot.generation,
                })
            })
            .filter(|id| self.is_shown(*id))
            .collect()
    }

    /// Assign bounds to every control, starting from `client` (window
    /// relative). A control that panics while being measured is laid out
    /// as a zero-sized item; the failures are returned.
    pub fn layout(&mut self, client: Rect) -> Vec<(ControlId, ControlError)> {
        let mut failures = Vec::new();
        let roots = self.roots.clone();
        self.layout_siblings(&roots, client, &mut failures);
        failures
    }

    fn layout_siblings(
        &mut self,
        ids: &[ControlId],
        area: Rect,
        failures: &mut Vec<(ControlId, ControlError)>,
    ) {
        let items: Vec<LayoutItem> = ids
            .iter()
            .map(|id| match self.node(*id) {
                Some(node) => match measure_item(*id, &*node.control, area) {
                    Ok(item) => item,
                    Err(err) => {
                        failures.push((*id, err));
                        LayoutItem {
                            hints: LayoutHints::default(),
                            desired: Size::new(0, 0),
                            visible: true,
                        }
                    }
                },
                None => LayoutItem {
                    hints: LayoutHints::default(),
                    desired: Size::new(0, 0),
                    visible: false,
                },
            })
            .collect();
        let rects = layout::flow_layout(area, &items);
        for (id, rect) in ids.iter().zip(rects) {
            let children = match self.node_mut(*id) {
                Some(node) => {
                    node.bounds = rect;
                    node.children.clone()
                }
                None => continue,
            };
            self.layout_siblings(&children, rect, failures);
        }
    }

    fn paint_order(&self, ids: &[ControlId]) -> Vec<ControlId> {
        let hints: Vec<LayoutHints> = ids
            .iter()
            .map(|id| {
                self.node(*id)
                    .and_then(|node| guarded(*id, || node.control.layout()).ok())
                    .unwrap_or_default()
            })
            .collect();
        layout::paint_order(&hints)
            .into_iter()
            .map(|idx| ids[idx])
            .collect()
    }

    /// Render every visible control into `target` (window-sized) at its
    /// laid-out bounds. A control that fails or panics is drawn as a
    /// placeholder; the failures are returned.
    pub fn render_into(&mut self, target: &mut CellBuffer) -> Vec<(ControlId, ControlError)> {
        let mut failures = Vec::new();
        let roots = self.paint_order(&self.roots.clone());
        let clip = target.area();
        for id in roots {
            self.render_node(id, target, clip, &mut failures);
        }
        failures
    }

    fn render_node(
        &mut self,
        id: ControlId,
        target: &mut CellBuffer,
        clip: Rect,
        failures: &mut Vec<(ControlId, ControlError)>,
    ) {
        let Some(node) = self.node_mut(id) else {
            return;
        };
        if !node.control.visible() {
            return;
        }
        let bounds = node.bounds;
        let clip = clip.intersection(bounds);
        if clip.is_empty() {
            return;
        }
        let control = &mut node.control;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            control.render(bounds.width, bounds.height)
        }));
        let buffer = match outcome {
            Ok(Ok(buffer)) => buffer,
            Ok(Err(err)) => {
                tracing::warn!(control = %id, error = %err, "control render failed");
                failures.push((id, err));
                placeholder(bounds.width, bounds.height)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(control = %id, %message, "control panicked while rendering");
                failures.push((id, ControlError::Panicked(message)));
                placeholder(bounds.width, bounds.height)
            }
        };
        target.blit(&buffer, bounds.x as i32, bounds.y as i32, clip);

        let children = self.children(id).to_vec();
        for child in self.paint_order(&children) {
            self.render_node(child, target, clip, failures);
        }
    }

    /// Deepest visible, enabled, input-accepting control at the
    /// window-relative point. Among overlapping siblings the one painted
    /// last wins, and it alone decides: a miss inside it does not fall
    /// through to siblings underneath.
    pub fn hit_test(&self, x: u16, y: u16) -> Option<ControlId> {
        self.hit_siblings(&self.roots, x, y)
    }

    fn hit_siblings(&self, ids: &[ControlId], x: u16, y: u16) -> Option<ControlId> {
        let order = self.paint_order(ids);
        let top = order.into_iter().rev().find(|id| {
            self.node(*id).is_some_and(|node| {
                node.control.visible() && layout::rect_contains(node.bounds, x, y)
            })
        })?;
        let node = self.node(top)?;
        if !node.control.enabled() {
            return None;
        }
        if let Some(hit) = self.hit_siblings(&node.children, x, y) {
            return Some(hit);
        }
        node.control.accepts_input().then_some(top)
    }
}

fn measure_item(
    id: ControlId,
    control: &dyn Control,
    area: Rect,
) -> Result<LayoutItem, ControlError> {
    guarded(id, || {
        let hints = control.layout();
        let max_w = area.width.saturating_sub(hints.margin.horizontal());
        let max_h = area.height.saturating_sub(hints.margin.vertical());
        LayoutItem {
            hints,
            desired: control.measure(max_w, max_h),
            visible: control.visible(),
        }
    })
}

/// Run a layout-time control callback, turning a panic into an error.
fn guarded<T>(id: ControlId, call: impl FnOnce() -> T) -> Result<T, ControlError> {
    panic::catch_unwind(AssertUnwindSafe(call)).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        tracing::warn!(control = %id, %message, "control panicked during layout");
        ControlError::Panicked(message)
    })
}

fn placeholder(width: u16, height: u16) -> CellBuffer {
    let mut buffer = CellBuffer::filled(width, height, Cell::blank().with_bg(Color::Red));
    buffer.set_string(0, 0, "render error", Style::default().fg(Color::White));
    buffer
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    struct Failing;

    impl Control for Failing {
        fn measure(&self, max_width: u16, _: u16) -> Size {
            Size::new(max_width, 1)
        }

        fn render(&mut self, _: u16, _: u16) -> Result<CellBuffer, ControlError> {
            Err(ControlError::render("no data"))
        }
    }

    struct Panicking;

    impl Control for Panicking {
        fn measure(&self, max_width: u16, _: u16) -> Size {
            Size::new(max_width, 1)
        }

        fn render(&mut self, _: u16, _: u16) -> Result<CellBuffer, ControlError> {
            panic!("boom");
        }
    }

    struct BadMeasure;

    impl Control for BadMeasure {
        fn measure(&self, _: u16, _: u16) -> Size {
            panic!("measure boom");
        }

        fn render(&mut self, width: u16, height: u16) -> Result<CellBuffer, ControlError> {
            Ok(CellBuffer::filled(width, height, Cell::new("x")))
        }
    }

    #[test]
    fn panicking_measure_lays_out_as_an_empty_slot() {
        let log = new_log();
        let mut tree = ControlTree::new();
        let bad = tree.add_root(BadMeasure);
        let ok = tree.add_root(Fill::new("ok", "k", &log).rows(1));
        let failures = tree.layout(Rect::new(0, 0, 6, 3));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, bad);
        assert!(matches!(failures[0].1, ControlError::Panicked(ref msg) if msg == "measure boom"));
        assert!(tree.bounds(bad).is_some_and(|rect| rect.is_empty()));
        assert_eq!(tree.bounds(ok), Some(Rect::new(0, 0, 6, 1)));

        let mut target = CellBuffer::new(6, 3);
        assert!(tree.render_into(&mut target).is_empty());
        assert_eq!(target.row_text(0), "kkkkkk");
    }

    #[test]
    fn stale_ids_do_not_resolve_after_slot_reuse() {
        let log = new_log();
        let mut tree = ControlTree::new();
        let a = tree.add_root(Fill::new("a", "a", &log));
        tree.remove(a);
        let b = tree.add_root(Fill::new("b", "b", &log));
        assert!(!tree.contains(a));
        assert!(tree.contains(b));
        assert_ne!(a, b);
    }

    #[test]
    fn remove_takes_the_subtree() {
        let log = new_log();
        let mut tree = ControlTree::new();
        let root = tree.add_root(Fill::new("root", " ", &log));
        let child = tree.add_child(root, Fill::new("child", " ", &log)).unwrap();
        let grandchild = tree
            .add_child(child, Fill::new("grandchild", " ", &log))
            .unwrap();
        let removed = tree.remove(child);
        assert_eq!(removed, vec![grandchild, child]);
        assert!(tree.children(root).is_empty());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn focus_order_is_preorder_and_skips_disabled_subtrees() {
        let log = new_log();
        let mut tree = ControlTree::new();
        let panel = tree.add_root(Fill::new("panel", " ", &log));
        let a = tree
            .add_child(panel, Fill::new("a", " ", &log).focusable())
            .unwrap();
        let mut hidden = Fill::new("hidden", " ", &log);
        hidden.enabled = false;
        let hidden = tree.add_child(panel, hidden).unwrap();
        tree.add_child(hidden, Fill::new("inner", " ", &log).focusable())
            .unwrap();
        let b = tree.add_root(Fill::new("b", " ", &log).focusable());
        assert_eq!(tree.focusable_order(), vec![a, b]);
    }

    #[test]
    fn layout_and_render_compose_children() {
        let log = new_log();
        let mut tree = ControlTree::new();
        tree.add_root(Fill::new("top", "t", &log).rows(1));
        tree.add_root(Fill::new("rest", "r", &log));
        tree.layout(Rect::new(1, 1, 3, 3));
        let mut target = CellBuffer::new(5, 5);
        let failures = tree.render_into(&mut target);
        assert!(failures.is_empty());
        assert_eq!(target.row_text(0), "     ");
        assert_eq!(target.row_text(1), " ttt ");
        assert_eq!(target.row_text(3), " rrr ");
        assert_eq!(target.row_text(4), "     ");
    }

    #[test]
    fn failing_and_panicking_controls_become_placeholders() {
        let log = new_log();
        let mut tree = ControlTree::new();
        let bad = tree.add_root(Failing);
        let worse = tree.add_root(Panicking);
        tree.add_root(Fill::new("ok", "k", &log).rows(1));
        tree.layout(Rect::new(0, 0, 12, 3));
        let mut target = CellBuffer::new(12, 3);
        let failures = tree.render_into(&mut target);
        let ids: Vec<_> = failures.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![bad, worse]);
        assert!(matches!(failures[1].1, ControlError::Panicked(ref msg) if msg == "boom"));
        assert!(target.row_text(2).starts_with("kkk"));
    }

    #[test]
    fn hit_test_prefers_last_painted_sibling() {
        let log = new_log();
        let mut tree = ControlTree::new();
        let below = tree.add_root(
            Fill::new("below", " ", &log)
                .focusable()
                .hints(LayoutHints::absolute(0, 0)),
        );
        let above = tree.add_root(
            Fill::new("above", " ", &log)
                .focusable()
                .hints(LayoutHints::absolute(2, 0)),
        );
        tree.layout(Rect::new(0, 0, 10, 4));
        assert_eq!(tree.hit_test(1, 1), Some(below));
        assert_eq!(tree.hit_test(3, 1), Some(above));
    }

    #[test]
    fn hit_test_falls_back_to_accepting_parent_but_not_disabled() {
        let log = new_log();
        let mut tree = ControlTree::new();
        let parent = tree.add_root(Fill::new("parent", " ", &log).focusable());
        tree.add_child(parent, Fill::new("label", " ", &log).rows(1))
            .unwrap();
        tree.layout(Rect::new(0, 0, 4, 4));
        assert_eq!(tree.hit_test(0, 0), Some(parent));

        if let Some(fill) = tree.downcast_mut::<Fill>(parent) {
            fill.enabled = false;
        }
        assert_eq!(tree.hit_test(0, 0), None);
    }

    #[test]
    fn pending_redraws_reports_flagged_controls() {
        let log = new_log();
        let mut tree = ControlTree::new();
        let a = tree.add_root(Fill::new("a", " ", &log));
        tree.add_root(Fill::new("b", " ", &log));
        if let Some(fill) = tree.downcast_mut::<Fill>(a) {
            fill.dirty = true;
        }
        assert_eq!(tree.pending_redraws(), vec![a]);
    }

    #[test]
    fn pending_redraws_skips_hidden_controls_and_their_children() {
        let log = new_log();
        let mut tree = ControlTree::new();
        let mut hidden = Fill::new("hidden", " ", &log);
        hidden.visible = false;
        hidden.dirty = true;
        let hidden = tree.add_root(hidden);
        let mut child = Fill::new("child", " ", &log);
        child.dirty = true;
        tree.add_child(hidden, child).unwrap();
        assert!(tree.pending_redraws().is_empty());

        if let Some(fill) = tree.downcast_mut::<Fill>(hidden) {
            fill.visible = true;
        }
        assert_eq!(tree.pending_redraws().len(), 2);
    }
}
