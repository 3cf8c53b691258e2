//! Rectangle helpers and the flow layout used inside a window's client area.
//!
//! Controls are stacked vertically in insertion order. Sticky controls are
//! pinned to the top or bottom edge of their parent before the normal flow
//! takes the space that is left, and absolutely positioned controls are
//! placed at an offset from the parent's origin. Every rectangle is clipped
//! to the parent.

use ratatui::layout::{Rect, Size};

/// Alignment along one axis inside the space offered to a control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Align {
    #[default]
    Start,
    Center,
    End,
    /// Take all offered space. Vertically, stretch controls share whatever
    /// the fixed-height flow controls leave over.
    Stretch,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Margin {
    pub left: u16,
    pub top: u16,
    pub right: u16,
    pub bottom: u16,
}

impl Margin {
    pub const fn uniform(value: u16) -> Self {
        Self {
            left: value,
            top: value,
            right: value,
            bottom: value,
        }
    }

    pub const fn horizontal(&self) -> u16 {
        self.left.saturating_add(self.right)
    }

    pub const fn vertical(&self) -> u16 {
        self.top.saturating_add(self.bottom)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Placement {
    #[default]
    Flow,
    StickyTop,
    StickyBottom,
    /// Offset from the parent's origin, sized by `measure`.
    Absolute { x: u16, y: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutHints {
    pub h_align: Align,
    pub v_align: Align,
    pub margin: Margin,
    pub placement: Placement,
}

impl Default for LayoutHints {
    fn default() -> Self {
        Self {
            h_align: Align::Stretch,
            v_align: Align::Start,
            margin: Margin::default(),
            placement: Placement::Flow,
        }
    }
}

impl LayoutHints {
    pub fn fill() -> Self {
        Self {
            v_align: Align::Stretch,
            ..Self::default()
        }
    }

    pub fn sticky_top() -> Self {
        Self {
            placement: Placement::StickyTop,
            ..Self::default()
        }
    }

    pub fn sticky_bottom() -> Self {
        Self {
            placement: Placement::StickyBottom,
            ..Self::default()
        }
    }

    pub fn absolute(x: u16, y: u16) -> Self {
        Self {
            h_align: Align::Start,
            placement: Placement::Absolute { x, y },
            ..Self::default()
        }
    }

    pub fn with_margin(mut self, margin: Margin) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_h_align(mut self, align: Align) -> Self {
        self.h_align = align;
        self
    }

    pub fn with_v_align(mut self, align: Align) -> Self {
        self.v_align = align;
        self
    }

    fn is_sticky(&self) -> bool {
        matches!(
            self.placement,
            Placement::StickyTop | Placement::StickyBottom
        )
    }
}

/// One child as seen by [`flow_layout`]: its hints, the size it asked for
/// (margins excluded) and whether it takes part at all.
#[derive(Debug, Clone, Copy)]
pub struct LayoutItem {
    pub hints: LayoutHints,
    pub desired: Size,
    pub visible: bool,
}

/// Assign a rectangle inside `area` to every item. Invisible items get an
/// empty rectangle.
pub fn flow_layout(area: Rect, items: &[LayoutItem]) -> Vec<Rect> {
    let mut out = vec![Rect::default(); items.len()];
    let mut top = area.y;
    let mut bottom = area.bottom();

    for (idx, item) in items.iter().enumerate() {
        if !item.visible || item.hints.placement != Placement::StickyTop {
            continue;
        }
        let height = outer_height(item).min(bottom.saturating_sub(top));
        out[idx] = place_in_slot(area, top, height, item);
        top = top.saturating_add(height);
    }
    for (idx, item) in items.iter().enumerate().rev() {
        if !item.visible || item.hints.placement != Placement::StickyBottom {
            continue;
        }
        let height = outer_height(item).min(bottom.saturating_sub(top));
        bottom = bottom.saturating_sub(height);
        out[idx] = place_in_slot(area, bottom, height, item);
    }

    let flow: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| item.visible && item.hints.placement == Placement::Flow)
        .map(|(idx, _)| idx)
        .collect();
    let available = bottom.saturating_sub(top);
    let fixed: u16 = flow
        .iter()
        .filter(|&&idx| items[idx].hints.v_align != Align::Stretch)
        .fold(0u16, |acc, &idx| acc.saturating_add(outer_height(&items[idx])));
    let stretch_count = flow
        .iter()
        .filter(|&&idx| items[idx].hints.v_align == Align::Stretch)
        .count() as u16;
    let leftover = available.saturating_sub(fixed);

    let mut cursor = top;
    if stretch_count == 0
        && let Some(&first) = flow.first()
    {
        cursor = match items[first].hints.v_align {
            Align::Center => top.saturating_add(leftover / 2),
            Align::End => top.saturating_add(leftover),
            _ => top,
        };
    }
    let mut extra = if stretch_count > 0 {
        leftover % stretch_count
    } else {
        0
    };
    for idx in flow {
        let item = &items[idx];
        let height = if item.hints.v_align == Align::Stretch {
            let mut share = leftover / stretch_count;
            if extra > 0 {
                share += 1;
                extra -= 1;
            }
            share
        } else {
            outer_height(item)
        };
        let height = height.min(bottom.saturating_sub(cursor));
        out[idx] = place_in_slot(area, cursor, height, item);
        cursor = cursor.saturating_add(height);
    }

    for (idx, item) in items.iter().enumerate() {
        let Placement::Absolute { x, y } = item.hints.placement else {
            continue;
        };
        if !item.visible {
            continue;
        }
        let rect = Rect {
            x: area
                .x
                .saturating_add(x)
                .saturating_add(item.hints.margin.left),
            y: area
                .y
                .saturating_add(y)
                .saturating_add(item.hints.margin.top),
            width: item.desired.width,
            height: item.desired.height,
        };
        out[idx] = clamp_rect(rect, area);
    }
    out
}

/// Indices of `hints` in paint order: normal flow first, then sticky
/// controls, then absolutely positioned ones. Order within each group is
/// insertion order, so later siblings paint over earlier ones.
pub fn paint_order(hints: &[LayoutHints]) -> Vec<usize> {
    let flow = hints
        .iter()
        .enumerate()
        .filter(|(_, h)| h.placement == Placement::Flow)
        .map(|(idx, _)| idx);
    let sticky = hints
        .iter()
        .enumerate()
        .filter(|(_, h)| h.is_sticky())
        .map(|(idx, _)| idx);
    let absolute = hints
        .iter()
        .enumerate()
        .filter(|(_, h)| matches!(h.placement, Placement::Absolute { .. }))
        .map(|(idx, _)| idx);
    flow.chain(sticky).chain(absolute).collect()
}

fn outer_height(item: &LayoutItem) -> u16 {
    item.desired
        .height
        .saturating_add(item.hints.margin.vertical())
}

fn place_in_slot(area: Rect, y: u16, slot_height: u16, item: &LayoutItem) -> Rect {
    let margin = item.hints.margin;
    let avail_w = area.width.saturating_sub(margin.horizontal());
    let width = match item.hints.h_align {
        Align::Stretch => avail_w,
        _ => item.desired.width.min(avail_w),
    };
    let slack = avail_w - width;
    let x_offset = match item.hints.h_align {
        Align::Center => slack / 2,
        Align::End => slack,
        Align::Start | Align::Stretch => 0,
    };
    let height = slot_height.saturating_sub(margin.vertical());
    let rect = Rect {
        x: area
            .x
            .saturating_add(margin.left)
            .saturating_add(x_offset),
        y: y.saturating_add(margin.top),
        width,
        height,
    };
    clamp_rect(rect, area)
}

pub fn rect_contains(rect: Rect, column: u16, row: u16) -> bool {
    if rect.width == 0 || rect.height == 0 {
        return false;
    }
    let max_x = rect.x.saturating_add(rect.width);
    let max_y = rect.y.saturating_add(rect.height);
    column >= rect.x && column < max_x && row >= rect.y && row < max_y
}

pub fn rects_intersect(a: Rect, b: Rect) -> bool {
    if a.width == 0 || a.height == 0 || b.width == 0 || b.height == 0 {
        return false;
    }
    let a_right = a.x.saturating_add(a.width);
    let a_bottom = a.y.saturating_add(a.height);
    let b_right = b.x.saturating_add(b.width);
    let b_bottom = b.y.saturating_add(b.height);
    a.x < b_right && a_right > b.x && a.y < b_bottom && a_bottom > b.y
}

/// The part of `area` inside `bounds`, or an empty rect.
pub fn clamp_rect(area: Rect, bounds: Rect) -> Rect {
    let x0 = area.x.max(bounds.x);
    let y0 = area.y.max(bounds.y);
    let x1 = area
        .x
        .saturating_add(area.width)
        .min(bounds.x.saturating_add(bounds.width));
    let y1 = area
        .y
        .saturating_add(area.height)
        .min(bounds.y.saturating_add(bounds.height));
    if x1 <= x0 || y1 <= y0 {
        return Rect::default();
    }
    Rect {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    }
}

/// Move `rect` so it lies inside `bounds`, shrinking it only when it is
/// larger than `bounds`. Unlike [`clamp_rect`] this keeps as much of the
/// size as possible.
pub fn fit_within(rect: Rect, bounds: Rect) -> Rect {
    let width = rect.width.min(bounds.width);
    let height = rect.height.min(bounds.height);
    let max_x = bounds.right().saturating_sub(width);
    let max_y = bounds.bottom().saturating_sub(height);
    Rect {
        x: rect.x.clamp(bounds.x, max_x.max(bounds.x)),
        y: rect.y.clamp(bounds.y, max_y.max(bounds.y)),
        width,
        height,
    }
}

/// A rect of `size` centered in `bounds`.
pub fn centered(size: Size, bounds: Rect) -> Rect {
    let width = size.width.min(bounds.width);
    let height = size.height.min(bounds.height);
    Rect {
        x: bounds.x + (bounds.width - width) / 2,
        y: bounds.y + (bounds.height - height) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(hints: LayoutHints, width: u16, height: u16) -> LayoutItem {
        LayoutItem {
            hints,
            desired: Size::new(width, height),
            visible: true,
        }
    }

    #[test]
    fn flow_stacks_in_insertion_order() {
        let area = Rect::new(0, 0, 10, 10);
        let rects = flow_layout(
            area,
            &[
                item(LayoutHints::default(), 4, 2),
                item(LayoutHints::default(), 4, 3),
            ],
        );
        assert_eq!(rects[0], Rect::new(0, 0, 10, 2));
        assert_eq!(rects[1], Rect::new(0, 2, 10, 3));
    }

    #[test]
    fn sticky_controls_are_placed_before_flow() {
        let area = Rect::new(2, 1, 10, 10);
        let rects = flow_layout(
            area,
            &[
                item(LayoutHints::fill(), 10, 1),
                item(LayoutHints::sticky_bottom(), 10, 1),
                item(LayoutHints::sticky_top(), 10, 2),
            ],
        );
        assert_eq!(rects[2], Rect::new(2, 1, 10, 2));
        assert_eq!(rects[1], Rect::new(2, 10, 10, 1));
        assert_eq!(rects[0], Rect::new(2, 3, 10, 7));
    }

    #[test]
    fn sticky_bottom_keeps_listing_order() {
        let area = Rect::new(0, 0, 5, 5);
        let rects = flow_layout(
            area,
            &[
                item(LayoutHints::sticky_bottom(), 5, 1),
                item(LayoutHints::sticky_bottom(), 5, 1),
            ],
        );
        assert_eq!(rects[0].y, 3);
        assert_eq!(rects[1].y, 4);
    }

    #[test]
    fn stretch_items_share_leftover() {
        let area = Rect::new(0, 0, 4, 7);
        let rects = flow_layout(
            area,
            &[
                item(LayoutHints::fill(), 4, 1),
                item(LayoutHints::default(), 4, 2),
                item(LayoutHints::fill(), 4, 1),
            ],
        );
        assert_eq!(rects[0].height, 3);
        assert_eq!(rects[1], Rect::new(0, 3, 4, 2));
        assert_eq!(rects[2], Rect::new(0, 5, 4, 2));
    }

    #[test]
    fn margins_and_horizontal_alignment() {
        let area = Rect::new(0, 0, 10, 4);
        let hints = LayoutHints::default()
            .with_h_align(Align::Center)
            .with_margin(Margin {
                left: 2,
                top: 1,
                right: 0,
                bottom: 0,
            });
        let rects = flow_layout(area, &[item(hints, 4, 1)]);
        assert_eq!(rects[0], Rect::new(4, 1, 4, 1));

        let end = LayoutHints::default().with_h_align(Align::End);
        let rects = flow_layout(area, &[item(end, 3, 1)]);
        assert_eq!(rects[0], Rect::new(7, 0, 3, 1));
    }

    #[test]
    fn vertical_alignment_of_flow_group() {
        let area = Rect::new(0, 0, 4, 6);
        let hints = LayoutHints::default().with_v_align(Align::End);
        let rects = flow_layout(area, &[item(hints, 4, 2)]);
        assert_eq!(rects[0], Rect::new(0, 4, 4, 2));
    }

    #[test]
    fn absolute_is_clipped_to_parent() {
        let area = Rect::new(1, 1, 6, 4);
        let rects = flow_layout(area, &[item(LayoutHints::absolute(4, 2), 5, 5)]);
        assert_eq!(rects[0], Rect::new(5, 3, 2, 2));
    }

    #[test]
    fn invisible_items_get_no_space() {
        let area = Rect::new(0, 0, 4, 4);
        let mut hidden = item(LayoutHints::default(), 4, 2);
        hidden.visible = false;
        let rects = flow_layout(area, &[hidden, item(LayoutHints::default(), 4, 1)]);
        assert_eq!(rects[0], Rect::default());
        assert_eq!(rects[1], Rect::new(0, 0, 4, 1));
    }

    #[test]
    fn flow_overflow_is_clipped() {
        let area = Rect::new(0, 0, 4, 3);
        let rects = flow_layout(
            area,
            &[
                item(LayoutHints::default(), 4, 2),
                item(LayoutHints::default(), 4, 2),
            ],
        );
        assert_eq!(rects[1], Rect::new(0, 2, 4, 1));
    }

    #[test]
    fn paint_order_puts_flow_first() {
        let hints = [
            LayoutHints::absolute(0, 0),
            LayoutHints::sticky_top(),
            LayoutHints::default(),
            LayoutHints::sticky_bottom(),
        ];
        assert_eq!(paint_order(&hints), vec![2, 1, 3, 0]);
    }

    #[test]
    fn fit_within_moves_before_shrinking() {
        let desk = Rect::new(0, 0, 80, 24);
        assert_eq!(
            fit_within(Rect::new(90, 5, 20, 10), desk),
            Rect::new(60, 5, 20, 10)
        );
        assert_eq!(
            fit_within(Rect::new(10, 20, 100, 10), desk),
            Rect::new(0, 14, 80, 10)
        );
    }

    #[test]
    fn centered_in_bounds() {
        let desk = Rect::new(0, 0, 80, 24);
        assert_eq!(centered(Size::new(40, 10), desk), Rect::new(20, 7, 40, 10));
    }

    #[test]
    fn clamp_rect_inside_and_outside() {
        let bounds = Rect::new(0, 0, 5, 5);
        assert_eq!(clamp_rect(Rect::new(2, 2, 4, 4), bounds), Rect::new(2, 2, 3, 3));
        assert_eq!(clamp_rect(Rect::new(6, 6, 2, 2), bounds), Rect::default());
    }

    #[test]
    fn rect_contains_edge_cases() {
        assert!(!rect_contains(Rect::new(0, 0, 0, 5), 0, 0));
        let r = Rect::new(1, 1, 3, 3);
        assert!(rect_contains(r, 1, 1));
        assert!(!rect_contains(r, 4, 1));
    }

    #[test]
    fn rects_intersect_requires_overlap() {
        let a = Rect::new(0, 0, 4, 4);
        assert!(rects_intersect(a, Rect::new(3, 3, 2, 2)));
        assert!(!rects_intersect(a, Rect::new(4, 0, 2, 2)));
    }
}
