//! Fixed-size grids of cells.
//!
//! A `CellBuffer` is the unit every stage renders into: controls produce
//! one for their bounds, windows compose one for their whole rectangle and
//! the compositor keeps desktop-sized ones for the scratch and previous
//! frames. Dimensions never change after creation and every write outside
//! them is clipped away.

use ratatui::layout::{Rect, Size};
use ratatui::style::Style;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::cell::Cell;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellBuffer {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl CellBuffer {
    pub fn new(width: u16, height: u16) -> Self {
        Self::filled(width, height, Cell::blank())
    }

    pub fn filled(width: u16, height: u16, cell: Cell) -> Self {
        let len = (width as usize).saturating_mul(height as usize);
        Self {
            width,
            height,
            cells: vec![cell; len],
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn area(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    fn index(&self, x: u16, y: u16) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        self.index(x, y).map(|idx| &self.cells[idx])
    }

    /// Write one cell, repairing any double-width glyph the write splits.
    /// Out-of-range writes are ignored.
    pub fn set(&mut self, x: u16, y: u16, cell: Cell) {
        let Some(idx) = self.index(x, y) else {
            return;
        };
        let old_is_continuation = self.cells[idx].is_continuation();
        let old_is_wide = self.cells[idx].is_wide();
        if old_is_continuation && x > 0 && !cell.is_continuation() {
            let lead = idx - 1;
            if self.cells[lead].is_wide() {
                self.cells[lead] = self.cells[lead].restyled_blank();
            }
        }
        if old_is_wide
            && let Some(next) = self.index(x.saturating_add(1), y)
            && self.cells[next].is_continuation()
        {
            self.cells[next] = self.cells[next].restyled_blank();
        }
        self.cells[idx] = cell;
    }

    /// Write one cell verbatim. Callers take responsibility for keeping wide
    /// glyph pairs intact.
    pub(crate) fn set_raw(&mut self, x: u16, y: u16, cell: Cell) {
        if let Some(idx) = self.index(x, y) {
            self.cells[idx] = cell;
        }
    }

    pub fn fill(&mut self, area: Rect, cell: &Cell) {
        let area = area.intersection(self.area());
        for y in area.top()..area.bottom() {
            for x in area.left()..area.right() {
                self.set_raw(x, y, cell.clone());
            }
        }
    }

    pub fn set_style(&mut self, area: Rect, style: Style) {
        let area = area.intersection(self.area());
        for y in area.top()..area.bottom() {
            for x in area.left()..area.right() {
                if let Some(idx) = self.index(x, y) {
                    self.cells[idx].apply_style(style);
                }
            }
        }
    }

    /// Print `text` starting at `(x, y)`, clipped at the right edge.
    ///
    /// Graphemes are laid out by display width: wide glyphs take a lead cell
    /// plus a continuation cell, and zero-width graphemes are folded into
    /// the preceding glyph. A wide glyph that would straddle the right edge
    /// is replaced by a space. Returns the column after the last one written.
    pub fn set_string(&mut self, x: u16, y: u16, text: &str, style: Style) -> u16 {
        self.set_string_bounded(x, y, text, style, self.width)
    }

    /// Like [`set_string`](Self::set_string) but stops before column `max_x`.
    pub fn set_string_bounded(
        &mut self,
        x: u16,
        y: u16,
        text: &str,
        style: Style,
        max_x: u16,
    ) -> u16 {
        let max_x = max_x.min(self.width);
        if y >= self.height {
            return x;
        }
        let mut col = x;
        let mut last: Option<u16> = None;
        for grapheme in text.graphemes(true) {
            let width = grapheme.width();
            if width == 0 {
                if let Some(prev) = last
                    && let Some(idx) = self.index(prev, y)
                {
                    self.cells[idx].push_zero_width(grapheme);
                }
                continue;
            }
            if col >= max_x {
                break;
            }
            let base = self.get(col, y).cloned().unwrap_or_default();
            if width >= 2 {
                if col.saturating_add(1) >= max_x {
                    self.set(col, y, base.with_symbol(" ").with_style(style));
                    col = col.saturating_add(1);
                    break;
                }
                let lead = base.with_symbol(grapheme).with_style(style);
                let tail = lead.clone().with_symbol("");
                self.set(col, y, lead);
                self.set(col + 1, y, tail);
                last = Some(col);
                col = col.saturating_add(2);
            } else {
                self.set(col, y, base.with_symbol(grapheme).with_style(style));
                last = Some(col);
                col = col.saturating_add(1);
            }
        }
        col
    }

    /// Copy `src` so that its origin lands at `(dest_x, dest_y)`, which may be
    /// negative. Only cells inside both this buffer and `clip` are written;
    /// transparent cells are skipped.
    pub fn blit(&mut self, src: &CellBuffer, dest_x: i32, dest_y: i32, clip: Rect) {
        let clip = clip.intersection(self.area());
        if clip.is_empty() {
            return;
        }
        let clip_x0 = clip.x as i32;
        let clip_y0 = clip.y as i32;
        let clip_x1 = clip_x0 + clip.width as i32;
        let clip_y1 = clip_y0 + clip.height as i32;
        for sy in 0..src.height as i32 {
            let dy = dest_y + sy;
            if dy < clip_y0 || dy >= clip_y1 {
                continue;
            }
            for sx in 0..src.width as i32 {
                let dx = dest_x + sx;
                if dx < clip_x0 || dx >= clip_x1 {
                    continue;
                }
                if let Some(cell) = src.get(sx as u16, sy as u16)
                    && !cell.is_skip()
                {
                    self.set(dx as u16, dy as u16, cell.clone());
                }
            }
        }
    }

    /// The symbols of one row concatenated; handy for assertions.
    pub fn row_text(&self, y: u16) -> String {
        let mut out = String::new();
        for x in 0..self.width {
            if let Some(cell) = self.get(x, y) {
                out.push_str(cell.symbol());
            }
        }
        out
    }

    /// All rows joined with newlines.
    pub fn to_text(&self) -> String {
        (0..self.height)
            .map(|y| self.row_text(y))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
