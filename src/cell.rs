//! A single terminal cell.
//!
//! Cells are plain values; two cells that compare equal produce identical
//! terminal output, which is what the compositor's diff relies on.

use ratatui::style::{Color, Modifier, Style};
use unicode_width::UnicodeWidthStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cell {
    symbol: String,
    fg: Color,
    bg: Color,
    modifier: Modifier,
    skip: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self::blank()
    }
}

impl Cell {
    /// A space with default colors.
    pub fn blank() -> Self {
        Self::new(" ")
    }

    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            fg: Color::Reset,
            bg: Color::Reset,
            modifier: Modifier::empty(),
            skip: false,
        }
    }

    /// The trailing half of a double-width glyph. It carries no symbol of its
    /// own; the terminal paints it when the lead cell is printed.
    pub fn continuation() -> Self {
        Self::new("")
    }

    /// A transparent cell: compositing leaves whatever is below it untouched.
    pub fn transparent() -> Self {
        let mut cell = Self::blank();
        cell.skip = true;
        cell
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn fg(&self) -> Color {
        self.fg
    }

    pub fn bg(&self) -> Color {
        self.bg
    }

    pub fn modifier(&self) -> Modifier {
        self.modifier
    }

    pub fn is_skip(&self) -> bool {
        self.skip
    }

    pub fn is_continuation(&self) -> bool {
        self.symbol.is_empty()
    }

    /// Display width in columns: 0 for continuation cells, 2 for wide
    /// glyphs, 1 otherwise.
    pub fn width(&self) -> u16 {
        if self.symbol.is_empty() {
            return 0;
        }
        self.symbol.width().clamp(1, 2) as u16
    }

    pub fn is_wide(&self) -> bool {
        self.width() == 2
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    pub fn with_fg(mut self, fg: Color) -> Self {
        self.fg = fg;
        self
    }

    pub fn with_bg(mut self, bg: Color) -> Self {
        self.bg = bg;
        self
    }

    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.modifier = modifier;
        self
    }

    /// Patch colors and attributes from a ratatui `Style`. Unset colors keep
    /// their current value.
    pub fn with_style(mut self, style: Style) -> Self {
        self.apply_style(style);
        self
    }

    pub(crate) fn apply_style(&mut self, style: Style) {
        if let Some(fg) = style.fg {
            self.fg = fg;
        }
        if let Some(bg) = style.bg {
            self.bg = bg;
        }
        self.modifier.insert(style.add_modifier);
        self.modifier.remove(style.sub_modifier);
    }

    /// Attach a zero-width code point (combining mark, variation selector)
    /// to this cell's glyph.
    pub(crate) fn push_zero_width(&mut self, grapheme: &str) {
        if !self.symbol.is_empty() {
            self.symbol.push_str(grapheme);
        }
    }

    /// Same colors and attributes, different glyph.
    pub(crate) fn restyled_blank(&self) -> Self {
        Self {
            symbol: " ".to_string(),
            fg: self.fg,
            bg: self.bg,
            modifier: self.modifier,
            skip: false,
        }
    }

    pub fn style(&self) -> Style {
        Style::default()
            .fg(self.fg)
            .bg(self.bg)
            .add_modifier(self.modifier)
    }
}
