use ratatui::layout::{Rect, Size};
use ratatui::style::{Color, Modifier, Style};

use super::WindowCapabilities;
use crate::buffer::CellBuffer;
use crate::cell::Cell;

/// What a window-relative point lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromeHit {
    Close,
    Minimize,
    Maximize,
    /// Header row outside any button; drags the window.
    Title,
    ResizeCorner,
    Border,
    Client,
    Outside,
}

/// Draws window chrome and defines where the client area sits inside it.
pub trait WindowDecorator: std::fmt::Debug {
    fn client_area(&self, size: Size) -> Rect;

    fn render(&self, buffer: &mut CellBuffer, title: &str, focused: bool, caps: WindowCapabilities);

    fn hit_test(&self, size: Size, x: u16, y: u16, caps: WindowCapabilities) -> ChromeHit;
}

const CLOSE_GLYPH: &str = "×";
const MAXIMIZE_GLYPH: &str = "□";
const MINIMIZE_GLYPH: &str = "_";

/// OpenStep-flavoured chrome: a thin border, a one-row header with the
/// title centered and the window buttons at its right end.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultDecorator;

impl DefaultDecorator {
    const HEADER_ROW: u16 = 1;

    /// Buttons from the right edge inwards, with their columns.
    fn buttons(width: u16, caps: WindowCapabilities) -> Vec<(u16, ChromeHit, &'static str)> {
        let mut out = Vec::new();
        let mut col = width.saturating_sub(2);
        let wanted = [
            (caps.closable, ChromeHit::Close, CLOSE_GLYPH),
            (caps.maximizable, ChromeHit::Maximize, MAXIMIZE_GLYPH),
            (caps.minimizable, ChromeHit::Minimize, MINIMIZE_GLYPH),
        ];
        for (enabled, hit, glyph) in wanted {
            if !enabled {
                continue;
            }
            if col < 2 {
                break;
            }
            out.push((col, hit, glyph));
            col = col.saturating_sub(2);
        }
        out
    }
}

impl WindowDecorator for DefaultDecorator {
    fn client_area(&self, size: Size) -> Rect {
        Rect {
            x: 1,
            y: 2,
            width: size.width.saturating_sub(2),
            height: size.height.saturating_sub(3),
        }
    }

    fn render(&self, buffer: &mut CellBuffer, title: &str, focused: bool, caps: WindowCapabilities) {
        let width = buffer.width();
        let height = buffer.height();
        if width == 0 || height == 0 {
            return;
        }

        let focused_header_style = Style::default()
            .bg(Color::Blue)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD);
        let normal_header_style = Style::default().bg(Color::DarkGray).fg(Color::White);
        let border_style = Style::default().fg(Color::DarkGray).bg(Color::Reset);
        let header_style = if focused {
            focused_header_style
        } else {
            normal_header_style
        };

        let right = width - 1;
        let bottom = height - 1;
        let border = |symbol: &str| Cell::new(symbol).with_style(border_style);

        for x in 0..width {
            let top = match x {
                0 => "┌",
                x if x == right => "┐",
                _ => "─",
            };
            buffer.set(x, 0, border(top));
            if bottom > 0 {
                let low = match x {
                    0 => "└",
                    x if x == right => "┘",
                    _ => "─",
                };
                buffer.set(x, bottom, border(low));
            }
        }
        for y in 1..bottom {
            buffer.set(0, y, border("│"));
            buffer.set(right, y, border("│"));
        }

        let header_y = Self::HEADER_ROW;
        if header_y >= bottom || width < 3 {
            return;
        }
        buffer.fill(
            Rect::new(1, header_y, width - 2, 1),
            &Cell::blank().with_style(header_style),
        );
        let buttons = Self::buttons(width, caps);
        let title_end = buttons
            .last()
            .map(|(col, _, _)| col.saturating_sub(1))
            .unwrap_or(right);
        let available = title_end.saturating_sub(1);
        let title_width = unicode_width::UnicodeWidthStr::width(title) as u16;
        let start = 1 + available.saturating_sub(title_width) / 2;
        buffer.set_string_bounded(start, header_y, title, header_style, title_end);
        for (col, _, glyph) in buttons {
            buffer.set(col, header_y, Cell::new(glyph).with_style(header_style));
        }
    }

    fn hit_test(&self, size: Size, x: u16, y: u16, caps: WindowCapabilities) -> ChromeHit {
        if x >= size.width || y >= size.height {
            return ChromeHit::Outside;
        }
        let right = size.width - 1;
        let bottom = size.height - 1;
        if caps.resizable && x == right && y == bottom {
            return ChromeHit::ResizeCorner;
        }
        if y == Self::HEADER_ROW && x > 0 && x < right && y < bottom {
            return Self::buttons(size.width, caps)
                .into_iter()
                .find(|(col, _, _)| *col == x)
                .map(|(_, hit, _)| hit)
                .unwrap_or(ChromeHit::Title);
        }
        if x == 0 || x == right || y == 0 || y == bottom {
            return ChromeHit::Border;
        }
        ChromeHit::Client
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_area_sits_inside_border_and_header() {
        assert_eq!(
            DefaultDecorator.client_area(Size::new(20, 10)),
            Rect::new(1, 2, 18, 7)
        );
    }

    #[test]
    fn renders_border_title_and_buttons() {
        let mut buffer = CellBuffer::new(16, 4);
        DefaultDecorator.render(&mut buffer, "Edit", true, WindowCapabilities::default());
        assert_eq!(buffer.row_text(0), "┌──────────────┐");
        assert_eq!(buffer.row_text(3), "└──────────────┘");
        let header = buffer.row_text(1);
        assert!(header.starts_with('│'));
        assert!(header.contains("Edit"));
        assert!(header.ends_with("_ □ ×│"));
        let style = buffer.get(3, 1).unwrap();
        assert_eq!(style.bg(), Color::Blue);
    }

    #[test]
    fn unfocused_header_is_gray() {
        let mut buffer = CellBuffer::new(10, 4);
        DefaultDecorator.render(&mut buffer, "x", false, WindowCapabilities::default());
        assert_eq!(buffer.get(1, 1).unwrap().bg(), Color::DarkGray);
    }

    #[test]
    fn hit_test_finds_buttons_title_and_corner() {
        let size = Size::new(16, 6);
        let caps = WindowCapabilities::default();
        let d = DefaultDecorator;
        assert_eq!(d.hit_test(size, 14, 1, caps), ChromeHit::Close);
        assert_eq!(d.hit_test(size, 12, 1, caps), ChromeHit::Maximize);
        assert_eq!(d.hit_test(size, 10, 1, caps), ChromeHit::Minimize);
        assert_eq!(d.hit_test(size, 4, 1, caps), ChromeHit::Title);
        assert_eq!(d.hit_test(size, 15, 5, caps), ChromeHit::ResizeCorner);
        assert_eq!(d.hit_test(size, 0, 3, caps), ChromeHit::Border);
        assert_eq!(d.hit_test(size, 3, 3, caps), ChromeHit::Client);
        assert_eq!(d.hit_test(size, 16, 3, caps), ChromeHit::Outside);
    }

    #[test]
    fn missing_capabilities_hide_buttons() {
        let size = Size::new(16, 6);
        let caps = WindowCapabilities {
            closable: false,
            resizable: false,
            ..WindowCapabilities::default()
        };
        let d = DefaultDecorator;
        assert_eq!(d.hit_test(size, 14, 1, caps), ChromeHit::Maximize);
        assert_eq!(d.hit_test(size, 15, 5, caps), ChromeHit::Border);
    }
}
