use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::Cursor;
use crate::error::Result;

/// The surface the menu is drawn on, and that is handed over to the
/// emulator while a session runs.
pub trait Display {
    /// Drawable area in cells.
    fn size(&self) -> (u16, u16);
    fn render(&mut self, items: &[String], cursor: Cursor, hovered: Option<usize>) -> Result<()>;
    /// Release the terminal to an external program.
    fn suspend(&mut self) -> Result<()>;
    /// Take the terminal back after [`Display::suspend`].
    fn resume(&mut self) -> Result<()>;
}

const BACKGROUND: Color = Color::Rgb(46, 52, 64);
const LIST_BG: Color = Color::Rgb(59, 66, 82);
const ELEMENT_BG: Color = Color::Rgb(76, 86, 106);
const ELEMENT_HOVER_BG: Color = Color::Rgb(94, 129, 172);
const TEXT: Color = Color::Rgb(236, 239, 244);
const INSTRUCTION: Color = Color::Rgb(136, 192, 208);

/// Row pitch of the item list: one row of item, one row of gap.
const ROW_STEP: u16 = 2;

/// Screen rectangles of the catalog items that fit in `area`, in order.
///
/// Items past the bottom of the panel are not laid out (and so cannot be
/// hovered).
pub fn item_rects(area: Rect, count: usize) -> Vec<Rect> {
    // margin + border + padding on each side
    let left = area.x.saturating_add(3);
    let width = area.width.saturating_sub(6);
    // margin, border, instruction line, blank line
    let top = area.y.saturating_add(4);
    let bottom = area.bottom().saturating_sub(2);

    let mut rects = Vec::new();
    let mut y = top;
    for _ in 0..count {
        if y >= bottom || width == 0 {
            break;
        }
        rects.push(Rect::new(left, y, width, 1));
        y = y.saturating_add(ROW_STEP);
    }
    rects
}

/// Index of the item under `cursor`, if any.
pub fn item_at(area: Rect, count: usize, cursor: Cursor) -> Option<usize> {
    item_rects(area, count).iter().position(|r| {
        cursor.x >= r.x && cursor.x < r.right() && cursor.y >= r.y && cursor.y < r.bottom()
    })
}

/// Render the full menu frame.
pub fn draw(frame: &mut Frame, items: &[String], cursor: Cursor, hovered: Option<usize>) {
    let area = frame.area();
    frame.render_widget(Block::default().style(Style::default().bg(BACKGROUND)), area);

    // ── Panel ───────────────────────────────────────────────────
    let panel = Rect::new(
        area.x.saturating_add(1),
        area.y.saturating_add(1),
        area.width.saturating_sub(2),
        area.height.saturating_sub(2),
    );
    frame.render_widget(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(ELEMENT_BG))
            .title(" Game List ")
            .style(Style::default().bg(LIST_BG)),
        panel,
    );

    let instruction = Rect::new(
        area.x.saturating_add(3),
        area.y.saturating_add(2),
        area.width.saturating_sub(6),
        1,
    );
    let text = if items.is_empty() {
        "No games yet. Insert a USB stick with ROMs."
    } else {
        "Please select a game:"
    };
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            text,
            Style::default().fg(INSTRUCTION).add_modifier(Modifier::BOLD),
        ))),
        clip(instruction, area),
    );

    // ── Items ───────────────────────────────────────────────────
    for (i, (rect, name)) in item_rects(area, items.len()).into_iter().zip(items).enumerate() {
        let bg = if hovered == Some(i) {
            ELEMENT_HOVER_BG
        } else {
            ELEMENT_BG
        };
        frame.render_widget(
            Paragraph::new(format!(" {name}")).style(Style::default().fg(TEXT).bg(bg)),
            rect,
        );
    }

    // ── Pointer ─────────────────────────────────────────────────
    if cursor.x < area.right() && cursor.y < area.bottom() {
        frame.render_widget(
            Paragraph::new("●").style(Style::default().fg(TEXT)),
            Rect::new(cursor.x, cursor.y, 1, 1),
        );
    }
}

/// Keep `rect` inside `area` so tiny terminals don't panic the renderer.
fn clip(rect: Rect, area: Rect) -> Rect {
    rect.intersection(area)
}

#[cfg(test)]
mod tests {
    use ratatui::{backend::TestBackend, buffer::Buffer, Terminal};

    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn row_text(buffer: &Buffer, y: u16) -> String {
        (0..buffer.area.width)
            .map(|x| buffer[(x, y)].symbol().to_string())
            .collect()
    }

    #[test]
    fn items_are_laid_out_every_other_row() {
        let rects = item_rects(Rect::new(0, 0, 40, 20), 3);
        assert_eq!(
            rects,
            vec![
                Rect::new(3, 4, 34, 1),
                Rect::new(3, 6, 34, 1),
                Rect::new(3, 8, 34, 1),
            ]
        );
    }

    #[test]
    fn items_past_the_panel_are_dropped() {
        // rows 4, 6 fit above bottom - 2 = 8
        assert_eq!(item_rects(Rect::new(0, 0, 40, 10), 5).len(), 2);
        assert!(item_rects(Rect::new(0, 0, 4, 10), 5).is_empty());
    }

    #[test]
    fn hit_test_finds_item_under_cursor() {
        let area = Rect::new(0, 0, 40, 20);
        assert_eq!(item_at(area, 3, Cursor { x: 10, y: 6 }), Some(1));
        assert_eq!(item_at(area, 3, Cursor { x: 10, y: 5 }), None);
        assert_eq!(item_at(area, 3, Cursor { x: 1, y: 4 }), None);
        assert_eq!(item_at(area, 0, Cursor { x: 10, y: 4 }), None);
    }

    #[test]
    fn draw_shows_items_and_pointer() {
        let mut terminal = Terminal::new(TestBackend::new(40, 12)).unwrap();
        let items = names(&["mario.sfc", "zelda.nes"]);
        terminal
            .draw(|frame| draw(frame, &items, Cursor { x: 20, y: 10 }, Some(1)))
            .unwrap();

        let buffer = terminal.backend().buffer();
        assert!(row_text(buffer, 2).contains("Please select a game:"));
        assert!(row_text(buffer, 4).contains("mario.sfc"));
        assert!(row_text(buffer, 6).contains("zelda.nes"));
        assert_eq!(buffer[(20, 10)].symbol(), "●");
        assert_eq!(buffer[(5, 6)].bg, ELEMENT_HOVER_BG);
        assert_eq!(buffer[(5, 4)].bg, ELEMENT_BG);
    }

    #[test]
    fn draw_empty_catalog_hints_at_usb() {
        let mut terminal = Terminal::new(TestBackend::new(60, 10)).unwrap();
        terminal
            .draw(|frame| draw(frame, &[], Cursor { x: 0, y: 0 }, None))
            .unwrap();
        assert!(row_text(terminal.backend().buffer(), 2).contains("Insert a USB stick"));
    }
}
