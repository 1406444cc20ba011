use ratatui::{
    Frame,
    buffer::{Buffer, Cell},
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use unicode_width::UnicodeWidthChar;

use chordlate::extractor::EditableSurface;
use chordlate::geometry;
use chordlate::overlay::{CLOSE_LABEL, OverlayManager, Popup};
use chordlate::page::{Focus, Pane, TerminalPage, VisualRow};
use chordlate::session::Workspace;
use chordlate::utils::char_slice;

use crate::theme::Theme;

const POPUP_HINT: &str = " drag to move · Ctrl+Y copy · Esc close ";

fn to_geometry(r: Rect) -> geometry::Rect {
    geometry::Rect::new(
        i32::from(r.x),
        i32::from(r.y),
        i32::from(r.width),
        i32::from(r.height),
    )
}

pub fn render(
    f: &mut Frame,
    ws: &mut Workspace<TerminalPage, OverlayManager>,
    theme: &Theme,
    status: &str,
) {
    let area = f.area();
    ws.overlay.set_viewport(geometry::Size::new(
        i32::from(area.width),
        i32::from(area.height),
    ));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(55),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .split(area);
    ws.document
        .set_layout(to_geometry(chunks[0]), to_geometry(chunks[1]));

    let page = &ws.document;
    render_pane(f, chunks[0], page.article(), page.focus() == Focus::Article, theme);
    render_pane(f, chunks[1], page.editor(), page.focus() == Focus::Editor, theme);
    if page.focus() == Focus::Editor {
        let caret = page.editor().caret_point();
        if let (Ok(x), Ok(y)) = (u16::try_from(caret.x), u16::try_from(caret.y)) {
            f.set_cursor_position((x, y));
        }
    }

    let footer = Paragraph::new(status).style(theme.footer);
    f.render_widget(footer, chunks[2]);

    render_overlay(f.buffer_mut(), &ws.overlay, theme);
}

fn render_pane(f: &mut Frame, area: Rect, pane: &Pane, focused: bool, theme: &Theme) {
    let selected = pane.selected_range();
    let lines: Vec<Line> = pane
        .rows()
        .into_iter()
        .map(|row| row_line(pane, row, selected, theme))
        .collect();
    let border = if focused {
        theme.focus_border
    } else {
        theme.blurred_border
    };
    let block = Block::default()
        .title(pane.title().to_string())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border));
    let para = Paragraph::new(lines)
        .block(block)
        .style(Style::default().fg(theme.text));
    f.render_widget(para, area);
}

/// One wrapped row, with the selected part highlighted.
fn row_line(
    pane: &Pane,
    row: VisualRow,
    selected: Option<(usize, usize)>,
    theme: &Theme,
) -> Line<'static> {
    let text = pane.text();
    let (s, e) = selected.map_or((row.end, row.end), |(a, b)| {
        (a.clamp(row.start, row.end), b.clamp(row.start, row.end))
    });
    Line::from(vec![
        Span::raw(char_slice(text, row.start, s)),
        Span::styled(char_slice(text, s, e), theme.selection),
        Span::raw(char_slice(text, e, row.end)),
    ])
}

fn render_overlay(buf: &mut Buffer, overlay: &OverlayManager, theme: &Theme) {
    for (_, popup) in overlay.popups() {
        draw_popup(buf, popup, theme);
    }

    for indicator in overlay.indicators() {
        let label = format!(" {} ", indicator.label);
        draw_text(buf, indicator.rect.x, indicator.rect.y, &label, theme.indicator, indicator.rect.right());
    }

    if let Some(qa) = overlay.quick_actions() {
        let style = if qa.is_hovered() {
            theme.button_hover
        } else {
            theme.button
        };
        for (kind, rect) in qa.buttons() {
            let label = format!(" {} ", kind.button_label());
            draw_text(buf, rect.x, rect.y, &label, style, rect.right());
        }
    }

    for (rect, toast) in overlay.toasts() {
        let style = theme.toast(toast.kind);
        fill(buf, rect, style);
        draw_border(buf, rect, style);
        draw_text(buf, rect.x + 2, rect.y + 1, &toast.message, style, rect.right() - 2);
    }
}

fn draw_popup(buf: &mut Buffer, popup: &Popup, theme: &Theme) {
    let Some(rect) = popup.rect() else {
        return;
    };
    let border = theme.popup_border(popup.content());
    fill(buf, rect, Style::default().bg(theme.popup_bg));
    draw_border(buf, rect, border);

    if popup.is_draggable() {
        let title = format!(" {} ", popup.content().title());
        draw_text(buf, rect.x + 1, rect.y, &title, theme.popup_title.bg(theme.popup_bg), rect.right() - 1);
        if let Some(close) = popup.close_button() {
            draw_text(buf, close.x, close.y, CLOSE_LABEL, theme.close_button.bg(theme.popup_bg), close.right());
        }
        draw_text(buf, rect.x + 1, rect.bottom() - 1, POPUP_HINT, theme.hint.bg(theme.popup_bg), rect.right() - 1);
    }

    for (line, y) in popup.lines().iter().zip(rect.y + 1..) {
        draw_text(buf, rect.x + 2, y, &line.text, theme.line(line.kind), rect.right() - 2);
    }
}

/// The buffer cell at signed coordinates; `None` when off-screen.
fn cell(buf: &mut Buffer, x: i32, y: i32) -> Option<&mut Cell> {
    let x = u16::try_from(x).ok()?;
    let y = u16::try_from(y).ok()?;
    buf.cell_mut((x, y))
}

fn fill(buf: &mut Buffer, rect: geometry::Rect, style: Style) {
    for y in rect.top()..rect.bottom() {
        for x in rect.left()..rect.right() {
            if let Some(c) = cell(buf, x, y) {
                c.set_char(' ').set_style(style);
            }
        }
    }
}

fn draw_border(buf: &mut Buffer, rect: geometry::Rect, style: Style) {
    if rect.width < 2 || rect.height < 2 {
        return;
    }
    let right = rect.right() - 1;
    let bottom = rect.bottom() - 1;
    for x in rect.left() + 1..right {
        for y in [rect.top(), bottom] {
            if let Some(c) = cell(buf, x, y) {
                c.set_char('─').set_style(style);
            }
        }
    }
    for y in rect.top() + 1..bottom {
        for x in [rect.left(), right] {
            if let Some(c) = cell(buf, x, y) {
                c.set_char('│').set_style(style);
            }
        }
    }
    for (x, y, ch) in [
        (rect.left(), rect.top(), '┌'),
        (right, rect.top(), '┐'),
        (rect.left(), bottom, '└'),
        (right, bottom, '┘'),
    ] {
        if let Some(c) = cell(buf, x, y) {
            c.set_char(ch).set_style(style);
        }
    }
}

/// Writes `text` from (x, y), stopping before column `limit`. Cells outside
/// the buffer are skipped, so popups dragged off-screen are clipped.
fn draw_text(buf: &mut Buffer, x: i32, y: i32, text: &str, style: Style, limit: i32) {
    let mut col = x;
    for ch in text.chars() {
        let w = ch.width().map_or(0, |w| w as i32);
        if w == 0 {
            continue;
        }
        if col + w > limit {
            break;
        }
        if let Some(c) = cell(buf, col, y) {
            c.set_char(ch).set_style(style);
        }
        for dx in 1..w {
            if let Some(c) = cell(buf, col + dx, y) {
                c.set_char(' ').set_style(style);
            }
        }
        col += w;
    }
}
