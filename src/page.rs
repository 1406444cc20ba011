//! The terminal stand-in for a web page: a read-only article and an editable
//! text area, each wrapped to its pane width, with mouse selection and a caret.

use unicode_width::UnicodeWidthChar;

use crate::dispatcher::Document;
use crate::extractor::{EditableSurface, SurfaceId, SurfaceKind};
use crate::geometry::{Point, Rect};
use crate::selection::LiveSelection;
use crate::utils::{char_slice, replace_chars};

pub const ARTICLE: SurfaceId = SurfaceId(0);
pub const EDITOR: SurfaceId = SurfaceId(1);

/// One wrapped screen row: chars `start..end` of the pane text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VisualRow {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug)]
pub struct Pane {
    title: String,
    kind: SurfaceKind,
    text: String,
    caret: usize,
    /// Anchor and head of the selection, in chars. Equal means collapsed.
    selection: Option<(usize, usize)>,
    /// Outer rectangle including the border; set by the renderer.
    area: Rect,
}

impl Pane {
    pub fn new(title: impl Into<String>, kind: SurfaceKind, text: impl Into<String>) -> Self {
        let text = text.into();
        let caret = text.chars().count();
        Self {
            title: title.into(),
            kind,
            text,
            caret,
            selection: None,
            area: Rect::default(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn area(&self) -> Rect {
        self.area
    }

    pub fn set_area(&mut self, area: Rect) {
        self.area = area;
    }

    /// Text area inside the border.
    pub fn inner(&self) -> Rect {
        Rect::new(
            self.area.x + 1,
            self.area.y + 1,
            (self.area.width - 2).max(0),
            (self.area.height - 2).max(0),
        )
    }

    fn len(&self) -> usize {
        self.text.chars().count()
    }

    /// Selected char range, ordered, if not collapsed.
    pub fn selected_range(&self) -> Option<(usize, usize)> {
        let (a, b) = self.selection?;
        (a != b).then(|| (a.min(b), a.max(b)))
    }

    /// Wraps the text to the inner width. Newlines end a row and belong to it.
    pub fn rows(&self) -> Vec<VisualRow> {
        let width = self.inner().width.max(1);
        let mut rows = Vec::new();
        let mut start = 0;
        let mut col = 0;
        for (i, ch) in self.text.chars().enumerate() {
            if ch == '\n' {
                rows.push(VisualRow { start, end: i });
                start = i + 1;
                col = 0;
                continue;
            }
            let w = ch.width().map_or(0, |w| w as i32);
            if col + w > width && i > start {
                rows.push(VisualRow { start, end: i });
                start = i;
                col = 0;
            }
            col += w;
        }
        rows.push(VisualRow {
            start,
            end: self.len(),
        });
        rows
    }

    /// Row index and column of a char offset.
    fn locate(&self, rows: &[VisualRow], offset: usize) -> (usize, i32) {
        let row = rows
            .iter()
            .rposition(|r| r.start <= offset)
            .unwrap_or(0);
        let r = rows[row];
        let col = self
            .text
            .chars()
            .skip(r.start)
            .take(offset.min(r.end).saturating_sub(r.start))
            .map(|c| c.width().map_or(0, |w| w as i32))
            .sum();
        (row, col)
    }

    /// Screen position of a char offset.
    pub fn point_of(&self, offset: usize) -> Point {
        let rows = self.rows();
        let (row, col) = self.locate(&rows, offset);
        let inner = self.inner();
        Point::new(inner.x + col, inner.y + row as i32)
    }

    /// Char offset nearest to a screen position, clamped into the pane.
    pub fn offset_at(&self, p: Point) -> usize {
        let rows = self.rows();
        let inner = self.inner();
        let row = (p.y - inner.y).clamp(0, rows.len() as i32 - 1) as usize;
        let r = rows[row];
        let target = (p.x - inner.x).max(0);
        let mut col = 0;
        let mut offset = r.start;
        for ch in self.text.chars().skip(r.start).take(r.end - r.start) {
            let w = ch.width().map_or(0, |w| w as i32);
            if col + w > target {
                break;
            }
            col += w;
            offset += 1;
        }
        offset
    }

    /// Bounding box of the selected rows on screen.
    fn selection_rect(&self, start: usize, end: usize) -> Rect {
        let a = self.point_of(start);
        let b = self.point_of(end);
        if a.y == b.y {
            Rect::new(a.x, a.y, (b.x - a.x).max(1), 1)
        } else {
            let inner = self.inner();
            Rect::new(inner.x, a.y, inner.width, b.y - a.y + 1)
        }
    }

    pub fn select(&mut self, anchor: usize, head: usize) {
        let len = self.len();
        self.selection = Some((anchor.min(len), head.min(len)));
    }

    pub fn extend_selection(&mut self, head: usize) {
        if let Some((anchor, _)) = self.selection {
            self.select(anchor, head);
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn caret_point(&self) -> Point {
        self.point_of(self.caret)
    }

    pub fn set_caret(&mut self, offset: usize) {
        self.caret = offset.min(self.len());
    }

    pub fn insert(&mut self, s: &str) {
        if !self.kind.is_editable() {
            return;
        }
        let (start, end) = self.selected_range().unwrap_or((self.caret, self.caret));
        self.replace_range(start, end, s);
    }

    pub fn backspace(&mut self) {
        if !self.kind.is_editable() {
            return;
        }
        match self.selected_range() {
            Some((start, end)) => self.replace_range(start, end, ""),
            None if self.caret > 0 => self.replace_range(self.caret - 1, self.caret, ""),
            None => {}
        }
    }

    pub fn delete(&mut self) {
        if !self.kind.is_editable() {
            return;
        }
        match self.selected_range() {
            Some((start, end)) => self.replace_range(start, end, ""),
            None if self.caret < self.len() => self.replace_range(self.caret, self.caret + 1, ""),
            None => {}
        }
    }

    pub fn move_left(&mut self) {
        self.clear_selection();
        self.caret = self.caret.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.clear_selection();
        self.set_caret(self.caret + 1);
    }

    /// Moves the caret `delta` visual rows, keeping the column where possible.
    pub fn move_vertical(&mut self, delta: i32) {
        self.clear_selection();
        let p = self.caret_point();
        self.caret = self.offset_at(Point::new(p.x, p.y + delta));
    }

    pub fn move_home(&mut self) {
        self.clear_selection();
        let rows = self.rows();
        let (row, _) = self.locate(&rows, self.caret);
        self.caret = rows[row].start;
    }

    pub fn move_end(&mut self) {
        self.clear_selection();
        let rows = self.rows();
        let (row, _) = self.locate(&rows, self.caret);
        self.caret = rows[row].end;
    }
}

impl EditableSurface for Pane {
    fn kind(&self) -> SurfaceKind {
        self.kind
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn caret(&self) -> Option<usize> {
        self.kind.is_editable().then_some(self.caret)
    }

    fn bounds(&self) -> Rect {
        self.area
    }

    fn replace_range(&mut self, start: usize, end: usize, replacement: &str) {
        let len = self.len();
        let (start, end) = (start.min(len), end.min(len).max(start.min(len)));
        replace_chars(&mut self.text, start, end, replacement);
        let inserted = replacement.chars().count();
        if self.caret >= end {
            self.caret = self.caret - (end - start) + inserted;
        } else if self.caret > start {
            self.caret = start + inserted;
        }
        self.selection = None;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Focus {
    Article,
    Editor,
}

impl Focus {
    fn id(self) -> SurfaceId {
        match self {
            Focus::Article => ARTICLE,
            Focus::Editor => EDITOR,
        }
    }
}

#[derive(Debug)]
pub struct TerminalPage {
    article: Pane,
    editor: Pane,
    focus: Focus,
    /// Pane where the current mouse selection started.
    selecting: Option<Focus>,
}

impl TerminalPage {
    pub fn new(article: impl Into<String>, draft: impl Into<String>) -> Self {
        Self {
            article: Pane::new("Article", SurfaceKind::ReadOnly, article),
            editor: Pane::new("Editor", SurfaceKind::TextArea, draft),
            focus: Focus::Editor,
            selecting: None,
        }
    }

    pub fn article(&self) -> &Pane {
        &self.article
    }

    pub fn editor(&self) -> &Pane {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut Pane {
        &mut self.editor
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn set_layout(&mut self, article: Rect, editor: Rect) {
        self.article.set_area(article);
        self.editor.set_area(editor);
    }

    fn pane(&self, which: Focus) -> &Pane {
        match which {
            Focus::Article => &self.article,
            Focus::Editor => &self.editor,
        }
    }

    fn pane_mut(&mut self, which: Focus) -> &mut Pane {
        match which {
            Focus::Article => &mut self.article,
            Focus::Editor => &mut self.editor,
        }
    }

    fn pane_at(&self, p: Point) -> Option<Focus> {
        [Focus::Article, Focus::Editor]
            .into_iter()
            .find(|f| self.pane(*f).area().contains(p))
    }

    /// Focuses the pane under the pointer and starts a selection there.
    pub fn mouse_down(&mut self, p: Point) {
        self.article.clear_selection();
        self.editor.clear_selection();
        self.selecting = None;
        let Some(which) = self.pane_at(p) else {
            return;
        };
        self.focus = which;
        let pane = self.pane_mut(which);
        let offset = pane.offset_at(p);
        pane.set_caret(offset);
        pane.select(offset, offset);
        self.selecting = Some(which);
    }

    pub fn mouse_drag(&mut self, p: Point) {
        if let Some(which) = self.selecting {
            let pane = self.pane_mut(which);
            let offset = pane.offset_at(p);
            pane.extend_selection(offset);
            if pane.kind.is_editable() {
                pane.set_caret(offset);
            }
        }
    }

    pub fn mouse_up(&mut self) {
        self.selecting = None;
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Article => Focus::Editor,
            Focus::Editor => Focus::Article,
        };
    }

    /// Typing always goes to the editor.
    pub fn type_char(&mut self, ch: char) {
        self.focus = Focus::Editor;
        let mut buf = [0u8; 4];
        self.editor.insert(ch.encode_utf8(&mut buf));
    }
}

impl Document for TerminalPage {
    fn live_selection(&self) -> Option<LiveSelection> {
        [&self.article, &self.editor].into_iter().find_map(|pane| {
            let (start, end) = pane.selected_range()?;
            Some(LiveSelection::new(
                char_slice(pane.text(), start, end),
                Some(pane.selection_rect(start, end)),
            ))
        })
    }

    fn focused_surface(&self) -> Option<(SurfaceId, &dyn EditableSurface)> {
        Some((self.focus.id(), self.pane(self.focus) as &dyn EditableSurface))
    }

    fn surface_mut(&mut self, id: SurfaceId) -> Option<&mut dyn EditableSurface> {
        match id {
            ARTICLE => Some(&mut self.article),
            EDITOR => Some(&mut self.editor),
            _ => None,
        }
    }
}
