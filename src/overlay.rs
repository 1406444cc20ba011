//! Floating panels on top of the document: result popups, toasts, the
//! quick-action cluster and inline "working" indicators.
//!
//! A popup goes through `create` → `position` → (`make_draggable`, any number
//! of drags) → `remove`. Positioning is the only step that looks at the
//! viewport; dragging moves the popup wherever the pointer goes.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use tracing::debug;
use unicode_width::UnicodeWidthChar;

use crate::geometry::{Point, Rect, Size};
use crate::models::{ActionKind, PopupContent, ToastKind, Tone};
use crate::placement::{PlacementConfig, place_popup};
use crate::utils::display_width;

new_key_type! {
    pub struct PopupId;
    pub struct IndicatorId;
}

pub const CLOSE_LABEL: &str = " x ";
const CLOSE_WIDTH: i32 = 3;
/// Border plus one column of padding on each side.
const H_CHROME: i32 = 4;
/// Header and footer rows; both are drag handles.
const V_CHROME: i32 = 2;
const TOAST_HEIGHT: i32 = 3;
const BUTTON_SPACING: i32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub toast_ms: u64,
    pub quick_actions_idle_ms: u64,
    pub popup_max_width: i32,
    pub gap: i32,
    pub margin: i32,
    pub stack_offset_x: i32,
    pub stack_offset_y: i32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        let placement = PlacementConfig::default();
        Self {
            toast_ms: 3000,
            quick_actions_idle_ms: 5000,
            popup_max_width: 60,
            gap: placement.gap,
            margin: placement.margin,
            stack_offset_x: placement.stack_offset_x,
            stack_offset_y: placement.stack_offset_y,
        }
    }
}

impl OverlayConfig {
    pub fn placement(&self) -> PlacementConfig {
        PlacementConfig {
            gap: self.gap,
            margin: self.margin,
            stack_offset_x: self.stack_offset_x,
            stack_offset_y: self.stack_offset_y,
        }
    }

    fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.toast_ms)
    }

    fn quick_actions_idle(&self) -> Duration {
        Duration::from_millis(self.quick_actions_idle_ms)
    }
}

/// What lies under the pointer, topmost first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hit {
    QuickAction(ActionKind),
    /// Inside the cluster but between buttons.
    QuickActionBar,
    PopupClose(PopupId),
    PopupHandle(PopupId),
    PopupBody(PopupId),
    Nothing,
}

/// The host-facing surface the dispatcher and session draw through.
pub trait Overlay: Send {
    fn viewport(&self) -> Size;

    fn create(&mut self, content: PopupContent, anchor: Option<Rect>) -> PopupId;
    fn position(&mut self, id: PopupId, anchor: Option<Rect>, viewport: Size);
    fn make_draggable(&mut self, id: PopupId);
    /// False if the popup was already gone.
    fn remove(&mut self, id: PopupId) -> bool;
    fn content(&self, id: PopupId) -> Option<&PopupContent>;

    fn show_toast(&mut self, message: &str, kind: ToastKind, now: Instant);

    fn show_quick_actions(&mut self, anchor: Option<Rect>, now: Instant);
    fn hide_quick_actions(&mut self);

    fn show_indicator(&mut self, near: Rect, label: &str) -> IndicatorId;
    fn remove_indicator(&mut self, id: IndicatorId);

    fn hit_test(&self, point: Point) -> Hit;
    /// Starts a drag if `point` is on the handle of a draggable popup.
    fn begin_drag(&mut self, point: Point) -> bool;
    fn drag_to(&mut self, point: Point) -> bool;
    fn end_drag(&mut self) -> bool;

    fn pointer_move(&mut self, point: Point, now: Instant);
    /// Drops expired toasts and an idle quick-action cluster.
    fn tick(&mut self, now: Instant);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineKind {
    Heading,
    Body(Tone),
    Blank,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PopupLine {
    pub text: String,
    pub kind: LineKind,
}

#[derive(Debug)]
pub struct Popup {
    content: PopupContent,
    anchor: Option<Rect>,
    lines: Vec<PopupLine>,
    size: Size,
    origin: Option<Point>,
    draggable: bool,
}

impl Popup {
    pub fn content(&self) -> &PopupContent {
        &self.content
    }

    pub fn anchor(&self) -> Option<Rect> {
        self.anchor
    }

    pub fn lines(&self) -> &[PopupLine] {
        &self.lines
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// `None` until positioned.
    pub fn rect(&self) -> Option<Rect> {
        self.origin.map(|o| Rect::from_origin(o, self.size))
    }

    pub fn is_draggable(&self) -> bool {
        self.draggable
    }

    pub fn close_button(&self) -> Option<Rect> {
        if !self.draggable {
            return None;
        }
        let rect = self.rect()?;
        Some(Rect::new(rect.right() - 1 - CLOSE_WIDTH, rect.top(), CLOSE_WIDTH, 1))
    }

    fn on_handle(&self, p: Point) -> bool {
        self.rect()
            .is_some_and(|r| r.contains(p) && (p.y == r.top() || p.y == r.bottom() - 1))
    }
}

#[derive(Clone, Debug)]
pub struct Toast {
    pub message: String,
    pub kind: ToastKind,
    expires_at: Instant,
}

#[derive(Clone, Debug)]
pub struct QuickActions {
    buttons: Vec<(ActionKind, Rect)>,
    bounds: Rect,
    hovered: bool,
    hide_at: Instant,
}

impl QuickActions {
    pub fn buttons(&self) -> &[(ActionKind, Rect)] {
        &self.buttons
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn is_hovered(&self) -> bool {
        self.hovered
    }
}

#[derive(Clone, Debug)]
pub struct Indicator {
    pub rect: Rect,
    pub label: String,
}

#[derive(Clone, Copy, Debug)]
struct Drag {
    id: PopupId,
    /// Pointer position relative to the popup origin when the drag started.
    grab: Point,
}

/// In-memory scene that a renderer draws every frame.
#[derive(Debug)]
pub struct OverlayManager {
    config: OverlayConfig,
    viewport: Size,
    popups: SlotMap<PopupId, Popup>,
    /// Bottom to top.
    order: Vec<PopupId>,
    toasts: Vec<Toast>,
    quick_actions: Option<QuickActions>,
    indicators: SlotMap<IndicatorId, Indicator>,
    drag: Option<Drag>,
}

impl OverlayManager {
    pub fn new(config: OverlayConfig, viewport: Size) -> Self {
        Self {
            config,
            viewport,
            popups: SlotMap::with_key(),
            order: Vec::new(),
            toasts: Vec::new(),
            quick_actions: None,
            indicators: SlotMap::with_key(),
            drag: None,
        }
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
    }

    pub fn popup(&self, id: PopupId) -> Option<&Popup> {
        self.popups.get(id)
    }

    /// Popups in paint order, bottom first.
    pub fn popups(&self) -> impl Iterator<Item = (PopupId, &Popup)> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.popups.get(*id).map(|p| (*id, p)))
    }

    pub fn popup_count(&self) -> usize {
        self.popups.len()
    }

    /// Toasts with their screen rectangles: bottom-right corner, the oldest
    /// lowest, newer ones stacked above.
    pub fn toasts(&self) -> Vec<(Rect, &Toast)> {
        let max_width = (self.viewport.width - 2 * self.config.margin).max(1);
        self.toasts
            .iter()
            .zip(0..)
            .map(|(toast, i)| {
                let width = (display_width(&toast.message) + H_CHROME).min(max_width);
                let rect = Rect::new(
                    self.viewport.width - self.config.margin - width,
                    self.viewport.height - self.config.margin - TOAST_HEIGHT * (i + 1),
                    width,
                    TOAST_HEIGHT,
                );
                (rect, toast)
            })
            .collect()
    }

    pub fn quick_actions(&self) -> Option<&QuickActions> {
        self.quick_actions.as_ref()
    }

    pub fn indicators(&self) -> impl Iterator<Item = &Indicator> + '_ {
        self.indicators.values()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    fn raise(&mut self, id: PopupId) {
        self.order.retain(|other| *other != id);
        self.order.push(id);
    }
}

impl Overlay for OverlayManager {
    fn viewport(&self) -> Size {
        self.viewport
    }

    fn create(&mut self, content: PopupContent, anchor: Option<Rect>) -> PopupId {
        let (lines, size) = layout_content(&content, self.config.popup_max_width);
        let id = self.popups.insert(Popup {
            content,
            anchor,
            lines,
            size,
            origin: None,
            draggable: false,
        });
        self.order.push(id);
        id
    }

    fn position(&mut self, id: PopupId, anchor: Option<Rect>, viewport: Size) {
        let placement = self.config.placement();
        let stacked = self
            .popups
            .iter()
            .any(|(other, p)| other != id && p.origin.is_some());
        let Some(popup) = self.popups.get_mut(id) else {
            return;
        };
        popup.anchor = anchor;
        let origin = place_popup(anchor, popup.size, viewport, stacked, &placement);
        debug!(x = origin.x, y = origin.y, stacked, "popup positioned");
        popup.origin = Some(origin);
    }

    fn make_draggable(&mut self, id: PopupId) {
        if let Some(popup) = self.popups.get_mut(id) {
            popup.draggable = true;
        }
    }

    fn remove(&mut self, id: PopupId) -> bool {
        self.order.retain(|other| *other != id);
        if self.drag.is_some_and(|d| d.id == id) {
            self.drag = None;
        }
        self.popups.remove(id).is_some()
    }

    fn content(&self, id: PopupId) -> Option<&PopupContent> {
        self.popups.get(id).map(Popup::content)
    }

    fn show_toast(&mut self, message: &str, kind: ToastKind, now: Instant) {
        self.toasts.push(Toast {
            message: message.to_string(),
            kind,
            expires_at: now + self.config.toast_duration(),
        });
    }

    fn show_quick_actions(&mut self, anchor: Option<Rect>, now: Instant) {
        let widths: Vec<i32> = ActionKind::ALL
            .iter()
            .map(|kind| display_width(kind.button_label()) + 2)
            .collect();
        let total = widths.iter().sum::<i32>() + BUTTON_SPACING * (widths.len() as i32 - 1);
        let size = Size::new(total, 1);
        let origin = place_popup(anchor, size, self.viewport, false, &self.config.placement());

        let mut x = origin.x;
        let buttons = ActionKind::ALL
            .iter()
            .zip(widths)
            .map(|(kind, width)| {
                let rect = Rect::new(x, origin.y, width, 1);
                x += width + BUTTON_SPACING;
                (*kind, rect)
            })
            .collect();
        self.quick_actions = Some(QuickActions {
            buttons,
            bounds: Rect::from_origin(origin, size),
            hovered: false,
            hide_at: now + self.config.quick_actions_idle(),
        });
    }

    fn hide_quick_actions(&mut self) {
        self.quick_actions = None;
    }

    fn show_indicator(&mut self, near: Rect, label: &str) -> IndicatorId {
        let width = display_width(label) + 2;
        let x = (near.right() - width - 1).max(near.left());
        self.indicators.insert(Indicator {
            rect: Rect::new(x, near.top(), width, 1),
            label: label.to_string(),
        })
    }

    fn remove_indicator(&mut self, id: IndicatorId) {
        self.indicators.remove(id);
    }

    fn hit_test(&self, point: Point) -> Hit {
        if let Some(qa) = &self.quick_actions {
            if qa.bounds.contains(point) {
                return qa
                    .buttons
                    .iter()
                    .find(|(_, rect)| rect.contains(point))
                    .map_or(Hit::QuickActionBar, |(kind, _)| Hit::QuickAction(*kind));
            }
        }
        for id in self.order.iter().rev() {
            let Some(popup) = self.popups.get(*id) else {
                continue;
            };
            if !popup.rect().is_some_and(|r| r.contains(point)) {
                continue;
            }
            if popup.close_button().is_some_and(|r| r.contains(point)) {
                return Hit::PopupClose(*id);
            }
            if popup.draggable && popup.on_handle(point) {
                return Hit::PopupHandle(*id);
            }
            return Hit::PopupBody(*id);
        }
        Hit::Nothing
    }

    fn begin_drag(&mut self, point: Point) -> bool {
        let Hit::PopupHandle(id) = self.hit_test(point) else {
            return false;
        };
        let Some(origin) = self.popups.get(id).and_then(|p| p.origin) else {
            return false;
        };
        self.drag = Some(Drag {
            id,
            grab: Point::new(point.x - origin.x, point.y - origin.y),
        });
        self.raise(id);
        true
    }

    fn drag_to(&mut self, point: Point) -> bool {
        let Some(drag) = self.drag else {
            return false;
        };
        match self.popups.get_mut(drag.id) {
            Some(popup) => {
                popup.origin = Some(Point::new(point.x - drag.grab.x, point.y - drag.grab.y));
                true
            }
            None => {
                self.drag = None;
                false
            }
        }
    }

    fn end_drag(&mut self) -> bool {
        self.drag.take().is_some()
    }

    fn pointer_move(&mut self, point: Point, now: Instant) {
        let idle = self.config.quick_actions_idle();
        if let Some(qa) = self.quick_actions.as_mut() {
            let inside = qa.bounds.contains(point);
            if qa.hovered && !inside {
                qa.hide_at = now + idle;
            }
            qa.hovered = inside;
        }
    }

    fn tick(&mut self, now: Instant) {
        self.toasts.retain(|t| t.expires_at > now);
        if self
            .quick_actions
            .as_ref()
            .is_some_and(|qa| !qa.hovered && qa.hide_at <= now)
        {
            debug!("quick actions idle; hiding");
            self.quick_actions = None;
        }
    }
}

/// Wraps and measures a popup body. The size includes the chrome.
fn layout_content(content: &PopupContent, max_width: i32) -> (Vec<PopupLine>, Size) {
    let wrap_width = (max_width - H_CHROME).max(1);
    let mut lines = Vec::new();
    for (i, section) in content.sections().into_iter().enumerate() {
        if i > 0 {
            lines.push(PopupLine {
                text: String::new(),
                kind: LineKind::Blank,
            });
        }
        if !section.heading.is_empty() {
            lines.push(PopupLine {
                text: section.heading,
                kind: LineKind::Heading,
            });
        }
        lines.extend(wrap(&section.body, wrap_width).into_iter().map(|text| PopupLine {
            text,
            kind: LineKind::Body(section.tone),
        }));
    }

    let title_width = if content.is_loading() {
        0
    } else {
        display_width(content.title()) + CLOSE_WIDTH + 2
    };
    let inner = lines
        .iter()
        .map(|l| display_width(&l.text))
        .max()
        .unwrap_or(0)
        .max(title_width);
    let height = i32::try_from(lines.len()).unwrap_or(i32::MAX);
    (lines, Size::new(inner + H_CHROME, height + V_CHROME))
}

/// Greedy word wrap by display width. Words wider than a row (and runs of
/// CJK text, which has no spaces) are broken between characters.
pub fn wrap(text: &str, width: i32) -> Vec<String> {
    let mut rows = Vec::new();
    for para in text.lines() {
        let mut row = String::new();
        let mut row_width = 0;
        for word in para.split_inclusive(' ') {
            let fit = display_width(word.trim_end());
            if row_width + fit > width && !row.is_empty() {
                rows.push(row.trim_end().to_string());
                row.clear();
                row_width = 0;
            }
            if fit > width {
                for ch in word.chars() {
                    let cw = ch.width().map_or(0, |w| w as i32);
                    if row_width + cw > width && !row.is_empty() {
                        rows.push(row.trim_end().to_string());
                        row.clear();
                        row_width = 0;
                    }
                    row.push(ch);
                    row_width += cw;
                }
            } else {
                row.push_str(word);
                row_width += display_width(word);
            }
        }
        rows.push(row.trim_end().to_string());
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Direction;
    use crate::models::GrammarCorrection;

    fn cells() -> OverlayConfig {
        OverlayConfig {
            popup_max_width: 40,
            gap: 1,
            margin: 1,
            stack_offset_x: 3,
            stack_offset_y: 1,
            ..OverlayConfig::default()
        }
    }

    fn manager() -> OverlayManager {
        OverlayManager::new(cells(), Size::new(80, 24))
    }

    fn translation() -> PopupContent {
        PopupContent::Translation {
            original: "你好世界".into(),
            translation: "Hello world".into(),
            direction: Direction::CjkToLatin,
        }
    }

    const ANCHOR: Rect = Rect::new(10, 5, 8, 1);

    fn open(m: &mut OverlayManager, content: PopupContent) -> PopupId {
        let id = m.create(content, Some(ANCHOR));
        m.position(id, Some(ANCHOR), m.viewport());
        m.make_draggable(id);
        id
    }

    #[test]
    fn popup_is_measured_and_placed_below_anchor() {
        let mut m = manager();
        let id = open(&mut m, translation());
        let popup = m.popup(id).unwrap();
        // Chinese / 你好世界 / blank / English / Hello world
        assert_eq!(popup.lines().len(), 5);
        assert_eq!(popup.rect(), Some(Rect::new(10, 7, 20, 7)));
    }

    #[test]
    fn second_open_popup_is_offset_diagonally() {
        let mut m = manager();
        open(&mut m, translation());
        let second = open(&mut m, translation());
        assert_eq!(m.popup(second).unwrap().rect().unwrap().origin(), Point::new(13, 8));
    }

    #[test]
    fn drag_follows_pointer_without_clamping() {
        let mut m = manager();
        let id = open(&mut m, translation());
        assert!(m.begin_drag(Point::new(12, 7)));
        assert!(m.drag_to(Point::new(0, -3)));
        assert!(m.end_drag());
        assert_eq!(m.popup(id).unwrap().rect().unwrap().origin(), Point::new(-2, -3));

        // Footer row is a handle too; body rows are not.
        assert!(m.begin_drag(Point::new(0, 3)));
        m.end_drag();
        assert!(!m.begin_drag(Point::new(0, 0)));
    }

    #[test]
    fn loading_popup_has_no_handles() {
        let mut m = manager();
        let id = m.create(PopupContent::loading(), Some(ANCHOR));
        m.position(id, Some(ANCHOR), m.viewport());
        let rect = m.popup(id).unwrap().rect().unwrap();
        assert_eq!(m.hit_test(rect.origin()), Hit::PopupBody(id));
        assert!(!m.begin_drag(rect.origin()));
    }

    #[test]
    fn close_button_wins_over_handle() {
        let mut m = manager();
        let id = open(&mut m, translation());
        assert_eq!(m.hit_test(Point::new(27, 7)), Hit::PopupClose(id));
        assert_eq!(m.hit_test(Point::new(11, 7)), Hit::PopupHandle(id));
        assert_eq!(m.hit_test(Point::new(11, 9)), Hit::PopupBody(id));
        assert_eq!(m.hit_test(Point::new(70, 20)), Hit::Nothing);
    }

    #[test]
    fn removing_a_dragged_popup_ends_the_drag() {
        let mut m = manager();
        let id = open(&mut m, translation());
        m.begin_drag(Point::new(12, 7));
        assert!(m.remove(id));
        assert!(!m.is_dragging());
        assert!(!m.remove(id));
    }

    #[test]
    fn toasts_stack_upward_and_expire() {
        let t0 = Instant::now();
        let mut m = manager();
        m.show_toast("Saved", ToastKind::Success, t0);
        m.show_toast("Oops", ToastKind::Error, t0 + Duration::from_secs(1));
        let rects: Vec<Rect> = m.toasts().into_iter().map(|(r, _)| r).collect();
        assert_eq!(rects[0], Rect::new(70, 20, 9, 3));
        assert_eq!(rects[1].bottom(), rects[0].top());

        m.tick(t0 + Duration::from_secs(3));
        let left: Vec<_> = m.toasts().into_iter().map(|(_, t)| t.message.clone()).collect();
        assert_eq!(left, ["Oops"]);
    }

    #[test]
    fn quick_actions_layout_and_hits() {
        let mut m = manager();
        m.show_quick_actions(Some(ANCHOR), Instant::now());
        let qa = m.quick_actions().unwrap();
        assert_eq!(qa.buttons()[0], (ActionKind::TranslateSelection, Rect::new(10, 7, 11, 1)));
        assert_eq!(m.hit_test(Point::new(23, 7)), Hit::QuickAction(ActionKind::AnalyzeGrammar));
        assert_eq!(m.hit_test(Point::new(21, 7)), Hit::QuickActionBar);
    }

    #[test]
    fn quick_actions_hide_when_idle_but_not_while_hovered() {
        let t0 = Instant::now();
        let mut m = manager();
        m.show_quick_actions(Some(ANCHOR), t0);
        m.pointer_move(Point::new(12, 7), t0 + Duration::from_secs(1));
        m.tick(t0 + Duration::from_secs(10));
        assert!(m.quick_actions().is_some());

        // Leaving re-arms the timer from that moment.
        let left = t0 + Duration::from_secs(11);
        m.pointer_move(Point::new(0, 0), left);
        m.tick(left + Duration::from_millis(4999));
        assert!(m.quick_actions().is_some());
        m.tick(left + Duration::from_secs(5));
        assert!(m.quick_actions().is_none());
    }

    #[test]
    fn indicator_sits_on_the_top_edge_of_its_surface() {
        let mut m = manager();
        let id = m.show_indicator(Rect::new(0, 12, 40, 10), "Translating...");
        assert_eq!(m.indicators().next().unwrap().rect, Rect::new(23, 12, 16, 1));
        m.remove_indicator(id);
        assert_eq!(m.indicators().count(), 0);
    }

    #[test]
    fn wrap_breaks_words_and_cjk_runs() {
        assert_eq!(wrap("the quick brown fox", 10), ["the quick", "brown fox"]);
        assert_eq!(wrap("你好世界你好", 6), ["你好世", "界你好"]);
        assert_eq!(wrap("a\n\nb", 10), ["a", "", "b"]);
    }

    #[test]
    fn correction_popup_keeps_section_tones() {
        let content = PopupContent::Correction {
            original: "he go".into(),
            correction: GrammarCorrection {
                corrected: "He goes.".into(),
                explanation: "Third person singular.".into(),
            },
        };
        let (lines, _) = layout_content(&content, 40);
        let kinds: Vec<_> = lines.iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            [
                LineKind::Heading,
                LineKind::Body(Tone::Original),
                LineKind::Blank,
                LineKind::Heading,
                LineKind::Body(Tone::Corrected),
                LineKind::Blank,
                LineKind::Heading,
                LineKind::Body(Tone::Plain),
            ]
        );
    }
}
