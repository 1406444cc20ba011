use serde::Deserialize;

use crate::geometry::{Point, Rect, Size};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct PlacementConfig {
    /// Distance between the anchor and the popup.
    pub gap: i32,
    /// Minimum distance kept from a viewport edge when clamping.
    pub margin: i32,
    /// Diagonal shift applied when another popup is already open.
    pub stack_offset_x: i32,
    pub stack_offset_y: i32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            gap: 10,
            margin: 10,
            stack_offset_x: 15,
            stack_offset_y: 15,
        }
    }
}

/// Top-left corner for a popup of `popup` size.
///
/// Below the anchor when it fits, otherwise above it, otherwise pinned to the
/// top margin. Horizontally clamped into the viewport. Without an anchor the
/// popup is centered and `stacked` is ignored.
pub fn place_popup(
    anchor: Option<Rect>,
    popup: Size,
    viewport: Size,
    stacked: bool,
    cfg: &PlacementConfig,
) -> Point {
    let Some(anchor) = anchor else {
        return Point::new(
            (viewport.width - popup.width) / 2,
            (viewport.height - popup.height) / 2,
        );
    };

    let mut top = anchor.bottom() + cfg.gap;
    let mut left = anchor.left();

    if top + popup.height > viewport.height {
        top = anchor.top() - popup.height - cfg.gap;
        if top < 0 {
            top = cfg.margin;
        }
    }
    if left + popup.width > viewport.width {
        left = viewport.width - popup.width - cfg.margin;
    }
    if left < 0 {
        left = cfg.margin;
    }

    if stacked {
        top += cfg.stack_offset_y;
        left += cfg.stack_offset_x;
    }
    Point::new(left, top)
}
