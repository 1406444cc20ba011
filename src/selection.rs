use std::time::Instant;

use crate::geometry::Rect;

/// Selections this short never become a snapshot.
pub const MIN_SNAPSHOT_CHARS: usize = 3;

/// What the host document reports as currently selected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveSelection {
    pub text: String,
    /// Bounding box of the selected range, if the host can compute one.
    pub anchor: Option<Rect>,
}

impl LiveSelection {
    pub fn new(text: impl Into<String>, anchor: Option<Rect>) -> Self {
        Self {
            text: text.into(),
            anchor,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionSnapshot {
    /// Trimmed, never empty.
    pub text: String,
    pub anchor: Option<Rect>,
    pub captured_at: Instant,
}

/// The text an action should operate on, and where to anchor its popup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedText {
    pub text: String,
    pub anchor: Option<Rect>,
    /// False when this came from a stale snapshot.
    pub live: bool,
}

/// Remembers the last non-trivial selection so actions still have something
/// to work on after focus moves away.
#[derive(Debug, Default)]
pub struct SelectionTracker {
    last: Option<SelectionSnapshot>,
}

impl SelectionTracker {
    pub fn last(&self) -> Option<&SelectionSnapshot> {
        self.last.as_ref()
    }

    /// Called on pointer release. Returns the new snapshot when the live
    /// selection qualifies; otherwise the previous snapshot is kept.
    pub fn capture(
        &mut self,
        live: Option<&LiveSelection>,
        now: Instant,
    ) -> Option<&SelectionSnapshot> {
        let live = live?;
        let text = live.text.trim();
        if text.chars().count() <= MIN_SNAPSHOT_CHARS {
            return None;
        }
        self.last = Some(SelectionSnapshot {
            text: text.to_string(),
            anchor: live.anchor,
            captured_at: now,
        });
        self.last.as_ref()
    }

    /// Live selection first, then the last snapshot however old.
    pub fn resolve(&self, live: Option<&LiveSelection>) -> Option<ResolvedText> {
        if let Some(live) = live {
            let text = live.text.trim();
            if !text.is_empty() {
                return Some(ResolvedText {
                    text: text.to_string(),
                    anchor: live.anchor,
                    live: true,
                });
            }
        }
        self.last.as_ref().map(|snap| ResolvedText {
            text: snap.text.clone(),
            anchor: snap.anchor,
            live: false,
        })
    }

    pub fn clear(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(text: &str) -> LiveSelection {
        LiveSelection::new(text, Some(Rect::new(1, 2, 3, 1)))
    }

    #[test]
    fn short_selections_are_not_captured() {
        let mut t = SelectionTracker::default();
        assert!(t.capture(Some(&live("  abc ")), Instant::now()).is_none());
        assert!(t.capture(None, Instant::now()).is_none());
        assert!(t.last().is_none());
    }

    #[test]
    fn capture_counts_chars_not_bytes() {
        let mut t = SelectionTracker::default();
        let snap = t.capture(Some(&live("你好世界")), Instant::now()).unwrap();
        assert_eq!(snap.text, "你好世界");
        assert!(t.capture(Some(&live("你好世")), Instant::now()).is_none());
        assert_eq!(t.last().unwrap().text, "你好世界");
    }

    #[test]
    fn most_recent_capture_wins() {
        let mut t = SelectionTracker::default();
        let now = Instant::now();
        t.capture(Some(&live("first pick")), now);
        t.capture(Some(&live(" second pick ")), now);
        assert_eq!(t.last().unwrap().text, "second pick");
    }

    #[test]
    fn resolve_prefers_live_then_falls_back() {
        let mut t = SelectionTracker::default();
        assert!(t.resolve(None).is_none());
        t.capture(Some(&live("remembered text")), Instant::now());

        let r = t.resolve(Some(&live(" now "))).unwrap();
        assert_eq!((r.text.as_str(), r.live), ("now", true));

        let r = t.resolve(Some(&LiveSelection::new("   ", None))).unwrap();
        assert_eq!((r.text.as_str(), r.live), ("remembered text", false));
        assert_eq!(r.anchor, Some(Rect::new(1, 2, 3, 1)));
    }
}
