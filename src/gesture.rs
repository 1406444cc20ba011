//! Turns repeated Ctrl / Shift presses into discrete actions.
//!
//! Each chord key has a [`PressCounter`] with at most one pending deadline.
//! The machine never sleeps: the host asks for [`GestureMachine::next_deadline`],
//! waits at most that long for input, and calls [`GestureMachine::expire`].
//!
//! | key   | presses in window | fires                               |
//! |-------|-------------------|-------------------------------------|
//! | Ctrl  | 1, then silence   | `DismissPopup`                      |
//! | Ctrl  | 2                 | `TranslateAtCursor`, immediately    |
//! | Ctrl  | 3                 | `TranslateSelection`, then reset    |
//! | Shift | 1, then silence   | `AnalyzeGrammar`                    |
//! | Shift | 2, then silence   | `CorrectGrammar`                    |

use std::time::{Duration, Instant};

use tracing::debug;

pub const DEFAULT_CHORD_WINDOW: Duration = Duration::from_millis(500);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Control,
    Shift,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyDown {
    pub key: Key,
    pub ctrl: bool,
    pub shift: bool,
    /// Auto-repeat from a held key. Never counted.
    pub repeat: bool,
}

impl KeyDown {
    pub fn key(key: Key) -> Self {
        Self {
            key,
            ctrl: key == Key::Control,
            shift: key == Key::Shift,
            repeat: false,
        }
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn repeated(mut self) -> Self {
        self.repeat = true;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GestureAction {
    DismissPopup,
    TranslateAtCursor,
    TranslateSelection,
    AnalyzeGrammar,
    CorrectGrammar,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PressCounter {
    count: u32,
    deadline: Option<Instant>,
}

impl PressCounter {
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_live(&self) -> bool {
        self.deadline.is_some()
    }

    fn press(&mut self, now: Instant, window: Duration) -> u32 {
        self.count += 1;
        self.deadline = Some(now + window);
        self.count
    }

    fn reset(&mut self) {
        self.count = 0;
        self.deadline = None;
    }

    /// Final count if the deadline has passed; the counter is reset.
    fn take_expired(&mut self, now: Instant) -> Option<u32> {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                let count = self.count;
                self.reset();
                Some(count)
            }
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct GestureMachine {
    ctrl: PressCounter,
    shift: PressCounter,
    window: Duration,
}

impl Default for GestureMachine {
    fn default() -> Self {
        Self::new(DEFAULT_CHORD_WINDOW)
    }
}

impl GestureMachine {
    pub fn new(window: Duration) -> Self {
        Self {
            ctrl: PressCounter::default(),
            shift: PressCounter::default(),
            window,
        }
    }

    pub fn ctrl(&self) -> &PressCounter {
        &self.ctrl
    }

    pub fn shift(&self) -> &PressCounter {
        &self.shift
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.ctrl.deadline, self.shift.deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Drops both pending chords without firing anything. Hosts call this when
    /// a modifier turned out to be part of a shortcut or of typed text.
    pub fn cancel(&mut self) {
        self.ctrl.reset();
        self.shift.reset();
    }

    /// Feeds one key-down. Overdue deadlines are fired first so a late press
    /// always starts a fresh count.
    pub fn key_down(&mut self, event: KeyDown, now: Instant) -> Vec<GestureAction> {
        let mut actions = self.expire(now);
        if event.repeat {
            return actions;
        }

        if event.key == Key::Control || (event.ctrl && !self.ctrl.is_live()) {
            let count = self.ctrl.press(now, self.window);
            debug!(count, "ctrl press");
            match count {
                2 => actions.push(GestureAction::TranslateAtCursor),
                3 => {
                    actions.push(GestureAction::TranslateSelection);
                    self.ctrl.reset();
                }
                _ => {}
            }
        }

        if event.key == Key::Shift || (event.shift && !self.shift.is_live()) {
            let count = self.shift.press(now, self.window);
            debug!(count, "shift press");
        }

        actions
    }

    /// Fires every deadline that is due at `now`.
    pub fn expire(&mut self, now: Instant) -> Vec<GestureAction> {
        let mut actions = Vec::new();
        if let Some(count) = self.ctrl.take_expired(now) {
            debug!(count, "ctrl window closed");
            if count == 1 {
                actions.push(GestureAction::DismissPopup);
            }
        }
        if let Some(count) = self.shift.take_expired(now) {
            debug!(count, "shift window closed");
            match count {
                1 => actions.push(GestureAction::AnalyzeGrammar),
                2 => actions.push(GestureAction::CorrectGrammar),
                _ => {}
            }
        }
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn ctrl() -> KeyDown {
        KeyDown::key(Key::Control)
    }

    fn shift() -> KeyDown {
        KeyDown::key(Key::Shift)
    }

    #[test]
    fn double_ctrl_translates_at_cursor_once() {
        let t0 = Instant::now();
        let mut m = GestureMachine::default();
        assert!(m.key_down(ctrl(), t0).is_empty());
        assert_eq!(m.key_down(ctrl(), t0 + ms(120)), vec![GestureAction::TranslateAtCursor]);
        // Count stays at 2 until the window closes; expiry of 2 is silent.
        assert_eq!(m.ctrl().count(), 2);
        assert!(m.expire(t0 + ms(700)).is_empty());
        assert_eq!(m.ctrl().count(), 0);
        assert!(!m.ctrl().is_live());
    }

    #[test]
    fn triple_ctrl_translates_selection_and_resets() {
        let t0 = Instant::now();
        let mut m = GestureMachine::default();
        m.key_down(ctrl(), t0);
        m.key_down(ctrl(), t0 + ms(100));
        let fired = m.key_down(ctrl(), t0 + ms(200));
        assert_eq!(fired, vec![GestureAction::TranslateSelection]);
        assert_eq!(m.ctrl().count(), 0);
        assert!(m.ctrl().deadline().is_none());

        assert!(m.key_down(ctrl(), t0 + ms(250)).is_empty());
        assert_eq!(m.ctrl().count(), 1);
    }

    #[test]
    fn single_ctrl_dismisses_after_window() {
        let t0 = Instant::now();
        let mut m = GestureMachine::default();
        m.key_down(ctrl(), t0);
        assert!(m.expire(t0 + ms(499)).is_empty());
        assert_eq!(m.expire(t0 + ms(500)), vec![GestureAction::DismissPopup]);
        assert!(m.expire(t0 + ms(900)).is_empty());
    }

    #[test]
    fn each_press_restarts_the_window() {
        let t0 = Instant::now();
        let mut m = GestureMachine::default();
        m.key_down(ctrl(), t0);
        m.key_down(ctrl(), t0 + ms(400));
        assert_eq!(m.next_deadline(), Some(t0 + ms(900)));
        assert!(m.expire(t0 + ms(600)).is_empty());
        assert_eq!(m.ctrl().count(), 2);
    }

    #[test]
    fn late_press_starts_a_fresh_count() {
        let t0 = Instant::now();
        let mut m = GestureMachine::default();
        m.key_down(ctrl(), t0);
        let fired = m.key_down(ctrl(), t0 + ms(800));
        assert_eq!(fired, vec![GestureAction::DismissPopup]);
        assert_eq!(m.ctrl().count(), 1);
    }

    #[test]
    fn shift_counts_resolve_on_expiry() {
        let t0 = Instant::now();
        let mut m = GestureMachine::default();
        m.key_down(shift(), t0);
        assert_eq!(m.expire(t0 + ms(500)), vec![GestureAction::AnalyzeGrammar]);

        m.key_down(shift(), t0 + ms(1000));
        m.key_down(shift(), t0 + ms(1200));
        assert!(m.expire(t0 + ms(1500)).is_empty());
        assert_eq!(m.expire(t0 + ms(1700)), vec![GestureAction::CorrectGrammar]);

        for i in 0..3 {
            m.key_down(shift(), t0 + ms(2000 + i * 100));
        }
        assert!(m.expire(t0 + ms(3000)).is_empty());
    }

    #[test]
    fn no_presses_means_nothing_fires() {
        let mut m = GestureMachine::default();
        assert!(m.expire(Instant::now() + ms(10_000)).is_empty());
        assert!(m.next_deadline().is_none());
    }

    #[test]
    fn modifier_flag_counts_once_per_window() {
        let t0 = Instant::now();
        let mut m = GestureMachine::default();
        let ctrl_c = KeyDown::key(Key::Other).with_ctrl();
        m.key_down(ctrl_c, t0);
        m.key_down(ctrl_c, t0 + ms(50));
        assert_eq!(m.ctrl().count(), 1);
        // The bare key still counts while the window is open.
        assert_eq!(m.key_down(ctrl(), t0 + ms(100)), vec![GestureAction::TranslateAtCursor]);
    }

    #[test]
    fn auto_repeat_is_ignored() {
        let t0 = Instant::now();
        let mut m = GestureMachine::default();
        m.key_down(ctrl(), t0);
        assert!(m.key_down(ctrl().repeated(), t0 + ms(30)).is_empty());
        assert_eq!(m.ctrl().count(), 1);
    }

    #[test]
    fn chords_are_independent() {
        let t0 = Instant::now();
        let mut m = GestureMachine::default();
        m.key_down(shift(), t0);
        m.key_down(ctrl(), t0 + ms(100));
        let mut fired = m.expire(t0 + ms(700));
        fired.sort_by_key(|a| format!("{a:?}"));
        assert_eq!(fired, vec![GestureAction::AnalyzeGrammar, GestureAction::DismissPopup]);
    }

    #[test]
    fn cancel_drops_pending_chords_silently() {
        let t0 = Instant::now();
        let mut m = GestureMachine::default();
        m.key_down(shift(), t0);
        m.key_down(ctrl(), t0);
        m.cancel();
        assert_eq!(m.next_deadline(), None);
        assert!(m.expire(t0 + ms(600)).is_empty());
    }
}
