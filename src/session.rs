//! The gesture-handling service: one per page.
//!
//! `Session` turns host input into gesture actions and pointer behaviour and
//! spawns dispatcher work on the runtime. All state shared with running
//! actions lives in the [`Workspace`].

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::dispatcher::{ActionDispatcher, Document};
use crate::geometry::{Point, Rect};
use crate::gesture::{GestureAction, GestureMachine, KeyDown};
use crate::models::{ActionKind, PopupContent};
use crate::overlay::{Hit, Overlay, PopupId};
use crate::selection::SelectionTracker;

/// Document, overlay and selection memory, behind one lock.
pub struct Workspace<D, O> {
    pub document: D,
    pub overlay: O,
    pub selection: SelectionTracker,
    /// The primary result popup; opening another closes it.
    pub active_popup: Option<PopupId>,
}

impl<D: Document, O: Overlay> Workspace<D, O> {
    pub fn new(document: D, overlay: O) -> Self {
        Self {
            document,
            overlay,
            selection: SelectionTracker::default(),
            active_popup: None,
        }
    }

    /// Creates and positions a popup against the current viewport.
    pub fn open_popup(
        &mut self,
        content: PopupContent,
        anchor: Option<Rect>,
        draggable: bool,
    ) -> PopupId {
        let viewport = self.overlay.viewport();
        let id = self.overlay.create(content, anchor);
        self.overlay.position(id, anchor, viewport);
        if draggable {
            self.overlay.make_draggable(id);
        }
        id
    }

    pub fn close_popup(&mut self, id: PopupId) -> bool {
        if self.active_popup == Some(id) {
            self.active_popup = None;
        }
        self.overlay.remove(id)
    }

    pub fn close_active_popup(&mut self) -> bool {
        match self.active_popup.take() {
            Some(id) => self.overlay.remove(id),
            None => false,
        }
    }

    pub fn active_content(&self) -> Option<&PopupContent> {
        self.active_popup.and_then(|id| self.overlay.content(id))
    }
}

pub struct Session<D, O> {
    gestures: GestureMachine,
    dispatcher: Arc<ActionDispatcher<D, O>>,
    runtime: Handle,
    cancel: CancellationToken,
    /// The current press landed on the overlay, so its release is not a
    /// selection gesture.
    overlay_press: bool,
}

impl<D, O> Session<D, O>
where
    D: Document + 'static,
    O: Overlay + 'static,
{
    pub fn new(dispatcher: Arc<ActionDispatcher<D, O>>, chord_window: Duration, runtime: Handle) -> Self {
        Self {
            gestures: GestureMachine::new(chord_window),
            dispatcher,
            runtime,
            cancel: CancellationToken::new(),
            overlay_press: false,
        }
    }

    pub fn dispatcher(&self) -> &Arc<ActionDispatcher<D, O>> {
        &self.dispatcher
    }

    pub fn workspace(&self) -> MutexGuard<'_, Workspace<D, O>> {
        self.dispatcher
            .workspace()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.gestures.next_deadline()
    }

    /// Feeds a key-down into the chord counters and performs what fires.
    pub fn key_down(&mut self, event: KeyDown, now: Instant) -> Vec<GestureAction> {
        let actions = self.gestures.key_down(event, now);
        for action in &actions {
            self.perform(*action);
        }
        actions
    }

    /// Forgets pending chords, e.g. when a modifier was used for typing.
    pub fn interrupt_chords(&mut self) {
        self.gestures.cancel();
    }

    /// Fires due chord deadlines and expires overlay timers.
    pub fn tick(&mut self, now: Instant) -> Vec<GestureAction> {
        let actions = self.gestures.expire(now);
        for action in &actions {
            self.perform(*action);
        }
        self.workspace().overlay.tick(now);
        actions
    }

    pub fn perform(&self, action: GestureAction) {
        debug!(?action, "gesture");
        match action {
            GestureAction::DismissPopup => {
                self.dispatcher.dismiss_active_popup();
            }
            GestureAction::TranslateAtCursor => {
                let dispatcher = Arc::clone(&self.dispatcher);
                self.spawn(async move { dispatcher.translate_at_cursor().await });
            }
            GestureAction::TranslateSelection => self.run(ActionKind::TranslateSelection),
            GestureAction::AnalyzeGrammar => self.run(ActionKind::AnalyzeGrammar),
            GestureAction::CorrectGrammar => self.run(ActionKind::CorrectGrammar),
        }
    }

    pub fn run(&self, kind: ActionKind) {
        let dispatcher = Arc::clone(&self.dispatcher);
        self.spawn(async move { dispatcher.run(kind).await });
    }

    fn spawn<F>(&self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cancel = self.cancel.clone();
        self.runtime.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => debug!("action cancelled by shutdown"),
                _ = action => {}
            }
        });
    }

    /// Returns true when the overlay took the press; otherwise the host may
    /// start a text selection.
    pub fn pointer_down(&mut self, point: Point) -> bool {
        let hit = self.workspace().overlay.hit_test(point);
        self.overlay_press = hit != Hit::Nothing;
        match hit {
            Hit::QuickAction(kind) => {
                self.run(kind);
                true
            }
            Hit::QuickActionBar | Hit::PopupBody(_) => true,
            Hit::PopupClose(id) => {
                self.workspace().close_popup(id);
                true
            }
            Hit::PopupHandle(_) => {
                self.workspace().overlay.begin_drag(point);
                true
            }
            Hit::Nothing => {
                self.workspace().overlay.hide_quick_actions();
                false
            }
        }
    }

    /// Moves a popup being dragged. False when no drag is active.
    pub fn pointer_drag(&mut self, point: Point) -> bool {
        self.workspace().overlay.drag_to(point)
    }

    /// Ends a drag, or captures the selection and offers quick actions.
    pub fn pointer_up(&mut self, now: Instant) {
        let overlay_press = std::mem::take(&mut self.overlay_press);
        let mut ws = self.workspace();
        if ws.overlay.end_drag() || overlay_press {
            return;
        }
        let live = ws.document.live_selection();
        let anchor = match ws.selection.capture(live.as_ref(), now) {
            Some(snapshot) => snapshot.anchor,
            None => return,
        };
        ws.overlay.show_quick_actions(anchor, now);
    }

    pub fn pointer_move(&mut self, point: Point, now: Instant) {
        self.workspace().overlay.pointer_move(point, now);
    }

    /// Result text of the active popup, for copying.
    pub fn active_result(&self) -> Option<String> {
        self.workspace()
            .active_content()
            .and_then(PopupContent::result_text)
            .map(str::to_string)
    }

    /// Cancels in-flight actions.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl<D, O> Drop for Session<D, O> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
