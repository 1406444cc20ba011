//! Runs user actions against the language API and routes the outcome to the
//! overlay.
//!
//! Translate-selection, grammar analysis and grammar correction share one
//! in-flight flag: while one of them runs, the others are silently dropped.
//! Cursor translation has its own path and ignores the flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::error::{ActionError, ApiError};
use crate::extractor::{EditableSurface, SurfaceId, extract_at_cursor};
use crate::language::{Direction, ScriptClassifier, ScriptKind};
use crate::models::{ActionKind, PopupContent, ToastKind};
use crate::network::LanguageApi;
use crate::overlay::{IndicatorId, Overlay, PopupId};
use crate::selection::LiveSelection;
use crate::session::Workspace;
use crate::store::{self, KeyValueStore, TranslationCache};
use crate::utils::char_slice;

pub const INDICATOR_LABEL: &str = "Translating...";

/// The page the actions read from and write into.
pub trait Document: Send {
    /// The current non-collapsed selection, if any.
    fn live_selection(&self) -> Option<LiveSelection>;

    /// The surface holding keyboard focus.
    fn focused_surface(&self) -> Option<(SurfaceId, &dyn EditableSurface)>;

    fn surface_mut(&mut self, id: SurfaceId) -> Option<&mut dyn EditableSurface>;
}

/// Holds the in-flight flag for as long as it lives.
struct ProcessingGuard<'a>(&'a AtomicBool);

impl<'a> ProcessingGuard<'a> {
    fn claim(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Loading popup or inline indicator shown while a request is out.
#[derive(Clone, Copy, Debug)]
enum Transient {
    Popup(PopupId),
    Indicator(IndicatorId),
}

/// Takes a transient item off the overlay when dropped, which also covers an
/// action future dropped mid-request by session shutdown.
struct TransientGuard<'a, D: Document, O: Overlay> {
    workspace: &'a Mutex<Workspace<D, O>>,
    item: Transient,
}

impl<D: Document, O: Overlay> Drop for TransientGuard<'_, D, O> {
    fn drop(&mut self) {
        let mut ws = self.workspace.lock().unwrap_or_else(PoisonError::into_inner);
        match self.item {
            Transient::Popup(id) => {
                ws.overlay.remove(id);
            }
            Transient::Indicator(id) => ws.overlay.remove_indicator(id),
        }
    }
}

pub struct ActionDispatcher<D, O> {
    api: Arc<dyn LanguageApi>,
    store: Arc<dyn KeyValueStore>,
    cache: TranslationCache,
    classifier: Arc<dyn ScriptClassifier>,
    workspace: Arc<Mutex<Workspace<D, O>>>,
    processing: AtomicBool,
}

impl<D: Document, O: Overlay> ActionDispatcher<D, O> {
    pub fn new(
        api: Arc<dyn LanguageApi>,
        store: Arc<dyn KeyValueStore>,
        classifier: Arc<dyn ScriptClassifier>,
        workspace: Arc<Mutex<Workspace<D, O>>>,
    ) -> Self {
        Self {
            api,
            cache: TranslationCache::new(Arc::clone(&store)),
            store,
            classifier,
            workspace,
            processing: AtomicBool::new(false),
        }
    }

    pub fn workspace(&self) -> &Arc<Mutex<Workspace<D, O>>> {
        &self.workspace
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    fn with_workspace<R>(&self, f: impl FnOnce(&mut Workspace<D, O>) -> R) -> R {
        let mut ws = self.workspace.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut ws)
    }

    fn transient(&self, item: Transient) -> TransientGuard<'_, D, O> {
        TransientGuard {
            workspace: &self.workspace,
            item,
        }
    }

    fn report(&self, action: &str, err: &ActionError) {
        error!(action, error = %err, "action failed");
        let message = err.to_string();
        self.with_workspace(|ws| {
            ws.overlay
                .show_toast(&message, ToastKind::Error, Instant::now())
        });
    }

    /// Closes the active result popup. Returns whether one was open.
    pub fn dismiss_active_popup(&self) -> bool {
        self.with_workspace(|ws| ws.close_active_popup())
    }

    /// Runs one of the exclusive actions. A call while another is in flight
    /// returns immediately without side effects.
    pub async fn run(&self, kind: ActionKind) {
        let Some(_guard) = ProcessingGuard::claim(&self.processing) else {
            debug!(%kind, "another action is in flight; ignoring");
            return;
        };
        info!(%kind, "action started");
        match self.run_exclusive(kind).await {
            Ok(()) => info!(%kind, "action finished"),
            Err(err) => self.report(kind.name(), &err),
        }
    }

    pub async fn translate_selection(&self) {
        self.run(ActionKind::TranslateSelection).await
    }

    pub async fn analyze_grammar(&self) {
        self.run(ActionKind::AnalyzeGrammar).await
    }

    pub async fn correct_grammar(&self) {
        self.run(ActionKind::CorrectGrammar).await
    }

    async fn run_exclusive(&self, kind: ActionKind) -> Result<(), ActionError> {
        self.with_workspace(|ws| ws.overlay.hide_quick_actions());

        if store::api_key(self.store.as_ref()).await?.is_none() {
            return Err(ActionError::MissingApiKey);
        }

        let resolved = self
            .with_workspace(|ws| {
                let live = ws.document.live_selection();
                ws.selection.resolve(live.as_ref())
            })
            .ok_or(ActionError::NoSelection)?;
        self.with_workspace(|ws| ws.close_active_popup());

        let script = self.classifier.classify(&resolved.text);
        if kind.requires_english() && Direction::from_script(script) != Direction::LatinToCjk {
            return Err(ActionError::WrongLanguage(kind.name()));
        }

        let loading =
            self.with_workspace(|ws| ws.open_popup(PopupContent::loading(), resolved.anchor, false));
        let outcome = {
            let _loading = self.transient(Transient::Popup(loading));
            self.request(kind, &resolved.text, script).await
        };
        let content = outcome?;

        self.with_workspace(|ws| {
            let id = ws.open_popup(content, resolved.anchor, true);
            ws.active_popup = Some(id);
        });
        Ok(())
    }

    async fn request(
        &self,
        kind: ActionKind,
        text: &str,
        script: ScriptKind,
    ) -> Result<PopupContent, ActionError> {
        let action = kind.name();
        match kind {
            ActionKind::TranslateSelection => {
                let direction = Direction::from_script(script);
                let translation = self
                    .translate_cached(text, "", direction)
                    .await
                    .map_err(|e| ActionError::api(action, e))?;
                if translation.is_empty() {
                    return Err(ActionError::EmptyResult(action));
                }
                Ok(PopupContent::Translation {
                    original: text.to_string(),
                    translation,
                    direction,
                })
            }
            ActionKind::AnalyzeGrammar => {
                let analysis = self
                    .api
                    .analyze_grammar(text)
                    .await
                    .map_err(|e| ActionError::api(action, e))?;
                if analysis.structure.trim().is_empty() {
                    return Err(ActionError::EmptyResult(action));
                }
                Ok(PopupContent::Analysis {
                    original: text.to_string(),
                    analysis,
                })
            }
            ActionKind::CorrectGrammar => {
                let correction = self
                    .api
                    .correct_grammar(text)
                    .await
                    .map_err(|e| ActionError::api(action, e))?;
                if correction.corrected.trim().is_empty() {
                    return Err(ActionError::EmptyResult(action));
                }
                Ok(PopupContent::Correction {
                    original: text.to_string(),
                    correction,
                })
            }
        }
    }

    /// Translation through the cache. Cache failures never fail the call.
    async fn translate_cached(
        &self,
        text: &str,
        context: &str,
        direction: Direction,
    ) -> Result<String, ApiError> {
        match self.cache.get(direction, text).await {
            Ok(Some(hit)) => {
                debug!(%direction, "translation cache hit");
                return Ok(hit);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "could not read translation cache"),
        }

        let translation = self.api.translate(text, context, direction).await?;
        if !translation.is_empty() {
            if let Err(e) = self.cache.put(direction, text, &translation).await {
                warn!(error = %e, "could not cache translation");
            }
        }
        Ok(translation)
    }

    /// Translates the same-script run just before the caret and writes the
    /// result over it. Not subject to the in-flight flag.
    pub async fn translate_at_cursor(&self) {
        if let Err(err) = self.cursor_translation().await {
            self.report("Cursor translation", &err);
        }
    }

    async fn cursor_translation(&self) -> Result<(), ActionError> {
        let found = self.with_workspace(|ws| {
            ws.close_active_popup();
            let (id, surface) = ws.document.focused_surface()?;
            let ctx = extract_at_cursor(surface, id, self.classifier.as_ref())?;
            Some((ctx, surface.bounds()))
        });
        let Some((ctx, bounds)) = found else {
            debug!("no text before the caret");
            self.with_workspace(|ws| {
                ws.overlay
                    .show_toast("No text found before the cursor", ToastKind::Info, Instant::now())
            });
            return Ok(());
        };
        info!(direction = %ctx.direction, chars = ctx.matched_text.chars().count(), "cursor translation");

        let indicator = self.with_workspace(|ws| ws.overlay.show_indicator(bounds, INDICATOR_LABEL));
        let outcome = {
            let _indicator = self.transient(Transient::Indicator(indicator));
            self.translate_cached(&ctx.matched_text, &ctx.context, ctx.direction)
                .await
        };
        let translation = outcome.map_err(|e| ActionError::api("Translation", e))?;
        if translation.is_empty() {
            return Err(ActionError::EmptyResult("Translation"));
        }

        self.with_workspace(|ws| {
            let range = ctx.absolute_range();
            let surface = ws
                .document
                .surface_mut(ctx.target)
                .ok_or(ActionError::TextChanged)?;
            if char_slice(surface.text(), range.start, range.end) != ctx.matched_text {
                return Err(ActionError::TextChanged);
            }
            surface.replace_range(range.start, range.end, &translation);
            ws.overlay.show_toast(
                &format!("Translated to {}", ctx.direction.target_language()),
                ToastKind::Success,
                Instant::now(),
            );
            Ok(())
        })
    }
}
