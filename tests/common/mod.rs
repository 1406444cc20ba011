#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::oneshot;
use serde_json::Value;

use chordlate::dispatcher::ActionDispatcher;
use chordlate::error::{ApiError, StoreError};
use chordlate::geometry::{Point, Rect, Size};
use chordlate::language::{Direction, RegexClassifier};
use chordlate::models::{GrammarAnalysis, GrammarCorrection};
use chordlate::network::LanguageApi;
use chordlate::overlay::{OverlayConfig, OverlayManager};
use chordlate::page::TerminalPage;
use chordlate::session::Workspace;
use chordlate::store::{KeyValueStore, MemoryStore};

pub type PageDispatcher = ActionDispatcher<TerminalPage, OverlayManager>;

/// Answers every call with `reply` (or fails with `failure`), optionally
/// holding the first call until [`FakeApi::release`].
pub struct FakeApi {
    reply: String,
    failure: Option<String>,
    calls: AtomicUsize,
    last_context: Mutex<Option<String>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    opener: Mutex<Option<oneshot::Sender<()>>>,
}

impl FakeApi {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self::plain(reply))
    }

    fn plain(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            failure: None,
            calls: AtomicUsize::new(0),
            last_context: Mutex::new(None),
            gate: Mutex::new(None),
            opener: Mutex::new(None),
        }
    }

    /// Every call fails the way a non-2xx answer does.
    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            failure: Some(message.to_string()),
            ..Self::plain("")
        })
    }

    pub fn gated(reply: &str) -> Arc<Self> {
        let api = Self::new(reply);
        let (tx, rx) = oneshot::channel();
        *api.gate.lock().unwrap() = Some(rx);
        *api.opener.lock().unwrap() = Some(tx);
        api
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_context(&self) -> Option<String> {
        self.last_context.lock().unwrap().clone()
    }

    pub fn release(&self) {
        if let Some(tx) = self.opener.lock().unwrap().take() {
            let _ = tx.send(());
        }
    }

    async fn answer(&self) -> Result<String, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self
            .gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(rx) = gate {
            let _ = rx.await;
        }
        match &self.failure {
            Some(message) => Err(ApiError::Status(message.clone())),
            None => Ok(self.reply.clone()),
        }
    }
}

#[async_trait]
impl LanguageApi for FakeApi {
    async fn translate(
        &self,
        _text: &str,
        context: &str,
        _direction: Direction,
    ) -> Result<String, ApiError> {
        *self.last_context.lock().unwrap() = Some(context.to_string());
        self.answer().await
    }

    async fn analyze_grammar(&self, _text: &str) -> Result<GrammarAnalysis, ApiError> {
        Ok(GrammarAnalysis {
            structure: self.answer().await?,
        })
    }

    async fn correct_grammar(&self, _text: &str) -> Result<GrammarCorrection, ApiError> {
        Ok(GrammarCorrection {
            corrected: self.answer().await?,
            explanation: "Subject and verb now agree.".to_string(),
        })
    }
}

/// Article on top, editor below; both 78 cells wide inside their borders.
pub fn page(article: &str, draft: &str) -> TerminalPage {
    let mut page = TerminalPage::new(article, draft);
    page.set_layout(Rect::new(0, 0, 80, 12), Rect::new(0, 12, 80, 10));
    page
}

pub fn overlay() -> OverlayManager {
    OverlayManager::new(OverlayConfig::default(), Size::new(80, 24))
}

pub fn dispatcher(api: Arc<FakeApi>, store: MemoryStore, page: TerminalPage) -> Arc<PageDispatcher> {
    dispatcher_with_store(api, Arc::new(store), page)
}

pub fn dispatcher_with_store(
    api: Arc<FakeApi>,
    store: Arc<dyn KeyValueStore>,
    page: TerminalPage,
) -> Arc<PageDispatcher> {
    let workspace = Arc::new(Mutex::new(Workspace::new(page, overlay())));
    Arc::new(ActionDispatcher::new(
        api,
        store,
        Arc::new(RegexClassifier),
        workspace,
    ))
}

pub fn with_key() -> MemoryStore {
    MemoryStore::with_api_key("sk-test")
}

/// Holds an API key but rejects every write.
pub struct ReadOnlyStore(MemoryStore);

impl ReadOnlyStore {
    pub fn with_key() -> Arc<Self> {
        Arc::new(Self(with_key()))
    }
}

#[async_trait]
impl KeyValueStore for ReadOnlyStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.0.get(key).await
    }

    async fn set(&self, _key: &str, _value: Value) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }
}

/// Drags across the first article row from column `from` to `to` (cells
/// inside the border).
pub fn select_in_article(page: &mut TerminalPage, from: i32, to: i32) {
    page.mouse_down(Point::new(1 + from, 1));
    page.mouse_drag(Point::new(1 + to, 1));
    page.mouse_up();
}

pub async fn wait_until(mut done: impl FnMut() -> bool) {
    for _ in 0..200 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
