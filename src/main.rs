mod input;
mod theme;
mod ui;

use std::io::{self, Stdout};
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{
    self, EnterAlternateScreen, LeaveAlternateScreen, supports_keyboard_enhancement,
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::runtime::Runtime;
use tracing::{info, warn};

use chordlate::config::Settings;
use chordlate::dispatcher::ActionDispatcher;
use chordlate::language::{Direction, RegexClassifier, ScriptClassifier};
use chordlate::logging;
use chordlate::network::{DeepSeekClient, LanguageApi};
use chordlate::overlay::OverlayManager;
use chordlate::page::TerminalPage;
use chordlate::session::{Session, Workspace};
use chordlate::store::{self, JsonFileStore, KeyValueStore, MemoryStore, TranslationCache};
use chordlate::utils::viewport_size;

use crate::input::{Flow, handle_event};
use crate::theme::Theme;

const TICK: Duration = Duration::from_millis(100);

const KEY_HELP: &str = "Ctrl×2 cursor · Ctrl×3 translate · Shift×1 analyze · Shift×2 correct \
                        · F2-F5 · Tab focus · Ctrl+Y copy · Ctrl+Q quit";

const SAMPLE_ARTICLE: &str = "\
Select a sentence with the mouse, then press Ctrl three times to translate it, \
or pick an action from the buttons that appear under the selection.

The quick brown fox jump over the lazy dog. This sentence has a mistake; \
try Shift twice on it to get a correction, or Shift once for an analysis.

语言是人类最重要的交际工具。选中这句中文，连按三次 Ctrl 即可翻译成英文。

In the editor below, type a few words and press Ctrl twice: the text before \
the cursor is translated in place.";

#[derive(Parser)]
#[command(name = "chordlate", version, about)]
struct Cli {
    /// Use this config file instead of the user and local ones
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Open the interactive page (default)
    Run {
        /// Show this file in the article pane
        #[arg(long)]
        file: Option<PathBuf>,
        /// Keep the translation cache in memory only
        #[arg(long)]
        ephemeral: bool,
    },
    /// Save the DeepSeek API key
    SetKey {
        key: String,
        /// Send a test request before saving
        #[arg(long)]
        validate: bool,
    },
    /// Drop all cached translations
    ClearCache,
    /// Translate text between Chinese and English
    Translate { text: String },
    /// Explain the grammar of an English sentence
    Analyze { text: String },
    /// Correct the grammar of an English sentence
    Correct { text: String },
    /// Print the effective settings
    ShowConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;

    let command = cli.command.unwrap_or(Command::Run {
        file: None,
        ephemeral: false,
    });
    match command {
        Command::Run { file, ephemeral } => run_interactive(&settings, &runtime, file, ephemeral),
        other => {
            logging::init_stderr(&settings.log);
            runtime.block_on(run_command(&settings, other))
        }
    }
}

async fn run_command(settings: &Settings, command: Command) -> Result<()> {
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(settings.store.resolved_path()));
    let client = DeepSeekClient::new(&settings.api, Arc::clone(&store))?;
    let classifier = RegexClassifier;

    match command {
        Command::SetKey { key, validate } => {
            let key = key.trim();
            if key.is_empty() {
                bail!("the API key is empty");
            }
            if validate {
                client.validate_key(key).await.context("the API rejected the key")?;
            }
            store::set_api_key(store.as_ref(), key).await?;
            println!("API key saved to {}", settings.store.resolved_path().display());
        }
        Command::ClearCache => {
            let cache = TranslationCache::new(Arc::clone(&store));
            let dropped = cache.len().await?;
            cache.clear().await?;
            println!("Dropped {dropped} cached translations");
        }
        Command::Translate { text } => {
            let direction = Direction::from_script(classifier.classify(&text));
            let cache = TranslationCache::new(Arc::clone(&store));
            let translation = match cache.get(direction, &text).await {
                Ok(Some(hit)) => hit,
                _ => {
                    let fresh = client.translate(&text, "", direction).await?;
                    if let Err(e) = cache.put(direction, &text, &fresh).await {
                        warn!(error = %e, "could not cache translation");
                    }
                    fresh
                }
            };
            println!("{translation}");
        }
        Command::Analyze { text } => {
            let analysis = client.analyze_grammar(&text).await?;
            println!("{}", analysis.structure);
        }
        Command::Correct { text } => {
            let correction = client.correct_grammar(&text).await?;
            println!("{}\n\n{}", correction.corrected, correction.explanation);
        }
        Command::ShowConfig => print!("{}", settings.to_toml()?),
        Command::Run { .. } => bail!("`run` needs the interactive terminal"),
    }
    Ok(())
}

fn run_interactive(
    settings: &Settings,
    runtime: &Runtime,
    file: Option<PathBuf>,
    ephemeral: bool,
) -> Result<()> {
    let log_guard = logging::init(&settings.log);
    if let Some(guard) = &log_guard {
        info!(log_dir = %guard.log_dir().display(), "starting");
    }

    let article = match &file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => SAMPLE_ARTICLE.to_string(),
    };

    let file_store = JsonFileStore::new(settings.store.resolved_path());
    let store: Arc<dyn KeyValueStore> = if ephemeral {
        let saved = runtime.block_on(store::api_key(&file_store)).ok().flatten();
        Arc::new(saved.map_or_else(MemoryStore::new, |key| MemoryStore::with_api_key(&key)))
    } else {
        Arc::new(file_store)
    };
    let api: Arc<dyn LanguageApi> = Arc::new(DeepSeekClient::new(&settings.api, Arc::clone(&store))?);

    let overlay = OverlayManager::new(settings.overlay, viewport_size()?);
    let workspace = Arc::new(Mutex::new(Workspace::new(TerminalPage::new(article, ""), overlay)));
    let dispatcher = Arc::new(ActionDispatcher::new(
        api,
        store,
        Arc::new(RegexClassifier),
        workspace,
    ));
    let mut session = Session::new(
        dispatcher,
        settings.gestures.chord_window(),
        runtime.handle().clone(),
    );

    let theme = Theme::default();
    let mut terminal = TerminalGuard::new()?;
    let result = event_loop(&mut terminal, &mut session, &theme);
    drop(terminal);

    session.shutdown();
    info!("stopped");
    result
}

fn event_loop(
    terminal: &mut TerminalGuard,
    session: &mut input::PageSession,
    theme: &Theme,
) -> Result<()> {
    loop {
        session.tick(Instant::now());

        let status = if session.dispatcher().is_processing() {
            format!(" working… │ {KEY_HELP}")
        } else {
            format!(" ready │ {KEY_HELP}")
        };
        {
            let mut ws = session.workspace();
            terminal.draw(|f| ui::render(f, &mut ws, theme, &status))?;
        }

        let timeout = session
            .next_deadline()
            .map_or(TICK, |deadline| {
                deadline.saturating_duration_since(Instant::now()).min(TICK)
            });
        if event::poll(timeout)? {
            let ev = event::read()?;
            if handle_event(ev, session, Instant::now())? == Flow::Quit {
                return Ok(());
            }
        }
    }
}

/// Raw mode, alternate screen and mouse capture for as long as it lives.
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    enhanced_keys: bool,
}

impl TerminalGuard {
    fn new() -> Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

        // Bare Ctrl / Shift presses are only reported with the kitty protocol.
        let enhanced_keys = supports_keyboard_enhancement().unwrap_or(false);
        if enhanced_keys {
            execute!(
                stdout,
                PushKeyboardEnhancementFlags(
                    KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                        | KeyboardEnhancementFlags::REPORT_ALL_KEYS_AS_ESCAPE_CODES
                        | KeyboardEnhancementFlags::REPORT_ALTERNATE_KEYS
                        | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
                )
            )?;
        } else {
            warn!("keyboard enhancement unsupported; chords need F2-F5");
        }

        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self {
            terminal,
            enhanced_keys,
        })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let backend = self.terminal.backend_mut();
        if self.enhanced_keys {
            let _ = execute!(backend, PopKeyboardEnhancementFlags);
        }
        let _ = execute!(backend, DisableMouseCapture, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
        let _ = self.terminal.show_cursor();
    }
}

impl Deref for TerminalGuard {
    type Target = Terminal<CrosstermBackend<Stdout>>;

    fn deref(&self) -> &Self::Target {
        &self.terminal
    }
}

impl DerefMut for TerminalGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.terminal
    }
}
