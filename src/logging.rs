use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LogSettings;

/// `CHORDLATE_LOG` overrides the configured filter.
pub const FILTER_ENV: &str = "CHORDLATE_LOG";

/// Keeps the background writer alive; dropping it flushes the log.
pub struct LoggingGuard {
    _guard: WorkerGuard,
    log_dir: PathBuf,
}

impl LoggingGuard {
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

fn env_filter(settings: &LogSettings) -> EnvFilter {
    EnvFilter::try_from_env(FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(&settings.filter))
}

/// File logging for the interactive session, which owns the terminal.
/// Returns `None` if no log directory is usable or a subscriber is already set.
pub fn init(settings: &LogSettings) -> Option<LoggingGuard> {
    let log_dir = Some(settings.resolved_directory())
        .filter(|dir| std::fs::create_dir_all(dir).is_ok())
        .or_else(|| {
            let dir = std::env::temp_dir().join("chordlate").join("logs");
            std::fs::create_dir_all(&dir).ok().map(|_| dir)
        })?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "chordlate.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = tracing_subscriber::registry().with(env_filter(settings)).with(
        tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_file(true)
            .with_line_number(true),
    );

    if subscriber.try_init().is_err() {
        return None;
    }

    std::panic::set_hook(Box::new(|panic_info| {
        tracing::error!(panic = %panic_info, "panic");
    }));

    tracing::info!(log_dir = %log_dir.display(), "tracing initialized");

    Some(LoggingGuard {
        _guard: guard,
        log_dir,
    })
}

/// Stderr logging for one-shot commands.
pub fn init_stderr(settings: &LogSettings) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(settings))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
