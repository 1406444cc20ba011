use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::overlay::OverlayConfig;

/// Shipped defaults; also the template for a new user config file.
pub const DEFAULTS: &str = include_str!("../chordlate.toml");

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiSettings {
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GestureSettings {
    pub chord_window_ms: u64,
}

impl GestureSettings {
    pub fn chord_window(&self) -> Duration {
        Duration::from_millis(self.chord_window_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StoreSettings {
    /// JSON file holding the API key and translation cache. `~` is expanded.
    pub path: Option<String>,
}

impl StoreSettings {
    pub fn resolved_path(&self) -> PathBuf {
        match &self.path {
            Some(path) => expand(path),
            None => data_dir().join("store.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogSettings {
    /// Used when `CHORDLATE_LOG` is unset.
    pub filter: String,
    pub directory: Option<String>,
}

impl LogSettings {
    pub fn resolved_directory(&self) -> PathBuf {
        match &self.directory {
            Some(dir) => expand(dir),
            None => data_dir().join("logs"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub api: ApiSettings,
    pub gestures: GestureSettings,
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub store: StoreSettings,
    pub log: LogSettings,
}

impl Settings {
    /// Layers, later wins: shipped defaults, then either `explicit` or the user
    /// config plus `./chordlate.toml`, then `CHORDLATE__SECTION__KEY` variables.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULTS, FileFormat::Toml));

        builder = match explicit {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => {
                if let Some(user_config_path) = get_user_config_path() {
                    // If the user config doesn't exist, create it from the defaults
                    ensure_user_config(&user_config_path)
                        .map_err(|e| ConfigError::Foreign(Box::new(e)))?;
                    builder = builder.add_source(File::from(user_config_path).required(false));
                }
                builder.add_source(File::with_name("chordlate.toml").required(false))
            }
        };

        builder
            .add_source(
                Environment::with_prefix("CHORDLATE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Effective settings as TOML, for `chordlate show-config`.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

pub fn get_user_config_path() -> Option<PathBuf> {
    let mut path = dirs::home_dir()?;
    path.push(".config");
    path.push("chordlate");
    path.push("chordlate.toml");
    Some(path)
}

fn ensure_user_config(path: &Path) -> std::io::Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, DEFAULTS)
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("chordlate")
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}
