//! Viewer configuration.
//!
//! Loaded from `~/.config/threadview/threadview.toml` when present; every
//! field has a default so an absent or partial file is fine. A malformed
//! file is logged and ignored rather than aborting the viewer.

use serde::Deserialize;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub follow: FollowConfig,
    pub live: LiveConfig,
}

/// Render-window tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Timeline items shown before the viewer ever scrolls up.
    pub initial_count: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            initial_count: threadview_view::window::INITIAL_RENDER_COUNT,
        }
    }
}

/// Auto-follow tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FollowConfig {
    /// Bottom gap (layout units) beyond which auto-follow pauses.
    pub threshold: u32,
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            threshold: threadview_view::anchor::FOLLOW_THRESHOLD,
        }
    }
}

/// Live-tail tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Quiet period after the last observed write before reloading.
    pub debounce_ms: u64,
    /// How often the log file is polled for changes.
    pub poll_interval_ms: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 150,
            poll_interval_ms: 200,
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("THREADVIEW_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let home = std::env::var_os("HOME")?;
    Some(PathBuf::from(home).join(".config/threadview/threadview.toml"))
}

pub fn load() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };
    let Ok(raw) = std::fs::read_to_string(&path) else {
        return Config::default();
    };
    match toml::from_str(&raw) {
        Ok(config) => config,
        Err(err) => {
            warn!(path = %path.display(), %err, "ignoring malformed config");
            Config::default()
        }
    }
}
