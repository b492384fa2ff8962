//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::state::{ManagerOptions, DEFAULT_THRESHOLD};

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Hotkey settings file
    pub settings_path: PathBuf,

    /// Suppress all hotkey registration
    pub preview_mode: bool,

    /// Window for counting repeated chord taps
    pub multi_tap_threshold: Duration,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME").context("HOME is not set")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("modkey");

        let socket_path = data_dir.join("daemon.sock");
        let settings_path = data_dir.join("hotkeys.json");

        let preview_mode = std::env::var("MODKEY_PREVIEW")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let multi_tap_threshold = match std::env::var("MODKEY_MULTI_TAP_MS") {
            Ok(ms) => Duration::from_millis(
                ms.parse()
                    .with_context(|| format!("invalid MODKEY_MULTI_TAP_MS: {ms}"))?,
            ),
            Err(_) => DEFAULT_THRESHOLD,
        };

        Ok(Self {
            socket_path,
            data_dir,
            settings_path,
            preview_mode,
            multi_tap_threshold,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }

    pub fn manager_options(&self) -> ManagerOptions {
        ManagerOptions {
            preview_mode: self.preview_mode,
            multi_tap_threshold: self.multi_tap_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_load() {
        let config = Config::load().unwrap();
        assert!(config.socket_path.to_string_lossy().contains("modkey"));
        assert!(config.settings_path.ends_with("hotkeys.json"));
        assert_eq!(config.settings_path.parent(), Some(config.data_dir.as_path()));
    }

    #[test]
    fn test_manager_options() {
        let mut config = Config::load().unwrap();
        config.preview_mode = true;
        config.multi_tap_threshold = Duration::from_millis(250);
        let options = config.manager_options();
        assert!(options.preview_mode);
        assert_eq!(options.multi_tap_threshold, Duration::from_millis(250));
    }
}
