//! Input settings
//!
//! Read from `<config dir>/padnav/settings.toml`. Every field has a default,
//! so a partial file is fine; a missing or broken file falls back to the
//! defaults with a warning instead of stopping startup.

use crate::consumers::ShortcutCombo;
use crate::controller::dispatcher::DispatcherSettings;
use crate::controller::edge_engine::EdgeSettings;
use crate::controller::normalizer::DEFAULT_DEADZONE;
use color_eyre::eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = "padnav";
const SETTINGS_FILE: &str = "settings.toml";

/// Input settings for the whole controller pipeline
///
/// Split into component settings with [`Settings::edge_settings`] and
/// [`Settings::dispatcher_settings`].
///
/// # Examples
///
/// ```toml
/// deadzone = 8000
/// repeat_delay_ms = 200
/// shortcut = "guide"
/// ```
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Stick deadzone in raw axis units (0..=32767)
    ///
    /// An axis counts as a direction only when strictly beyond this value.
    /// Worn sticks drifting near the center need higher values.
    pub deadzone: u16,

    /// Hold time before the first repeat and between repeats
    pub repeat_delay_ms: u64,

    /// Directional re-press debounce after a release
    pub debounce_ms: u64,

    /// Poll period while only background consumers listen
    pub poll_interval_ms: u64,

    /// Poll period while the overlay is being navigated
    pub visible_poll_interval_ms: u64,

    pub shortcut: ShortcutCombo,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            deadzone: DEFAULT_DEADZONE,
            repeat_delay_ms: 250,
            debounce_ms: 100,
            poll_interval_ms: 16,
            visible_poll_interval_ms: 8,
            shortcut: ShortcutCombo::default(),
        }
    }
}

impl Settings {
    /// Rejects values the pipeline cannot run with
    ///
    /// # Errors
    ///
    /// * deadzone beyond the i16 axis range
    /// * zero repeat delay
    /// * zero poll interval (either of them)
    pub fn validate(&self) -> Result<()> {
        if self.deadzone > i16::MAX as u16 {
            return Err(eyre!(
                "deadzone {} exceeds the axis range (max {})",
                self.deadzone,
                i16::MAX
            ));
        }
        if self.repeat_delay_ms == 0 {
            return Err(eyre!("repeat_delay_ms must be greater than zero"));
        }
        if self.poll_interval_ms == 0 || self.visible_poll_interval_ms == 0 {
            return Err(eyre!("poll intervals must be greater than zero"));
        }
        Ok(())
    }

    pub fn edge_settings(&self) -> EdgeSettings {
        EdgeSettings {
            repeat_delay: Duration::from_millis(self.repeat_delay_ms),
            debounce: Duration::from_millis(self.debounce_ms),
        }
    }

    pub fn dispatcher_settings(&self) -> DispatcherSettings {
        DispatcherSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            visible_poll_interval: Duration::from_millis(self.visible_poll_interval_ms),
        }
    }

    /// `<config dir>/padnav/settings.toml`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(SETTINGS_FILE))
    }

    pub async fn load_from(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;
        let settings: Settings = toml::from_str(&raw)
            .map_err(|e| eyre!("Failed to parse {}: {}", path.display(), e))?;
        settings.validate()?;
        debug!("Loaded settings from {}: {:?}", path.display(), settings);
        Ok(settings)
    }

    pub async fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create settings directory: {}", e))?;
        }
        let raw = toml::to_string_pretty(self)
            .map_err(|e| eyre!("Failed to serialize settings: {}", e))?;
        tokio::fs::write(path, raw)
            .await
            .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?;
        info!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Loads `path` or falls back to defaults
    pub async fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            warn!("No config directory available, using default input settings");
            return Self::default();
        };

        match tokio::fs::try_exists(path).await {
            Ok(true) => {}
            Ok(false) => {
                info!("No settings at {}, using defaults", path.display());
                return Self::default();
            }
            Err(e) => {
                warn!("Unable to check {}: {}", path.display(), e);
                return Self::default();
            }
        }

        match Self::load_from(path).await {
            Ok(settings) => {
                info!("Loaded input settings from {}", path.display());
                settings
            }
            Err(e) => {
                warn!("{}; using default input settings", e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.deadzone, 10_000);
        assert_eq!(settings.repeat_delay_ms, 250);
        assert_eq!(settings.debounce_ms, 100);
        assert_eq!(settings.poll_interval_ms, 16);
        assert_eq!(settings.visible_poll_interval_ms, 8);
        assert_eq!(settings.shortcut, ShortcutCombo::StartBack);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            deadzone = 8000
            shortcut = "guide"
            "#,
        )
        .expect("valid toml");
        assert_eq!(settings.deadzone, 8_000);
        assert_eq!(settings.shortcut, ShortcutCombo::Guide);
        assert_eq!(settings.repeat_delay_ms, 250);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let zero_repeat = Settings {
            repeat_delay_ms: 0,
            ..Settings::default()
        };
        assert!(zero_repeat.validate().is_err());

        let huge_deadzone = Settings {
            deadzone: 40_000,
            ..Settings::default()
        };
        assert!(huge_deadzone.validate().is_err());

        let zero_poll = Settings {
            visible_poll_interval_ms: 0,
            ..Settings::default()
        };
        assert!(zero_poll.validate().is_err());
    }

    #[test]
    fn derived_component_settings() {
        let settings = Settings::default();
        assert_eq!(settings.edge_settings().repeat_delay, Duration::from_millis(250));
        assert_eq!(settings.edge_settings().debounce, Duration::from_millis(100));
        assert_eq!(
            settings.dispatcher_settings().visible_poll_interval,
            Duration::from_millis(8)
        );
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(SETTINGS_FILE);
        let settings = Settings {
            deadzone: 12_000,
            shortcut: ShortcutCombo::Guide,
            ..Settings::default()
        };

        settings.save_to(&path).await.expect("save");
        let loaded = Settings::load_or_default(Some(&path)).await;
        assert_eq!(loaded, settings);
    }

    #[tokio::test]
    async fn missing_or_broken_file_falls_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("missing.toml");
        assert_eq!(Settings::load_or_default(Some(&missing)).await, Settings::default());

        let broken = dir.path().join("broken.toml");
        tokio::fs::write(&broken, "deadzone = \"loud\"").await.expect("write");
        assert!(Settings::load_from(&broken).await.is_err());
        assert_eq!(Settings::load_or_default(Some(&broken)).await, Settings::default());

        assert_eq!(Settings::load_or_default(None).await, Settings::default());
    }
}
