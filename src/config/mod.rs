//! Configuration management for the Ember assistant
//!
//! Settings are loaded from `ember.toml` in the current directory or the
//! platform config directory. Every field has a default so the file is
//! optional.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Application settings loaded from `ember.toml`
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Seconds to wait for a follow-up response before ending the conversation
    pub listening_timeout_secs: f32,

    /// Directory containing sound files (ding, alarm)
    pub sounds_dir: PathBuf,

    /// Data directory override (database); defaults to the platform data dir
    pub data_dir: Option<PathBuf>,

    /// Wake phrase configuration
    pub wake_word: WakeWordSettings,

    /// Reminder configuration
    pub reminders: ReminderSettings,
}

/// Wake phrase configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WakeWordSettings {
    /// Label used for the model directory and file name under `models_dir`
    pub model_label: String,

    /// What is displayed to the user when talking about the wake phrase
    pub display_name: String,

    /// Detection threshold (0.0 to 1.0)
    pub threshold: f32,

    /// Directory holding wake phrase models
    pub models_dir: PathBuf,
}

/// Reminder configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReminderSettings {
    /// Minutes to wait before re-delivering an unacknowledged reminder
    pub retry_minutes: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listening_timeout_secs: 6.0,
            sounds_dir: PathBuf::from("sounds"),
            data_dir: None,
            wake_word: WakeWordSettings::default(),
            reminders: ReminderSettings::default(),
        }
    }
}

impl Default for WakeWordSettings {
    fn default() -> Self {
        Self {
            model_label: "hey_ember".to_string(),
            display_name: "Hey Ember".to_string(),
            threshold: 0.5,
            models_dir: PathBuf::from("models/wake_word"),
        }
    }
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self { retry_minutes: 10 }
    }
}

impl Settings {
    /// Load settings from the default locations
    ///
    /// Checks `./ember.toml` first, then the platform config directory.
    /// Missing files yield defaults; a malformed file is an error.
    pub fn load() -> Result<Self> {
        let local = Path::new("ember.toml");
        if local.exists() {
            return Self::load_from(local);
        }

        if let Some(dirs) = directories::ProjectDirs::from("", "", "ember") {
            let path = dirs.config_dir().join("ember.toml");
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load settings from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let settings: Self = toml::from_str(&text)?;
        settings.validate()?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.wake_word.threshold) {
            return Err(Error::Config(format!(
                "wake_word.threshold must be between 0.0 and 1.0, got {}",
                self.wake_word.threshold
            )));
        }
        if self.listening_timeout_secs <= 0.0 {
            return Err(Error::Config(
                "listening_timeout_secs must be positive".to_string(),
            ));
        }
        if self.reminders.retry_minutes <= 0 {
            return Err(Error::Config(
                "reminders.retry_minutes must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory for the database and other mutable state
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        directories::ProjectDirs::from("", "", "ember")
            .map_or_else(|| PathBuf::from("data"), |d| d.data_dir().to_path_buf())
    }

    /// Path to the wake phrase model asset
    #[must_use]
    pub fn wake_model_path(&self) -> PathBuf {
        let label = &self.wake_word.model_label;
        self.wake_word
            .models_dir
            .join(label)
            .join(format!("{label}.onnx"))
    }
}
