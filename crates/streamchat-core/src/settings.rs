//! User preferences, stored as one JSON blob.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::{Result, UnknownName};
use crate::storage::Storage;

pub const SETTINGS_KEY: &str = "chatbot-settings";
pub const THEME_KEY: &str = "theme";

pub const MIN_FONT_SIZE: u16 = 10;
pub const MAX_FONT_SIZE: u16 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Auto,
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Auto => "auto",
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    /// auto -> light -> dark -> auto
    pub fn next(&self) -> Self {
        match self {
            Theme::Auto => Theme::Light,
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Auto,
        }
    }

    pub fn all() -> Vec<Theme> {
        vec![Theme::Auto, Theme::Light, Theme::Dark]
    }
}

impl FromStr for Theme {
    type Err = UnknownName;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Theme::Auto),
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(UnknownName::new("theme", s, "auto, light, dark")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationSpeed {
    Slow,
    #[default]
    Normal,
    Fast,
    #[serde(rename = "none")]
    Off,
}

impl AnimationSpeed {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnimationSpeed::Slow => "slow",
            AnimationSpeed::Normal => "normal",
            AnimationSpeed::Fast => "fast",
            AnimationSpeed::Off => "none",
        }
    }

    /// Tick period for UI animations; `None` disables them.
    pub fn tick_millis(&self) -> Option<u64> {
        match self {
            AnimationSpeed::Slow => Some(500),
            AnimationSpeed::Normal => Some(300),
            AnimationSpeed::Fast => Some(150),
            AnimationSpeed::Off => None,
        }
    }

    pub fn all() -> Vec<AnimationSpeed> {
        vec![
            AnimationSpeed::Slow,
            AnimationSpeed::Normal,
            AnimationSpeed::Fast,
            AnimationSpeed::Off,
        ]
    }
}

impl FromStr for AnimationSpeed {
    type Err = UnknownName;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "slow" => Ok(AnimationSpeed::Slow),
            "normal" => Ok(AnimationSpeed::Normal),
            "fast" => Ok(AnimationSpeed::Fast),
            "none" | "off" => Ok(AnimationSpeed::Off),
            _ => Err(UnknownName::new("animation speed", s, "slow, normal, fast, none")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub theme: Theme,
    pub send_on_enter: bool,
    pub sound_effects: bool,
    pub message_timestamps: bool,
    pub auto_scroll: bool,
    pub font_size: u16,
    pub animation_speed: AnimationSpeed,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::Auto,
            send_on_enter: true,
            sound_effects: false,
            message_timestamps: false,
            auto_scroll: true,
            font_size: 14,
            animation_speed: AnimationSpeed::Normal,
        }
    }
}

impl Settings {
    /// Apply every recognized key of a stored blob; anything missing or of
    /// the wrong type keeps its current value.
    pub fn apply_json(&mut self, blob: &Map<String, Value>) {
        if let Some(theme) = blob.get("theme").and_then(Value::as_str).and_then(|s| s.parse::<Theme>().ok()) {
            self.theme = theme;
        }
        if let Some(v) = blob.get("sendOnEnter").and_then(Value::as_bool) {
            self.send_on_enter = v;
        }
        if let Some(v) = blob.get("soundEffects").and_then(Value::as_bool) {
            self.sound_effects = v;
        }
        if let Some(v) = blob.get("messageTimestamps").and_then(Value::as_bool) {
            self.message_timestamps = v;
        }
        if let Some(v) = blob.get("autoScroll").and_then(Value::as_bool) {
            self.auto_scroll = v;
        }
        // Older blobs stored the slider value as a string.
        let font_size = match blob.get("fontSize") {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };
        if let Some(size) = font_size {
            self.font_size = clamp_font_size(size);
        }
        if let Some(speed) = blob
            .get("animationSpeed")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<AnimationSpeed>().ok())
        {
            self.animation_speed = speed;
        }
    }

    pub fn with_font_size(mut self, size: u64) -> Self {
        self.font_size = clamp_font_size(size);
        self
    }
}

fn clamp_font_size(size: u64) -> u16 {
    size.clamp(MIN_FONT_SIZE as u64, MAX_FONT_SIZE as u64) as u16
}

/// Load/save/reset of [`Settings`] over any [`Storage`].
#[derive(Debug)]
pub struct SettingsStore<S> {
    storage: S,
}

impl<S: Storage> SettingsStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn load(&self) -> Result<Settings> {
        let mut settings = Settings::default();
        let mut has_theme = false;

        if let Some(raw) = self.storage.get(SETTINGS_KEY)? {
            match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(blob)) => {
                    has_theme = blob.get("theme").and_then(Value::as_str).and_then(|s| s.parse::<Theme>().ok()).is_some();
                    settings.apply_json(&blob);
                }
                Ok(_) => warn!("settings blob is not an object, using defaults"),
                Err(e) => warn!(error = %e, "settings blob unreadable, using defaults"),
            }
        }

        if !has_theme {
            if let Some(theme) = self.storage.get(THEME_KEY)?.as_deref().and_then(|s| s.parse::<Theme>().ok()) {
                settings.theme = theme;
            }
        }

        Ok(settings)
    }

    /// Overwrite the stored blob with `settings`.
    pub fn save(&self, settings: &Settings) -> Result<()> {
        self.storage.set(SETTINGS_KEY, &serde_json::to_string(settings)?)?;
        self.storage.set(THEME_KEY, settings.theme.as_str())?;
        info!("settings saved");
        Ok(())
    }

    /// Delete the stored blob and return the defaults.
    pub fn reset(&self) -> Result<Settings> {
        self.storage.remove(SETTINGS_KEY)?;
        self.storage.remove(THEME_KEY)?;
        info!("settings reset to defaults");
        Ok(Settings::default())
    }

    /// Change only the theme, leaving other stored keys untouched.
    pub fn set_theme(&self, theme: Theme) -> Result<()> {
        let mut blob = match self.storage.get(SETTINGS_KEY)? {
            Some(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(blob)) => blob,
                _ => Map::new(),
            },
            None => Map::new(),
        };
        blob.insert("theme".into(), Value::String(theme.as_str().into()));
        self.storage.set(SETTINGS_KEY, &Value::Object(blob).to_string())?;
        self.storage.set(THEME_KEY, theme.as_str())?;
        Ok(())
    }
}
