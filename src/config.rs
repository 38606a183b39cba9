/// User-tunable settings for the card deck
///
/// The configuration is stored as JSON in the user's config directory:
/// - Linux: ~/.config/concept-deck/config.json
/// - macOS: ~/Library/Application Support/concept-deck/config.json
/// - Windows: %APPDATA%\concept-deck\config.json
///
/// Every field has a default, so a partial file only overrides what it names.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::DeckError;

/// Top-level configuration
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DeckConfig {
    pub layout: LayoutConfig,
    pub gestures: GestureConfig,
    pub snap: SnapConfig,
    /// How long a finished disintegration may wait for the history to
    /// confirm the removal before the hidden card is forcibly restored
    pub removal_timeout_ms: u64,
    /// Log spec handed to the logger (overridden by RUST_LOG)
    pub log_level: String,
}

/// Card stack geometry
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    /// Viewport width below which the narrow metrics apply
    pub narrow_breakpoint: f32,
    /// Horizontal distance between neighbouring cards on wide viewports
    pub spacing_wide: f32,
    /// Horizontal distance between neighbouring cards on narrow viewports
    pub spacing_narrow: f32,
    pub card_width_wide: f32,
    pub card_width_narrow: f32,
    /// Card height divided by card width
    pub card_aspect: f32,
}

/// Thresholds that turn raw input into discrete navigation commands
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct GestureConfig {
    /// Drag distance (px) past which a release counts as a swipe
    pub swipe_distance: f32,
    /// Release velocity (px/s) past which a release counts as a swipe
    pub swipe_velocity: f32,
    /// Minimum horizontal wheel delta (px) for a step
    pub wheel_threshold: f32,
    /// Minimum time between two accepted wheel steps
    pub wheel_cooldown_ms: u64,
}

/// Disintegration effect parameters
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct SnapConfig {
    pub columns: u32,
    pub rows: u32,
    /// Extra room around the card so fragments can drift out of its bounds
    pub padding: f32,
    /// Cells whose sampled alpha is at or below this value are skipped
    pub alpha_threshold: u8,
    /// Upward acceleration applied to every fragment each step
    pub buoyancy: f32,
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            gestures: GestureConfig::default(),
            snap: SnapConfig::default(),
            removal_timeout_ms: 4_000,
            log_level: "info".to_string(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            narrow_breakpoint: 768.0,
            spacing_wide: 260.0,
            spacing_narrow: 220.0,
            card_width_wide: 340.0,
            card_width_narrow: 300.0,
            card_aspect: 14.0 / 9.0,
        }
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            swipe_distance: 50.0,
            swipe_velocity: 500.0,
            wheel_threshold: 20.0,
            wheel_cooldown_ms: 400,
        }
    }
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            columns: 30,
            rows: 20,
            padding: 100.0,
            alpha_threshold: 20,
            buoyancy: 0.05,
        }
    }
}

impl LayoutConfig {
    fn is_narrow(&self, viewport_width: f32) -> bool {
        viewport_width < self.narrow_breakpoint
    }

    /// Horizontal spacing between card slots for a viewport width
    pub fn spacing(&self, viewport_width: f32) -> f32 {
        if self.is_narrow(viewport_width) {
            self.spacing_narrow
        } else {
            self.spacing_wide
        }
    }

    /// Card size (width, height) for a viewport width
    pub fn card_size(&self, viewport_width: f32) -> (f32, f32) {
        let width = if self.is_narrow(viewport_width) {
            // Shrink further on very small windows so side cards stay visible
            self.card_width_narrow.min(viewport_width * 0.77).max(200.0)
        } else {
            self.card_width_wide
        };
        (width, width * self.card_aspect)
    }
}

impl DeckConfig {
    /// Parse from a JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn removal_timeout(&self) -> Duration {
        Duration::from_millis(self.removal_timeout_ms)
    }

    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir().or_else(dirs::home_dir)?;
        path.push("concept-deck");
        path.push("config.json");
        Some(path)
    }

    /// Load the configuration from a file.
    ///
    /// A missing file is not an error and yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, DeckError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&json)?)
    }

    /// Load from the default location, falling back to defaults on any error
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(err) => {
                // Logging is not up yet, so this goes straight to stderr
                eprintln!("⚠️  Ignoring config at {}: {}", path.display(), err);
                Self::default()
            }
        }
    }
}
