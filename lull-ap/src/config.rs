//! Mix configuration for lull-ap
//!
//! The mix file is static, read-only input at startup:
//! - `[player]`: fade lengths, retry bounds and debounce windows
//! - `[[channel]]`: the channel catalog (id, name, icon, default volume, variants)
//!
//! Missing, unreadable or empty catalogs fall back to a built-in minimal set
//! so the mixer always starts.

use crate::error::{Error, Result};
use lull_common::time::millis_to_duration;
use lull_common::FadeCurve;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Player tunables
///
/// All values have built-in defaults; any subset may appear in the TOML file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PlayerSettings {
    /// Fade-in length for user-initiated play
    pub fade_in_ms: u64,
    /// Fade-out length for user-initiated pause
    pub fade_out_ms: u64,
    /// Fade-out length when the sleep timer expires (longer than `fade_out_ms`)
    pub timer_fade_out_ms: u64,
    /// Fade-in length when resuming after an interruption
    pub interruption_resume_fade_ms: u64,
    /// Volume steps per second during a fade
    pub fade_steps_per_second: u32,
    /// Curve used for every ramp
    pub fade_curve: FadeCurve,
    /// Route activation attempts before reporting failure
    pub route_activation_attempts: u32,
    /// Linear backoff between route activation attempts
    pub route_retry_backoff_ms: u64,
    /// Teardown-and-reload attempts after a transient load/start failure
    pub engine_reload_attempts: u32,
    /// Coalescing window for preference writes
    pub volume_persist_debounce_ms: u64,
    /// Mixer output sample rate; clips are resampled to it on load
    pub mixer_sample_rate: u32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            fade_in_ms: 1500,
            fade_out_ms: 1000,
            timer_fade_out_ms: 8000,
            interruption_resume_fade_ms: 1500,
            fade_steps_per_second: 20,
            fade_curve: FadeCurve::Linear,
            route_activation_attempts: 3,
            route_retry_backoff_ms: 150,
            engine_reload_attempts: 1,
            volume_persist_debounce_ms: 500,
            mixer_sample_rate: 44_100,
        }
    }
}

impl PlayerSettings {
    pub fn fade_in(&self) -> Duration {
        millis_to_duration(self.fade_in_ms)
    }

    pub fn fade_out(&self) -> Duration {
        millis_to_duration(self.fade_out_ms)
    }

    pub fn timer_fade_out(&self) -> Duration {
        millis_to_duration(self.timer_fade_out_ms)
    }

    pub fn interruption_resume_fade(&self) -> Duration {
        millis_to_duration(self.interruption_resume_fade_ms)
    }

    pub fn route_retry_backoff(&self) -> Duration {
        millis_to_duration(self.route_retry_backoff_ms)
    }

    pub fn volume_persist_debounce(&self) -> Duration {
        millis_to_duration(self.volume_persist_debounce_ms)
    }

    /// Clamp settings into workable ranges
    ///
    /// The timer fade-out must stay strictly longer than the user fade-out;
    /// a misconfigured value is raised to twice the user fade-out.
    pub fn validated(mut self) -> Self {
        if self.fade_steps_per_second == 0 {
            warn!("fade_steps_per_second = 0 is invalid, using 20");
            self.fade_steps_per_second = 20;
        }
        if self.route_activation_attempts == 0 {
            warn!("route_activation_attempts = 0 is invalid, using 1");
            self.route_activation_attempts = 1;
        }
        if self.timer_fade_out_ms <= self.fade_out_ms {
            let adjusted = self.fade_out_ms.max(1) * 2;
            warn!(
                "timer_fade_out_ms ({}) must exceed fade_out_ms ({}), using {}",
                self.timer_fade_out_ms, self.fade_out_ms, adjusted
            );
            self.timer_fade_out_ms = adjusted;
        }
        if self.mixer_sample_rate == 0 {
            self.mixer_sample_rate = 44_100;
        }
        self
    }
}

/// One channel in the catalog
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ChannelConfig {
    /// Stable identifier (persistence key, asset folder name)
    pub id: String,
    /// Display name; also used as the now-playing title
    pub name: String,
    /// Icon reference for the UI
    #[serde(default)]
    pub icon: String,
    /// Volume used when no preference is stored
    #[serde(default = "default_channel_volume")]
    pub default_volume: f32,
    /// Available variants; the first one is the default selection
    pub variants: Vec<String>,
}

fn default_channel_volume() -> f32 {
    0.5
}

impl ChannelConfig {
    pub fn new(id: &str, name: &str, icon: &str, default_volume: f32, variants: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            icon: icon.to_string(),
            default_volume,
            variants: variants.iter().map(|v| v.to_string()).collect(),
        }
    }
}

/// Complete mix configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct MixConfig {
    #[serde(default)]
    pub player: PlayerSettings,

    #[serde(default, rename = "channel")]
    pub channels: Vec<ChannelConfig>,
}

impl MixConfig {
    /// Parse mix configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: MixConfig =
            toml::from_str(content).map_err(|e| Error::Config(format!("Invalid mix TOML: {}", e)))?;
        config.player = config.player.validated();
        Ok(config)
    }

    /// Load mix configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load the mix file, falling back to the built-in channel set on failure
    ///
    /// Player settings from a readable file are kept even when its catalog is
    /// empty; only the channel list is replaced.
    pub fn load_or_fallback(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            info!("No mix file configured, using built-in channel set");
            return Self::fallback();
        };

        match Self::load(path) {
            Ok(mut config) => {
                if config.channels.is_empty() {
                    warn!(
                        "Mix file {} defines no channels, using built-in channel set",
                        path.display()
                    );
                    config.channels = fallback_channels();
                }
                info!(
                    "Loaded {} channel(s) from {}",
                    config.channels.len(),
                    path.display()
                );
                config
            }
            Err(e) => {
                warn!(
                    "Failed to load mix file {}: {}. Using built-in channel set.",
                    path.display(),
                    e
                );
                Self::fallback()
            }
        }
    }

    /// Built-in minimal configuration
    pub fn fallback() -> Self {
        Self {
            player: PlayerSettings::default(),
            channels: fallback_channels(),
        }
    }
}

/// Hard-coded minimal channel set used when the catalog cannot be loaded
pub fn fallback_channels() -> Vec<ChannelConfig> {
    vec![
        ChannelConfig::new("rain", "Rain", "cloud.rain", 0.6, &["light", "heavy"]),
        ChannelConfig::new("waves", "Waves", "water.waves", 0.0, &["shore"]),
        ChannelConfig::new("fire", "Fire", "flame", 0.0, &["crackle"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_catalog_and_settings() {
        let config = MixConfig::from_toml_str(
            r#"
            [player]
            fade_in_ms = 2000
            fade_curve = "s_curve"

            [[channel]]
            id = "rain"
            name = "Rain"
            icon = "cloud.rain"
            default_volume = 0.7
            variants = ["light", "heavy"]

            [[channel]]
            id = "birds"
            name = "Birds"
            variants = ["forest"]
            "#,
        )
        .unwrap();

        assert_eq!(config.player.fade_in_ms, 2000);
        assert_eq!(config.player.fade_curve, FadeCurve::SCurve);
        // Unspecified values keep defaults
        assert_eq!(config.player.route_activation_attempts, 3);
        assert_eq!(config.channels.len(), 2);
        assert_eq!(config.channels[1].default_volume, 0.5);
        assert!(config.channels[1].icon.is_empty());
    }

    #[test]
    fn test_timer_fade_forced_longer_than_user_fade() {
        let settings = PlayerSettings {
            fade_out_ms: 3000,
            timer_fade_out_ms: 1000,
            ..PlayerSettings::default()
        }
        .validated();
        assert!(settings.timer_fade_out() > settings.fade_out());
    }

    #[test]
    fn test_defaults_keep_timer_fade_longer() {
        let settings = PlayerSettings::default().validated();
        assert_eq!(settings, PlayerSettings::default());
        assert!(settings.timer_fade_out() > settings.fade_out());
    }

    #[test]
    fn test_missing_file_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let config = MixConfig::load_or_fallback(Some(&dir.path().join("missing.toml")));
        assert_eq!(config.channels, fallback_channels());
    }

    #[test]
    fn test_invalid_file_uses_fallback() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[[channel]]\nid = 3").unwrap();
        let config = MixConfig::load_or_fallback(Some(file.path()));
        assert_eq!(config.channels, fallback_channels());
    }

    #[test]
    fn test_empty_catalog_keeps_settings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[player]\nfade_out_ms = 400").unwrap();
        let config = MixConfig::load_or_fallback(Some(file.path()));
        assert_eq!(config.player.fade_out_ms, 400);
        assert_eq!(config.channels.len(), fallback_channels().len());
    }
}
