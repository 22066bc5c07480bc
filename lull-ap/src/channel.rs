//! Channel data model
//!
//! A channel is one independently volume-controlled looping source in the
//! mix. Its volume always stays in `[0, 1]` and its selected variant is
//! always one of its available variants.

use crate::config::ChannelConfig;
use crate::error::{Error, Result};
use crate::persistence::ChannelPreference;
use serde::Serialize;
use tracing::warn;

/// Mix channel definition plus the user's current settings
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    id: String,
    display_name: String,
    icon: String,
    volume: f32,
    selected_variant: String,
    variants: Vec<String>,
}

impl Channel {
    /// Create a channel
    ///
    /// Fails with `InvalidChannel` when `variants` is empty. The first variant
    /// is selected.
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        icon: impl Into<String>,
        volume: f32,
        variants: Vec<String>,
    ) -> Result<Self> {
        let id = id.into();
        let Some(first) = variants.first().cloned() else {
            return Err(Error::InvalidChannel(format!(
                "channel '{}' has no variants",
                id
            )));
        };

        Ok(Self {
            id,
            display_name: display_name.into(),
            icon: icon.into(),
            volume: clamp_volume(volume),
            selected_variant: first,
            variants,
        })
    }

    /// Build from catalog entry and an optional stored preference
    ///
    /// A stored variant that is no longer available falls back to the first
    /// variant with a warning.
    pub fn from_config(config: &ChannelConfig, preference: Option<&ChannelPreference>) -> Result<Self> {
        let mut channel = Self::new(
            config.id.clone(),
            config.name.clone(),
            config.icon.clone(),
            config.default_volume,
            config.variants.clone(),
        )?;

        if let Some(pref) = preference {
            channel.set_volume(pref.volume);
            if channel.select_variant(&pref.variant).is_err() {
                warn!(
                    channel_id = %channel.id,
                    variant = %pref.variant,
                    "Stored variant no longer available, using '{}'",
                    channel.selected_variant
                );
            }
        }

        Ok(channel)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn icon(&self) -> &str {
        &self.icon
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn selected_variant(&self) -> &str {
        &self.selected_variant
    }

    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    /// Set volume, clamped to `[0, 1]`; returns the stored value
    pub fn set_volume(&mut self, volume: f32) -> f32 {
        self.volume = clamp_volume(volume);
        self.volume
    }

    /// Select a variant; rejects names not in the available list
    pub fn select_variant(&mut self, variant: &str) -> Result<()> {
        if !self.variants.iter().any(|v| v == variant) {
            return Err(Error::UnknownVariant {
                channel_id: self.id.clone(),
                variant: variant.to_string(),
            });
        }
        self.selected_variant = variant.to_string();
        Ok(())
    }

    /// Settings persisted for this channel
    pub fn preference(&self) -> ChannelPreference {
        ChannelPreference {
            volume: self.volume,
            variant: self.selected_variant.clone(),
        }
    }
}

/// Clamp to `[0, 1]`; NaN becomes silence
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

/// Point-in-time view of one channel for the UI
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChannelSnapshot {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub volume: f32,
    pub variant: String,
    pub variants: Vec<String>,
    pub is_loaded: bool,
    pub is_playing: bool,
    /// Last load/start failure, shown as an inactive channel
    pub failure: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rain() -> Channel {
        Channel::new(
            "rain",
            "Rain",
            "cloud.rain",
            0.5,
            vec!["light".into(), "heavy".into()],
        )
        .unwrap()
    }

    #[test]
    fn test_empty_variants_rejected() {
        let err = Channel::new("x", "X", "", 0.5, vec![]).unwrap_err();
        assert!(matches!(err, Error::InvalidChannel(_)));
    }

    #[test]
    fn test_volume_clamped() {
        let mut channel = rain();
        assert_eq!(channel.set_volume(1.7), 1.0);
        assert_eq!(channel.set_volume(-0.2), 0.0);
        assert_eq!(channel.set_volume(f32::NAN), 0.0);
        assert_eq!(channel.set_volume(0.3), 0.3);

        let loud = Channel::new("a", "A", "", 4.0, vec!["v".into()]).unwrap();
        assert_eq!(loud.volume(), 1.0);
    }

    #[test]
    fn test_select_variant_validated() {
        let mut channel = rain();
        assert_eq!(channel.selected_variant(), "light");
        channel.select_variant("heavy").unwrap();
        assert_eq!(channel.selected_variant(), "heavy");
        assert!(matches!(
            channel.select_variant("drizzle"),
            Err(Error::UnknownVariant { .. })
        ));
        assert_eq!(channel.selected_variant(), "heavy");
    }

    #[test]
    fn test_restore_from_preference() {
        let config = ChannelConfig::new("rain", "Rain", "", 0.6, &["light", "heavy"]);

        let pref = ChannelPreference {
            volume: 1.4,
            variant: "heavy".into(),
        };
        let channel = Channel::from_config(&config, Some(&pref)).unwrap();
        assert_eq!(channel.volume(), 1.0);
        assert_eq!(channel.selected_variant(), "heavy");

        let stale = ChannelPreference {
            volume: 0.2,
            variant: "removed".into(),
        };
        let channel = Channel::from_config(&config, Some(&stale)).unwrap();
        assert_eq!(channel.volume(), 0.2);
        assert_eq!(channel.selected_variant(), "light");

        let channel = Channel::from_config(&config, None).unwrap();
        assert_eq!(channel.volume(), 0.6);
    }
}
