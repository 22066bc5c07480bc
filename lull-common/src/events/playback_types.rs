//! Playback-related type definitions
//!
//! Supporting types for mix playback state, sleep timer phase and fades.

use serde::{Deserialize, Serialize};

/// Playback state enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    #[default]
    Paused,
}

impl PlaybackState {
    /// Convenience for the UI-facing "is playing" flag
    pub fn is_playing(self) -> bool {
        self == PlaybackState::Playing
    }

    /// State for a boolean playing flag
    pub fn from_playing(playing: bool) -> Self {
        if playing {
            PlaybackState::Playing
        } else {
            PlaybackState::Paused
        }
    }

    /// The state a play/pause toggle moves to
    pub fn toggled(self) -> Self {
        match self {
            PlaybackState::Playing => PlaybackState::Paused,
            PlaybackState::Paused => PlaybackState::Playing,
        }
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
        }
    }
}

/// Sleep timer phase
///
/// `Off` → `Running` (start) → `Paused` (pause) → `Running` (resume) → `Off`
/// (stop or expiry).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    #[default]
    Off,
    Running,
    Paused,
}

impl std::fmt::Display for TimerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimerPhase::Off => write!(f, "off"),
            TimerPhase::Running => write!(f, "running"),
            TimerPhase::Paused => write!(f, "paused"),
        }
    }
}

/// Direction of a volume ramp
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum FadeDirection {
    /// Volume increases toward the channel level
    In,
    /// Volume decreases toward silence
    Out,
}

impl std::fmt::Display for FadeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FadeDirection::In => write!(f, "FadeIn"),
            FadeDirection::Out => write!(f, "FadeOut"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_state_toggle() {
        assert_eq!(PlaybackState::Playing.toggled(), PlaybackState::Paused);
        assert_eq!(PlaybackState::Paused.toggled(), PlaybackState::Playing);
        assert_eq!(PlaybackState::default(), PlaybackState::Paused);
        assert!(PlaybackState::from_playing(true).is_playing());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&PlaybackState::Playing).unwrap(),
            "\"playing\""
        );
        assert_eq!(serde_json::to_string(&TimerPhase::Paused).unwrap(), "\"paused\"");
        assert_eq!(serde_json::to_string(&FadeDirection::Out).unwrap(), "\"Out\"");
    }
}
