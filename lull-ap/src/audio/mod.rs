//! Audio backend
//!
//! The playback core only talks to the [`AudioEngine`] / [`ChannelPlayer`]
//! seam. The built-in backend decodes clips with symphonia, resamples them
//! with rubato and plays them as looping voices in a [`LoopMixer`].

pub mod decoder;
pub mod engine;
pub mod mixer;
pub mod resampler;

pub use engine::ClipEngine;
pub use mixer::{LoopMixer, MixerVoice};

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// One decoded, infinitely looping audio source
///
/// All methods are cheap and non-blocking.
pub trait ChannelPlayer: Send + Sync {
    /// Start (or continue) producing audio
    fn start(&self) -> Result<()>;

    /// Stop producing audio, keeping the loop position
    fn pause(&self);

    /// Stop and release the source; the player is not reused afterwards
    fn stop(&self);

    fn set_volume(&self, volume: f32);

    fn volume(&self) -> f32;

    fn is_playing(&self) -> bool;

    /// Length of one loop iteration
    fn duration(&self) -> Duration;
}

/// What to load: one variant of one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub channel_id: String,
    pub variant: String,
}

impl LoadRequest {
    pub fn new(channel_id: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            variant: variant.into(),
        }
    }
}

/// Creates players for channel variants
#[async_trait]
pub trait AudioEngine: Send + Sync {
    /// Load a variant and return a paused player at volume 0
    async fn load(&self, request: &LoadRequest) -> Result<Arc<dyn ChannelPlayer>>;
}
