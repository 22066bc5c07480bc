//! File-backed audio engine
//!
//! Resolves `{root}/{channel_id}/{variant}.{wav|flac|mp3|ogg}`, decodes the
//! clip on a blocking worker, resamples it to the mixer rate and registers a
//! looping voice. A missing file is a hard `ResourceMissing` failure; nothing
//! is substituted.

use super::decoder::{decode_clip, OUTPUT_CHANNELS};
use super::resampler::resample_clip;
use super::{AudioEngine, ChannelPlayer, LoadRequest, LoopMixer};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Supported clip extensions, in lookup order
pub const CLIP_EXTENSIONS: [&str; 4] = ["wav", "flac", "mp3", "ogg"];

pub struct ClipEngine {
    root: PathBuf,
    mixer: Arc<LoopMixer>,
    /// Decoded, resampled clips by (channel, variant)
    cache: Mutex<HashMap<(String, String), Arc<Vec<f32>>>>,
}

impl ClipEngine {
    pub fn new(root: impl Into<PathBuf>, mixer: Arc<LoopMixer>) -> Self {
        Self {
            root: root.into(),
            mixer,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mixer(&self) -> &Arc<LoopMixer> {
        &self.mixer
    }

    /// First existing file for the request, if any
    pub fn resolve_path(&self, request: &LoadRequest) -> Option<PathBuf> {
        let dir = self.root.join(&request.channel_id);
        CLIP_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{}.{}", request.variant, ext)))
            .find(|path| path.is_file())
    }

    async fn decode(&self, path: PathBuf) -> Result<Arc<Vec<f32>>> {
        let output_rate = self.mixer.sample_rate();
        let samples = tokio::task::spawn_blocking(move || -> Result<Vec<f32>> {
            let clip = decode_clip(&path)?;
            resample_clip(clip.samples, clip.sample_rate, output_rate, OUTPUT_CHANNELS)
        })
        .await
        .map_err(|e| Error::Decode(format!("decode worker failed: {}", e)))??;
        Ok(Arc::new(samples))
    }
}

#[async_trait]
impl AudioEngine for ClipEngine {
    async fn load(&self, request: &LoadRequest) -> Result<Arc<dyn ChannelPlayer>> {
        let key = (request.channel_id.clone(), request.variant.clone());

        let cached = self.cache.lock().get(&key).cloned();
        let samples = match cached {
            Some(samples) => {
                debug!(channel_id = %request.channel_id, variant = %request.variant, "Clip cache hit");
                samples
            }
            None => {
                let path = self.resolve_path(request).ok_or_else(|| Error::ResourceMissing {
                    channel_id: request.channel_id.clone(),
                    variant: request.variant.clone(),
                })?;
                let samples = self.decode(path.clone()).await?;
                info!(
                    channel_id = %request.channel_id,
                    variant = %request.variant,
                    "Loaded clip {} ({} frames)",
                    path.display(),
                    samples.len() / OUTPUT_CHANNELS as usize
                );
                self.cache.lock().insert(key, Arc::clone(&samples));
                samples
            }
        };

        let label = format!("{}/{}", request.channel_id, request.variant);
        let voice: Arc<dyn ChannelPlayer> = self.mixer.add_voice(label, samples);
        Ok(voice)
    }
}
