//! In-process loop mixer
//!
//! Sums every playing voice into an interleaved stereo buffer, each scaled by
//! its volume. Voices wrap at the end of their clip, so every source loops
//! forever.
//!
//! `invalidate()` models the engine being torn down behind our back (long
//! suspension, device change): existing voices stop and refuse to start
//! again until their channel reloads a fresh voice.

use super::decoder::OUTPUT_CHANNELS;
use super::ChannelPlayer;
use crate::channel::clamp_volume;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct VoiceState {
    /// Next sample index (interleaved)
    position: usize,
    playing: bool,
    volume: f32,
    released: bool,
}

/// One looping voice
pub struct MixerVoice {
    label: String,
    samples: Arc<Vec<f32>>,
    sample_rate: u32,
    engine_generation: u64,
    current_generation: Arc<AtomicU64>,
    state: Mutex<VoiceState>,
}

impl MixerVoice {
    pub fn label(&self) -> &str {
        &self.label
    }

    fn is_valid(&self) -> bool {
        self.engine_generation == self.current_generation.load(Ordering::Acquire)
    }

    /// Add this voice into `out`; returns false once the voice is released
    fn mix_into(&self, out: &mut [f32]) -> bool {
        let mut state = self.state.lock();
        if state.released {
            return false;
        }
        if !state.playing || self.samples.is_empty() {
            return true;
        }

        let volume = state.volume;
        let len = self.samples.len();
        let mut pos = state.position;
        for sample in out.iter_mut() {
            *sample += self.samples[pos] * volume;
            pos += 1;
            if pos >= len {
                pos = 0;
            }
        }
        state.position = pos;
        true
    }
}

impl ChannelPlayer for MixerVoice {
    fn start(&self) -> Result<()> {
        if !self.is_valid() {
            return Err(Error::EngineInvalidated(format!(
                "voice '{}' belongs to a previous engine session",
                self.label
            )));
        }
        let mut state = self.state.lock();
        if state.released {
            return Err(Error::EngineInvalidated(format!(
                "voice '{}' was released",
                self.label
            )));
        }
        state.playing = true;
        Ok(())
    }

    fn pause(&self) {
        self.state.lock().playing = false;
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        state.playing = false;
        state.position = 0;
        state.released = true;
    }

    fn set_volume(&self, volume: f32) {
        self.state.lock().volume = clamp_volume(volume);
    }

    fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    fn is_playing(&self) -> bool {
        self.state.lock().playing && self.is_valid()
    }

    fn duration(&self) -> Duration {
        let frames = self.samples.len() / OUTPUT_CHANNELS as usize;
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }
}

/// Mixer of looping voices at a fixed output rate
pub struct LoopMixer {
    sample_rate: u32,
    generation: Arc<AtomicU64>,
    voices: Mutex<Vec<Weak<MixerVoice>>>,
}

impl LoopMixer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            generation: Arc::new(AtomicU64::new(0)),
            voices: Mutex::new(Vec::new()),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Register a paused voice at volume 0
    ///
    /// `samples` must be interleaved stereo at the mixer rate.
    pub fn add_voice(&self, label: impl Into<String>, samples: Arc<Vec<f32>>) -> Arc<MixerVoice> {
        let voice = Arc::new(MixerVoice {
            label: label.into(),
            samples,
            sample_rate: self.sample_rate,
            engine_generation: self.generation.load(Ordering::Acquire),
            current_generation: Arc::clone(&self.generation),
            state: Mutex::new(VoiceState::default()),
        });
        self.voices.lock().push(Arc::downgrade(&voice));
        debug!(voice = %voice.label, "Voice registered");
        voice
    }

    /// Number of live (not released, still referenced) voices
    pub fn voice_count(&self) -> usize {
        let mut voices = self.voices.lock();
        voices.retain(|v| v.upgrade().map(|v| !v.state.lock().released).unwrap_or(false));
        voices.len()
    }

    /// Number of voices currently producing audio
    pub fn playing_count(&self) -> usize {
        self.voices
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|v| v.is_playing())
            .count()
    }

    /// Render one block of interleaved stereo output
    ///
    /// Returns the peak absolute sample value of the block.
    pub fn render(&self, out: &mut [f32]) -> f32 {
        out.fill(0.0);
        let live: Vec<Arc<MixerVoice>> = {
            let mut voices = self.voices.lock();
            voices.retain(|v| v.strong_count() > 0);
            voices.iter().filter_map(Weak::upgrade).collect()
        };

        for voice in live {
            if voice.is_valid() {
                voice.mix_into(out);
            }
        }

        out.iter().fold(0.0f32, |peak, s| peak.max(s.abs()))
    }

    /// Invalidate every existing voice
    pub fn invalidate(&self) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        for voice in self.voices.lock().iter().filter_map(Weak::upgrade) {
            voice.state.lock().playing = false;
        }
        warn!(generation, "Audio engine invalidated; voices must be reloaded");
    }
}
