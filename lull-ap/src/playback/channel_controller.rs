//! Channel controller
//!
//! Owns one channel's player and fade controller. Audio is loaded lazily on
//! first play; concurrent loads share one gate so a channel never holds two
//! players. Load and start failures are reported and leave the channel shown
//! inactive; they never propagate as panics.

use crate::audio::{AudioEngine, ChannelPlayer, LoadRequest};
use crate::channel::{Channel, ChannelSnapshot};
use crate::error::{Error, Result};
use crate::observability::{ObservabilitySink, Report, Severity};
use crate::persistence::PreferenceWriter;
use crate::playback::fader::{FadeController, FadeOperation, FadeOutcome};
use lull_common::events::{EventBus, LullEvent};
use lull_common::FadeCurve;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Collaborators shared by every channel controller
#[derive(Clone)]
pub struct ChannelDeps {
    pub engine: Arc<dyn AudioEngine>,
    pub writer: Arc<PreferenceWriter>,
    pub observability: Arc<dyn ObservabilitySink>,
    pub events: EventBus,
    pub fade_curve: FadeCurve,
    pub fade_steps_per_second: u32,
    pub engine_reload_attempts: u32,
}

#[derive(Debug, Default, Clone)]
struct RuntimeState {
    is_loaded: bool,
    /// The channel is meant to be audible (set when play starts, cleared when pause starts)
    is_playing: bool,
    failure: Option<String>,
}

pub struct ChannelController {
    channel: Mutex<Channel>,
    runtime: Mutex<RuntimeState>,
    player: Mutex<Option<Arc<dyn ChannelPlayer>>>,
    load_gate: tokio::sync::Mutex<()>,
    fader: FadeController,
    deps: ChannelDeps,
}

impl ChannelController {
    pub fn new(channel: Channel, deps: ChannelDeps) -> Self {
        Self {
            channel: Mutex::new(channel),
            runtime: Mutex::new(RuntimeState::default()),
            player: Mutex::new(None),
            load_gate: tokio::sync::Mutex::new(()),
            fader: FadeController::new(deps.fade_steps_per_second),
            deps,
        }
    }

    pub fn id(&self) -> String {
        self.channel.lock().id().to_string()
    }

    pub fn display_name(&self) -> String {
        self.channel.lock().display_name().to_string()
    }

    pub fn volume(&self) -> f32 {
        self.channel.lock().volume()
    }

    pub fn selected_variant(&self) -> String {
        self.channel.lock().selected_variant().to_string()
    }

    pub fn is_loaded(&self) -> bool {
        self.runtime.lock().is_loaded
    }

    /// Whether the player is producing audio right now
    pub fn is_actually_playing(&self) -> bool {
        self.current_player()
            .map(|p| p.is_playing())
            .unwrap_or(false)
    }

    pub fn failure(&self) -> Option<String> {
        self.runtime.lock().failure.clone()
    }

    pub fn fade_active(&self) -> bool {
        self.fader.is_active()
    }

    /// Start playback, optionally fading in from silence
    ///
    /// When the player is still audible (e.g. mid fade-out) the fade starts
    /// from its current volume instead of jumping to zero. A transient
    /// failure tears the player down and retries up to the configured reload
    /// count before the failure is reported.
    pub async fn play(&self, fade: Option<Duration>, token: &CancellationToken) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            match self.try_play(fade, token).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < self.deps.engine_reload_attempts => {
                    attempt += 1;
                    warn!(
                        channel_id = %self.id(),
                        attempt,
                        "Play failed ({}), reloading audio and retrying",
                        e
                    );
                    self.teardown_player();
                }
                Err(e) => {
                    self.mark_failed(&e);
                    return Err(e);
                }
            }
        }
    }

    async fn try_play(&self, fade: Option<Duration>, token: &CancellationToken) -> Result<()> {
        if token.is_cancelled() {
            debug!(channel_id = %self.id(), "Play skipped: operation already cancelled");
            return Ok(());
        }

        let player = self.ensure_loaded().await?;
        if token.is_cancelled() {
            warn!(channel_id = %self.id(), "Stale reference: play continuation after cancellation ignored");
            return Ok(());
        }

        let target = self.volume();
        let audible = player.is_playing();

        match fade.filter(|d| !d.is_zero()) {
            Some(duration) => {
                let start = if audible { player.volume() } else { 0.0 };
                player.set_volume(start);
                player.start()?;
                self.set_playing(true);
                info!(channel_id = %self.id(), target, "Channel fading in");

                let op = FadeOperation::fade_in(start, target, duration, self.deps.fade_curve);
                if self.fader.run(&player, op, token).await == FadeOutcome::Cancelled {
                    debug!(channel_id = %self.id(), "Fade-in cancelled");
                }
            }
            None => {
                self.fader.cancel();
                player.set_volume(target);
                player.start()?;
                self.set_playing(true);
                info!(channel_id = %self.id(), target, "Channel playing");
            }
        }
        Ok(())
    }

    /// Pause playback, optionally fading out first
    ///
    /// No-op when nothing is playing. A fade-out that gets cancelled (for
    /// example by a new play) leaves the player running at its current
    /// volume.
    pub async fn pause(&self, fade: Option<Duration>, token: &CancellationToken) {
        let was_meant_to_play = {
            let mut runtime = self.runtime.lock();
            std::mem::replace(&mut runtime.is_playing, false)
        };

        let Some(player) = self.current_player() else {
            self.fader.cancel();
            return;
        };
        if !player.is_playing() {
            self.fader.cancel();
            if was_meant_to_play {
                self.emit_state();
            }
            return;
        }

        match fade.filter(|d| !d.is_zero()) {
            Some(duration) => {
                let op = FadeOperation::fade_out(player.volume(), duration, self.deps.fade_curve);
                info!(channel_id = %self.id(), "Channel fading out");
                if self.fader.run(&player, op, token).await == FadeOutcome::Cancelled {
                    debug!(channel_id = %self.id(), "Fade-out cancelled, channel left running");
                    return;
                }
                if self.runtime.lock().is_playing {
                    // A play started after this pause and owns the player now
                    return;
                }
                player.pause();
            }
            None => {
                self.fader.cancel();
                player.pause();
            }
        }

        info!(channel_id = %self.id(), "Channel paused");
        self.emit_state();
    }

    /// Set the channel volume
    ///
    /// Clamps to `[0, 1]`, applies to an audible player immediately
    /// (cancelling a running fade-in) and schedules a debounced persist.
    /// Returns `(old, new)`.
    pub fn set_volume(&self, volume: f32) -> (f32, f32) {
        let (old, new, id, preference) = {
            let mut channel = self.channel.lock();
            let old = channel.volume();
            let new = channel.set_volume(volume);
            (old, new, channel.id().to_string(), channel.preference())
        };

        if self.runtime.lock().is_playing {
            self.fader.cancel();
            if let Some(player) = self.current_player() {
                player.set_volume(new);
            }
        }

        self.deps.writer.schedule(&id, preference);
        debug!(channel_id = %id, old, new, "Channel volume changed");
        self.emit_state();
        (old, new)
    }

    /// Switch to another variant
    ///
    /// The choice is persisted first. A playing channel stops its old source,
    /// loads the new one and resumes; if that fails the failure is reported
    /// and the channel shows inactive.
    pub async fn change_variant(&self, variant: &str, token: &CancellationToken) -> Result<()> {
        let (id, preference, changed) = {
            let mut channel = self.channel.lock();
            let changed = channel.selected_variant() != variant;
            channel.select_variant(variant)?;
            (channel.id().to_string(), channel.preference(), changed)
        };
        self.deps.writer.schedule(&id, preference);

        if !changed {
            debug!(channel_id = %id, variant, "Variant unchanged");
            return Ok(());
        }

        let was_playing = {
            let _gate = self.load_gate.lock().await;
            let was_playing = self.runtime.lock().is_playing;
            self.teardown_player();
            was_playing
        };
        info!(channel_id = %id, variant, was_playing, "Variant changed");

        if was_playing {
            self.play(None, token).await?;
        } else {
            self.emit_state();
        }
        Ok(())
    }

    /// Stop and release the player, cancelling any fade
    pub fn teardown(&self) {
        self.teardown_player();
        self.runtime.lock().is_playing = false;
    }

    pub fn snapshot(&self) -> ChannelSnapshot {
        let channel = self.channel.lock().clone();
        let runtime = self.runtime.lock().clone();
        ChannelSnapshot {
            id: channel.id().to_string(),
            name: channel.display_name().to_string(),
            icon: channel.icon().to_string(),
            volume: channel.volume(),
            variant: channel.selected_variant().to_string(),
            variants: channel.variants().to_vec(),
            is_loaded: runtime.is_loaded,
            is_playing: self.is_actually_playing(),
            failure: runtime.failure,
        }
    }

    fn current_player(&self) -> Option<Arc<dyn ChannelPlayer>> {
        self.player.lock().clone()
    }

    /// Load the selected variant once; concurrent callers wait for the same load
    async fn ensure_loaded(&self) -> Result<Arc<dyn ChannelPlayer>> {
        if let Some(player) = self.current_player() {
            return Ok(player);
        }

        let _gate = self.load_gate.lock().await;
        if let Some(player) = self.current_player() {
            return Ok(player);
        }

        let request = {
            let channel = self.channel.lock();
            LoadRequest::new(channel.id(), channel.selected_variant())
        };
        debug!(channel_id = %request.channel_id, variant = %request.variant, "Loading audio");

        let player = self.deps.engine.load(&request).await?;
        player.set_volume(0.0);
        *self.player.lock() = Some(Arc::clone(&player));
        {
            let mut runtime = self.runtime.lock();
            runtime.is_loaded = true;
            runtime.failure = None;
        }
        Ok(player)
    }

    fn teardown_player(&self) {
        self.fader.cancel();
        if let Some(player) = self.player.lock().take() {
            player.stop();
        }
        self.runtime.lock().is_loaded = false;
    }

    fn set_playing(&self, playing: bool) {
        {
            let mut runtime = self.runtime.lock();
            runtime.is_playing = playing;
            if playing {
                runtime.failure = None;
            }
        }
        self.emit_state();
    }

    fn mark_failed(&self, err: &Error) {
        self.teardown_player();
        let (id, variant) = {
            let channel = self.channel.lock();
            (channel.id().to_string(), channel.selected_variant().to_string())
        };
        {
            let mut runtime = self.runtime.lock();
            runtime.is_playing = false;
            runtime.failure = Some(err.to_string());
        }

        error!(channel_id = %id, variant = %variant, "Channel failed: {}", err);
        self.deps.observability.report(
            Report::from_error(Severity::Error, err)
                .with("channel_id", &id)
                .with("variant", &variant),
        );
        self.deps.events.emit_lossy(LullEvent::ChannelFailed {
            channel_id: id,
            error: err.to_string(),
            timestamp: lull_common::time::now(),
        });
        self.emit_state();
    }

    fn emit_state(&self) {
        let (channel_id, volume, variant) = {
            let channel = self.channel.lock();
            (
                channel.id().to_string(),
                channel.volume(),
                channel.selected_variant().to_string(),
            )
        };
        self.deps.events.emit_lossy(LullEvent::ChannelStateChanged {
            channel_id,
            playing: self.is_actually_playing(),
            volume,
            variant,
            timestamp: lull_common::time::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{ClipEngine, LoopMixer};
    use crate::observability::TracingSink;
    use crate::persistence::MemoryStore;

    fn controller(root: &std::path::Path) -> ChannelController {
        let mixer = Arc::new(LoopMixer::new(44_100));
        let deps = ChannelDeps {
            engine: Arc::new(ClipEngine::new(root, mixer)),
            writer: Arc::new(PreferenceWriter::new(Arc::new(MemoryStore::new()), Duration::ZERO)),
            observability: Arc::new(TracingSink),
            events: EventBus::new(16),
            fade_curve: FadeCurve::Linear,
            fade_steps_per_second: 20,
            engine_reload_attempts: 1,
        };
        let channel = Channel::new("rain", "Rain", "", 0.5, vec!["light".into()]).unwrap();
        ChannelController::new(channel, deps)
    }

    #[tokio::test]
    async fn test_missing_audio_marks_channel_failed() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(dir.path());
        let mut rx = controller.deps.events.subscribe();

        let err = controller
            .play(None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ResourceMissing { .. }));
        assert!(controller.failure().is_some());
        assert!(!controller.is_actually_playing());
        assert!(!controller.snapshot().is_playing);

        let mut saw_failure = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, LullEvent::ChannelFailed { .. }) {
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }

    #[tokio::test]
    async fn test_pause_without_player_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(dir.path());
        controller
            .pause(Some(Duration::from_millis(100)), &CancellationToken::new())
            .await;
        assert!(!controller.is_loaded());
    }

    #[test]
    fn test_set_volume_clamps() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(dir.path());
        assert_eq!(controller.set_volume(1.5), (0.5, 1.0));
        assert_eq!(controller.set_volume(-1.0), (1.0, 0.0));
    }
}
