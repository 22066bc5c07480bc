//! Scripted collaborators
//!
//! Every mock records what the playback core asked of it so tests can assert
//! on calls (starts, pauses, loads, activations) rather than on audio.

use async_trait::async_trait;
use lull_ap::audio::{AudioEngine, ChannelPlayer, LoadRequest};
use lull_ap::error::{Error, Result};
use lull_ap::observability::{ObservabilitySink, Report, Severity};
use lull_ap::playback::{NowPlaying, RemoteCommand, RemoteCommandSurface, RouteNotification};
use lull_ap::playback::AudioRoute;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

// ============================================================================
// Player / engine
// ============================================================================

#[derive(Debug, Default)]
struct PlayerState {
    playing: bool,
    volume: f32,
    released: bool,
    fail_next_start: bool,
}

/// Player that only tracks state
#[derive(Debug, Default)]
pub struct MockPlayer {
    state: Mutex<PlayerState>,
    volume_history: Mutex<Vec<f32>>,
    starts: AtomicUsize,
    pauses: AtomicUsize,
    stops: AtomicUsize,
}

impl MockPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn pause_count(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    /// Every volume ever applied, in order
    pub fn volume_history(&self) -> Vec<f32> {
        self.volume_history.lock().clone()
    }

    /// Make the next `start()` fail with `EngineInvalidated`
    pub fn fail_next_start(&self) {
        self.state.lock().fail_next_start = true;
    }

    /// Stop producing audio behind the core's back (system took the output)
    pub fn force_stop(&self) {
        self.state.lock().playing = false;
    }
}

impl ChannelPlayer for MockPlayer {
    fn start(&self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        if state.released {
            return Err(Error::EngineInvalidated("player released".into()));
        }
        if std::mem::take(&mut state.fail_next_start) {
            return Err(Error::EngineInvalidated("engine reset".into()));
        }
        state.playing = true;
        Ok(())
    }

    fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        self.state.lock().playing = false;
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        state.playing = false;
        state.released = true;
    }

    fn set_volume(&self, volume: f32) {
        self.state.lock().volume = volume;
        self.volume_history.lock().push(volume);
    }

    fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    fn duration(&self) -> Duration {
        Duration::from_secs(30)
    }
}

/// Engine handing out [`MockPlayer`]s
#[derive(Default)]
pub struct MockEngine {
    players: Mutex<HashMap<String, Vec<Arc<MockPlayer>>>>,
    loads: Mutex<Vec<LoadRequest>>,
    missing: Mutex<HashSet<String>>,
    fail_first_start: Mutex<HashSet<String>>,
    load_delay: Mutex<Option<Duration>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every load of this channel fails with `ResourceMissing`
    pub fn set_missing(&self, channel_id: &str) {
        self.missing.lock().insert(channel_id.to_string());
    }

    /// The next player loaded for this channel fails its first start
    pub fn fail_first_start(&self, channel_id: &str) {
        self.fail_first_start.lock().insert(channel_id.to_string());
    }

    pub fn set_load_delay(&self, delay: Duration) {
        *self.load_delay.lock() = Some(delay);
    }

    /// Most recently loaded player for a channel
    pub fn player(&self, channel_id: &str) -> Option<Arc<MockPlayer>> {
        self.players
            .lock()
            .get(channel_id)
            .and_then(|p| p.last().cloned())
    }

    pub fn players(&self, channel_id: &str) -> Vec<Arc<MockPlayer>> {
        self.players
            .lock()
            .get(channel_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn loads(&self) -> Vec<LoadRequest> {
        self.loads.lock().clone()
    }

    pub fn load_count(&self, channel_id: &str) -> usize {
        self.loads
            .lock()
            .iter()
            .filter(|r| r.channel_id == channel_id)
            .count()
    }
}

#[async_trait]
impl AudioEngine for MockEngine {
    async fn load(&self, request: &LoadRequest) -> Result<Arc<dyn ChannelPlayer>> {
        self.loads.lock().push(request.clone());

        let delay = *self.load_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.missing.lock().contains(&request.channel_id) {
            return Err(Error::ResourceMissing {
                channel_id: request.channel_id.clone(),
                variant: request.variant.clone(),
            });
        }

        let player = Arc::new(MockPlayer::new());
        if self.fail_first_start.lock().remove(&request.channel_id) {
            player.fail_next_start();
        }
        self.players
            .lock()
            .entry(request.channel_id.clone())
            .or_default()
            .push(Arc::clone(&player));
        Ok(player)
    }
}

// ============================================================================
// Route
// ============================================================================

/// Route whose activation can be made to fail a number of times
pub struct ScriptedRoute {
    failures_remaining: AtomicU32,
    activations: AtomicU32,
    deactivations: AtomicU32,
    other_audio: AtomicBool,
    notifications: broadcast::Sender<RouteNotification>,
}

impl ScriptedRoute {
    pub fn new() -> Self {
        let (notifications, _) = broadcast::channel(16);
        Self {
            failures_remaining: AtomicU32::new(0),
            activations: AtomicU32::new(0),
            deactivations: AtomicU32::new(0),
            other_audio: AtomicBool::new(false),
            notifications,
        }
    }

    /// Fail the next `n` activation attempts
    pub fn fail_next(&self, n: u32) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    pub fn set_other_audio(&self, active: bool) {
        self.other_audio.store(active, Ordering::SeqCst);
    }

    pub fn activation_attempts(&self) -> u32 {
        self.activations.load(Ordering::SeqCst)
    }

    pub fn deactivations(&self) -> u32 {
        self.deactivations.load(Ordering::SeqCst)
    }

    pub fn notify(&self, notification: RouteNotification) {
        let _ = self.notifications.send(notification);
    }
}

impl Default for ScriptedRoute {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioRoute for ScriptedRoute {
    async fn activate(&self) -> Result<()> {
        self.activations.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::InvalidState("route busy".into()));
        }
        Ok(())
    }

    async fn deactivate(&self) -> Result<()> {
        self.deactivations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn other_audio_active(&self) -> bool {
        self.other_audio.load(Ordering::SeqCst)
    }

    fn notifications(&self) -> broadcast::Receiver<RouteNotification> {
        self.notifications.subscribe()
    }
}

// ============================================================================
// Remote surface / observability
// ============================================================================

/// Remote surface recording every metadata push
#[derive(Default)]
pub struct RecordingRemote {
    commands: Mutex<Option<mpsc::UnboundedSender<RemoteCommand>>>,
    updates: Mutex<Vec<Option<NowPlaying>>>,
}

impl RecordingRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&self, command: RemoteCommand) {
        if let Some(tx) = self.commands.lock().as_ref() {
            let _ = tx.send(command);
        }
    }

    pub fn is_registered(&self) -> bool {
        self.commands.lock().is_some()
    }

    pub fn updates(&self) -> Vec<Option<NowPlaying>> {
        self.updates.lock().clone()
    }

    pub fn last(&self) -> Option<NowPlaying> {
        self.updates.lock().last().cloned().flatten()
    }
}

impl RemoteCommandSurface for RecordingRemote {
    fn register(&self, commands: mpsc::UnboundedSender<RemoteCommand>) {
        *self.commands.lock() = Some(commands);
    }

    fn set_now_playing(&self, now_playing: Option<&NowPlaying>) {
        self.updates.lock().push(now_playing.cloned());
    }
}

/// Observability sink keeping every report
#[derive(Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<Report>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().clone()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.reports
            .lock()
            .iter()
            .filter(|r| r.severity == severity)
            .count()
    }
}

impl ObservabilitySink for RecordingSink {
    fn report(&self, report: Report) {
        self.reports.lock().push(report);
    }
}
