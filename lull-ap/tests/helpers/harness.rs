//! Coordinator wired to scripted collaborators

use super::mocks::{MockEngine, RecordingRemote, RecordingSink, ScriptedRoute};
use lull_ap::config::{ChannelConfig, MixConfig, PlayerSettings};
use lull_ap::persistence::MemoryStore;
use lull_ap::playback::{CoordinatorDeps, PlaybackCoordinator};
use lull_common::events::EventBus;
use std::sync::Arc;

pub struct Harness {
    pub coordinator: Arc<PlaybackCoordinator>,
    pub engine: Arc<MockEngine>,
    pub route: Arc<ScriptedRoute>,
    pub remote: Arc<RecordingRemote>,
    pub reports: Arc<RecordingSink>,
    pub store: Arc<MemoryStore>,
    pub events: EventBus,
}

impl Harness {
    pub fn new(config: MixConfig) -> Self {
        Self::with_store(config, MemoryStore::new())
    }

    pub fn with_store(config: MixConfig, store: MemoryStore) -> Self {
        let engine = Arc::new(MockEngine::new());
        let route = Arc::new(ScriptedRoute::new());
        let remote = Arc::new(RecordingRemote::new());
        let reports = Arc::new(RecordingSink::new());
        let store = Arc::new(store);
        let events = EventBus::new(1024);

        let deps = CoordinatorDeps {
            engine: engine.clone(),
            store: store.clone(),
            route: route.clone(),
            remote: remote.clone(),
            observability: reports.clone(),
            events: events.clone(),
        };
        let coordinator = PlaybackCoordinator::new(config, deps).unwrap();
        coordinator.start();

        Self {
            coordinator,
            engine,
            route,
            remote,
            reports,
            store,
            events,
        }
    }

    /// Current volume of a channel's live player
    pub fn player_volume(&self, channel_id: &str) -> f32 {
        use lull_ap::audio::ChannelPlayer;
        self.engine
            .player(channel_id)
            .map(|p| p.volume())
            .unwrap_or(0.0)
    }

    pub fn player_playing(&self, channel_id: &str) -> bool {
        use lull_ap::audio::ChannelPlayer;
        self.engine
            .player(channel_id)
            .map(|p| p.is_playing())
            .unwrap_or(false)
    }

    /// Let spawned listeners and timers run
    pub async fn yield_now(&self) {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }
}

pub fn channel(id: &str, volume: f32) -> ChannelConfig {
    let name = {
        let mut chars = id.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        }
    };
    ChannelConfig::new(id, &name, "", volume, &["a", "b"])
}

/// Mix with default player settings
pub fn mix(channels: Vec<ChannelConfig>) -> MixConfig {
    MixConfig {
        player: PlayerSettings::default(),
        channels,
    }
}
