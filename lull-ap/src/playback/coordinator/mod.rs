//! Playback coordinator
//!
//! Root of the playback core. Owns every channel controller, the sleep
//! timer, the route guardian and the remote-control bridge, and keeps one
//! playback intent consistent across user presses, remote commands, timer
//! expiry, interruptions and foreground/background transitions.
//!
//! # Transitions
//!
//! Every global transition (toggle, `play_all`, `pause_all`) begins an
//! operation: a ticket holding a cancellation token. Beginning an operation
//! cancels the previous one, and with it every fade it started (fade tokens
//! are children of the operation token). Transitions then run one at a time
//! behind the `ops` gate and re-check their ticket after each await, so a
//! superseded transition finishes as a no-op.
//!
//! Entry points that must not block later commands (toggle, remote
//! commands, route interruptions) begin their operation synchronously and
//! run it on a spawned task. Channel-local starts from volume and variant
//! changes run under a scope token that every new operation cancels.
//!
//! # Module Organization
//!
//! - `core.rs`: operation tickets, actual-state queries, now-playing updates
//! - `transport.rs`: toggle / play_all / pause_all
//! - `reconcile.rs`: reconciliation and lifecycle hooks
//! - `interruption.rs`: route interruption handling
//! - `channels.rs`: per-channel volume/variant and timer selection

mod channels;
mod core;
mod interruption;
mod reconcile;
mod transport;

use crate::audio::AudioEngine;
use crate::channel::Channel;
use crate::config::{MixConfig, PlayerSettings};
use crate::error::{Error, Result};
use crate::observability::{ObservabilitySink, Report, Severity};
use crate::persistence::{PreferenceStore, PreferenceWriter};
use crate::playback::channel_controller::{ChannelController, ChannelDeps};
use crate::playback::events::PlaybackEventSink;
use crate::playback::remote::{RemoteCommandSurface, RemoteControlBridge};
use crate::playback::route::{AudioRoute, AudioRouteGuardian};
use crate::playback::sleep_timer::{SleepTimer, TimerMode};
use crate::state::SharedState;
use async_trait::async_trait;
use lull_common::events::EventBus;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use self::core::CoordinatorStatus;
use self::core::Operation;

/// External collaborators injected by the composition root
#[derive(Clone)]
pub struct CoordinatorDeps {
    pub engine: Arc<dyn AudioEngine>,
    pub store: Arc<dyn PreferenceStore>,
    pub route: Arc<dyn AudioRoute>,
    pub remote: Arc<dyn RemoteCommandSurface>,
    pub observability: Arc<dyn ObservabilitySink>,
    pub events: EventBus,
}

pub struct PlaybackCoordinator {
    settings: PlayerSettings,
    state: Arc<SharedState>,
    channels: Vec<Arc<ChannelController>>,
    timer: SleepTimer,
    route: Arc<AudioRouteGuardian>,
    remote: RemoteControlBridge,
    writer: Arc<PreferenceWriter>,
    observability: Arc<dyn ObservabilitySink>,

    /// Timer mode selected by the user; armed until the mix plays
    timer_mode: Mutex<TimerMode>,

    /// Serializes global transitions
    ops: tokio::sync::Mutex<()>,
    /// The one in-flight global transition
    operation: Mutex<Option<Operation>>,
    next_operation_id: AtomicU64,
    /// Spawned transitions, awaited by `settle`
    transitions: Mutex<Vec<JoinHandle<()>>>,
    /// Reconcile passes queued behind remote commands
    follow_ups: Mutex<Vec<JoinHandle<()>>>,
    /// Parent of channel-local starts; replaced by every new operation
    channel_scope: Mutex<CancellationToken>,

    /// The current pause was caused by an interruption
    paused_by_interruption: AtomicBool,

    route_listener: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
    self_ref: Weak<PlaybackCoordinator>,
}

impl PlaybackCoordinator {
    /// Build the coordinator from the mix configuration
    ///
    /// Stored preferences are loaded synchronously here. Invalid or duplicate
    /// catalog entries are skipped with a report; a catalog with no usable
    /// channel is a configuration error.
    pub fn new(config: MixConfig, deps: CoordinatorDeps) -> Result<Arc<Self>> {
        let settings = config.player.clone().validated();
        let preferences = deps.store.load();
        let writer = Arc::new(PreferenceWriter::new(
            Arc::clone(&deps.store),
            settings.volume_persist_debounce(),
        ));

        let channel_deps = ChannelDeps {
            engine: Arc::clone(&deps.engine),
            writer: Arc::clone(&writer),
            observability: Arc::clone(&deps.observability),
            events: deps.events.clone(),
            fade_curve: settings.fade_curve,
            fade_steps_per_second: settings.fade_steps_per_second,
            engine_reload_attempts: settings.engine_reload_attempts,
        };

        let mut seen = HashSet::new();
        let mut channels = Vec::with_capacity(config.channels.len());
        for entry in &config.channels {
            if !seen.insert(entry.id.clone()) {
                warn!(channel_id = %entry.id, "Duplicate channel id in catalog, skipped");
                continue;
            }
            match Channel::from_config(entry, preferences.get(&entry.id)) {
                Ok(channel) => channels.push(Arc::new(ChannelController::new(
                    channel,
                    channel_deps.clone(),
                ))),
                Err(e) => {
                    deps.observability.report(
                        Report::from_error(Severity::Warning, &e).with("channel_id", &entry.id),
                    );
                }
            }
        }
        if channels.is_empty() {
            return Err(Error::Config("no usable channels in catalog".to_string()));
        }

        let route = Arc::new(AudioRouteGuardian::new(
            Arc::clone(&deps.route),
            settings.route_activation_attempts,
            settings.route_retry_backoff(),
        ));
        let state = Arc::new(SharedState::new(deps.events.clone()));

        info!(
            channels = channels.len(),
            restored = preferences.len(),
            "Playback coordinator created"
        );

        let shutdown = CancellationToken::new();
        Ok(Arc::new_cyclic(|weak: &Weak<PlaybackCoordinator>| {
            let sink: Weak<dyn PlaybackEventSink> = weak.clone();
            Self {
                timer: SleepTimer::new(sink.clone(), deps.events.clone()),
                remote: RemoteControlBridge::new(Arc::clone(&deps.remote), sink, deps.events.clone()),
                settings,
                state,
                channels,
                route,
                writer,
                observability: deps.observability,
                timer_mode: Mutex::new(TimerMode::Off),
                ops: tokio::sync::Mutex::new(()),
                operation: Mutex::new(None),
                next_operation_id: AtomicU64::new(0),
                transitions: Mutex::new(Vec::new()),
                follow_ups: Mutex::new(Vec::new()),
                channel_scope: Mutex::new(shutdown.child_token()),
                paused_by_interruption: AtomicBool::new(false),
                route_listener: Mutex::new(None),
                shutdown,
                self_ref: weak.clone(),
            }
        }))
    }

    /// Register remote handlers and start listening for interruptions
    pub fn start(self: &Arc<Self>) {
        self.remote.start();
        self.route.start();
        self.spawn_route_listener();
        self.refresh_now_playing();
        debug!("Playback coordinator started");
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    pub fn shared_state(&self) -> &Arc<SharedState> {
        &self.state
    }

    pub fn events(&self) -> &EventBus {
        self.state.event_bus()
    }

    pub fn route_guardian(&self) -> &Arc<AudioRouteGuardian> {
        &self.route
    }

    pub fn channel_ids(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.id()).collect()
    }

    fn channel(&self, channel_id: &str) -> Result<&Arc<ChannelController>> {
        self.channels
            .iter()
            .find(|c| c.id() == channel_id)
            .ok_or_else(|| Error::UnknownChannel(channel_id.to_string()))
    }

    fn strong_self(&self, origin: &str) -> Result<Arc<Self>> {
        self.self_ref.upgrade().ok_or_else(|| {
            let err = Error::StaleReference(format!("coordinator shutting down ({})", origin));
            warn!(origin, "{}", err);
            err
        })
    }
}

#[async_trait]
impl PlaybackEventSink for PlaybackCoordinator {
    // Remote commands return as soon as their transition is under way, so
    // the next command can supersede it.
    async fn remote_play(&self) {
        let Ok(this) = self.strong_self("remote_play") else {
            return;
        };
        if let Some(operation) = self.begin_play() {
            this.spawn_transition(operation, Some(self.settings.fade_in()));
        }
        this.spawn_follow_up_reconcile();
    }

    async fn remote_pause(&self) {
        let Ok(this) = self.strong_self("remote_pause") else {
            return;
        };
        if let Some(operation) = self.begin_pause() {
            this.spawn_transition(operation, Some(self.settings.fade_out()));
        }
        this.spawn_follow_up_reconcile();
    }

    async fn remote_toggle(&self) {
        let Ok(this) = self.strong_self("remote_toggle") else {
            return;
        };
        self.toggle();
        this.spawn_follow_up_reconcile();
    }

    fn timer_tick(&self, remaining_seconds: u64) {
        tracing::trace!(remaining_seconds, "Timer tick");
        self.refresh_now_playing();
    }

    async fn timer_expired(&self) {
        *self.timer_mode.lock() = TimerMode::Off;
        info!("Sleep timer expired, fading out the mix");
        if let Err(e) = self.pause_all(Some(self.settings.timer_fade_out())).await {
            warn!("Timer fade-out failed: {}", e);
        }
    }
}

impl Drop for PlaybackCoordinator {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
