//! Remote-control bridge
//!
//! Registers play/pause/toggle handlers with the system remote-control
//! surface and pushes now-playing metadata back to it. Commands are
//! delivered to the coordinator through its event sink.

use crate::playback::events::{upgrade_sink, SinkRef};
use lull_common::events::{EventBus, LullEvent};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Commands the system surface can send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand {
    Play,
    Pause,
    Toggle,
}

/// Metadata shown on the system now-playing surface
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NowPlaying {
    pub title: String,
    pub is_playing: bool,
    /// Sleep timer length, when one is active
    pub duration: Option<Duration>,
    /// Time elapsed on the sleep timer
    pub elapsed: Option<Duration>,
}

/// System remote-control surface
pub trait RemoteCommandSurface: Send + Sync {
    /// Route play/pause/toggle presses into `commands`
    fn register(&self, commands: mpsc::UnboundedSender<RemoteCommand>);

    /// Replace (or clear, with `None`) the now-playing metadata
    fn set_now_playing(&self, now_playing: Option<&NowPlaying>);
}

/// Surface that accepts nothing and displays nothing
#[derive(Debug, Default)]
pub struct NoRemoteSurface;

impl RemoteCommandSurface for NoRemoteSurface {
    fn register(&self, _commands: mpsc::UnboundedSender<RemoteCommand>) {}
    fn set_now_playing(&self, _now_playing: Option<&NowPlaying>) {}
}

pub struct RemoteControlBridge {
    surface: Arc<dyn RemoteCommandSurface>,
    sink: SinkRef,
    events: EventBus,
    last: Mutex<Option<NowPlaying>>,
    listener: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl RemoteControlBridge {
    pub fn new(surface: Arc<dyn RemoteCommandSurface>, sink: SinkRef, events: EventBus) -> Self {
        Self {
            surface,
            sink,
            events,
            last: Mutex::new(None),
            listener: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    /// Register handlers and start dispatching commands; idempotent
    pub fn start(&self) {
        let mut listener = self.listener.lock();
        if listener.is_some() {
            return;
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        self.surface.register(tx);

        let sink = self.sink.clone();
        let shutdown = self.shutdown.clone();
        *listener = Some(tokio::spawn(async move {
            loop {
                let command = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => return,
                    command = rx.recv() => command,
                };
                let Some(command) = command else {
                    debug!("Remote surface closed its command channel");
                    return;
                };
                info!(?command, "Remote command received");

                let Ok(sink) = upgrade_sink(&sink, "remote_command") else {
                    return;
                };
                match command {
                    RemoteCommand::Play => sink.remote_play().await,
                    RemoteCommand::Pause => sink.remote_pause().await,
                    RemoteCommand::Toggle => sink.remote_toggle().await,
                }
            }
        }));
        debug!("Remote command handlers registered");
    }

    /// Push metadata; identical updates are not re-sent
    ///
    /// `NowPlayingChanged` is only broadcast when the title or playing flag
    /// changes, not for elapsed-time updates.
    pub fn update(&self, now_playing: Option<NowPlaying>) {
        let headline_changed = {
            let mut last = self.last.lock();
            if *last == now_playing {
                return;
            }
            let headline = |n: &Option<NowPlaying>| {
                n.as_ref().map(|n| (n.title.clone(), n.is_playing))
            };
            let changed = headline(&*last) != headline(&now_playing);
            *last = now_playing.clone();
            changed
        };

        self.surface.set_now_playing(now_playing.as_ref());
        if !headline_changed {
            return;
        }

        let (title, is_playing) = now_playing
            .map(|n| (n.title, n.is_playing))
            .unwrap_or_default();
        debug!(%title, is_playing, "Now playing updated");
        self.events.emit_lossy(LullEvent::NowPlayingChanged {
            title,
            is_playing,
            timestamp: lull_common::time::now(),
        });
    }

    pub fn current(&self) -> Option<NowPlaying> {
        self.last.lock().clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(listener) = self.listener.lock().take() {
            listener.abort();
        }
        self.surface.set_now_playing(None);
    }
}

impl Drop for RemoteControlBridge {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Now-playing title: playing channel names joined with ", "
pub fn now_playing_title<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(", ")
}
