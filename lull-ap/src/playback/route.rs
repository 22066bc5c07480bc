//! Audio route guardian
//!
//! Owns the process-wide output route. All activation requests funnel
//! through one gate, so attempts never overlap. System interruption
//! notifications are turned into [`RouteEvent`]s for the coordinator.

use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Raw notification from the system audio-route surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteNotification {
    InterruptionBegan,
    InterruptionEnded { should_resume: bool },
}

/// System audio-route surface
#[async_trait]
pub trait AudioRoute: Send + Sync {
    async fn activate(&self) -> Result<()>;

    async fn deactivate(&self) -> Result<()>;

    /// Another application currently holds the output
    fn other_audio_active(&self) -> bool;

    fn notifications(&self) -> broadcast::Receiver<RouteNotification>;
}

/// Events derived by the guardian
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteEvent {
    InterruptionBegan,
    InterruptionEnded { should_resume: bool },
    Reactivated,
    ReactivationFailed { attempts: u32, reason: String },
}

/// Result of a successful activation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Activated { attempts: u32 },
    AlreadyActive,
    /// Another app holds the route; nothing was requested
    HeldByOther,
}

pub struct AudioRouteGuardian {
    route: Arc<dyn AudioRoute>,
    max_attempts: u32,
    backoff: Duration,
    gate: tokio::sync::Mutex<()>,
    active: AtomicBool,
    events: broadcast::Sender<RouteEvent>,
    reactivation: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
    listener: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl AudioRouteGuardian {
    pub fn new(route: Arc<dyn AudioRoute>, max_attempts: u32, backoff: Duration) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            route,
            max_attempts: max_attempts.max(1),
            backoff,
            gate: tokio::sync::Mutex::new(()),
            active: AtomicBool::new(false),
            events,
            reactivation: Mutex::new(None),
            listener: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RouteEvent> {
        self.events.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Start forwarding system notifications; idempotent
    pub fn start(self: &Arc<Self>) {
        let mut listener = self.listener.lock();
        if listener.is_some() {
            return;
        }

        let mut notifications = self.route.notifications();
        let guardian = Arc::downgrade(self);
        let shutdown = self.shutdown.clone();
        *listener = Some(tokio::spawn(async move {
            loop {
                let notification = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => return,
                    received = notifications.recv() => received,
                };
                match notification {
                    Ok(notification) => {
                        let Some(guardian) = guardian.upgrade() else {
                            warn!("Stale reference: route guardian dropped, listener exiting");
                            return;
                        };
                        guardian.handle_notification(notification);
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Route listener lagged, {} notification(s) dropped", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        }));
    }

    /// Activate the route with bounded retries
    ///
    /// Attempts are serialized. Between attempts the guardian waits
    /// `attempt * backoff`. Exhausting the attempts yields
    /// `RouteActivationFailure`.
    pub async fn activate(&self) -> Result<Activation> {
        let _gate = self.gate.lock().await;

        if self.is_active() {
            return Ok(Activation::AlreadyActive);
        }
        if self.route.other_audio_active() {
            debug!("Another app holds the audio route, activation skipped");
            return Ok(Activation::HeldByOther);
        }

        let mut last_error = String::new();
        for attempt in 1..=self.max_attempts {
            if self.shutdown.is_cancelled() {
                return Err(Error::InvalidState("route guardian shut down".to_string()));
            }
            match self.route.activate().await {
                Ok(()) => {
                    self.active.store(true, Ordering::Release);
                    info!(attempt, "Audio route activated");
                    return Ok(Activation::Activated { attempts: attempt });
                }
                Err(e) => {
                    warn!(attempt, "Audio route activation failed: {}", e);
                    last_error = e.to_string();
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.backoff * attempt).await;
                    }
                }
            }
        }

        Err(Error::RouteActivationFailure {
            attempts: self.max_attempts,
            reason: last_error,
        })
    }

    pub async fn deactivate(&self) -> Result<()> {
        let _gate = self.gate.lock().await;
        if !self.active.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        self.route.deactivate().await?;
        info!("Audio route deactivated");
        Ok(())
    }

    /// Translate one system notification into guardian events
    pub fn handle_notification(self: &Arc<Self>, notification: RouteNotification) {
        match notification {
            RouteNotification::InterruptionBegan => {
                self.cancel_reactivation();
                self.active.store(false, Ordering::Release);
                info!("Audio route interrupted");
                let _ = self.events.send(RouteEvent::InterruptionBegan);
            }
            RouteNotification::InterruptionEnded { should_resume } => {
                info!(should_resume, "Audio route interruption ended");
                let _ = self.events.send(RouteEvent::InterruptionEnded { should_resume });
                if should_resume {
                    self.spawn_reactivation();
                }
            }
        }
    }

    /// Cancel listener and pending reactivation
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.cancel_reactivation();
        if let Some(listener) = self.listener.lock().take() {
            listener.abort();
        }
    }

    fn spawn_reactivation(self: &Arc<Self>) {
        let token = self.shutdown.child_token();
        let guardian = Arc::downgrade(self);
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            let Some(guardian) = guardian.upgrade() else {
                return;
            };
            let result = tokio::select! {
                biased;
                _ = task_token.cancelled() => return,
                result = guardian.activate() => result,
            };
            let event = match result {
                Ok(_) => RouteEvent::Reactivated,
                Err(Error::RouteActivationFailure { attempts, reason }) => {
                    RouteEvent::ReactivationFailed { attempts, reason }
                }
                Err(e) => RouteEvent::ReactivationFailed {
                    attempts: 0,
                    reason: e.to_string(),
                },
            };
            let _ = guardian.events.send(event);
        });

        if let Some((old_token, _)) = self.reactivation.lock().replace((token, handle)) {
            old_token.cancel();
        }
    }

    fn cancel_reactivation(&self) {
        if let Some((token, _)) = self.reactivation.lock().take() {
            token.cancel();
        }
    }
}

impl Drop for AudioRouteGuardian {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
