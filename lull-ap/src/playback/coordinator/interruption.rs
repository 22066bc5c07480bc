//! Audio route interruption handling

use super::PlaybackCoordinator;
use crate::observability::{Report, Severity};
use crate::playback::route::RouteEvent;
use lull_common::events::LullEvent;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

impl PlaybackCoordinator {
    pub(super) fn spawn_route_listener(self: &Arc<Self>) {
        let mut listener = self.route_listener.lock();
        if listener.is_some() {
            return;
        }

        let mut events = self.route.subscribe();
        let coordinator = Arc::downgrade(self);
        let shutdown = self.shutdown.clone();
        *listener = Some(tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => return,
                    event = events.recv() => event,
                };
                match event {
                    Ok(event) => {
                        let Some(coordinator) = coordinator.upgrade() else {
                            warn!("Stale reference: coordinator dropped, route listener exiting");
                            return;
                        };
                        coordinator.handle_route_event(event);
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Route event listener lagged, {} event(s) dropped", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        }));
    }

    /// React to one route event
    ///
    /// An interruption pauses the mix immediately when it was playing and
    /// remembers that; the end of the interruption resumes only a mix that
    /// the interruption itself paused, and only with the resume hint.
    ///
    /// The decision and the new operation are taken before returning; the
    /// pause or resume itself runs on its own task, so the next event can
    /// cancel it (an interruption arriving mid resume fade).
    pub fn handle_route_event(self: &Arc<Self>, event: RouteEvent) {
        match event {
            RouteEvent::InterruptionBegan => {
                let was_playing = self.is_playing();
                self.events().emit_lossy(LullEvent::InterruptionBegan {
                    was_playing,
                    timestamp: lull_common::time::now(),
                });
                if !was_playing {
                    debug!("Interruption while paused, nothing to do");
                    return;
                }

                info!("Interruption began, pausing mix");
                self.paused_by_interruption.store(true, Ordering::SeqCst);
                if let Some(operation) = self.begin_pause() {
                    self.spawn_transition(operation, None);
                }
            }
            RouteEvent::InterruptionEnded { should_resume } => {
                self.events().emit_lossy(LullEvent::InterruptionEnded {
                    should_resume,
                    timestamp: lull_common::time::now(),
                });

                let caused_pause = self.paused_by_interruption.swap(false, Ordering::SeqCst);
                if should_resume && caused_pause {
                    info!("Interruption ended, resuming mix");
                    if let Some(operation) = self.begin_play() {
                        let fade = Some(self.settings.interruption_resume_fade());
                        self.spawn_transition(operation, fade);
                    }
                } else {
                    debug!(should_resume, caused_pause, "Interruption ended without resume");
                }
            }
            RouteEvent::Reactivated => debug!("Audio route reactivated after interruption"),
            RouteEvent::ReactivationFailed { attempts, reason } => {
                warn!(attempts, "Audio route reactivation failed: {}", reason);
                self.observability.report(
                    Report::new(Severity::Warning, "audio route reactivation failed")
                        .with("attempts", attempts)
                        .with("reason", reason),
                );
            }
        }
    }
}
