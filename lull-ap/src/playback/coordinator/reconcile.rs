//! Reconciliation and lifecycle hooks

use super::PlaybackCoordinator;
use crate::state::PlaybackState;
use tracing::{debug, info, warn};

impl PlaybackCoordinator {
    /// Align the displayed state and the timer with what the channels are
    /// actually doing
    ///
    /// Skipped while a transition is in flight; that transition settles the
    /// state itself.
    pub async fn reconcile(&self) {
        let _gate = self.ops.lock().await;
        if self.any_transition_in_flight() {
            debug!("Reconcile skipped: transition in flight");
            return;
        }

        let actual = PlaybackState::from_playing(self.actually_playing());
        let displayed = self.state.set_playback_state(actual);
        if displayed != actual {
            info!("Reconciled displayed state {} -> {}", displayed, actual);
        }

        if actual.is_playing() {
            self.timer.resume();
        } else {
            self.timer.pause();
        }
        self.refresh_now_playing();
    }

    /// App moved to the background: make pending preference writes durable
    pub async fn enter_background(&self) {
        debug!("Entering background, flushing preferences");
        self.writer.flush().await;
    }

    /// App returned to the foreground
    pub async fn enter_foreground(&self) {
        debug!("Entering foreground, reconciling");
        self.reconcile().await;
    }

    /// Cancel everything, release players, flush preferences and release the
    /// route
    pub async fn shutdown(&self) {
        info!("Playback coordinator shutting down");
        self.shutdown.cancel();
        self.timer.stop();
        self.remote.shutdown();
        self.route.shutdown();
        if let Some(listener) = self.route_listener.lock().take() {
            listener.abort();
        }

        self.settle().await;
        let _gate = self.ops.lock().await;
        for channel in &self.channels {
            channel.teardown();
        }
        self.state.set_playback_state(PlaybackState::Paused);

        self.writer.flush().await;
        if let Err(e) = self.route.deactivate().await {
            warn!("Failed to deactivate audio route: {}", e);
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
