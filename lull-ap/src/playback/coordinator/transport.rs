//! Global play/pause transitions

use super::core::Operation;
use super::PlaybackCoordinator;
use crate::error::{Error, Result};
use crate::observability::{Report, Severity};
use crate::playback::channel_controller::ChannelController;
use crate::state::PlaybackState;
use futures::future::join_all;
use lull_common::events::{LullEvent, TimerPhase};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

impl PlaybackCoordinator {
    /// User pressed play/pause
    ///
    /// The displayed state flips immediately; the transition runs in the
    /// background and cancels any transition still in flight. Returns the new
    /// displayed state.
    pub fn toggle(&self) -> PlaybackState {
        let target = self.state.playback_state().toggled();
        let Ok(this) = self.strong_self("toggle") else {
            return self.state.playback_state();
        };

        // The user took over from any interruption-driven pause
        self.paused_by_interruption.store(false, Ordering::SeqCst);

        let operation = self.begin_operation(target);
        self.state.set_playback_state(target);
        info!(op = operation.id, "Toggle: {}", target);

        let fade = match target {
            PlaybackState::Playing => self.settings.fade_in(),
            PlaybackState::Paused => self.settings.fade_out(),
        };
        this.spawn_transition(operation, Some(fade));
        target
    }

    /// Run a begun operation on its own task
    pub(crate) fn spawn_transition(self: &Arc<Self>, operation: Operation, fade: Option<Duration>) {
        let this = Arc::clone(self);
        let target = operation.target;
        let handle = tokio::spawn(async move {
            match target {
                PlaybackState::Playing => {
                    if let Err(e) = this.run_play(operation, fade).await {
                        warn!("Transition to {} failed: {}", target, e);
                    }
                }
                PlaybackState::Paused => this.run_pause(operation, fade).await,
            }
        });

        let mut tasks = self.transitions.lock();
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
    }

    /// Reconcile once the transitions spawned so far have finished
    pub(crate) fn spawn_follow_up_reconcile(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            this.settle_transitions().await;
            this.reconcile().await;
        });

        let mut tasks = self.follow_ups.lock();
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
    }

    /// Wait until every spawned transition and follow-up has finished
    pub async fn settle(&self) {
        loop {
            self.settle_transitions().await;
            let pending: Vec<_> = self.follow_ups.lock().drain(..).collect();
            if pending.is_empty() && self.transitions.lock().is_empty() {
                return;
            }
            join_tasks(pending, "Follow-up").await;
        }
    }

    async fn settle_transitions(&self) {
        loop {
            let pending: Vec<_> = self.transitions.lock().drain(..).collect();
            if pending.is_empty() {
                return;
            }
            join_tasks(pending, "Transition").await;
        }
    }

    /// Play every channel with volume > 0
    ///
    /// Suppressed when a play transition is already in flight, or when the
    /// intent is already "playing" and the mix is actually playing.
    pub async fn play_all(&self, fade: Option<Duration>) -> Result<()> {
        match self.begin_play() {
            Some(operation) => self.run_play(operation, fade).await,
            None => Ok(()),
        }
    }

    /// Pause every channel with volume > 0 (and any still audible)
    ///
    /// Suppressed when a pause transition is already in flight, or when the
    /// intent is already "paused" and nothing is audible.
    pub async fn pause_all(&self, fade: Option<Duration>) -> Result<()> {
        if let Some(operation) = self.begin_pause() {
            self.run_pause(operation, fade).await;
        }
        Ok(())
    }

    /// Begin a play operation unless one is redundant
    pub(crate) fn begin_play(&self) -> Option<Operation> {
        if self.transition_in_flight(PlaybackState::Playing) {
            debug!("play_all suppressed: play already in flight");
            return None;
        }
        if !self.any_transition_in_flight() && self.is_playing() && self.actually_playing() {
            debug!("play_all suppressed: already playing");
            return None;
        }

        let operation = self.begin_operation(PlaybackState::Playing);
        self.state.set_playback_state(PlaybackState::Playing);
        Some(operation)
    }

    /// Begin a pause operation unless one is redundant
    pub(crate) fn begin_pause(&self) -> Option<Operation> {
        if self.transition_in_flight(PlaybackState::Paused) {
            debug!("pause_all suppressed: pause already in flight");
            return None;
        }
        if !self.any_transition_in_flight() && !self.is_playing() && !self.actually_playing() {
            debug!("pause_all suppressed: already paused");
            self.timer.pause();
            return None;
        }

        let operation = self.begin_operation(PlaybackState::Paused);
        self.state.set_playback_state(PlaybackState::Paused);
        Some(operation)
    }

    pub(crate) async fn run_play(&self, operation: Operation, fade: Option<Duration>) -> Result<()> {
        let _gate = self.ops.lock().await;
        if operation.is_stale() {
            debug!(op = operation.id, "Play transition superseded before start");
            return Ok(());
        }

        if let Err(e) = self.route.activate().await {
            if operation.is_stale() {
                return Ok(());
            }
            self.fail_activation(&operation, &e);
            return Err(e);
        }
        if operation.is_stale() {
            debug!(op = operation.id, "Play transition superseded during route activation");
            return Ok(());
        }

        self.sync_timer_for_play();

        let targets: Vec<Arc<ChannelController>> = self
            .channels
            .iter()
            .filter(|c| c.volume() > 0.0)
            .cloned()
            .collect();

        let results = join_all(targets.iter().map(|c| c.play(fade, &operation.token))).await;

        if operation.is_stale() {
            debug!(op = operation.id, "Play transition superseded during fan-out");
            return Ok(());
        }

        let failed = results.iter().filter(|r| r.is_err()).count();
        if targets.is_empty() {
            debug!("No channel has volume, mix stays silent");
        } else if failed == targets.len() {
            warn!(failed, "Every channel failed to start, reverting to paused");
            self.state.set_playback_state(PlaybackState::Paused);
            self.timer.pause();
        } else if failed > 0 {
            warn!(failed, started = targets.len() - failed, "Some channels failed to start");
        }

        self.finish_operation(&operation);
        self.refresh_now_playing();
        info!(op = operation.id, channels = targets.len() - failed, "Mix playing");
        Ok(())
    }

    pub(crate) async fn run_pause(&self, operation: Operation, fade: Option<Duration>) {
        let _gate = self.ops.lock().await;
        if operation.is_stale() {
            debug!(op = operation.id, "Pause transition superseded before start");
            return;
        }

        self.timer.pause();

        let targets: Vec<Arc<ChannelController>> = self
            .channels
            .iter()
            .filter(|c| c.volume() > 0.0 || c.is_actually_playing())
            .cloned()
            .collect();

        join_all(targets.iter().map(|c| c.pause(fade, &operation.token))).await;

        if operation.is_stale() {
            debug!(op = operation.id, "Pause transition superseded during fan-out");
            return;
        }

        self.finish_operation(&operation);
        self.refresh_now_playing();
        info!(op = operation.id, "Mix paused");
    }

    /// Resume a paused timer, or start the selected mode when none is running
    fn sync_timer_for_play(&self) {
        let mode = *self.timer_mode.lock();
        if mode.is_off() {
            return;
        }
        match self.timer.phase() {
            TimerPhase::Paused => {
                self.timer.resume();
            }
            TimerPhase::Off => {
                if let Err(e) = self.timer.start(mode) {
                    warn!("Sleep timer not started: {}", e);
                }
            }
            TimerPhase::Running => {}
        }
    }

    fn fail_activation(&self, operation: &Operation, err: &Error) {
        error!("Audio route activation failed: {}", err);
        self.state.set_playback_state(PlaybackState::Paused);
        self.timer.pause();

        let attempts = match err {
            Error::RouteActivationFailure { attempts, .. } => *attempts,
            _ => 0,
        };
        self.observability.report(
            Report::from_error(Severity::Error, err).with("attempts", attempts),
        );
        self.events().emit_lossy(LullEvent::RouteActivationFailed {
            attempts,
            error: err.to_string(),
            timestamp: lull_common::time::now(),
        });

        self.finish_operation(operation);
        self.refresh_now_playing();
    }
}

async fn join_tasks(tasks: Vec<JoinHandle<()>>, kind: &str) {
    for task in tasks {
        if let Err(e) = task.await {
            if !e.is_cancelled() {
                error!("{} task failed: {}", kind, e);
            }
        }
    }
}
