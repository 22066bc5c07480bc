//! Operation tickets, actual state and now-playing metadata

use super::PlaybackCoordinator;
use crate::channel::ChannelSnapshot;
use crate::playback::remote::{now_playing_title, NowPlaying};
use crate::playback::sleep_timer::TimerSnapshot;
use crate::state::PlaybackState;
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// The in-flight global transition
#[derive(Debug, Clone)]
pub(crate) struct Operation {
    pub(crate) id: u64,
    pub(crate) target: PlaybackState,
    pub(crate) token: CancellationToken,
}

impl Operation {
    /// Superseded by a newer transition or by shutdown
    pub(crate) fn is_stale(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Whole-mix view for UIs and the command shell
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorStatus {
    pub displayed: PlaybackState,
    pub actually_playing: bool,
    pub now_playing: String,
    pub timer: TimerSnapshot,
    pub timer_text: Option<String>,
    pub channels: Vec<ChannelSnapshot>,
}

impl PlaybackCoordinator {
    /// Start a new transition, cancelling the previous one and its fades
    pub(crate) fn begin_operation(&self, target: PlaybackState) -> Operation {
        let operation = Operation {
            id: self.next_operation_id.fetch_add(1, Ordering::Relaxed) + 1,
            target,
            token: self.shutdown.child_token(),
        };

        if let Some(previous) = self.operation.lock().replace(operation.clone()) {
            if !previous.is_stale() {
                debug!(
                    previous = previous.id,
                    next = operation.id,
                    "Cancelling in-flight transition to {}",
                    previous.target
                );
            }
            previous.token.cancel();
        }

        // Channel-local starts begun before this operation must not outlive it
        let scope = std::mem::replace(&mut *self.channel_scope.lock(), self.shutdown.child_token());
        scope.cancel();
        operation
    }

    /// Token for a channel-local start or pause outside any operation
    pub(crate) fn channel_token(&self) -> CancellationToken {
        self.channel_scope.lock().child_token()
    }

    /// Clear the slot if it still holds this operation
    pub(crate) fn finish_operation(&self, operation: &Operation) {
        let mut slot = self.operation.lock();
        if slot.as_ref().map(|o| o.id) == Some(operation.id) {
            *slot = None;
        }
    }

    /// A live transition toward `target` is already running
    pub(crate) fn transition_in_flight(&self, target: PlaybackState) -> bool {
        self.operation
            .lock()
            .as_ref()
            .map(|o| o.target == target && !o.is_stale())
            .unwrap_or(false)
    }

    pub(crate) fn any_transition_in_flight(&self) -> bool {
        self.operation
            .lock()
            .as_ref()
            .map(|o| !o.is_stale())
            .unwrap_or(false)
    }

    /// Any channel with volume > 0 is producing audio
    pub fn actually_playing(&self) -> bool {
        self.channels
            .iter()
            .any(|c| c.volume() > 0.0 && c.is_actually_playing())
    }

    /// Displayed (optimistic) playback state
    pub fn displayed_state(&self) -> PlaybackState {
        self.state.playback_state()
    }

    pub fn is_playing(&self) -> bool {
        self.displayed_state().is_playing()
    }

    /// Push now-playing metadata derived from the channels and timer
    ///
    /// The title lists the audible channels; while nothing plays the last
    /// title is kept with the playing flag cleared.
    pub(crate) fn refresh_now_playing(&self) {
        let names: Vec<String> = self
            .channels
            .iter()
            .filter(|c| c.volume() > 0.0 && c.is_actually_playing())
            .map(|c| c.display_name())
            .collect();

        let is_playing = !names.is_empty() && self.is_playing();
        let title = if names.is_empty() {
            self.state.now_playing_title()
        } else {
            now_playing_title(&names)
        };

        let timer = self.timer.snapshot();
        let (duration, elapsed) = match timer.total_seconds.filter(|_| timer.is_active) {
            Some(total) => (
                Some(Duration::from_secs(total)),
                Some(Duration::from_secs(total.saturating_sub(timer.remaining_seconds))),
            ),
            None => (None, None),
        };

        self.state.set_now_playing_title(title.clone());
        self.remote.update(Some(NowPlaying {
            title,
            is_playing,
            duration,
            elapsed,
        }));
    }

    pub fn now_playing(&self) -> Option<NowPlaying> {
        self.remote.current()
    }

    pub fn status(&self) -> CoordinatorStatus {
        CoordinatorStatus {
            displayed: self.displayed_state(),
            actually_playing: self.actually_playing(),
            now_playing: self.state.now_playing_title(),
            timer: self.timer.snapshot(),
            timer_text: self.timer.display_text(),
            channels: self.channel_snapshots(),
        }
    }
}
