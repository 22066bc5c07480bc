//! Shared playback state
//!
//! Displayed state and event broadcasting shared by the coordinator and its
//! collaborators. The displayed flag is the optimistic UI view of the
//! playback intent; reconciliation keeps it aligned with what the channels
//! are actually doing.

use lull_common::events::{EventBus, LullEvent};
use parking_lot::RwLock;
use tokio::sync::broadcast;

pub use lull_common::events::PlaybackState;

/// Shared state accessible by all components
///
/// Locks are synchronous and never held across an await point.
pub struct SharedState {
    /// Displayed playback state (Playing or Paused)
    playback_state: RwLock<PlaybackState>,

    /// Title last pushed to the now-playing surface
    now_playing_title: RwLock<String>,

    /// Event broadcaster
    events: EventBus,
}

impl SharedState {
    /// Create new shared state; the mix starts paused
    pub fn new(events: EventBus) -> Self {
        Self {
            playback_state: RwLock::new(PlaybackState::Paused),
            now_playing_title: RwLock::new(String::new()),
            events,
        }
    }

    /// Broadcast an event to all listeners
    pub fn broadcast_event(&self, event: LullEvent) {
        // No receivers is OK
        self.events.emit_lossy(event);
    }

    /// Subscribe to the event stream
    pub fn subscribe_events(&self) -> broadcast::Receiver<LullEvent> {
        self.events.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    /// Get displayed playback state
    pub fn playback_state(&self) -> PlaybackState {
        *self.playback_state.read()
    }

    /// Set displayed playback state
    ///
    /// Emits `PlaybackStateChanged` only when the value actually changes.
    /// Returns the previous state.
    pub fn set_playback_state(&self, state: PlaybackState) -> PlaybackState {
        let old = {
            let mut guard = self.playback_state.write();
            std::mem::replace(&mut *guard, state)
        };

        if old != state {
            self.broadcast_event(LullEvent::PlaybackStateChanged {
                old_state: old,
                new_state: state,
                timestamp: lull_common::time::now(),
            });
        }
        old
    }

    pub fn now_playing_title(&self) -> String {
        self.now_playing_title.read().clone()
    }

    pub fn set_now_playing_title(&self, title: String) {
        *self.now_playing_title.write() = title;
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(EventBus::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_state_defaults_to_paused() {
        let state = SharedState::default();
        assert_eq!(state.playback_state(), PlaybackState::Paused);
    }

    #[tokio::test]
    async fn test_state_change_broadcasts_once() {
        let state = SharedState::default();
        let mut rx = state.subscribe_events();

        assert_eq!(
            state.set_playback_state(PlaybackState::Playing),
            PlaybackState::Paused
        );
        // Same value again: no event
        state.set_playback_state(PlaybackState::Playing);

        match rx.recv().await.unwrap() {
            LullEvent::PlaybackStateChanged {
                old_state,
                new_state,
                ..
            } => {
                assert_eq!(old_state, PlaybackState::Paused);
                assert_eq!(new_state, PlaybackState::Playing);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }
}
