//! Event types for the Lull event system
//!
//! Provides shared event definitions and the EventBus used by every
//! playback component to announce state changes.

mod playback_types;

pub use playback_types::{FadeDirection, PlaybackState, TimerPhase};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Lull event types
///
/// Events are broadcast via EventBus and can be serialized for UI transport.
/// All components use this central enum for exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LullEvent {
    /// Displayed mix state changed (Playing ↔ Paused)
    ///
    /// Triggers:
    /// - UI: Update play/pause control
    /// - Platform Integration: Update now-playing surface
    PlaybackStateChanged {
        /// State before change
        old_state: PlaybackState,
        /// State after change
        new_state: PlaybackState,
        /// When state changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One channel started, stopped or changed volume/variant
    ChannelStateChanged {
        /// Stable channel identifier
        channel_id: String,
        /// Whether the channel's player is actually producing audio
        playing: bool,
        /// Channel volume (0.0-1.0)
        volume: f32,
        /// Selected variant
        variant: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A channel failed to load or start and is shown inactive
    ChannelFailed {
        channel_id: String,
        /// Human-readable failure description
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Sleep timer counted down one second
    TimerTick {
        remaining_seconds: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Sleep timer phase changed
    TimerStateChanged {
        phase: TimerPhase,
        remaining_seconds: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Sleep timer reached zero (emitted once per running phase)
    TimerExpired {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Audio route interrupted (call, other app)
    InterruptionBegan {
        /// Whether the mix was playing when the interruption began
        was_playing: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Audio route interruption ended
    InterruptionEnded {
        /// System hint that playback may resume
        should_resume: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Now-playing metadata pushed to the remote-control surface
    NowPlayingChanged {
        title: String,
        is_playing: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Shared output route could not be activated after bounded retries
    RouteActivationFailed {
        attempts: u32,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl LullEvent {
    /// Short event name for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            LullEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            LullEvent::ChannelStateChanged { .. } => "ChannelStateChanged",
            LullEvent::ChannelFailed { .. } => "ChannelFailed",
            LullEvent::TimerTick { .. } => "TimerTick",
            LullEvent::TimerStateChanged { .. } => "TimerStateChanged",
            LullEvent::TimerExpired { .. } => "TimerExpired",
            LullEvent::InterruptionBegan { .. } => "InterruptionBegan",
            LullEvent::InterruptionEnded { .. } => "InterruptionEnded",
            LullEvent::NowPlayingChanged { .. } => "NowPlayingChanged",
            LullEvent::RouteActivationFailed { .. } => "RouteActivationFailed",
        }
    }
}

/// Central event distribution bus
///
/// Wraps a tokio broadcast channel. Cloning the bus shares the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LullEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    ///
    /// # Examples
    ///
    /// ```
    /// use lull_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<LullEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: LullEvent,
    ) -> Result<usize, broadcast::error::SendError<LullEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// # Examples
    ///
    /// ```
    /// use lull_common::events::{EventBus, LullEvent};
    ///
    /// let event_bus = EventBus::new(16);
    /// event_bus.emit_lossy(LullEvent::TimerTick {
    ///     remaining_seconds: 42,
    ///     timestamp: chrono::Utc::now(),
    /// });
    /// ```
    pub fn emit_lossy(&self, event: LullEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_delivers_to_subscribers() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        let count = bus
            .emit(LullEvent::TimerExpired {
                timestamp: chrono::Utc::now(),
            })
            .unwrap();
        assert_eq!(count, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type(), "TimerExpired");
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus
            .emit(LullEvent::TimerTick {
                remaining_seconds: 1,
                timestamp: chrono::Utc::now(),
            })
            .is_err());
        // Lossy emit never fails
        bus.emit_lossy(LullEvent::TimerTick {
            remaining_seconds: 1,
            timestamp: chrono::Utc::now(),
        });
    }

    #[test]
    fn test_event_serialization_tag() {
        let event = LullEvent::ChannelStateChanged {
            channel_id: "rain".to_string(),
            playing: true,
            volume: 0.5,
            variant: "heavy".to_string(),
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ChannelStateChanged");
        assert_eq!(json["channel_id"], "rain");
        assert_eq!(json["playing"], true);
    }
}
