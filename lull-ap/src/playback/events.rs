//! Internal playback event sink
//!
//! Remote commands and timer callbacks reach the coordinator through this
//! trait instead of loose callbacks. Components hold the sink as a `Weak`
//! reference; a failed upgrade means the coordinator is gone and the event is
//! dropped with a warning.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Weak};
use tracing::warn;

/// Receiver of remote-control and sleep-timer events
#[async_trait]
pub trait PlaybackEventSink: Send + Sync {
    /// Remote "play" command
    async fn remote_play(&self);

    /// Remote "pause" command
    async fn remote_pause(&self);

    /// Remote "toggle play/pause" command
    async fn remote_toggle(&self);

    /// Sleep timer counted down one second
    fn timer_tick(&self, remaining_seconds: u64);

    /// Sleep timer reached zero; called once per running phase
    async fn timer_expired(&self);
}

/// Weak handle to the sink
pub type SinkRef = Weak<dyn PlaybackEventSink>;

/// Upgrade a sink reference
///
/// A dropped sink is `Error::StaleReference`, logged here so callers only
/// decide whether to drop the event or stop.
pub fn upgrade_sink(sink: &SinkRef, origin: &str) -> Result<Arc<dyn PlaybackEventSink>> {
    sink.upgrade().ok_or_else(|| {
        let err = Error::StaleReference(format!("playback event sink gone ({})", origin));
        warn!(origin, "{}, event dropped", err);
        err
    })
}

/// Sink that ignores every event
///
/// Used where a component runs without a coordinator (tests, tools).
#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait]
impl PlaybackEventSink for NullSink {
    async fn remote_play(&self) {}
    async fn remote_pause(&self) {}
    async fn remote_toggle(&self) {}
    fn timer_tick(&self, _remaining_seconds: u64) {}
    async fn timer_expired(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upgrade_dropped_sink_is_stale_reference() {
        let sink: Arc<dyn PlaybackEventSink> = Arc::new(NullSink);
        let weak: SinkRef = Arc::downgrade(&sink);
        assert!(upgrade_sink(&weak, "timer_tick").is_ok());
        drop(sink);
        match upgrade_sink(&weak, "timer_tick") {
            Err(Error::StaleReference(origin)) => assert!(origin.contains("timer_tick")),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("dropped sink upgraded"),
        }
    }
}
