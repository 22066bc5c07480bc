//! Per-channel controls and sleep timer selection

use super::PlaybackCoordinator;
use crate::channel::ChannelSnapshot;
use crate::error::{Error, Result};
use crate::playback::sleep_timer::{TimerMode, TimerSnapshot};
use tracing::{debug, info, warn};

impl PlaybackCoordinator {
    /// Set one channel's volume
    ///
    /// While the mix plays, dragging a channel to zero pauses only that
    /// channel and dragging it up from zero starts only that channel. The
    /// global intent never changes here, and a paused mix never auto-starts.
    /// The channel start is abandoned when a global transition begins while
    /// it is still loading. Returns the stored (clamped) volume.
    pub async fn set_channel_volume(&self, channel_id: &str, volume: f32) -> Result<f32> {
        let channel = self.channel(channel_id)?;
        let (old, new) = channel.set_volume(volume);

        if self.is_playing() {
            let token = self.channel_token();
            if old > 0.0 && new == 0.0 {
                debug!(channel_id, "Volume dragged to zero, pausing channel");
                channel.pause(None, &token).await;
            } else if old == 0.0 && new > 0.0 {
                debug!(channel_id, "Volume raised from zero, starting channel");
                if let Err(e) = channel.play(None, &token).await {
                    // Already reported by the channel
                    warn!(channel_id, "Channel did not start: {}", e);
                }
            }
            self.refresh_now_playing();
        }
        Ok(new)
    }

    /// Switch one channel's variant
    ///
    /// An unknown channel or variant is the caller's error. Load failures are
    /// channel-local: reported, shown inactive, not returned.
    pub async fn change_channel_variant(&self, channel_id: &str, variant: &str) -> Result<()> {
        let channel = self.channel(channel_id)?;
        let token = self.channel_token();
        match channel.change_variant(variant, &token).await {
            Ok(()) => {}
            Err(e @ Error::UnknownVariant { .. }) => return Err(e),
            Err(e) => warn!(channel_id, variant, "Variant change left channel inactive: {}", e),
        }
        self.refresh_now_playing();
        Ok(())
    }

    pub fn channel_snapshots(&self) -> Vec<ChannelSnapshot> {
        self.channels.iter().map(|c| c.snapshot()).collect()
    }

    pub fn channel_snapshot(&self, channel_id: &str) -> Result<ChannelSnapshot> {
        Ok(self.channel(channel_id)?.snapshot())
    }

    /// Select the sleep timer mode
    ///
    /// Any running countdown is discarded. A fixed mode starts right away
    /// when the mix is playing, otherwise it is armed for the next play.
    pub fn set_timer(&self, mode: TimerMode) -> Result<()> {
        if mode.seconds() == Some(0) {
            return Err(Error::InvalidState(
                "sleep timer needs a non-zero duration".to_string(),
            ));
        }
        *self.timer_mode.lock() = mode;
        self.timer.stop();

        if mode.is_off() {
            info!("Sleep timer off");
            return Ok(());
        }
        if self.is_playing() && self.actually_playing() {
            self.timer.start(mode)?;
        } else {
            info!(seconds = ?mode.seconds(), "Sleep timer armed for next play");
        }
        self.refresh_now_playing();
        Ok(())
    }

    pub fn timer_mode(&self) -> TimerMode {
        *self.timer_mode.lock()
    }

    pub fn timer_snapshot(&self) -> TimerSnapshot {
        self.timer.snapshot()
    }

    /// Countdown text, or `None` when no timer is active
    pub fn timer_display_text(&self) -> Option<String> {
        self.timer.display_text()
    }
}
