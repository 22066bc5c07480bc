//! Per-channel volume ramps
//!
//! A fade is a UI-rate ramp: N discrete volume steps spread over the fade
//! duration at a fixed step rate. At most one fade runs per channel; starting
//! a new one cancels the previous one before the first step is applied.
//!
//! # Cancellation
//!
//! A cancelled fade leaves the player at its last applied volume. Only a fade
//! that runs to completion writes the exact end volume.

use crate::audio::ChannelPlayer;
use lull_common::events::FadeDirection;
use lull_common::FadeCurve;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// One ramp request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeOperation {
    pub direction: FadeDirection,
    pub start_volume: f32,
    pub end_volume: f32,
    pub duration: Duration,
    pub curve: FadeCurve,
}

impl FadeOperation {
    pub fn fade_in(from: f32, to: f32, duration: Duration, curve: FadeCurve) -> Self {
        Self {
            direction: FadeDirection::In,
            start_volume: from,
            end_volume: to,
            duration,
            curve,
        }
    }

    pub fn fade_out(from: f32, duration: Duration, curve: FadeCurve) -> Self {
        Self {
            direction: FadeDirection::Out,
            start_volume: from,
            end_volume: 0.0,
            duration,
            curve,
        }
    }
}

/// How a fade finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeOutcome {
    /// Reached the end volume
    Completed,
    /// Cancelled or replaced mid-ramp
    Cancelled,
}

struct ActiveFade {
    id: u64,
    token: CancellationToken,
}

/// Runs fades for one channel's player
pub struct FadeController {
    steps_per_second: u32,
    next_id: AtomicU64,
    active: Mutex<Option<ActiveFade>>,
}

impl FadeController {
    pub fn new(steps_per_second: u32) -> Self {
        Self {
            steps_per_second: steps_per_second.max(1),
            next_id: AtomicU64::new(0),
            active: Mutex::new(None),
        }
    }

    /// Number of steps for a duration (at least one)
    pub fn step_count(&self, duration: Duration) -> u32 {
        let steps = (duration.as_secs_f64() * self.steps_per_second as f64).ceil();
        (steps as u32).max(1)
    }

    /// Run a fade to completion or cancellation
    ///
    /// Any fade already running on this controller is cancelled first. The
    /// fade also stops when `parent` is cancelled.
    pub async fn run(
        &self,
        player: &Arc<dyn ChannelPlayer>,
        op: FadeOperation,
        parent: &CancellationToken,
    ) -> FadeOutcome {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let token = parent.child_token();
        {
            let mut active = self.active.lock();
            if let Some(previous) = active.replace(ActiveFade {
                id,
                token: token.clone(),
            }) {
                previous.token.cancel();
            }
        }

        if op.duration.is_zero() {
            let applied = self.apply_if_current(id, player, op.end_volume);
            self.clear(id);
            return if applied {
                FadeOutcome::Completed
            } else {
                FadeOutcome::Cancelled
            };
        }

        let steps = self.step_count(op.duration);
        let step_duration = op.duration / steps;
        trace!(steps, ?step_duration, direction = %op.direction, "Fade started");

        for step in 1..=steps {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    self.clear(id);
                    return FadeOutcome::Cancelled;
                }
                _ = tokio::time::sleep(step_duration) => {}
            }

            let volume = if step == steps {
                // Exact end value, no rounding drift
                op.end_volume
            } else {
                op.curve.interpolate(
                    op.direction,
                    op.start_volume,
                    op.end_volume,
                    step as f32 / steps as f32,
                )
            };

            if !self.apply_if_current(id, player, volume) {
                return FadeOutcome::Cancelled;
            }
        }

        self.clear(id);
        FadeOutcome::Completed
    }

    /// Cancel the running fade, if any
    pub fn cancel(&self) {
        if let Some(active) = self.active.lock().take() {
            active.token.cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Apply a step only while this fade is still the current one
    fn apply_if_current(&self, id: u64, player: &Arc<dyn ChannelPlayer>, volume: f32) -> bool {
        let active = self.active.lock();
        match active.as_ref() {
            Some(current) if current.id == id && !current.token.is_cancelled() => {
                player.set_volume(volume);
                true
            }
            _ => false,
        }
    }

    fn clear(&self, id: u64) {
        let mut active = self.active.lock();
        if active.as_ref().map(|a| a.id) == Some(id) {
            *active = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::LoopMixer;

    fn player() -> Arc<dyn ChannelPlayer> {
        let mixer = LoopMixer::new(44_100);
        mixer.add_voice("test", Arc::new(vec![0.0; 8]))
    }

    #[test]
    fn test_step_count() {
        let fader = FadeController::new(20);
        assert_eq!(fader.step_count(Duration::from_secs(1)), 20);
        assert_eq!(fader.step_count(Duration::from_millis(1510)), 31);
        assert_eq!(fader.step_count(Duration::from_millis(1)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_fade_lands_on_exact_end() {
        let fader = FadeController::new(20);
        let player = player();
        let op = FadeOperation::fade_in(0.0, 0.7, Duration::from_millis(1000), FadeCurve::SCurve);

        let outcome = fader.run(&player, op, &CancellationToken::new()).await;
        assert_eq!(outcome, FadeOutcome::Completed);
        assert_eq!(player.volume(), 0.7);
        assert!(!fader.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_leaves_interpolated_volume() {
        let fader = Arc::new(FadeController::new(20));
        let player = player();
        player.set_volume(1.0);
        let op = FadeOperation::fade_out(1.0, Duration::from_secs(1), FadeCurve::Linear);

        let task = {
            let fader = Arc::clone(&fader);
            let player = Arc::clone(&player);
            tokio::spawn(async move { fader.run(&player, op, &CancellationToken::new()).await })
        };

        tokio::time::sleep(Duration::from_millis(520)).await;
        fader.cancel();
        assert_eq!(task.await.unwrap(), FadeOutcome::Cancelled);

        let volume = player.volume();
        assert!(volume > 0.0 && volume < 1.0, "volume snapped to {}", volume);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_fade_replaces_running_one() {
        let fader = Arc::new(FadeController::new(20));
        let player = player();
        let parent = CancellationToken::new();

        let first = {
            let fader = Arc::clone(&fader);
            let player = Arc::clone(&player);
            let parent = parent.clone();
            tokio::spawn(async move {
                let op = FadeOperation::fade_in(0.0, 1.0, Duration::from_secs(2), FadeCurve::Linear);
                fader.run(&player, op, &parent).await
            })
        };
        tokio::time::sleep(Duration::from_millis(300)).await;

        let op = FadeOperation::fade_out(player.volume(), Duration::from_millis(500), FadeCurve::Linear);
        let second = fader.run(&player, op, &parent).await;

        assert_eq!(first.await.unwrap(), FadeOutcome::Cancelled);
        assert_eq!(second, FadeOutcome::Completed);
        assert_eq!(player.volume(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancellation_stops_fade() {
        let fader = FadeController::new(20);
        let player = player();
        let parent = CancellationToken::new();
        parent.cancel();

        let op = FadeOperation::fade_in(0.0, 1.0, Duration::from_secs(1), FadeCurve::Linear);
        assert_eq!(fader.run(&player, op, &parent).await, FadeOutcome::Cancelled);
        assert_eq!(player.volume(), 0.0);
    }

    #[tokio::test]
    async fn test_zero_duration_is_immediate() {
        let fader = FadeController::new(20);
        let player = player();
        let op = FadeOperation::fade_in(0.0, 0.4, Duration::ZERO, FadeCurve::Linear);
        assert_eq!(
            fader.run(&player, op, &CancellationToken::new()).await,
            FadeOutcome::Completed
        );
        assert_eq!(player.volume(), 0.4);
    }
}
