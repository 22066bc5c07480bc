//! Sleep timer
//!
//! Counts down in one-second ticks while running:
//!
//! ```text
//! Off --start--> Running --pause--> Paused --resume--> Running
//!  ^                |                  |
//!  +---stop/expiry--+-------stop-------+
//! ```
//!
//! Pausing keeps the remaining seconds. Each running phase owns one ticker
//! task and one cancellation token; a phase change bumps an epoch so a tick
//! that was already past its sleep can never apply to the next phase. That
//! rules out double expiry: zero is reached at most once per running phase.

use crate::error::{Error, Result};
use crate::playback::events::{upgrade_sink, SinkRef};
use lull_common::events::{EventBus, LullEvent, TimerPhase};
use lull_common::human_time::format_countdown;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const TICK: Duration = Duration::from_secs(1);

/// Selected timer mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerMode {
    #[default]
    Off,
    Fixed(Duration),
}

impl TimerMode {
    pub fn from_minutes(minutes: u64) -> Self {
        if minutes == 0 {
            TimerMode::Off
        } else {
            TimerMode::Fixed(Duration::from_secs(minutes * 60))
        }
    }

    pub fn is_off(&self) -> bool {
        matches!(self, TimerMode::Off)
    }

    /// Whole seconds of a fixed mode, rounded up
    pub fn seconds(&self) -> Option<u64> {
        match self {
            TimerMode::Off => None,
            TimerMode::Fixed(d) => Some(d.as_secs() + u64::from(d.subsec_nanos() > 0)),
        }
    }
}

/// Point-in-time timer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimerSnapshot {
    pub phase: TimerPhase,
    pub remaining_seconds: u64,
    /// Length of the running/paused countdown
    pub total_seconds: Option<u64>,
    pub is_active: bool,
}

struct TimerInner {
    phase: TimerPhase,
    mode: TimerMode,
    remaining: u64,
    epoch: u64,
    token: Option<CancellationToken>,
    ticker: Option<JoinHandle<()>>,
}

impl TimerInner {
    fn cancel_ticker(&mut self) {
        self.epoch += 1;
        if let Some(token) = self.token.take() {
            token.cancel();
        }
        // Detach rather than abort: an expiring ticker may be delivering its callback
        self.ticker.take();
    }
}

pub struct SleepTimer {
    inner: Arc<Mutex<TimerInner>>,
    sink: SinkRef,
    events: EventBus,
}

impl SleepTimer {
    pub fn new(sink: SinkRef, events: EventBus) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TimerInner {
                phase: TimerPhase::Off,
                mode: TimerMode::Off,
                remaining: 0,
                epoch: 0,
                token: None,
                ticker: None,
            })),
            sink,
            events,
        }
    }

    /// Start a countdown; only valid while the timer is off
    pub fn start(&self, mode: TimerMode) -> Result<()> {
        let seconds = match mode.seconds() {
            Some(s) if s > 0 => s,
            _ => {
                return Err(Error::InvalidState(
                    "sleep timer needs a non-zero duration".to_string(),
                ))
            }
        };

        {
            let mut inner = self.inner.lock();
            if inner.phase != TimerPhase::Off {
                return Err(Error::InvalidState(format!(
                    "sleep timer cannot start while {}",
                    inner.phase
                )));
            }
            inner.mode = mode;
            inner.remaining = seconds;
            inner.phase = TimerPhase::Running;
            self.spawn_ticker(&mut inner);
        }

        info!(remaining_seconds = seconds, "Sleep timer started");
        self.emit_state(TimerPhase::Running, seconds);
        Ok(())
    }

    /// Stop ticking, keeping the remaining time; no-op unless running
    pub fn pause(&self) -> bool {
        let remaining = {
            let mut inner = self.inner.lock();
            if inner.phase != TimerPhase::Running {
                return false;
            }
            inner.cancel_ticker();
            inner.phase = TimerPhase::Paused;
            inner.remaining
        };

        info!(remaining_seconds = remaining, "Sleep timer paused");
        self.emit_state(TimerPhase::Paused, remaining);
        true
    }

    /// Continue from the preserved remaining time; no-op unless paused
    pub fn resume(&self) -> bool {
        let remaining = {
            let mut inner = self.inner.lock();
            if inner.phase != TimerPhase::Paused || inner.remaining == 0 {
                return false;
            }
            inner.phase = TimerPhase::Running;
            self.spawn_ticker(&mut inner);
            inner.remaining
        };

        info!(remaining_seconds = remaining, "Sleep timer resumed");
        self.emit_state(TimerPhase::Running, remaining);
        true
    }

    /// Turn the timer off; idempotent
    pub fn stop(&self) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.phase == TimerPhase::Off {
                return false;
            }
            inner.cancel_ticker();
            inner.phase = TimerPhase::Off;
            inner.mode = TimerMode::Off;
            inner.remaining = 0;
        }

        info!("Sleep timer stopped");
        self.emit_state(TimerPhase::Off, 0);
        true
    }

    pub fn phase(&self) -> TimerPhase {
        self.inner.lock().phase
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.inner.lock().remaining
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        let inner = self.inner.lock();
        TimerSnapshot {
            phase: inner.phase,
            remaining_seconds: inner.remaining,
            total_seconds: inner.mode.seconds(),
            is_active: inner.phase != TimerPhase::Off,
        }
    }

    /// Countdown text for display; `None` while off
    pub fn display_text(&self) -> Option<String> {
        let snapshot = self.snapshot();
        snapshot
            .is_active
            .then(|| format_countdown(snapshot.remaining_seconds))
    }

    fn spawn_ticker(&self, inner: &mut TimerInner) {
        inner.cancel_ticker();
        let token = CancellationToken::new();
        let epoch = inner.epoch;

        let shared = Arc::clone(&self.inner);
        let sink = self.sink.clone();
        let events = self.events.clone();
        let ticker_token = token.clone();

        inner.token = Some(token);
        inner.ticker = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = ticker_token.cancelled() => return,
                    _ = tokio::time::sleep(TICK) => {}
                }

                let (remaining, expired) = {
                    let mut inner = shared.lock();
                    if inner.epoch != epoch || inner.phase != TimerPhase::Running {
                        debug!("Stale timer tick ignored");
                        return;
                    }
                    inner.remaining = inner.remaining.saturating_sub(1);
                    if inner.remaining == 0 {
                        inner.epoch += 1;
                        inner.phase = TimerPhase::Off;
                        inner.mode = TimerMode::Off;
                        inner.token = None;
                        inner.ticker = None;
                        (0, true)
                    } else {
                        (inner.remaining, false)
                    }
                };

                let timestamp = lull_common::time::now();
                events.emit_lossy(LullEvent::TimerTick {
                    remaining_seconds: remaining,
                    timestamp,
                });
                if let Ok(sink) = upgrade_sink(&sink, "timer_tick") {
                    sink.timer_tick(remaining);
                }

                if expired {
                    info!("Sleep timer expired");
                    events.emit_lossy(LullEvent::TimerStateChanged {
                        phase: TimerPhase::Off,
                        remaining_seconds: 0,
                        timestamp,
                    });
                    events.emit_lossy(LullEvent::TimerExpired { timestamp });
                    if let Ok(sink) = upgrade_sink(&sink, "timer_expired") {
                        sink.timer_expired().await;
                    }
                    return;
                }
            }
        }));
    }

    fn emit_state(&self, phase: TimerPhase, remaining_seconds: u64) {
        self.events.emit_lossy(LullEvent::TimerStateChanged {
            phase,
            remaining_seconds,
            timestamp: lull_common::time::now(),
        });
    }
}

impl Drop for SleepTimer {
    fn drop(&mut self) {
        self.inner.lock().cancel_ticker();
    }
}
