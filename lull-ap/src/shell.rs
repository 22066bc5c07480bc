//! Headless shell support for the `lull-ap` binary
//!
//! Stand-ins for the system audio-route and remote-control surfaces, plus
//! the line-oriented command parser used by the stdin loop.

use crate::error::Result;
use crate::playback::remote::{NowPlaying, RemoteCommand, RemoteCommandSurface};
use crate::playback::route::{AudioRoute, RouteNotification};
use crate::playback::sleep_timer::TimerMode;
use async_trait::async_trait;
use lull_common::human_time::format_countdown;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tracing::info;

/// Audio route that always activates; interruptions are injected by hand
pub struct HeadlessRoute {
    notifications: broadcast::Sender<RouteNotification>,
}

impl HeadlessRoute {
    pub fn new() -> Self {
        let (notifications, _) = broadcast::channel(16);
        Self { notifications }
    }

    /// Inject a system notification
    pub fn simulate(&self, notification: RouteNotification) {
        let _ = self.notifications.send(notification);
    }
}

impl Default for HeadlessRoute {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioRoute for HeadlessRoute {
    async fn activate(&self) -> Result<()> {
        Ok(())
    }

    async fn deactivate(&self) -> Result<()> {
        Ok(())
    }

    fn other_audio_active(&self) -> bool {
        false
    }

    fn notifications(&self) -> broadcast::Receiver<RouteNotification> {
        self.notifications.subscribe()
    }
}

/// Remote surface that logs now-playing updates and lets the shell press
/// remote buttons
#[derive(Default)]
pub struct ConsoleRemote {
    commands: Mutex<Option<mpsc::UnboundedSender<RemoteCommand>>>,
}

impl ConsoleRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a command as if pressed on the system surface
    pub fn press(&self, command: RemoteCommand) -> bool {
        self.commands
            .lock()
            .as_ref()
            .map(|tx| tx.send(command).is_ok())
            .unwrap_or(false)
    }
}

impl RemoteCommandSurface for ConsoleRemote {
    fn register(&self, commands: mpsc::UnboundedSender<RemoteCommand>) {
        *self.commands.lock() = Some(commands);
    }

    fn set_now_playing(&self, now_playing: Option<&NowPlaying>) {
        match now_playing {
            Some(np) => {
                let remaining = match (np.duration, np.elapsed) {
                    (Some(total), Some(elapsed)) => {
                        format!(" [{}]", format_countdown(total.saturating_sub(elapsed).as_secs()))
                    }
                    _ => String::new(),
                };
                info!(
                    "Now playing: {} ({}){}",
                    if np.title.is_empty() { "-" } else { &np.title },
                    if np.is_playing { "playing" } else { "paused" },
                    remaining
                );
            }
            None => info!("Now playing cleared"),
        }
    }
}

/// One shell command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Toggle,
    Play,
    Pause,
    Volume { channel_id: String, volume: f32 },
    Variant { channel_id: String, variant: String },
    Timer(TimerMode),
    Remote(RemoteCommand),
    Background,
    Foreground,
    Interrupt,
    Resume { should_resume: bool },
    Status,
    Help,
    Quit,
}

/// Parse one input line
///
/// Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> std::result::Result<Option<Command>, String> {
    let mut parts = line.split_whitespace();
    let Some(word) = parts.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = parts.collect();

    let command = match (word.to_lowercase().as_str(), args.as_slice()) {
        ("toggle" | "t", []) => Command::Toggle,
        ("play", []) => Command::Play,
        ("pause", []) => Command::Pause,
        ("vol" | "volume", [id, value]) => {
            let volume = value
                .parse::<f32>()
                .map_err(|_| format!("invalid volume '{}'", value))?;
            Command::Volume {
                channel_id: id.to_string(),
                volume,
            }
        }
        ("variant", [id, variant]) => Command::Variant {
            channel_id: id.to_string(),
            variant: variant.to_string(),
        },
        ("timer", ["off"]) => Command::Timer(TimerMode::Off),
        ("timer", [minutes]) => {
            let minutes = minutes
                .parse::<u64>()
                .map_err(|_| format!("invalid minutes '{}'", minutes))?;
            Command::Timer(TimerMode::from_minutes(minutes))
        }
        ("remote", [action]) => Command::Remote(match *action {
            "play" => RemoteCommand::Play,
            "pause" => RemoteCommand::Pause,
            "toggle" => RemoteCommand::Toggle,
            other => return Err(format!("unknown remote command '{}'", other)),
        }),
        ("background" | "bg", []) => Command::Background,
        ("foreground" | "fg", []) => Command::Foreground,
        ("interrupt", []) => Command::Interrupt,
        ("resume", []) => Command::Resume { should_resume: true },
        ("resume", ["nohint"]) => Command::Resume {
            should_resume: false,
        },
        ("status" | "s", []) => Command::Status,
        ("help" | "?", []) => Command::Help,
        ("quit" | "exit" | "q", []) => Command::Quit,
        (other, _) => return Err(format!("unknown command or arguments: '{}'", other)),
    };
    Ok(Some(command))
}

pub const HELP: &str = "\
commands:
  toggle | play | pause
  vol <channel> <0.0-1.0>
  variant <channel> <name>
  timer <minutes|off>
  remote <play|pause|toggle>
  background | foreground
  interrupt | resume [nohint]
  status | help | quit";
