//! Playback core: fades, channels, sleep timer, route, remote control and
//! the coordinator that ties them together

pub mod channel_controller;
pub mod coordinator;
pub mod events;
pub mod fader;
pub mod remote;
pub mod route;
pub mod sleep_timer;

pub use channel_controller::{ChannelController, ChannelDeps};
pub use coordinator::{CoordinatorDeps, CoordinatorStatus, PlaybackCoordinator};
pub use events::PlaybackEventSink;
pub use fader::{FadeController, FadeOperation, FadeOutcome};
pub use remote::{NowPlaying, RemoteCommand, RemoteCommandSurface, RemoteControlBridge};
pub use route::{Activation, AudioRoute, AudioRouteGuardian, RouteEvent, RouteNotification};
pub use sleep_timer::{SleepTimer, TimerMode, TimerSnapshot};
