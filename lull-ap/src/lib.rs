//! # Lull Audio Player Library (lull-ap)
//!
//! Multi-channel ambient mixer core.
//!
//! **Purpose:** Mix independently controlled looping channels, fade them in
//! and out, run a sleep timer that fades the mix to silence, and keep one
//! authoritative play/pause intent consistent across user presses, remote
//! commands, audio interruptions and app lifecycle transitions.
//!
//! **Architecture:** symphonia + rubato clip decoding into an in-process loop
//! mixer, driven by a tokio playback coordinator.

pub mod audio;
pub mod channel;
pub mod config;
pub mod error;
pub mod observability;
pub mod persistence;
pub mod playback;
pub mod shell;
pub mod state;

pub use error::{Error, Result};
pub use playback::PlaybackCoordinator;
pub use state::SharedState;
