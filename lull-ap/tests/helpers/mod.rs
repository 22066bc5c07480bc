//! Test helper modules for Lull Audio Player integration tests
//!
//! - mocks: scripted engine/player, route, remote surface and report sink
//! - audio_generator: deterministic WAV clips for decoder tests
//! - harness: coordinator wired to the mocks

#![allow(dead_code)]

pub mod audio_generator;
pub mod harness;
pub mod mocks;

pub use harness::{channel, mix, Harness};
pub use mocks::{MockEngine, MockPlayer, RecordingRemote, RecordingSink, ScriptedRoute};
