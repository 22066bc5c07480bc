//! # Lull Common Library
//!
//! Shared code for the Lull ambient mixer:
//! - Event types (LullEvent enum) and the broadcast EventBus
//! - Bootstrap configuration loading and root folder resolution
//! - Fade curve definitions and calculations
//! - Countdown formatting for the sleep timer display

pub mod config;
pub mod error;
pub mod events;
pub mod fade_curves;
pub mod human_time;
pub mod time;

pub use error::{Error, Result};
pub use fade_curves::FadeCurve;
