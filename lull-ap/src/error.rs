//! Error types for lull-ap
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//! Channel-local failures are converted into reported events at the
//! coordinator boundary; only the coordinator's own failures (route
//! activation, invalid requests) surface to callers.

use thiserror::Error;

/// Main error type for lull-ap
#[derive(Error, Debug)]
pub enum Error {
    /// Requested audio source is absent; never substituted
    #[error("Resource missing: channel '{channel_id}' variant '{variant}'")]
    ResourceMissing { channel_id: String, variant: String },

    /// Player failed to start despite a previously valid engine
    #[error("Audio engine invalidated: {0}")]
    EngineInvalidated(String),

    /// Shared output route could not be activated after bounded retries
    #[error("Route activation failed after {attempts} attempt(s): {reason}")]
    RouteActivationFailure { attempts: u32, reason: String },

    /// A cancelled operation's continuation ran after its owner was replaced
    #[error("Stale reference: {0}")]
    StaleReference(String),

    /// Channel definition violates the data model
    #[error("Invalid channel: {0}")]
    InvalidChannel(String),

    /// No channel with this identifier
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    /// Variant not in the channel's available variants
    #[error("Unknown variant '{variant}' for channel '{channel_id}'")]
    UnknownVariant { channel_id: String, variant: String },

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Preference persistence errors
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from the shared library
    #[error(transparent)]
    Common(#[from] lull_common::Error),
}

impl Error {
    /// Whether one teardown-and-reload attempt may recover from this failure
    ///
    /// A missing resource is never retried: there is nothing to reload.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::EngineInvalidated(_) | Error::Decode(_) | Error::Io(_)
        )
    }
}

/// Convenience Result type using lull-ap Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::EngineInvalidated("suspended".into()).is_transient());
        assert!(Error::Decode("bad packet".into()).is_transient());
        assert!(!Error::ResourceMissing {
            channel_id: "rain".into(),
            variant: "heavy".into()
        }
        .is_transient());
        assert!(!Error::RouteActivationFailure {
            attempts: 3,
            reason: "busy".into()
        }
        .is_transient());
    }

    #[test]
    fn test_display_messages() {
        let err = Error::ResourceMissing {
            channel_id: "rain".into(),
            variant: "heavy".into(),
        };
        assert_eq!(
            err.to_string(),
            "Resource missing: channel 'rain' variant 'heavy'"
        );
        let err = Error::RouteActivationFailure {
            attempts: 3,
            reason: "held".into(),
        };
        assert!(err.to_string().contains("3 attempt"));
    }
}
