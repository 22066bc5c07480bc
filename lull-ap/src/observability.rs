//! Observability collaborator
//!
//! One-way reporting of recoverable failures with severity and structured
//! context. Reporting never blocks and never affects playback.

use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, error, info, warn};

/// Report severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Debug => write!(f, "debug"),
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A single report: message, severity and key/value context
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub message: String,
    pub severity: Severity,
    pub context: BTreeMap<String, String>,
}

impl Report {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity,
            context: BTreeMap::new(),
        }
    }

    /// Report built from an error value
    pub fn from_error(severity: Severity, err: &dyn std::error::Error) -> Self {
        Self::new(severity, err.to_string())
    }

    /// Attach one context field
    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.context.insert(key.to_string(), value.to_string());
        self
    }

    fn context_string(&self) -> String {
        self.context
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Fire-and-forget receiver of reports
pub trait ObservabilitySink: Send + Sync {
    fn report(&self, report: Report);
}

/// Default sink forwarding reports to `tracing` at the matching level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ObservabilitySink for TracingSink {
    fn report(&self, report: Report) {
        let context = report.context_string();
        match report.severity {
            Severity::Debug => debug!(context = %context, "{}", report.message),
            Severity::Info => info!(context = %context, "{}", report.message),
            Severity::Warning => warn!(context = %context, "{}", report.message),
            Severity::Error => error!(context = %context, "{}", report.message),
        }
    }
}
