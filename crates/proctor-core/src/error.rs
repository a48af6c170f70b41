//! Error types for the proctoring monitor

use crate::signal::SignalClass;
use thiserror::Error;

/// Result type alias for monitor operations
pub type ProctorResult<T> = Result<T, ProctorError>;

/// Errors reported by the host platform (fullscreen API, event subscriptions).
///
/// These are recoverable: the monitor logs them, surfaces an
/// `environment_error` notice and keeps the session running.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("fullscreen request denied: {0}")]
    FullscreenDenied(String),

    #[error("fullscreen API unavailable")]
    FullscreenUnavailable,

    #[error("cannot subscribe to {class} signals: {reason}")]
    Subscription { class: SignalClass, reason: String },
}

/// Errors that can occur while configuring or driving a proctoring session
#[derive(Error, Debug)]
pub enum ProctorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No proctoring host supplied")]
    MissingHost,

    #[error("An auto-submit handler is required when strict fullscreen is enabled")]
    MissingAutoSubmit,

    #[error("Violations cannot be reset while proctoring is active")]
    ResetWhileActive,

    #[error("No tokio runtime available: {0}")]
    Runtime(String),

    #[error("Host error: {0}")]
    Host(#[from] HostError),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),
}

/// A fault raised by a single observer while handling one signal.
///
/// The observer set contains these per observer so one failing observer
/// cannot silence the others.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ObserverError {
    #[error("{observer} observer received a {class} signal it does not handle")]
    Misrouted {
        observer: &'static str,
        class: SignalClass,
    },
}
