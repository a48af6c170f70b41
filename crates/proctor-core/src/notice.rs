//! Candidate-facing notices. Rendering belongs to the exam UI; timing and content
//! are decided here.

use crate::violation::ViolationType;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum Notice {
    /// Transient warning for a non-terminal violation.
    ViolationWarning {
        kind: ViolationType,
        message: String,
        /// Violations left before the budget runs out; `None` once a non-strict session is past it.
        remaining: Option<u32>,
        dismiss_after_ms: u64,
    },
    /// Blocking notice shown after a strict fullscreen exit.
    FullscreenRequired { message: String },
    /// Blocking terminal notice; the exam is submitted when the grace delay elapses.
    AutoSubmitPending {
        total: u32,
        message: String,
        submit_in_ms: u64,
    },
    /// Non-fatal host failure such as a denied fullscreen request.
    EnvironmentError {
        message: String,
        dismiss_after_ms: u64,
    },
}

impl Notice {
    pub(crate) fn violation_warning(
        kind: ViolationType,
        message: impl Into<String>,
        remaining: Option<u32>,
        dismiss_after: Duration,
    ) -> Self {
        let base = message.into();
        let message = match remaining {
            Some(1) => format!("{}. 1 violation remaining before your exam is flagged.", base),
            Some(n) => format!("{}. {} violations remaining before your exam is flagged.", base, n),
            None => format!("{}. This violation has been recorded.", base),
        };
        Notice::ViolationWarning {
            kind,
            message,
            remaining,
            dismiss_after_ms: dismiss_after.as_millis() as u64,
        }
    }

    pub(crate) fn fullscreen_required() -> Self {
        Notice::FullscreenRequired {
            message: "This exam must be taken in fullscreen mode. Returning to fullscreen."
                .to_string(),
        }
    }

    pub(crate) fn auto_submit_pending(total: u32, grace: Duration) -> Self {
        Notice::AutoSubmitPending {
            total,
            message: format!(
                "Maximum violations reached ({}). Your exam will be submitted automatically.",
                total
            ),
            submit_in_ms: grace.as_millis() as u64,
        }
    }

    pub(crate) fn environment_error(message: impl Into<String>, dismiss_after: Duration) -> Self {
        Notice::EnvironmentError {
            message: message.into(),
            dismiss_after_ms: dismiss_after.as_millis() as u64,
        }
    }

    /// Blocking notices stay up until the UI clears them.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            Notice::FullscreenRequired { .. } | Notice::AutoSubmitPending { .. }
        )
    }

    pub fn dismiss_after(&self) -> Option<Duration> {
        match self {
            Notice::ViolationWarning {
                dismiss_after_ms, ..
            }
            | Notice::EnvironmentError {
                dismiss_after_ms, ..
            } => Some(Duration::from_millis(*dismiss_after_ms)),
            _ => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Notice::ViolationWarning { message, .. }
            | Notice::FullscreenRequired { message }
            | Notice::AutoSubmitPending { message, .. }
            | Notice::EnvironmentError { message, .. } => message,
        }
    }
}
