//! ClipboardObserver: blocks copy, cut and the context menu on exam content.
//!
//! Keyboard shortcuts are only blocked outside free-text regions, so candidates
//! can still copy and cut within their own typed answer.

use super::{DetectedViolation, Observation, ObserverContext, SignalObserver};
use crate::error::ObserverError;
use crate::signal::{ClipboardShortcut, HostSignal, SignalClass};
use crate::violation::ViolationType;

#[derive(Debug, Default)]
pub struct ClipboardObserver;

impl ClipboardObserver {
    pub fn new() -> Self {
        Self
    }
}

impl SignalObserver for ClipboardObserver {
    fn name(&self) -> &'static str {
        "clipboard"
    }

    fn classes(&self) -> &'static [SignalClass] {
        &[
            SignalClass::Clipboard,
            SignalClass::ContextMenu,
            SignalClass::Keyboard,
        ]
    }

    fn observe(
        &mut self,
        signal: &HostSignal,
        _ctx: &ObserverContext,
    ) -> Result<Observation, ObserverError> {
        let observation = match signal {
            HostSignal::Copy => Observation::blocked(DetectedViolation::new(
                ViolationType::CopyAttempt,
            )),
            HostSignal::Cut => Observation::blocked(
                DetectedViolation::new(ViolationType::CopyAttempt)
                    .with_message("Cutting exam content is disabled"),
            ),
            HostSignal::ContextMenu => Observation::blocked(DetectedViolation::new(
                ViolationType::ContextMenuAttempt,
            )),
            HostSignal::KeyDown { combo, target } => match combo.clipboard_shortcut() {
                Some(_) if target.is_free_text() => Observation::ignored(),
                Some(ClipboardShortcut::Copy) => Observation::blocked(DetectedViolation::new(
                    ViolationType::CopyAttempt,
                )),
                Some(ClipboardShortcut::Cut) => Observation::blocked(
                    DetectedViolation::new(ViolationType::CopyAttempt)
                        .with_message("Cutting exam content is disabled"),
                ),
                None => Observation::ignored(),
            },
            other => {
                return Err(ObserverError::Misrouted {
                    observer: self.name(),
                    class: other.class(),
                })
            }
        };
        Ok(observation)
    }
}
