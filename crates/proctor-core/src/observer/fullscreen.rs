//! FullscreenObserver: mirrors fullscreen state and reports strict-mode exits.

use super::{DetectedViolation, Observation, ObserverContext, SignalObserver};
use crate::error::ObserverError;
use crate::notice::Notice;
use crate::signal::{HostSignal, SignalClass};
use crate::violation::ViolationType;
use tracing::debug;

pub struct FullscreenObserver {
    strict: bool,
}

impl FullscreenObserver {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }
}

impl SignalObserver for FullscreenObserver {
    fn name(&self) -> &'static str {
        "fullscreen"
    }

    fn classes(&self) -> &'static [SignalClass] {
        &[SignalClass::Fullscreen]
    }

    fn observe(
        &mut self,
        signal: &HostSignal,
        ctx: &ObserverContext,
    ) -> Result<Observation, ObserverError> {
        let HostSignal::FullscreenChange { is_fullscreen } = *signal else {
            return Err(ObserverError::Misrouted {
                observer: self.name(),
                class: signal.class(),
            });
        };

        let mut observation = Observation {
            fullscreen: Some(is_fullscreen),
            ..Observation::default()
        };

        // Only a real true -> false transition is an exit; repeated change events are not.
        let exited = !is_fullscreen && ctx.is_fullscreen;
        if !exited {
            return Ok(observation);
        }
        if !self.strict {
            debug!("[PROCTOR] fullscreen exited (not strict, not counted)");
            return Ok(observation);
        }

        observation.violation = Some(DetectedViolation::new(ViolationType::FullscreenExit));
        observation.notice = Some(Notice::fullscreen_required());
        observation.request_reentry = !ctx.terminal_latched;
        Ok(observation)
    }
}
