//! VisibilityObserver: detects the candidate leaving the exam window or tab.
//!
//! Visibility-change and blur/focus usually fire together for one transition, so
//! both feed a single pending "away" slot. Absences no longer than the debounce
//! threshold are discarded as focus flicker.

use super::{DetectedViolation, Observation, ObserverContext, SignalObserver};
use crate::error::ObserverError;
use crate::signal::{HostSignal, SignalClass};
use crate::violation::ViolationType;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

pub struct VisibilityObserver {
    debounce: Duration,
    away_since: Option<Instant>,
}

impl VisibilityObserver {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            away_since: None,
        }
    }

    pub fn is_away(&self) -> bool {
        self.away_since.is_some()
    }

    fn mark_away(&mut self, now: Instant) {
        if self.away_since.is_none() {
            self.away_since = Some(now);
        }
    }

    fn mark_returned(&mut self, now: Instant) -> Observation {
        let Some(since) = self.away_since.take() else {
            return Observation::ignored();
        };

        let away = now.saturating_duration_since(since);
        if away <= self.debounce {
            debug!(
                "[PROCTOR] discarding brief absence ({}ms <= {}ms)",
                away.as_millis(),
                self.debounce.as_millis()
            );
            return Observation::ignored();
        }

        Observation {
            violation: Some(
                DetectedViolation::new(ViolationType::TabSwitch).with_duration(away),
            ),
            ..Observation::default()
        }
    }
}

impl SignalObserver for VisibilityObserver {
    fn name(&self) -> &'static str {
        "visibility"
    }

    fn classes(&self) -> &'static [SignalClass] {
        &[SignalClass::Visibility, SignalClass::Focus]
    }

    fn observe(
        &mut self,
        signal: &HostSignal,
        ctx: &ObserverContext,
    ) -> Result<Observation, ObserverError> {
        match signal {
            HostSignal::VisibilityChange { hidden: true } | HostSignal::WindowBlur => {
                self.mark_away(ctx.now);
                Ok(Observation::ignored())
            }
            HostSignal::VisibilityChange { hidden: false } | HostSignal::WindowFocus => {
                Ok(self.mark_returned(ctx.now))
            }
            other => Err(ObserverError::Misrouted {
                observer: self.name(),
                class: other.class(),
            }),
        }
    }

    fn reset(&mut self) {
        self.away_since = None;
    }
}
