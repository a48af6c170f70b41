//! Signal observers: each one subscribes to a class of host signal and turns raw
//! signals into classified observations.
//!
//! - **VisibilityObserver**: tab / window absences, debounced
//! - **ClipboardObserver**: copy, cut, context menu and their keyboard equivalents
//! - **FullscreenObserver**: fullscreen exits and the re-entry request
//!
//! Observers never write violation state themselves. They describe what they saw
//! and the session controller routes it through the recorder.

pub mod clipboard;
pub mod fullscreen;
pub mod visibility;

pub use clipboard::ClipboardObserver;
pub use fullscreen::FullscreenObserver;
pub use visibility::VisibilityObserver;

use crate::config::{ProctorTimings, ProctoringConfig};
use crate::error::{HostError, ObserverError};
use crate::host::ProctorHost;
use crate::notice::Notice;
use crate::signal::{HostSignal, SignalClass, SignalDisposition};
use crate::violation::ViolationType;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Session facts an observer may consult while handling a signal.
#[derive(Debug, Clone, Copy)]
pub struct ObserverContext {
    pub now: Instant,
    /// Last known fullscreen state.
    pub is_fullscreen: bool,
    /// The terminal auto-submit latch has fired.
    pub terminal_latched: bool,
}

/// A violation an observer wants recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedViolation {
    pub kind: ViolationType,
    pub duration: Option<Duration>,
    pub message: String,
}

impl DetectedViolation {
    pub fn new(kind: ViolationType) -> Self {
        Self {
            kind,
            duration: None,
            message: kind.describe().to_string(),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// What one observer concluded about one signal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observation {
    pub disposition: SignalDisposition,
    pub violation: Option<DetectedViolation>,
    /// New fullscreen state to mirror.
    pub fullscreen: Option<bool>,
    /// Ask for one deferred fullscreen re-entry attempt.
    pub request_reentry: bool,
    /// Extra notice to surface alongside any violation warning.
    pub notice: Option<Notice>,
}

impl Observation {
    pub fn ignored() -> Self {
        Self::default()
    }

    pub fn blocked(violation: DetectedViolation) -> Self {
        Self {
            disposition: SignalDisposition::PreventDefault,
            violation: Some(violation),
            ..Self::default()
        }
    }
}

pub trait SignalObserver: Send {
    fn name(&self) -> &'static str;

    /// Signal classes this observer subscribes to.
    fn classes(&self) -> &'static [SignalClass];

    fn observe(
        &mut self,
        signal: &HostSignal,
        ctx: &ObserverContext,
    ) -> Result<Observation, ObserverError>;

    /// Drop any pending per-session state. Called on detach.
    fn reset(&mut self) {}
}

/// The observers attached for one Active period. Dropping the set releases nothing
/// by itself; `detach` must be called with the host to unsubscribe.
pub struct ObserverSet {
    observers: Vec<Box<dyn SignalObserver>>,
}

impl ObserverSet {
    /// Build the observers enabled by `config` and subscribe each of them with the host.
    ///
    /// An observer whose subscription fails is left out; the others still attach.
    pub fn attach(
        config: &ProctoringConfig,
        timings: &ProctorTimings,
        host: &mut dyn ProctorHost,
    ) -> (Self, Vec<HostError>) {
        let mut candidates: Vec<Box<dyn SignalObserver>> = Vec::new();
        if config.enable_tab_detection {
            candidates.push(Box::new(VisibilityObserver::new(timings.tab_switch_debounce)));
        }
        if config.enable_copy_block {
            candidates.push(Box::new(ClipboardObserver::new()));
        }
        if config.enable_fullscreen_mode {
            candidates.push(Box::new(FullscreenObserver::new(config.strict_fullscreen)));
        }

        let mut observers = Vec::with_capacity(candidates.len());
        let mut failures = Vec::new();

        for observer in candidates {
            let mut attached = Vec::new();
            let mut failed = None;
            for &class in observer.classes() {
                match host.attach(class) {
                    Ok(()) => attached.push(class),
                    Err(e) => {
                        failed = Some(e);
                        break;
                    }
                }
            }

            match failed {
                None => {
                    debug!("[PROCTOR] {} observer attached", observer.name());
                    observers.push(observer);
                }
                Some(e) => {
                    warn!(
                        "[PROCTOR] {} observer disabled: {}",
                        observer.name(),
                        e
                    );
                    for class in attached {
                        host.detach(class);
                    }
                    failures.push(e);
                }
            }
        }

        (Self { observers }, failures)
    }

    /// Unsubscribe every observer and clear their pending state.
    pub fn detach(mut self, host: &mut dyn ProctorHost) {
        for observer in self.observers.iter_mut() {
            observer.reset();
            for &class in observer.classes() {
                host.detach(class);
            }
            debug!("[PROCTOR] {} observer detached", observer.name());
        }
    }

    /// Route a signal to every observer subscribed to its class.
    ///
    /// A failing observer is logged and skipped; the rest still see the signal.
    pub fn dispatch(&mut self, signal: &HostSignal, ctx: &ObserverContext) -> Vec<Observation> {
        let class = signal.class();
        let mut observations = Vec::new();
        for observer in self.observers.iter_mut() {
            if !observer.classes().contains(&class) {
                continue;
            }
            match observer.observe(signal, ctx) {
                Ok(observation) => observations.push(observation),
                Err(e) => warn!("[PROCTOR] observer fault contained: {}", e),
            }
        }
        observations
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.observers.iter().map(|o| o.name()).collect()
    }
}
