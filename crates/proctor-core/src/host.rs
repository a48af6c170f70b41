//! The host platform seam: fullscreen control and signal subscriptions.

use crate::error::HostError;
use crate::signal::{HostSignal, SignalClass};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::debug;

/// Platform services the monitor needs from its host (browser shell, kiosk, lockdown app).
///
/// Implementations must not call back into the monitor synchronously: the monitor
/// holds its session lock while it talks to the host. Signals produced as a result
/// of a host call (e.g. a `fullscreen_change` after a successful request) should be
/// delivered later through `ProctorMonitor::handle_signal`.
pub trait ProctorHost: Send {
    fn is_fullscreen(&self) -> bool;

    fn request_fullscreen(&mut self) -> Result<(), HostError>;

    fn exit_fullscreen(&mut self) -> Result<(), HostError>;

    /// Start delivering signals of `class`. Hosts that always deliver can keep the default.
    fn attach(&mut self, class: SignalClass) -> Result<(), HostError> {
        let _ = class;
        Ok(())
    }

    /// Stop delivering signals of `class`.
    fn detach(&mut self, class: SignalClass) {
        let _ = class;
    }
}

#[derive(Debug, Default)]
struct SimulatedState {
    fullscreen: bool,
    deny_fullscreen: bool,
    unavailable: HashSet<SignalClass>,
    attached: HashSet<SignalClass>,
    fullscreen_requests: u32,
    exit_requests: u32,
}

/// In-process host for tests and scripted replays.
///
/// Cloning yields another handle onto the same simulated platform, so a test can
/// keep one handle while the monitor owns the other.
#[derive(Debug, Clone, Default)]
pub struct SimulatedHost {
    state: Arc<Mutex<SimulatedState>>,
    feedback: Option<mpsc::UnboundedSender<HostSignal>>,
}

impl SimulatedHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Echo `fullscreen_change` signals into `tx` whenever the fullscreen state changes,
    /// the way a browser fires `fullscreenchange`.
    pub fn with_feedback(mut self, tx: mpsc::UnboundedSender<HostSignal>) -> Self {
        self.feedback = Some(tx);
        self
    }

    fn lock(&self) -> MutexGuard<'_, SimulatedState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make subsequent fullscreen requests fail.
    pub fn deny_fullscreen(&self, deny: bool) {
        self.lock().deny_fullscreen = deny;
    }

    /// Make `attach` fail for `class`, as if the platform API were missing.
    /// Marking `Fullscreen` also makes fullscreen requests fail.
    pub fn mark_unavailable(&self, class: SignalClass) {
        self.lock().unavailable.insert(class);
    }

    /// The candidate leaves fullscreen (Esc / F11). Returns the signal the platform would fire.
    pub fn user_exit_fullscreen(&self) -> HostSignal {
        let changed = {
            let mut state = self.lock();
            let was = state.fullscreen;
            state.fullscreen = false;
            was
        };
        if changed {
            self.echo(false);
        }
        HostSignal::FullscreenChange {
            is_fullscreen: false,
        }
    }

    pub fn is_attached(&self, class: SignalClass) -> bool {
        self.lock().attached.contains(&class)
    }

    pub fn attached_count(&self) -> usize {
        self.lock().attached.len()
    }

    pub fn fullscreen_requests(&self) -> u32 {
        self.lock().fullscreen_requests
    }

    pub fn exit_requests(&self) -> u32 {
        self.lock().exit_requests
    }

    fn echo(&self, is_fullscreen: bool) {
        if let Some(tx) = &self.feedback {
            // Receiver gone means nobody is replaying signals any more.
            let _ = tx.send(HostSignal::FullscreenChange { is_fullscreen });
        }
    }
}

impl ProctorHost for SimulatedHost {
    fn is_fullscreen(&self) -> bool {
        self.lock().fullscreen
    }

    fn request_fullscreen(&mut self) -> Result<(), HostError> {
        let changed = {
            let mut state = self.lock();
            state.fullscreen_requests += 1;
            if state.unavailable.contains(&SignalClass::Fullscreen) {
                return Err(HostError::FullscreenUnavailable);
            }
            if state.deny_fullscreen {
                return Err(HostError::FullscreenDenied(
                    "simulated host denied the request".to_string(),
                ));
            }
            let was = state.fullscreen;
            state.fullscreen = true;
            !was
        };
        if changed {
            self.echo(true);
        }
        Ok(())
    }

    fn exit_fullscreen(&mut self) -> Result<(), HostError> {
        let changed = {
            let mut state = self.lock();
            state.exit_requests += 1;
            let was = state.fullscreen;
            state.fullscreen = false;
            was
        };
        if changed {
            self.echo(false);
        }
        Ok(())
    }

    fn attach(&mut self, class: SignalClass) -> Result<(), HostError> {
        let mut state = self.lock();
        if state.unavailable.contains(&class) {
            return Err(HostError::Subscription {
                class,
                reason: "simulated API unavailable".to_string(),
            });
        }
        state.attached.insert(class);
        debug!("[PROCTOR] simulated host attached {} listener", class);
        Ok(())
    }

    fn detach(&mut self, class: SignalClass) {
        self.lock().attached.remove(&class);
    }
}
