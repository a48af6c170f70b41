//! Session controller: lifecycle, signal routing, deferred actions and the audit snapshot.
//!
//! State machine:
//!
//! ```text
//! Inactive --start--> Active --stop--> Inactive
//!                       |
//!                       | threshold crossed (strict) -> latch fires
//!                       v
//!                  Terminating --grace delay--> on_auto_submit --> caller stops the session
//! ```
//!
//! A restart without a reset resumes straight into `Terminating`.
//!
//! All mutable session state sits behind one mutex and every violation goes
//! through `Shared::record`. Deferred actions (fullscreen re-entry, auto-submit)
//! are owned `DeferredTask`s: stopping the session drops them, which aborts them,
//! and each one re-checks the session generation when it fires.

use crate::config::{ProctorTimings, ProctoringConfig};
use crate::error::{HostError, ProctorError, ProctorResult};
use crate::host::ProctorHost;
use crate::notice::Notice;
use crate::observer::{ObserverContext, ObserverSet};
use crate::policy::{PolicyDecision, PolicyEngine};
use crate::recorder::ViolationRecorder;
use crate::signal::{HostSignal, SignalDisposition};
use crate::violation::{Violation, ViolationCounts, ViolationType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Invoked once, with no arguments, when the terminal policy fires. The caller owns submission.
pub type AutoSubmitHandler = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Inactive,
    Active,
    /// The one-shot latch fired; auto-submit is pending or done.
    Terminating,
}

impl SessionState {
    /// Observers are attached and violations are recorded.
    pub fn is_observing(self) -> bool {
        matches!(self, SessionState::Active | SessionState::Terminating)
    }
}

/// Session state plus the terminal latch it guards. Only these methods move either.
///
/// While observing, `Terminating` and a set latch always go together: a restart
/// without `reset` resumes straight into `Terminating`.
#[derive(Debug, Default)]
struct Lifecycle {
    state: SessionState,
    latched_at: Option<DateTime<Utc>>,
    /// Bumped on every start and stop; deferred tasks from an older generation are stale.
    generation: u64,
}

impl Lifecycle {
    fn start(&mut self) -> bool {
        if self.state != SessionState::Inactive {
            return false;
        }
        self.state = if self.is_latched() {
            SessionState::Terminating
        } else {
            SessionState::Active
        };
        self.generation += 1;
        true
    }

    fn stop(&mut self) -> bool {
        if self.state == SessionState::Inactive {
            return false;
        }
        self.state = SessionState::Inactive;
        self.generation += 1;
        true
    }

    /// Active -> Terminating, at most once until `reset`.
    fn latch(&mut self) -> bool {
        if self.latched_at.is_some() || self.state != SessionState::Active {
            return false;
        }
        self.latched_at = Some(Utc::now());
        self.state = SessionState::Terminating;
        true
    }

    /// Re-arm the latch. Only allowed while Inactive.
    fn reset(&mut self) -> bool {
        if self.state != SessionState::Inactive {
            return false;
        }
        self.latched_at = None;
        true
    }

    fn is_latched(&self) -> bool {
        self.latched_at.is_some()
    }
}

/// A spawned fixed-delay action. Dropping it aborts the task.
struct DeferredTask {
    label: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl DeferredTask {
    fn spawn<F>(runtime: &Handle, label: &'static str, delay: Duration, fire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            fire();
        });
        Self {
            label,
            handle: Some(handle),
        }
    }

    /// The task is firing right now; release the handle without aborting it.
    fn complete(mut self) {
        self.handle.take();
    }

    fn cancel(self) {
        debug!("[PROCTOR] cancelled pending {}", self.label);
    }
}

impl Drop for DeferredTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Live state for UI rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveState {
    pub state: SessionState,
    pub violations: Vec<Violation>,
    pub violation_counts: ViolationCounts,
    pub total_violations: u32,
    pub is_fullscreen: bool,
    pub is_proctoring_active: bool,
}

/// Audit snapshot for the exam-submission payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProctoringMetadata {
    pub session_id: Uuid,
    pub violations: Vec<Violation>,
    pub violation_counts: ViolationCounts,
    pub total_violations: u32,
    pub proctoring_start_time: Option<DateTime<Utc>>,
    pub proctoring_end_time: DateTime<Utc>,
    pub auto_submit_triggered: bool,
}

impl ProctoringMetadata {
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

struct SessionCore {
    session_id: Uuid,
    config: ProctoringConfig,
    timings: ProctorTimings,
    host: Box<dyn ProctorHost>,
    lifecycle: Lifecycle,
    recorder: ViolationRecorder,
    policy: PolicyEngine,
    observers: Option<ObserverSet>,
    is_fullscreen: bool,
    started_at: Option<DateTime<Utc>>,
    auto_submitted_at: Option<DateTime<Utc>>,
    epoch: Instant,
    pending_reentry: Option<DeferredTask>,
    pending_submit: Option<DeferredTask>,
    notices: mpsc::UnboundedSender<Notice>,
    live: watch::Sender<LiveState>,
}

impl SessionCore {
    fn notify(&self, notice: Notice) {
        if self.notices.send(notice).is_err() {
            debug!("[PROCTOR] notice dropped: receiver closed");
        }
    }

    fn live_state(&self) -> LiveState {
        LiveState {
            state: self.lifecycle.state,
            violations: self.recorder.violations().to_vec(),
            violation_counts: self.recorder.counts(),
            total_violations: self.recorder.total(),
            is_fullscreen: self.is_fullscreen,
            is_proctoring_active: self.lifecycle.state.is_observing(),
        }
    }

    fn publish(&self) {
        self.live.send_replace(self.live_state());
    }

    fn enter_fullscreen(&mut self) -> Result<(), HostError> {
        if self.host.is_fullscreen() {
            self.is_fullscreen = true;
            return Ok(());
        }
        match self.host.request_fullscreen() {
            Ok(()) => {
                self.is_fullscreen = self.host.is_fullscreen();
                info!(session_id = %self.session_id, "[PROCTOR] fullscreen requested");
                Ok(())
            }
            Err(e) => {
                warn!(session_id = %self.session_id, "[PROCTOR] fullscreen request failed: {}", e);
                self.notify(Notice::environment_error(
                    format!("Could not enter fullscreen: {}", e),
                    self.timings.warning_dismiss,
                ));
                Err(e)
            }
        }
    }

    fn leave_fullscreen(&mut self) -> Result<(), HostError> {
        if !self.host.is_fullscreen() {
            self.is_fullscreen = false;
            return Ok(());
        }
        match self.host.exit_fullscreen() {
            Ok(()) => {
                // Mirror first so the host's own change event is not read as a candidate exit.
                self.is_fullscreen = false;
                Ok(())
            }
            Err(e) => {
                warn!(session_id = %self.session_id, "[PROCTOR] fullscreen exit failed: {}", e);
                self.notify(Notice::environment_error(
                    format!("Could not leave fullscreen: {}", e),
                    self.timings.warning_dismiss,
                ));
                Err(e)
            }
        }
    }
}

impl Drop for SessionCore {
    fn drop(&mut self) {
        if let Some(observers) = self.observers.take() {
            observers.detach(self.host.as_mut());
        }
    }
}

struct Shared {
    core: Mutex<SessionCore>,
    runtime: Handle,
    on_auto_submit: Option<AutoSubmitHandler>,
    this: Weak<Shared>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionCore> {
        self.core.lock().unwrap_or_else(|poisoned| {
            warn!("[PROCTOR] session lock was poisoned; continuing with last state");
            poisoned.into_inner()
        })
    }

    /// The single write path for violation state.
    fn record(
        &self,
        core: &mut SessionCore,
        kind: ViolationType,
        duration: Option<Duration>,
        message: &str,
    ) -> Option<u32> {
        if !core.lifecycle.state.is_observing() {
            debug!("[PROCTOR] {} ignored: session not active", kind);
            return None;
        }

        let timestamp_ms = core.epoch.elapsed().as_millis() as u64;
        let Some(total) = core.recorder.add_violation(kind, duration, timestamp_ms) else {
            debug!("[PROCTOR] {} ignored: history is frozen", kind);
            return None;
        };

        info!(
            session_id = %core.session_id,
            kind = %kind,
            duration_ms = duration.map(|d| d.as_millis() as u64),
            total,
            "[PROCTOR] violation recorded"
        );

        match core.policy.evaluate(total, core.lifecycle.is_latched()) {
            PolicyDecision::Warn { remaining } => {
                core.notify(Notice::violation_warning(
                    kind,
                    message,
                    Some(remaining),
                    core.timings.warning_dismiss,
                ));
            }
            PolicyDecision::BudgetExhausted => {
                core.notify(Notice::violation_warning(
                    kind,
                    message,
                    None,
                    core.timings.warning_dismiss,
                ));
            }
            PolicyDecision::Terminate => {
                if core.lifecycle.latch() {
                    warn!(
                        session_id = %core.session_id,
                        total,
                        max = core.policy.max_violations(),
                        "[PROCTOR] violation budget exhausted; auto-submit in {}ms",
                        core.timings.auto_submit_grace.as_millis()
                    );
                    core.notify(Notice::auto_submit_pending(
                        total,
                        core.timings.auto_submit_grace,
                    ));
                    self.schedule_auto_submit(core);
                }
            }
            PolicyDecision::AlreadyTerminating => {
                debug!("[PROCTOR] latch already fired; no further terminal action");
                core.notify(Notice::violation_warning(
                    kind,
                    message,
                    None,
                    core.timings.warning_dismiss,
                ));
            }
        }

        Some(total)
    }

    fn schedule_auto_submit(&self, core: &mut SessionCore) {
        let generation = core.lifecycle.generation;
        let this = self.this.clone();
        core.pending_submit = Some(DeferredTask::spawn(
            &self.runtime,
            "auto-submit",
            core.timings.auto_submit_grace,
            move || {
                if let Some(shared) = this.upgrade() {
                    shared.fire_auto_submit(generation);
                }
            },
        ));
    }

    fn schedule_reentry(&self, core: &mut SessionCore) {
        if core.lifecycle.is_latched() {
            debug!("[PROCTOR] skipping fullscreen re-entry: auto-submit latched");
            return;
        }
        if core.pending_reentry.is_some() {
            debug!("[PROCTOR] fullscreen re-entry already pending");
            return;
        }
        let generation = core.lifecycle.generation;
        let this = self.this.clone();
        core.pending_reentry = Some(DeferredTask::spawn(
            &self.runtime,
            "fullscreen re-entry",
            core.timings.fullscreen_reentry_delay,
            move || {
                if let Some(shared) = this.upgrade() {
                    shared.fire_reentry(generation);
                }
            },
        ));
    }

    fn fire_reentry(&self, generation: u64) {
        let mut guard = self.lock();
        let core = &mut *guard;
        if core.lifecycle.generation != generation {
            debug!("[PROCTOR] stale fullscreen re-entry ignored");
            return;
        }
        if let Some(task) = core.pending_reentry.take() {
            task.complete();
        }
        if core.lifecycle.state != SessionState::Active || core.lifecycle.is_latched() {
            debug!("[PROCTOR] fullscreen re-entry skipped: session is terminating");
            return;
        }

        // Best effort: a failure is reported, never counted.
        if let Err(e) = core.enter_fullscreen() {
            debug!("[PROCTOR] fullscreen re-entry failed ({}); not counted", e);
        }
        core.publish();
    }

    fn fire_auto_submit(&self, generation: u64) {
        let handler = {
            let mut guard = self.lock();
            let core = &mut *guard;
            if core.lifecycle.generation != generation {
                debug!("[PROCTOR] stale auto-submit ignored");
                return;
            }
            if let Some(task) = core.pending_submit.take() {
                task.complete();
            }
            if core.lifecycle.state != SessionState::Terminating {
                return;
            }

            core.recorder.freeze();
            core.auto_submitted_at = Some(Utc::now());
            info!(
                session_id = %core.session_id,
                total = core.recorder.total(),
                "[PROCTOR] grace delay elapsed; auto-submitting exam"
            );
            core.publish();
            self.on_auto_submit.clone()
        };

        // Lock released: the handler may call back into the monitor (e.g. stop_proctoring).
        if let Some(handler) = handler {
            handler();
        }
    }
}

/// Builder for [`ProctorMonitor`].
pub struct ProctorMonitorBuilder {
    config: ProctoringConfig,
    timings: ProctorTimings,
    host: Option<Box<dyn ProctorHost>>,
    on_auto_submit: Option<AutoSubmitHandler>,
}

impl ProctorMonitorBuilder {
    pub fn timings(mut self, timings: ProctorTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn host(mut self, host: impl ProctorHost + 'static) -> Self {
        self.host = Some(Box::new(host));
        self
    }

    pub fn on_auto_submit<F>(mut self, handler: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_auto_submit = Some(Arc::new(handler));
        self
    }

    /// Validate the configuration and create the monitor (Inactive) plus its notice stream.
    ///
    /// Must be called inside a tokio runtime; deferred actions are spawned on it.
    pub fn build(self) -> ProctorResult<(ProctorMonitor, mpsc::UnboundedReceiver<Notice>)> {
        self.config.validate()?;
        let host = self.host.ok_or(ProctorError::MissingHost)?;
        if self.config.strict_fullscreen && self.on_auto_submit.is_none() {
            return Err(ProctorError::MissingAutoSubmit);
        }
        let runtime =
            Handle::try_current().map_err(|e| ProctorError::Runtime(e.to_string()))?;

        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let (live_tx, _) = watch::channel(LiveState::default());
        let session_id = Uuid::new_v4();
        let policy = PolicyEngine::new(&self.config);
        let config = self.config;
        let timings = self.timings;
        let on_auto_submit = self.on_auto_submit;

        let shared = Arc::new_cyclic(|this| Shared {
            core: Mutex::new(SessionCore {
                session_id,
                config,
                timings,
                host,
                lifecycle: Lifecycle::default(),
                recorder: ViolationRecorder::new(),
                policy,
                observers: None,
                is_fullscreen: false,
                started_at: None,
                auto_submitted_at: None,
                epoch: Instant::now(),
                pending_reentry: None,
                pending_submit: None,
                notices: notice_tx,
                live: live_tx,
            }),
            runtime,
            on_auto_submit,
            this: this.clone(),
        });

        info!(session_id = %session_id, "[PROCTOR] monitor created");
        Ok((ProctorMonitor { shared }, notice_rx))
    }
}

/// Handle onto one proctoring session. Cheap to clone; all clones share the session.
#[derive(Clone)]
pub struct ProctorMonitor {
    shared: Arc<Shared>,
}

impl ProctorMonitor {
    pub fn builder(config: ProctoringConfig) -> ProctorMonitorBuilder {
        ProctorMonitorBuilder {
            config,
            timings: ProctorTimings::default(),
            host: None,
            on_auto_submit: None,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.shared.lock().session_id
    }

    /// Inactive -> Active. Attaches observers and enters fullscreen when enabled.
    /// Calling it on a running session changes nothing.
    pub fn start_proctoring(&self) -> SessionState {
        let mut guard = self.shared.lock();
        let core = &mut *guard;
        if !core.lifecycle.start() {
            debug!("[PROCTOR] start ignored: session already {:?}", core.lifecycle.state);
            return core.lifecycle.state;
        }

        core.recorder.thaw();
        core.started_at = Some(Utc::now());

        let (observers, failures) =
            ObserverSet::attach(&core.config, &core.timings, core.host.as_mut());
        for e in failures {
            core.notify(Notice::environment_error(
                format!("A proctoring check is unavailable: {}", e),
                core.timings.warning_dismiss,
            ));
        }
        let attached = observers.names();
        core.observers = Some(observers);

        if core.config.enable_fullscreen_mode {
            // Failure already reported as an environment notice.
            let _ = core.enter_fullscreen();
        }

        info!(
            session_id = %core.session_id,
            observers = ?attached,
            strict = core.config.strict_fullscreen,
            max_violations = core.config.max_violations,
            "[PROCTOR] proctoring started"
        );
        core.publish();
        core.lifecycle.state
    }

    /// Active/Terminating -> Inactive. Detaches every observer, cancels pending
    /// re-entry and auto-submit, freezes the history and leaves fullscreen.
    pub fn stop_proctoring(&self) -> SessionState {
        let mut guard = self.shared.lock();
        let core = &mut *guard;
        if !core.lifecycle.stop() {
            debug!("[PROCTOR] stop ignored: session not active");
            return core.lifecycle.state;
        }

        if let Some(task) = core.pending_submit.take() {
            warn!(session_id = %core.session_id, "[PROCTOR] pending auto-submit cancelled by stop");
            task.cancel();
        }
        if let Some(task) = core.pending_reentry.take() {
            task.cancel();
        }
        if let Some(observers) = core.observers.take() {
            observers.detach(core.host.as_mut());
        }
        core.recorder.freeze();

        if core.is_fullscreen || core.host.is_fullscreen() {
            let _ = core.leave_fullscreen();
        }

        info!(
            session_id = %core.session_id,
            total = core.recorder.total(),
            "[PROCTOR] proctoring stopped"
        );
        core.publish();
        core.lifecycle.state
    }

    /// Clear history, counters and the terminal latch. Rejected while the session runs.
    pub fn reset_violations(&self) -> ProctorResult<()> {
        let mut guard = self.shared.lock();
        let core = &mut *guard;
        if !core.lifecycle.reset() {
            warn!(session_id = %core.session_id, "[PROCTOR] reset rejected: session is active");
            return Err(ProctorError::ResetWhileActive);
        }
        core.recorder.clear();
        core.auto_submitted_at = None;
        info!(session_id = %core.session_id, "[PROCTOR] violations reset");
        core.publish();
        Ok(())
    }

    /// Route one host signal through the observers and tell the host whether to
    /// cancel its default action.
    pub fn handle_signal(&self, signal: HostSignal) -> SignalDisposition {
        let mut guard = self.shared.lock();
        let core = &mut *guard;

        let ctx = ObserverContext {
            now: Instant::now(),
            is_fullscreen: core.is_fullscreen,
            terminal_latched: core.lifecycle.is_latched(),
        };
        let Some(observers) = core.observers.as_mut() else {
            debug!("[PROCTOR] {} signal ignored: no observers attached", signal.class());
            return SignalDisposition::Allow;
        };
        let observations = observers.dispatch(&signal, &ctx);

        let mut disposition = SignalDisposition::Allow;
        for observation in observations {
            disposition = disposition.merge(observation.disposition);
            if let Some(is_fullscreen) = observation.fullscreen {
                core.is_fullscreen = is_fullscreen;
            }
            if let Some(notice) = observation.notice {
                core.notify(notice);
            }
            if let Some(violation) = observation.violation {
                self.shared
                    .record(core, violation.kind, violation.duration, &violation.message);
            }
            if observation.request_reentry {
                self.shared.schedule_reentry(core);
            }
        }

        core.publish();
        disposition
    }

    /// Record a violation directly. Same write path the observers use.
    /// Returns the new total, or `None` when the session is not recording.
    pub fn add_violation(&self, kind: ViolationType, duration: Option<Duration>) -> Option<u32> {
        let mut guard = self.shared.lock();
        let core = &mut *guard;
        let total = self.shared.record(core, kind, duration, kind.describe());
        core.publish();
        total
    }

    /// Idempotent; failures are reported as notices and returned, never raised.
    pub fn request_fullscreen(&self) -> ProctorResult<()> {
        let mut guard = self.shared.lock();
        let result = guard.enter_fullscreen();
        guard.publish();
        Ok(result?)
    }

    pub fn exit_fullscreen(&self) -> ProctorResult<()> {
        let mut guard = self.shared.lock();
        let result = guard.leave_fullscreen();
        guard.publish();
        Ok(result?)
    }

    pub fn proctoring_metadata(&self) -> ProctoringMetadata {
        let core = self.shared.lock();
        ProctoringMetadata {
            session_id: core.session_id,
            violations: core.recorder.violations().to_vec(),
            violation_counts: core.recorder.counts(),
            total_violations: core.recorder.total(),
            proctoring_start_time: core.started_at,
            proctoring_end_time: Utc::now(),
            auto_submit_triggered: core.lifecycle.is_latched(),
        }
    }

    pub fn live_state(&self) -> LiveState {
        self.shared.lock().live_state()
    }

    /// Receive a fresh `LiveState` after every change.
    pub fn subscribe(&self) -> watch::Receiver<LiveState> {
        self.shared.lock().live.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().lifecycle.state
    }

    pub fn is_proctoring_active(&self) -> bool {
        self.state().is_observing()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.shared.lock().is_fullscreen
    }

    pub fn violation_counts(&self) -> ViolationCounts {
        self.shared.lock().recorder.counts()
    }

    pub fn total_violations(&self) -> u32 {
        self.shared.lock().recorder.total()
    }

    /// `on_auto_submit` has actually been invoked for this session.
    pub fn auto_submitted(&self) -> bool {
        self.shared.lock().auto_submitted_at.is_some()
    }
}
