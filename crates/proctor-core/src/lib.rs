//! proctor-core: exam-session integrity monitor.
//!
//! Watches a candidate's exam environment for integrity violations, keeps an
//! audit trail of them and auto-submits the exam once a strict session runs
//! out of its violation budget.
//!
//! ```text
//!   host (browser / kiosk)                         exam UI
//!        |  HostSignal                                ^  Notice, LiveState
//!        v                                            |
//!   ProctorMonitor::handle_signal --> ObserverSet ----+
//!        |                            (visibility, clipboard, fullscreen)
//!        v
//!   ViolationRecorder --> PolicyEngine --> warn | latch + auto-submit after grace
//! ```
//!
//! The host is reached through the [`ProctorHost`] trait; [`SimulatedHost`] is the
//! in-process implementation used by tests and the replay tool.

pub mod config;
mod error;
pub mod host;
mod notice;
pub mod observer;
mod policy;
mod recorder;
mod session;
pub mod signal;
mod violation;

pub use config::{ProctorSettings, ProctorTimings, ProctoringConfig};
pub use error::{HostError, ObserverError, ProctorError, ProctorResult};
pub use host::{ProctorHost, SimulatedHost};
pub use notice::Notice;
pub use policy::{PolicyDecision, PolicyEngine};
pub use recorder::ViolationRecorder;
pub use session::{
    AutoSubmitHandler, LiveState, ProctorMonitor, ProctorMonitorBuilder, ProctoringMetadata,
    SessionState,
};
pub use signal::{
    ClipboardShortcut, HostSignal, Key, KeyCombo, Modifiers, SignalClass, SignalDisposition,
    SignalTarget,
};
pub use violation::{Violation, ViolationCounts, ViolationType};
