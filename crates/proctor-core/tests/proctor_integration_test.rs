//! Integration tests for the proctoring session
//!
//! These run the full monitor against a `SimulatedHost` on a paused tokio clock:
//! - Tab-switch debounce and duration capture
//! - Strict fullscreen exits with deferred re-entry
//! - Budget exhaustion, the one-shot auto-submit latch and its grace delay
//! - Lifecycle: stop, reset and restart

use proctor_core::{
    HostError, HostSignal, KeyCombo, Notice, ProctorError, ProctorHost, ProctorMonitor, ProctoringConfig, SessionState,
    SignalDisposition, SignalTarget, SimulatedHost, ViolationType,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::sleep;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn strict_config(max_violations: u32) -> ProctoringConfig {
    ProctoringConfig {
        strict_fullscreen: true,
        max_violations,
        ..Default::default()
    }
}

fn monitor_with_counter(
    config: ProctoringConfig,
    host: SimulatedHost,
) -> (ProctorMonitor, UnboundedReceiver<Notice>, Arc<AtomicUsize>) {
    let submits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&submits);
    let (monitor, notices) = ProctorMonitor::builder(config)
        .host(host)
        .on_auto_submit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .expect("build monitor");
    (monitor, notices, submits)
}

fn drain(notices: &mut UnboundedReceiver<Notice>) -> Vec<Notice> {
    let mut out = Vec::new();
    while let Ok(notice) = notices.try_recv() {
        out.push(notice);
    }
    out
}

async fn absence(monitor: &ProctorMonitor, away: Duration) {
    monitor.handle_signal(HostSignal::VisibilityChange { hidden: true });
    sleep(away).await;
    monitor.handle_signal(HostSignal::VisibilityChange { hidden: false });
}

#[tokio::test(start_paused = true)]
async fn test_short_absence_is_debounced() {
    init_tracing();
    let (monitor, _notices, _) = monitor_with_counter(ProctoringConfig::default(), SimulatedHost::new());
    monitor.start_proctoring();

    absence(&monitor, Duration::from_millis(999)).await;
    absence(&monitor, Duration::from_millis(200)).await;

    assert_eq!(monitor.total_violations(), 0);
    assert!(monitor.proctoring_metadata().violations.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_long_absences_each_record_once() {
    init_tracing();
    let (monitor, _notices, submits) =
        monitor_with_counter(ProctoringConfig::default(), SimulatedHost::new());
    monitor.start_proctoring();

    for _ in 0..4 {
        absence(&monitor, Duration::from_millis(1500)).await;
    }

    let metadata = monitor.proctoring_metadata();
    assert_eq!(metadata.total_violations, 4);
    assert_eq!(metadata.violation_counts.get(ViolationType::TabSwitch), 4);
    assert!(metadata.violations.iter().all(|v| v.duration.unwrap_or(0) >= 1500));

    // Lenient session: past the budget is recorded, never terminal.
    sleep(Duration::from_secs(5)).await;
    assert_eq!(submits.load(Ordering::SeqCst), 0);
    assert!(!metadata.auto_submit_triggered);
    assert_eq!(monitor.state(), SessionState::Active);
}

#[tokio::test(start_paused = true)]
async fn test_blur_and_hidden_share_one_absence() {
    init_tracing();
    let (monitor, _notices, _) = monitor_with_counter(ProctoringConfig::default(), SimulatedHost::new());
    monitor.start_proctoring();

    monitor.handle_signal(HostSignal::WindowBlur);
    monitor.handle_signal(HostSignal::VisibilityChange { hidden: true });
    sleep(Duration::from_millis(2000)).await;
    monitor.handle_signal(HostSignal::WindowFocus);
    monitor.handle_signal(HostSignal::VisibilityChange { hidden: false });

    assert_eq!(monitor.total_violations(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fullscreen_exits_with_reentry() {
    init_tracing();
    let host = SimulatedHost::new();
    let (monitor, mut notices, submits) = monitor_with_counter(strict_config(5), host.clone());
    monitor.start_proctoring();
    assert!(monitor.is_fullscreen());

    monitor.handle_signal(host.user_exit_fullscreen());
    assert!(!monitor.is_fullscreen());

    let first = drain(&mut notices);
    assert!(matches!(first[0], Notice::FullscreenRequired { .. }));
    assert!(matches!(
        first[1],
        Notice::ViolationWarning {
            remaining: Some(4),
            ..
        }
    ));

    sleep(Duration::from_millis(600)).await;
    assert_eq!(host.fullscreen_requests(), 2);
    assert!(monitor.is_fullscreen());

    monitor.handle_signal(host.user_exit_fullscreen());
    sleep(Duration::from_millis(600)).await;

    let metadata = monitor.proctoring_metadata();
    assert_eq!(metadata.violation_counts.get(ViolationType::FullscreenExit), 2);
    assert_eq!(metadata.total_violations, 2);
    assert!(!metadata.auto_submit_triggered);
    assert_eq!(submits.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_exit_event_is_not_counted_twice() {
    init_tracing();
    let host = SimulatedHost::new();
    let (monitor, _notices, _) = monitor_with_counter(strict_config(3), host.clone());
    monitor.start_proctoring();

    let exit = host.user_exit_fullscreen();
    monitor.handle_signal(exit.clone());
    monitor.handle_signal(exit);

    assert_eq!(monitor.total_violations(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_denied_reentry_is_reported_not_counted() {
    init_tracing();
    let host = SimulatedHost::new();
    let (monitor, mut notices, _) = monitor_with_counter(strict_config(3), host.clone());
    monitor.start_proctoring();
    host.deny_fullscreen(true);

    monitor.handle_signal(host.user_exit_fullscreen());
    sleep(Duration::from_millis(600)).await;

    assert_eq!(host.fullscreen_requests(), 2);
    assert_eq!(monitor.total_violations(), 1);
    assert!(!monitor.is_fullscreen());
    assert!(drain(&mut notices)
        .iter()
        .any(|n| matches!(n, Notice::EnvironmentError { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_clipboard_budget_auto_submits_after_grace() {
    init_tracing();
    let (monitor, mut notices, submits) = monitor_with_counter(strict_config(3), SimulatedHost::new());
    monitor.start_proctoring();

    assert!(monitor.handle_signal(HostSignal::Copy).is_blocked());
    assert!(monitor.handle_signal(HostSignal::Cut).is_blocked());
    assert!(monitor.handle_signal(HostSignal::ContextMenu).is_blocked());

    assert_eq!(monitor.total_violations(), 3);
    assert_eq!(monitor.state(), SessionState::Terminating);
    assert!(monitor.proctoring_metadata().auto_submit_triggered);

    let sent = drain(&mut notices);
    assert_eq!(sent.len(), 3);
    assert!(matches!(
        sent[2],
        Notice::AutoSubmitPending {
            total: 3,
            submit_in_ms: 3000,
            ..
        }
    ));

    sleep(Duration::from_millis(2900)).await;
    assert_eq!(submits.load(Ordering::SeqCst), 0);
    assert!(!monitor.auto_submitted());

    sleep(Duration::from_millis(200)).await;
    assert_eq!(submits.load(Ordering::SeqCst), 1);
    assert!(monitor.auto_submitted());
}

#[tokio::test(start_paused = true)]
async fn test_auto_submit_fires_exactly_once() {
    init_tracing();
    let (monitor, mut notices, submits) = monitor_with_counter(strict_config(3), SimulatedHost::new());
    monitor.start_proctoring();

    for _ in 0..3 {
        monitor.add_violation(ViolationType::CopyAttempt, None);
    }
    drain(&mut notices);

    // Recorded while terminating, but no second terminal action.
    assert_eq!(monitor.add_violation(ViolationType::ContextMenuAttempt, None), Some(4));
    let fourth = drain(&mut notices);
    assert_eq!(fourth.len(), 1);
    assert!(matches!(
        fourth[0],
        Notice::ViolationWarning {
            kind: ViolationType::ContextMenuAttempt,
            remaining: None,
            ..
        }
    ));

    sleep(Duration::from_secs(10)).await;
    assert_eq!(submits.load(Ordering::SeqCst), 1);

    // History is frozen once submitted; blocking still applies.
    assert_eq!(monitor.handle_signal(HostSignal::Copy), SignalDisposition::PreventDefault);
    assert_eq!(monitor.total_violations(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_grace_cancels_submit() {
    init_tracing();
    let (monitor, _notices, submits) = monitor_with_counter(strict_config(3), SimulatedHost::new());
    monitor.start_proctoring();

    for _ in 0..3 {
        monitor.handle_signal(HostSignal::Copy);
    }
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(monitor.stop_proctoring(), SessionState::Inactive);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(submits.load(Ordering::SeqCst), 0);

    let metadata = monitor.proctoring_metadata();
    assert!(metadata.auto_submit_triggered);
    assert_eq!(metadata.total_violations, 3);
}

#[tokio::test(start_paused = true)]
async fn test_reset_rearms_latch() {
    init_tracing();
    let (monitor, _notices, submits) = monitor_with_counter(strict_config(2), SimulatedHost::new());
    monitor.start_proctoring();
    monitor.add_violation(ViolationType::CopyAttempt, None);
    monitor.add_violation(ViolationType::CopyAttempt, None);
    sleep(Duration::from_secs(4)).await;
    assert_eq!(submits.load(Ordering::SeqCst), 1);

    monitor.stop_proctoring();
    monitor.reset_violations().expect("reset while inactive");

    let metadata = monitor.proctoring_metadata();
    assert_eq!(metadata.total_violations, 0);
    assert!(!metadata.auto_submit_triggered);

    monitor.start_proctoring();
    monitor.add_violation(ViolationType::ContextMenuAttempt, None);
    monitor.add_violation(ViolationType::ContextMenuAttempt, None);
    sleep(Duration::from_secs(4)).await;
    assert_eq!(submits.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_restart_without_reset_keeps_latch() {
    init_tracing();
    let (monitor, _notices, submits) = monitor_with_counter(strict_config(1), SimulatedHost::new());
    monitor.start_proctoring();
    monitor.add_violation(ViolationType::CopyAttempt, None);
    monitor.stop_proctoring();

    monitor.start_proctoring();
    assert_eq!(monitor.state(), SessionState::Terminating);
    assert!(monitor.is_proctoring_active());
    assert_eq!(monitor.add_violation(ViolationType::CopyAttempt, None), Some(2));

    sleep(Duration::from_secs(5)).await;
    assert_eq!(submits.load(Ordering::SeqCst), 0);
    assert_eq!(monitor.state(), SessionState::Terminating);
    assert!(monitor.proctoring_metadata().auto_submit_triggered);
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_pending_reentry() {
    init_tracing();
    let host = SimulatedHost::new();
    let (monitor, _notices, _) = monitor_with_counter(strict_config(3), host.clone());
    monitor.start_proctoring();

    monitor.handle_signal(host.user_exit_fullscreen());
    let requests = host.fullscreen_requests();
    monitor.stop_proctoring();

    sleep(Duration::from_millis(1000)).await;
    assert_eq!(host.fullscreen_requests(), requests);
    assert!(!host.is_fullscreen());
    assert!(!monitor.is_fullscreen());
}

#[tokio::test(start_paused = true)]
async fn test_manual_fullscreen_request_fails_softly() {
    init_tracing();
    let host = SimulatedHost::new();
    let config = ProctoringConfig {
        enable_fullscreen_mode: false,
        ..Default::default()
    };
    let (monitor, mut notices, _) = monitor_with_counter(config, host.clone());
    monitor.start_proctoring();
    host.deny_fullscreen(true);

    assert!(matches!(
        monitor.request_fullscreen(),
        Err(ProctorError::Host(HostError::FullscreenDenied(_)))
    ));
    assert!(!monitor.is_fullscreen());
    assert!(matches!(
        drain(&mut notices).as_slice(),
        [Notice::EnvironmentError { .. }]
    ));

    host.deny_fullscreen(false);
    monitor.request_fullscreen().expect("fullscreen granted");
    monitor.request_fullscreen().expect("already fullscreen");
    assert_eq!(host.fullscreen_requests(), 2);
    assert!(monitor.is_fullscreen());
}

#[tokio::test(start_paused = true)]
async fn test_reset_rejected_while_active() {
    init_tracing();
    let (monitor, _notices, _) = monitor_with_counter(ProctoringConfig::default(), SimulatedHost::new());
    monitor.start_proctoring();
    monitor.add_violation(ViolationType::CopyAttempt, None);

    assert!(matches!(
        monitor.reset_violations(),
        Err(ProctorError::ResetWhileActive)
    ));
    assert_eq!(monitor.total_violations(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_detaches_observers_and_leaves_fullscreen() {
    init_tracing();
    let host = SimulatedHost::new();
    let (monitor, _notices, _) = monitor_with_counter(ProctoringConfig::default(), host.clone());
    monitor.start_proctoring();
    assert_eq!(host.attached_count(), 6);

    monitor.stop_proctoring();
    assert_eq!(host.attached_count(), 0);
    assert_eq!(host.exit_requests(), 1);
    assert!(!monitor.is_fullscreen());
    assert!(!monitor.is_proctoring_active());

    assert_eq!(monitor.handle_signal(HostSignal::Copy), SignalDisposition::Allow);
    assert_eq!(monitor.add_violation(ViolationType::CopyAttempt, None), None);
    assert_eq!(monitor.total_violations(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_start_is_idempotent() {
    init_tracing();
    let host = SimulatedHost::new();
    let (monitor, _notices, _) = monitor_with_counter(ProctoringConfig::default(), host.clone());

    assert_eq!(monitor.start_proctoring(), SessionState::Active);
    assert_eq!(monitor.start_proctoring(), SessionState::Active);
    assert_eq!(host.attached_count(), 6);
    assert_eq!(host.fullscreen_requests(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_copy_shortcut_allowed_in_answer_field() {
    init_tracing();
    let (monitor, _notices, _) = monitor_with_counter(strict_config(3), SimulatedHost::new());
    monitor.start_proctoring();

    let in_answer = monitor.handle_signal(HostSignal::KeyDown {
        combo: KeyCombo::ctrl('c'),
        target: SignalTarget::TextArea,
    });
    assert_eq!(in_answer, SignalDisposition::Allow);

    let on_question = monitor.handle_signal(HostSignal::KeyDown {
        combo: KeyCombo::ctrl('c'),
        target: SignalTarget::Protected,
    });
    assert_eq!(on_question, SignalDisposition::PreventDefault);
    assert_eq!(monitor.total_violations(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_metadata_totals_and_json_shape() {
    init_tracing();
    let (monitor, _notices, _) = monitor_with_counter(ProctoringConfig::default(), SimulatedHost::new());
    monitor.start_proctoring();
    monitor.handle_signal(HostSignal::Copy);
    monitor.handle_signal(HostSignal::ContextMenu);
    absence(&monitor, Duration::from_millis(1500)).await;

    let metadata = monitor.proctoring_metadata();
    let sum: u32 = metadata.violation_counts.iter().map(|(_, n)| n).sum();
    assert_eq!(metadata.total_violations, sum);
    assert_eq!(metadata.violations.len() as u32, sum);
    assert!(metadata.proctoring_start_time.is_some());

    let json = metadata.to_json().unwrap();
    assert_eq!(json["totalViolations"], 3);
    assert_eq!(json["violationCounts"]["copy_attempt"], 1);
    assert_eq!(json["violationCounts"]["fullscreen_exit"], 0);
    assert_eq!(json["violations"][0]["type"], "copy_attempt");
    assert_eq!(json["autoSubmitTriggered"], false);
    assert!(json["sessionId"].is_string());
}

#[tokio::test(start_paused = true)]
async fn test_live_state_is_published() {
    init_tracing();
    let (monitor, _notices, _) = monitor_with_counter(ProctoringConfig::default(), SimulatedHost::new());
    let mut live = monitor.subscribe();

    monitor.start_proctoring();
    assert!(live.has_changed().unwrap());
    assert!(live.borrow_and_update().is_proctoring_active);

    monitor.handle_signal(HostSignal::Copy);
    let state = live.borrow_and_update().clone();
    assert_eq!(state.total_violations, 1);
    assert_eq!(state.violation_counts.get(ViolationType::CopyAttempt), 1);
    assert!(state.is_fullscreen);
}

#[tokio::test]
async fn test_builder_rejects_invalid_setup() {
    let strict_without_handler = ProctorMonitor::builder(strict_config(3))
        .host(SimulatedHost::new())
        .build();
    assert!(matches!(
        strict_without_handler,
        Err(ProctorError::MissingAutoSubmit)
    ));

    let zero_budget = ProctorMonitor::builder(ProctoringConfig {
        max_violations: 0,
        ..Default::default()
    })
    .host(SimulatedHost::new())
    .build();
    assert!(matches!(zero_budget, Err(ProctorError::Config(_))));

    let no_host = ProctorMonitor::builder(ProctoringConfig::default()).build();
    assert!(matches!(no_host, Err(ProctorError::MissingHost)));
}

#[test]
fn test_builder_requires_runtime() {
    let outside_runtime = ProctorMonitor::builder(ProctoringConfig::default())
        .host(SimulatedHost::new())
        .build();
    assert!(matches!(outside_runtime, Err(ProctorError::Runtime(_))));
}
