//! Proctor Replay
//!
//! Drives a proctoring session against the simulated host from a scripted
//! signal timeline, logs every notice the candidate would see, stops the session
//! when the policy auto-submits, and prints the final audit metadata as JSON.
//!
//! Usage: `proctor-replay [script.json]` (or `PROCTOR_REPLAY_SCRIPT`).

mod script;

use proctor_core::{Notice, ProctorMonitor, ProctorSettings, SimulatedHost};
use script::{ReplayAction, ReplayScript};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_SCRIPT: &str = "add-ons/proctor-replay/scripts/scenario_b.json";

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[proctor-replay] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "[PROCTOR] replay failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = ProctorSettings::load()?;
    let script_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PROCTOR_REPLAY_SCRIPT").ok())
        .unwrap_or_else(|| DEFAULT_SCRIPT.to_string());
    let script = ReplayScript::load(Path::new(&script_path))?;

    let (feedback_tx, mut feedback_rx) = mpsc::unbounded_channel();
    let host = SimulatedHost::new().with_feedback(feedback_tx);

    // The handler only signals; the replay loop owns the session and stops it.
    let (submit_tx, mut submit_rx) = mpsc::unbounded_channel::<()>();
    let (monitor, mut notices) = ProctorMonitor::builder(settings.proctoring_config())
        .timings(settings.timings())
        .host(host.clone())
        .on_auto_submit(move || {
            let _ = submit_tx.send(());
        })
        .build()?;

    tracing::info!(
        session_id = %monitor.session_id(),
        script = %script_path,
        steps = script.steps.len(),
        "[PROCTOR] replay started"
    );

    // Fullscreen change events echoed by the host go back through the monitor.
    let echo_monitor = monitor.clone();
    tokio::spawn(async move {
        while let Some(signal) = feedback_rx.recv().await {
            echo_monitor.handle_signal(signal);
        }
    });

    tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            log_notice(&notice);
        }
    });

    let submit_monitor = monitor.clone();
    tokio::spawn(async move {
        while submit_rx.recv().await.is_some() {
            tracing::info!("[PROCTOR] exam submitted by policy; ending session");
            submit_monitor.stop_proctoring();
        }
    });

    let origin = Instant::now();
    for step in &script.steps {
        tokio::time::sleep_until(origin + Duration::from_millis(step.at_ms)).await;
        apply(&monitor, &host, &step.action);
    }
    tokio::time::sleep(Duration::from_millis(script.settle_ms)).await;

    let metadata = monitor.proctoring_metadata();
    println!("{}", serde_json::to_string_pretty(&metadata)?);
    Ok(())
}

fn apply(monitor: &ProctorMonitor, host: &SimulatedHost, action: &ReplayAction) {
    match action {
        ReplayAction::Start => {
            monitor.start_proctoring();
        }
        ReplayAction::Stop => {
            monitor.stop_proctoring();
        }
        ReplayAction::Reset => {
            if let Err(e) = monitor.reset_violations() {
                tracing::warn!(error = %e, "[PROCTOR] scripted reset refused");
            }
        }
        ReplayAction::Signal { signal } => {
            let disposition = monitor.handle_signal(signal.clone());
            tracing::debug!(class = %signal.class(), ?disposition, "[PROCTOR] signal replayed");
        }
        ReplayAction::ExitFullscreen => {
            // The host echoes the change event through the feedback channel.
            host.user_exit_fullscreen();
        }
        ReplayAction::DenyFullscreen { deny } => host.deny_fullscreen(*deny),
    }
}

fn log_notice(notice: &Notice) {
    if notice.is_blocking() {
        tracing::warn!(notice = %notice.message(), "[PROCTOR] blocking notice");
    } else {
        tracing::info!(
            notice = %notice.message(),
            dismiss_after_ms = notice.dismiss_after().map(|d| d.as_millis() as u64),
            "[PROCTOR] notice"
        );
    }
}
