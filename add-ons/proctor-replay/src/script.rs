//! Replay scripts: a timeline of host signals and session actions.
//!
//! ```json
//! {
//!   "settle_ms": 4000,
//!   "steps": [
//!     { "at_ms": 0,    "action": "start" },
//!     { "at_ms": 500,  "action": "signal", "signal": { "type": "copy" } },
//!     { "at_ms": 900,  "action": "exit_fullscreen" }
//!   ]
//! }
//! ```

use proctor_core::HostSignal;
use serde::Deserialize;
use std::path::Path;

const DEFAULT_SETTLE_MS: u64 = 4000;

fn default_settle_ms() -> u64 {
    DEFAULT_SETTLE_MS
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReplayScript {
    /// How long to keep running after the last step so deferred actions can fire.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    pub steps: Vec<ReplayStep>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReplayStep {
    /// Offset from the start of the replay.
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: ReplayAction,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReplayAction {
    Start,
    Stop,
    Reset,
    /// Deliver a host signal straight to the monitor.
    Signal { signal: HostSignal },
    /// The candidate presses Esc; the simulated host echoes the change event.
    ExitFullscreen,
    DenyFullscreen { deny: bool },
}

impl ReplayScript {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("read replay script {}: {}", path.display(), e))?;
        Self::parse(&raw)
    }

    /// Parse and order the steps by offset.
    pub fn parse(raw: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let mut script: ReplayScript = serde_json::from_str(raw)?;
        script.steps.sort_by_key(|step| step.at_ms);
        Ok(script)
    }
}
