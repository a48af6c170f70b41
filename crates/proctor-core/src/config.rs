//! Proctoring configuration.
//!
//! `ProctoringConfig` is what the exam surface hands the monitor at session start.
//! `ProctorTimings` holds the fixed delays, overridable for tests.
//! `ProctorSettings` layers both from defaults, an optional file and the environment.
//!
//! | Env | Default | Description |
//! |-----|---------|-------------|
//! | PROCTOR_CONFIG | config/proctor | Settings file (extension optional). |
//! | PROCTOR__ENABLE_TAB_DETECTION | true | Watch visibility and window focus. |
//! | PROCTOR__ENABLE_COPY_BLOCK | true | Block copy, cut and context menu. |
//! | PROCTOR__ENABLE_FULLSCREEN_MODE | true | Enter fullscreen on start and watch for exits. |
//! | PROCTOR__STRICT_FULLSCREEN | false | Count exits and auto-submit when the budget runs out. |
//! | PROCTOR__MAX_VIOLATIONS | 3 | Violation budget. |
//! | PROCTOR__TAB_SWITCH_DEBOUNCE_MS | 1000 | Absences at or below this are discarded. |
//! | PROCTOR__FULLSCREEN_REENTRY_DELAY_MS | 500 | Delay before the single re-entry attempt. |
//! | PROCTOR__AUTO_SUBMIT_GRACE_MS | 3000 | Delay between the terminal notice and auto-submit. |
//! | PROCTOR__WARNING_DISMISS_MS | 6000 | Auto-dismiss for transient notices. |

use crate::error::{ProctorError, ProctorResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_MAX_VIOLATIONS: u32 = 3;
pub const DEFAULT_TAB_SWITCH_DEBOUNCE_MS: u64 = 1000;
pub const DEFAULT_FULLSCREEN_REENTRY_DELAY_MS: u64 = 500;
pub const DEFAULT_AUTO_SUBMIT_GRACE_MS: u64 = 3000;
pub const DEFAULT_WARNING_DISMISS_MS: u64 = 6000;

fn default_true() -> bool {
    true
}

fn default_max_violations() -> u32 {
    DEFAULT_MAX_VIOLATIONS
}

/// Session policy supplied by the exam-taking surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProctoringConfig {
    #[serde(default = "default_true")]
    pub enable_tab_detection: bool,
    #[serde(default = "default_true")]
    pub enable_copy_block: bool,
    #[serde(default = "default_true")]
    pub enable_fullscreen_mode: bool,
    /// Exiting fullscreen counts toward the budget, and running out of budget auto-submits.
    #[serde(default)]
    pub strict_fullscreen: bool,
    #[serde(default = "default_max_violations")]
    pub max_violations: u32,
}

impl Default for ProctoringConfig {
    fn default() -> Self {
        Self {
            enable_tab_detection: true,
            enable_copy_block: true,
            enable_fullscreen_mode: true,
            strict_fullscreen: false,
            max_violations: DEFAULT_MAX_VIOLATIONS,
        }
    }
}

impl ProctoringConfig {
    pub fn validate(&self) -> ProctorResult<()> {
        if self.max_violations == 0 {
            return Err(ProctorError::Config(
                "maxViolations must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fixed delays used by the observers and the policy engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProctorTimings {
    /// Absences must last longer than this to count as a tab switch (default: 1000ms)
    pub tab_switch_debounce: Duration,
    /// Wait before the single fullscreen re-entry attempt (default: 500ms)
    pub fullscreen_reentry_delay: Duration,
    /// Wait between the terminal notice and `on_auto_submit` (default: 3000ms)
    pub auto_submit_grace: Duration,
    /// Auto-dismiss for transient notices (default: 6000ms)
    pub warning_dismiss: Duration,
}

impl Default for ProctorTimings {
    fn default() -> Self {
        Self {
            tab_switch_debounce: Duration::from_millis(DEFAULT_TAB_SWITCH_DEBOUNCE_MS),
            fullscreen_reentry_delay: Duration::from_millis(DEFAULT_FULLSCREEN_REENTRY_DELAY_MS),
            auto_submit_grace: Duration::from_millis(DEFAULT_AUTO_SUBMIT_GRACE_MS),
            warning_dismiss: Duration::from_millis(DEFAULT_WARNING_DISMISS_MS),
        }
    }
}

/// Flat settings record loaded through the `config` crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProctorSettings {
    pub enable_tab_detection: bool,
    pub enable_copy_block: bool,
    pub enable_fullscreen_mode: bool,
    pub strict_fullscreen: bool,
    pub max_violations: u32,
    pub tab_switch_debounce_ms: u64,
    pub fullscreen_reentry_delay_ms: u64,
    pub auto_submit_grace_ms: u64,
    pub warning_dismiss_ms: u64,
}

impl ProctorSettings {
    /// Load from `$PROCTOR_CONFIG` (default `config/proctor`) plus `PROCTOR__*` env overrides.
    pub fn load() -> ProctorResult<Self> {
        let config_path =
            std::env::var("PROCTOR_CONFIG").unwrap_or_else(|_| "config/proctor".to_string());
        Self::load_from(Path::new(&config_path))
    }

    /// Load from an explicit file path. A missing file falls back to defaults.
    pub fn load_from(path: &Path) -> ProctorResult<Self> {
        let builder = config::Config::builder()
            .set_default("enable_tab_detection", true)?
            .set_default("enable_copy_block", true)?
            .set_default("enable_fullscreen_mode", true)?
            .set_default("strict_fullscreen", false)?
            .set_default("max_violations", DEFAULT_MAX_VIOLATIONS as i64)?
            .set_default("tab_switch_debounce_ms", DEFAULT_TAB_SWITCH_DEBOUNCE_MS as i64)?
            .set_default(
                "fullscreen_reentry_delay_ms",
                DEFAULT_FULLSCREEN_REENTRY_DELAY_MS as i64,
            )?
            .set_default("auto_submit_grace_ms", DEFAULT_AUTO_SUBMIT_GRACE_MS as i64)?
            .set_default("warning_dismiss_ms", DEFAULT_WARNING_DISMISS_MS as i64)?;

        let builder = builder.add_source(config::File::from(path).required(false));

        let built = builder
            .add_source(config::Environment::with_prefix("PROCTOR").separator("__"))
            .build()?;

        let settings: ProctorSettings = built.try_deserialize()?;
        settings.proctoring_config().validate()?;
        Ok(settings)
    }

    pub fn proctoring_config(&self) -> ProctoringConfig {
        ProctoringConfig {
            enable_tab_detection: self.enable_tab_detection,
            enable_copy_block: self.enable_copy_block,
            enable_fullscreen_mode: self.enable_fullscreen_mode,
            strict_fullscreen: self.strict_fullscreen,
            max_violations: self.max_violations,
        }
    }

    pub fn timings(&self) -> ProctorTimings {
        ProctorTimings {
            tab_switch_debounce: Duration::from_millis(self.tab_switch_debounce_ms),
            fullscreen_reentry_delay: Duration::from_millis(self.fullscreen_reentry_delay_ms),
            auto_submit_grace: Duration::from_millis(self.auto_submit_grace_ms),
            warning_dismiss: Duration::from_millis(self.warning_dismiss_ms),
        }
    }
}
