//! Violation model: the closed set of violation types, timestamped records
//! and the fixed per-type counter map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;

/// Behaviors that breach proctoring policy during an exam session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    /// Candidate left the exam window or tab for longer than the debounce threshold.
    TabSwitch,
    /// Candidate left mandated fullscreen mode.
    FullscreenExit,
    /// Copy or cut of protected content, by menu or keyboard.
    CopyAttempt,
    /// Right-click context menu on exam content.
    ContextMenuAttempt,
}

impl ViolationType {
    pub const COUNT: usize = 4;

    pub const ALL: [ViolationType; Self::COUNT] = [
        ViolationType::TabSwitch,
        ViolationType::FullscreenExit,
        ViolationType::CopyAttempt,
        ViolationType::ContextMenuAttempt,
    ];

    const fn index(self) -> usize {
        match self {
            ViolationType::TabSwitch => 0,
            ViolationType::FullscreenExit => 1,
            ViolationType::CopyAttempt => 2,
            ViolationType::ContextMenuAttempt => 3,
        }
    }

    /// Wire name, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            ViolationType::TabSwitch => "tab_switch",
            ViolationType::FullscreenExit => "fullscreen_exit",
            ViolationType::CopyAttempt => "copy_attempt",
            ViolationType::ContextMenuAttempt => "context_menu_attempt",
        }
    }

    /// Candidate-facing description used in warning notices.
    pub fn describe(self) -> &'static str {
        match self {
            ViolationType::TabSwitch => "Leaving the exam window is not allowed",
            ViolationType::FullscreenExit => "Exiting fullscreen mode is not allowed",
            ViolationType::CopyAttempt => "Copying exam content is disabled",
            ViolationType::ContextMenuAttempt => "Right-click is disabled during the exam",
        }
    }
}

impl fmt::Display for ViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single recorded violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    #[serde(rename = "type")]
    pub kind: ViolationType,
    /// Monotonic milliseconds since the monitor was created.
    pub timestamp: u64,
    /// Away duration in milliseconds; only set for `tab_switch`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    /// Wall-clock time of the record, for dispute review.
    pub recorded_at: DateTime<Utc>,
}

/// Per-type violation counts. All four types are always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    into = "BTreeMap<ViolationType, u32>",
    from = "BTreeMap<ViolationType, u32>"
)]
pub struct ViolationCounts([u32; ViolationType::COUNT]);

impl ViolationCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: ViolationType) -> u32 {
        self.0[kind.index()]
    }

    /// Sum across all types.
    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ViolationType, u32)> + '_ {
        ViolationType::ALL.iter().map(move |&kind| (kind, self.get(kind)))
    }

    pub(crate) fn increment(&mut self, kind: ViolationType) -> u32 {
        let slot = &mut self.0[kind.index()];
        *slot = slot.saturating_add(1);
        *slot
    }

    pub(crate) fn clear(&mut self) {
        self.0 = [0; ViolationType::COUNT];
    }
}

impl Index<ViolationType> for ViolationCounts {
    type Output = u32;

    fn index(&self, kind: ViolationType) -> &u32 {
        &self.0[kind.index()]
    }
}

impl From<ViolationCounts> for BTreeMap<ViolationType, u32> {
    fn from(counts: ViolationCounts) -> Self {
        counts.iter().collect()
    }
}

impl From<BTreeMap<ViolationType, u32>> for ViolationCounts {
    fn from(map: BTreeMap<ViolationType, u32>) -> Self {
        let mut counts = ViolationCounts::default();
        for (kind, count) in map {
            counts.0[kind.index()] = count;
        }
        counts
    }
}
