//! ViolationRecorder: the only writer of violation state.
//!
//! Appends timestamped records and keeps the per-type counters. The running total
//! is always derived from the counters, so it cannot drift from their sum.

use crate::violation::{Violation, ViolationCounts, ViolationType};
use chrono::Utc;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct ViolationRecorder {
    violations: Vec<Violation>,
    counts: ViolationCounts,
    frozen: bool,
}

impl ViolationRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one violation and return the new total, or `None` if the history is frozen.
    ///
    /// `duration` is kept only for tab switches.
    pub fn add_violation(
        &mut self,
        kind: ViolationType,
        duration: Option<Duration>,
        timestamp_ms: u64,
    ) -> Option<u32> {
        if self.frozen {
            return None;
        }

        let duration = match kind {
            ViolationType::TabSwitch => duration.map(|d| d.as_millis() as u64),
            _ => None,
        };

        self.violations.push(Violation {
            kind,
            timestamp: timestamp_ms,
            duration,
            recorded_at: Utc::now(),
        });
        self.counts.increment(kind);
        Some(self.total())
    }

    pub fn total(&self) -> u32 {
        self.counts.total()
    }

    pub fn counts(&self) -> ViolationCounts {
        self.counts
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Make the history read-only (session stopped or submitted).
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Reopen the history for appending when a session restarts.
    pub fn thaw(&mut self) {
        self.frozen = false;
    }

    /// Drop every record and counter.
    pub fn clear(&mut self) {
        self.violations.clear();
        self.counts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_violation_updates_counts_and_total() {
        let mut recorder = ViolationRecorder::new();

        assert_eq!(
            recorder.add_violation(ViolationType::CopyAttempt, None, 10),
            Some(1)
        );
        assert_eq!(
            recorder.add_violation(
                ViolationType::TabSwitch,
                Some(Duration::from_millis(1500)),
                20
            ),
            Some(2)
        );

        assert_eq!(recorder.counts().get(ViolationType::CopyAttempt), 1);
        assert_eq!(recorder.counts().get(ViolationType::TabSwitch), 1);
        assert_eq!(recorder.total(), recorder.counts().total());

        let records = recorder.violations();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].timestamp, 10);
        assert_eq!(records[1].duration, Some(1500));
    }

    #[test]
    fn test_duration_dropped_for_other_types() {
        let mut recorder = ViolationRecorder::new();
        recorder.add_violation(
            ViolationType::FullscreenExit,
            Some(Duration::from_millis(900)),
            0,
        );
        assert_eq!(recorder.violations()[0].duration, None);
    }

    #[test]
    fn test_frozen_history_rejects_writes() {
        let mut recorder = ViolationRecorder::new();
        recorder.add_violation(ViolationType::ContextMenuAttempt, None, 0);
        recorder.freeze();

        assert_eq!(recorder.add_violation(ViolationType::CopyAttempt, None, 5), None);
        assert_eq!(recorder.total(), 1);

        recorder.thaw();
        assert_eq!(recorder.add_violation(ViolationType::CopyAttempt, None, 5), Some(2));
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut recorder = ViolationRecorder::new();
        recorder.add_violation(ViolationType::CopyAttempt, None, 0);
        recorder.add_violation(ViolationType::CopyAttempt, None, 1);
        recorder.clear();

        assert!(recorder.violations().is_empty());
        assert_eq!(recorder.total(), 0);
        for (_, count) in recorder.counts().iter() {
            assert_eq!(count, 0);
        }
    }
}
