//! PolicyEngine: turns the running total into a warning or the terminal action.

use crate::config::ProctoringConfig;

/// Outcome of evaluating one updated total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Budget remains; tell the candidate how much.
    Warn { remaining: u32 },
    /// Past the budget in a non-strict session. Recorded, never terminal.
    BudgetExhausted,
    /// Threshold crossed in strict mode and the latch is still armed: fire it now.
    Terminate,
    /// The latch already fired; no second terminal action.
    AlreadyTerminating,
}

#[derive(Debug, Clone, Copy)]
pub struct PolicyEngine {
    max_violations: u32,
    strict_fullscreen: bool,
}

impl PolicyEngine {
    pub fn new(config: &ProctoringConfig) -> Self {
        Self {
            max_violations: config.max_violations,
            strict_fullscreen: config.strict_fullscreen,
        }
    }

    pub fn max_violations(&self) -> u32 {
        self.max_violations
    }

    /// `max_violations - total`, negative once the budget is overrun.
    pub fn remaining(&self, total: u32) -> i64 {
        i64::from(self.max_violations) - i64::from(total)
    }

    pub fn evaluate(&self, total: u32, latched: bool) -> PolicyDecision {
        let remaining = self.remaining(total);
        if remaining > 0 {
            return PolicyDecision::Warn {
                remaining: remaining as u32,
            };
        }
        if !self.strict_fullscreen {
            return PolicyDecision::BudgetExhausted;
        }
        if latched {
            PolicyDecision::AlreadyTerminating
        } else {
            PolicyDecision::Terminate
        }
    }
}
