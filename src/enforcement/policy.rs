use serde::{Deserialize, Serialize};

use crate::budget::BudgetState;

/// Application-wide lock mode derived from the latest budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LockState {
    #[default]
    Unlocked,
    Locked,
}

impl LockState {
    pub fn is_locked(self) -> bool {
        self == LockState::Locked
    }
}

/// Latch that lets the low-time warning through once per mount
#[derive(Debug, Default)]
pub struct WarningLatch {
    warned: bool,
}

impl WarningLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true exactly once: the first time the budget is inside the
    /// warning window. Never resets.
    pub fn should_warn(&mut self, state: &BudgetState, threshold_secs: u64) -> bool {
        if self.warned || !in_warning_window(state, threshold_secs) {
            return false;
        }
        self.warned = true;
        true
    }
}

/// Remaining time is limited, not yet exhausted, and at or under the threshold
pub fn in_warning_window(state: &BudgetState, threshold_secs: u64) -> bool {
    matches!(state.remaining_seconds, Some(r) if r > 0 && r <= threshold_secs)
}

/// Locked iff the limit is exhausted and no parent override is set
pub fn lock_decision(state: &BudgetState, override_set: bool) -> LockState {
    if state.is_exhausted() && !override_set {
        LockState::Locked
    } else {
        LockState::Unlocked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_window_bounds() {
        assert!(!in_warning_window(&BudgetState::limited(0), 300));
        assert!(in_warning_window(&BudgetState::limited(1), 300));
        assert!(in_warning_window(&BudgetState::limited(300), 300));
        assert!(!in_warning_window(&BudgetState::limited(301), 300));
        assert!(!in_warning_window(&BudgetState::unlimited(), 300));
    }

    #[test]
    fn latch_fires_once_across_many_evaluations() {
        let mut latch = WarningLatch::new();
        let fired = [280, 220, 160, 100, 40]
            .iter()
            .filter(|&&r| latch.should_warn(&BudgetState::limited(r), 300))
            .count();

        assert_eq!(fired, 1);
    }

    #[test]
    fn latch_stays_closed_outside_window() {
        let mut latch = WarningLatch::new();
        assert!(!latch.should_warn(&BudgetState::limited(600), 300));
        assert!(!latch.should_warn(&BudgetState::unlimited(), 300));
        assert!(!latch.should_warn(&BudgetState::limited(0), 300));

        assert!(latch.should_warn(&BudgetState::limited(250), 300));
    }

    #[test]
    fn latch_does_not_reset_when_budget_recovers() {
        let mut latch = WarningLatch::new();
        assert!(latch.should_warn(&BudgetState::limited(200), 300));
        assert!(!latch.should_warn(&BudgetState::limited(3600), 300));
        assert!(!latch.should_warn(&BudgetState::limited(200), 300));
    }

    #[test]
    fn lock_requires_exhaustion_without_override() {
        assert_eq!(lock_decision(&BudgetState::limited(0), false), LockState::Locked);
        assert_eq!(lock_decision(&BudgetState::limited(0), true), LockState::Unlocked);
        assert_eq!(lock_decision(&BudgetState::limited(1), false), LockState::Unlocked);
        assert_eq!(lock_decision(&BudgetState::unlimited(), false), LockState::Unlocked);
    }
}
