//! Filter enums for list commands

use clap::ValueEnum;

use crate::core::run::RunState;

/// Run state filter for `run list`
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum RunStateFilter {
    /// Runs still waiting for an observed outcome
    Created,
    /// Runs that have fed back an outcome
    Calibrated,
    /// All runs - default
    #[default]
    All,
}

impl RunStateFilter {
    pub fn matches(&self, state: &RunState) -> bool {
        match self {
            RunStateFilter::Created => *state == RunState::Created,
            RunStateFilter::Calibrated => *state == RunState::Calibrated,
            RunStateFilter::All => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_state_filter() {
        assert!(RunStateFilter::All.matches(&RunState::Created));
        assert!(RunStateFilter::All.matches(&RunState::Calibrated));
        assert!(RunStateFilter::Created.matches(&RunState::Created));
        assert!(!RunStateFilter::Created.matches(&RunState::Calibrated));
        assert!(RunStateFilter::Calibrated.matches(&RunState::Calibrated));
        assert!(!RunStateFilter::Calibrated.matches(&RunState::Created));
    }
}
