//! Retry budgets and derived bounds for a single run.

use serde::{Deserialize, Serialize};

/// Independent retry budgets plus the optional global step ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budgets {
    pub max_exec_retries: u32,
    pub max_validation_retries: u32,
    /// Upper bound on collaborator dispatches. `None` disables the ceiling.
    pub max_steps: Option<u32>,
}

impl Default for Budgets {
    fn default() -> Self {
        Self {
            max_exec_retries: 5,
            max_validation_retries: 5,
            max_steps: None,
        }
    }
}

impl Budgets {
    pub const fn new(max_exec_retries: u32, max_validation_retries: u32) -> Self {
        Self {
            max_exec_retries,
            max_validation_retries,
            max_steps: None,
        }
    }

    pub fn with_max_steps(mut self, max_steps: Option<u32>) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Most generator calls a run may make: the first attempt plus one per retry edge.
    pub fn generator_call_limit(&self) -> u32 {
        1u32.saturating_add(self.max_exec_retries)
            .saturating_add(self.max_validation_retries)
    }

    /// True when `steps` dispatches have used up the global ceiling.
    pub fn step_ceiling_reached(&self, steps: u32) -> bool {
        self.max_steps.is_some_and(|max| steps >= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_limit_is_one_plus_both_budgets() {
        assert_eq!(Budgets::new(0, 0).generator_call_limit(), 1);
        assert_eq!(Budgets::new(5, 5).generator_call_limit(), 11);
        assert_eq!(Budgets::new(u32::MAX, 3).generator_call_limit(), u32::MAX);
    }

    #[test]
    fn ceiling_disabled_by_default() {
        let budgets = Budgets::default();
        assert!(!budgets.step_ceiling_reached(u32::MAX));
        let budgets = budgets.with_max_steps(Some(4));
        assert!(!budgets.step_ceiling_reached(3));
        assert!(budgets.step_ceiling_reached(4));
    }
}
