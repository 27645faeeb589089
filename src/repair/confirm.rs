//! Operator confirmation

use super::plan::RepairPlan;

/// Asks the operator whether a printed plan may be applied.
///
/// Anything but an explicit yes is a decline.
pub trait Confirmer {
    fn confirm(&mut self, plan: &RepairPlan) -> bool;
}

impl<F> Confirmer for F
where
    F: FnMut(&RepairPlan) -> bool,
{
    fn confirm(&mut self, plan: &RepairPlan) -> bool {
        self(plan)
    }
}

/// Interpret one line of operator input.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
