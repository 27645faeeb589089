//! Errant GTID repair
//!
//! Detection, planning and the stop/apply/resume sequence around them.

mod audited;
mod confirm;
mod errant;
mod guard;
mod orchestrator;
mod plan;
mod state;

pub use confirm::{is_affirmative, Confirmer};
pub use errant::{ErrantEntry, ErrantReport, ErrantSetCalculator};
pub use guard::ResumeGuard;
pub use orchestrator::{RepairOrchestrator, RepairOutcome};
pub use plan::{RepairPlan, TopSummary};
pub use state::{PhaseTracker, RepairPhase};
