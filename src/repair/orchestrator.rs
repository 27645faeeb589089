//! Repair orchestration
//!
//! Drives one run against a root node:
//!
//! 1. DISCOVER the topology above the root
//! 2. VALIDATE auto-position on every channel into the root
//! 3. DETECT errant GTIDs; stop here if there are none
//! 4. STOP the applier, acquiring the resume guarantee
//! 5. RE_DISCOVER so the plan is built from the frozen executed set
//! 6. PLAN the purge set and print it
//! 7. CONFIRM with the operator unless forced
//! 8. APPLY reset-applier, reset-source, set-purged
//! 9. RESUME the applier, whatever happened since STOP
//!
//! Every failure aborts the run. Nothing is retried or rolled back.

use std::fmt;
use std::io::Write;

use crate::errors::{ApplyStep, FixerError, FixerResult, Stage};
use crate::node::{Connector, Credentials, NodeConnection};
use crate::observability::{
    log_event, log_event_with_fields, AuditLog, Event, Logger, ObservationScope,
};
use crate::topology::{gate, Topology, TopologyWalker};

use super::audited;
use super::confirm::Confirmer;
use super::errant::{ErrantReport, ErrantSetCalculator};
use super::guard::ResumeGuard;
use super::plan::RepairPlan;
use super::state::{PhaseTracker, RepairPhase};

/// How a run ended when nothing failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairOutcome {
    /// No errant GTIDs; nothing was changed.
    Clean,
    /// The plan was applied.
    Repaired(RepairPlan),
    /// The operator declined; nothing was reset.
    Declined(RepairPlan),
}

impl RepairOutcome {
    pub fn plan(&self) -> Option<&RepairPlan> {
        match self {
            Self::Clean => None,
            Self::Repaired(plan) | Self::Declined(plan) => Some(plan),
        }
    }
}

/// Runs repairs against root nodes.
///
/// `credentials` are used for every node other than the root.
pub struct RepairOrchestrator<'a, C: Connector> {
    connector: &'a C,
    credentials: &'a Credentials,
    audit: &'a dyn AuditLog,
    console: &'a mut dyn Write,
    force: bool,
    phases: PhaseTracker,
}

impl<'a, C: Connector> RepairOrchestrator<'a, C> {
    pub fn new(
        connector: &'a C,
        credentials: &'a Credentials,
        audit: &'a dyn AuditLog,
        console: &'a mut dyn Write,
    ) -> Self {
        Self {
            connector,
            credentials,
            audit,
            console,
            force: false,
            phases: PhaseTracker::new(),
        }
    }

    /// Skip CONFIRM.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Phases visited by the last run, in order.
    pub fn phases(&self) -> &[RepairPhase] {
        self.phases.trace()
    }

    /// Phase the last run ended in.
    pub fn phase(&self) -> RepairPhase {
        self.phases.current()
    }

    pub fn run<N: NodeConnection>(
        &mut self,
        root: &mut N,
        confirmer: &mut dyn Confirmer,
    ) -> FixerResult<RepairOutcome> {
        self.phases = PhaseTracker::new();
        let result = self.run_phases(root, confirmer);
        if result.is_err() {
            self.phases.fail();
        }
        result
    }

    fn run_phases<N: NodeConnection>(
        &mut self,
        root: &mut N,
        confirmer: &mut dyn Confirmer,
    ) -> FixerResult<RepairOutcome> {
        let walker = TopologyWalker::new(self.connector, self.credentials);
        let node = root.address().to_string();

        let topology = observed("DISCOVER", &node, || walker.discover(root))?;
        log_topology(&topology);

        self.phases.advance(RepairPhase::Validate)?;
        observed("VALIDATE", &node, || gate::check(&topology))?;

        self.phases.advance(RepairPhase::Detect)?;
        self.say("errant transaction pre-check: ");
        let (connector, credentials) = (self.connector, self.credentials);
        let report = observed("DETECT", &node, || {
            ErrantSetCalculator::detect(root, connector, credentials, &topology)
        })?;
        for entry in report.entries() {
            self.say(entry);
        }
        self.say("");

        if report.is_empty() {
            self.say("errant GTID not found");
            self.phases.advance(RepairPhase::Clean)?;
            return Ok(RepairOutcome::Clean);
        }

        self.phases.advance(RepairPhase::Stop)?;
        self.say("stopping replica");
        let mut guard = ResumeGuard::stop(root, self.audit)?;

        let result = self.repair_stopped(&mut guard, &report, confirmer);

        let advanced = self.phases.advance(RepairPhase::Resume);
        self.say("resuming replica");
        let result = guard.finish(result);
        advanced?;
        result
    }

    fn repair_stopped<N: NodeConnection>(
        &mut self,
        conn: &mut ResumeGuard<'_, N>,
        report: &ErrantReport,
        confirmer: &mut dyn Confirmer,
    ) -> FixerResult<RepairOutcome> {
        let walker = TopologyWalker::new(self.connector, self.credentials);
        let node = conn.address().to_string();

        self.phases.advance(RepairPhase::Rediscover)?;
        let topology = observed("RE_DISCOVER", &node, || {
            walker
                .discover(&mut **conn)
                .map_err(|e| e.at_stage(Stage::Rediscover))
        })?;

        self.phases.advance(RepairPhase::Plan)?;
        let plan = RepairPlan::build(&topology.root().executed_gtid_set, report, &topology);
        self.show(&plan);

        if self.force {
            log_event(Event::ConfirmationForced);
        } else {
            self.phases.advance(RepairPhase::Confirm)?;
            if !confirmer.confirm(&plan) {
                log_event(Event::ConfirmationDeclined);
                self.say("do nothing");
                self.phases.advance(RepairPhase::Abort)?;
                return Ok(RepairOutcome::Declined(plan));
            }
        }

        self.phases.advance(RepairPhase::Apply)?;
        let scope = ObservationScope::with_fields("APPLY", &[("node", node.as_str())]);
        match self.apply(&mut **conn, &plan) {
            Ok(()) => {
                let purged = plan.purge_set().to_string();
                scope.complete_with_fields(&[("gtid_purged", purged.as_str())]);
            }
            Err(e) => {
                scope.fail_fatal(&e.to_string());
                return Err(e);
            }
        }

        Ok(RepairOutcome::Repaired(plan))
    }

    fn apply<N: NodeConnection>(&mut self, conn: &mut N, plan: &RepairPlan) -> FixerResult<()> {
        let node = conn.address().clone();
        let purge = plan.purge_set();

        for step in [
            ApplyStep::ResetApplier,
            ApplyStep::ResetSource,
            ApplyStep::SetPurged,
        ] {
            let argument = match step {
                ApplyStep::SetPurged => Some(purge),
                _ => None,
            };

            match argument {
                Some(set) => self.say(format_args!("{} on {}: '{}'", step, node, set)),
                None => self.say(format_args!("{} on {}", step, node)),
            }
            log_event_with_fields(
                Event::ApplyStatement,
                &[("step", step.as_str()), ("node", node.to_string().as_str())],
            );

            let result = audited::run(self.audit, Stage::Apply, conn, step.as_str(), argument, |c| {
                match step {
                    ApplyStep::ResetApplier => c.reset_applier(),
                    ApplyStep::ResetSource => c.reset_source(),
                    ApplyStep::SetPurged => c.set_purged(purge),
                }
            });

            if let Err(e) = result {
                log_event_with_fields(
                    Event::ApplyFailed,
                    &[("step", step.as_str()), ("reason", e.message.as_str())],
                );
                return Err(FixerError::Apply {
                    step,
                    node: e.address,
                    message: e.message,
                });
            }
        }

        log_event_with_fields(
            Event::PurgeCommitted,
            &[
                ("node", node.to_string().as_str()),
                ("gtid_purged", purge.to_string().as_str()),
            ],
        );
        Ok(())
    }

    /// One line on the operator console. A console that cannot be written to
    /// does not stop the repair.
    fn say(&mut self, line: impl fmt::Display) {
        let _ = writeln!(self.console, "{}", line);
    }

    fn show(&mut self, plan: &RepairPlan) {
        let _ = write!(self.console, "{}", plan);
        let _ = self.console.flush();
    }
}

fn observed<T>(name: &str, node: &str, op: impl FnOnce() -> FixerResult<T>) -> FixerResult<T> {
    let scope = ObservationScope::with_fields(name, &[("node", node)]);
    match op() {
        Ok(value) => {
            scope.complete();
            Ok(value)
        }
        Err(e) => {
            scope.fail(&e.to_string());
            Err(e)
        }
    }
}

fn log_topology(topology: &Topology) {
    let nodes = topology.len().to_string();
    let tops = topology.tops().len().to_string();
    Logger::info(
        "TOPOLOGY_DISCOVERED",
        &[
            ("root", topology.root().address.to_string().as_str()),
            ("nodes", nodes.as_str()),
            ("tops", tops.as_str()),
        ],
    );
}
