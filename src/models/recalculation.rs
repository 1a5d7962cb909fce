//! Result models for the engine pipeline.
//!
//! Each pipeline stage returns a result carrying the identifiers the next
//! stage needs, plus an audit trace explaining the decisions it took.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{TaskStatus, WorkOrderStatus, WorkOrderTotals};

/// A single step in the audit trace recording a costing or status decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStep {
    /// The sequential step number.
    pub step_number: u32,
    /// Identifier of the rule that was applied.
    pub rule_id: String,
    /// The entity the rule was applied to (task, product or work order id).
    pub subject: String,
    /// The input data for this step.
    pub input: serde_json::Value,
    /// The output data from this step.
    pub output: serde_json::Value,
    /// Human-readable explanation of the decision.
    pub reasoning: String,
}

/// How serious an advisory diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational.
    Low,
    /// Should be looked at.
    Medium,
    /// Likely wrong data or a loss.
    High,
}

/// A non-fatal advisory produced by validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// A code identifying the type of warning.
    pub code: String,
    /// A human-readable description of the warning.
    pub message: String,
    /// The severity level.
    pub severity: Severity,
    /// The entity the warning is about.
    pub subject: String,
}

impl Diagnostic {
    /// Creates a diagnostic.
    pub fn new(
        code: impl Into<String>,
        severity: Severity,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            severity,
            subject: subject.into(),
        }
    }
}

/// The audit trace of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuditTrace {
    /// The sequence of decisions.
    pub steps: Vec<AuditStep>,
    /// Any warnings raised along the way.
    pub warnings: Vec<Diagnostic>,
    /// The total duration in microseconds.
    pub duration_us: u64,
}

impl AuditTrace {
    /// Step number the next appended step should use.
    pub fn next_step_number(&self) -> u32 {
        self.steps.len() as u32 + 1
    }
}

/// Outcome of deriving (or cleaning up) work logs for one worker and date.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DerivationOutcome {
    /// Work logs created.
    pub created: u32,
    /// Work logs that already existed.
    pub skipped: u32,
    /// Work logs whose split rate was rewritten.
    pub rewritten: u32,
    /// Work logs deleted (stale or non-working day).
    pub deleted: u32,
    /// Work orders whose labor cost may have changed.
    pub affected_work_orders: BTreeSet<String>,
}

impl DerivationOutcome {
    /// Folds another outcome into this one.
    pub fn merge(&mut self, other: DerivationOutcome) {
        self.created += other.created;
        self.skipped += other.skipped;
        self.rewritten += other.rewritten;
        self.deleted += other.deleted;
        self.affected_work_orders.extend(other.affected_work_orders);
    }
}

/// Costing outcome of a single task inside a recalculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCostLine {
    /// The task.
    pub task_id: String,
    /// The task's status.
    pub status: TaskStatus,
    /// Whether the task's costs are frozen.
    pub frozen: bool,
    /// Contracted value.
    pub value: Decimal,
    /// Material cost used.
    pub material_cost: Decimal,
    /// Actual labor cost used.
    pub actual_labor_cost: Decimal,
}

/// A status change applied (or rejected) by the propagator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// The product or project.
    pub subject: String,
    /// Status before.
    pub from: String,
    /// Status after.
    pub to: String,
}

/// The complete result of recalculating one work order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecalculationResult {
    /// The work order.
    pub work_order_id: String,
    /// Status before the recalculation.
    pub previous_status: WorkOrderStatus,
    /// Status after the recalculation.
    pub status: WorkOrderStatus,
    /// Recomputed aggregate.
    pub totals: WorkOrderTotals,
    /// Per-task costing.
    pub tasks: Vec<TaskCostLine>,
    /// Products touched by the work order.
    pub products: BTreeSet<String>,
    /// Whether a completion snapshot was written.
    pub snapshot_written: bool,
    /// Status changes applied downstream.
    pub status_changes: Vec<StatusChange>,
    /// When the recalculation ran.
    pub calculated_at: DateTime<Utc>,
    /// Audit trace of decisions.
    pub audit_trace: AuditTrace,
}
