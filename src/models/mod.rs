//! Core data models for the labor cost engine.
//!
//! This module contains all the domain models used throughout the engine.

mod attendance;
mod product;
mod recalculation;
mod snapshot;
mod task;
mod work_log;
mod work_order;
mod worker;

pub use attendance::{AttendanceRecord, AttendanceStatus};
pub use product::{AcceptedOffer, Product, Project};
pub use recalculation::{
    AuditStep, AuditTrace, DerivationOutcome, Diagnostic, RecalculationResult, Severity,
    StatusChange, TaskCostLine,
};
pub use snapshot::{SnapshotTaskLine, SnapshotWorkerLine, WorkOrderSnapshot};
pub use task::{
    Decomposition, PausePeriod, Process, StageTracked, StageVisit, SubTask, TaskStatus,
    WorkOrderTask,
};
pub use work_log::{WorkLog, WorkLogKey};
pub use work_order::{WorkOrder, WorkOrderStatus, WorkOrderTotals};
pub use worker::Worker;
