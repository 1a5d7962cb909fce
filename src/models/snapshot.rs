//! Point-in-time records of completed work orders for analytics.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::WorkOrderTotals;

/// Per-task line of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotTaskLine {
    /// The task.
    pub task_id: String,
    /// The product produced.
    pub product_id: String,
    /// Units produced.
    pub quantity: u32,
    /// Material cost at completion.
    pub material_cost: Decimal,
    /// Labor cost at completion.
    pub labor_cost: Decimal,
    /// Whole days between start and completion, inclusive.
    pub duration_days: i64,
}

/// Per-worker line of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotWorkerLine {
    /// The worker.
    pub worker_id: String,
    /// Distinct days the worker logged on the work order.
    pub days: u32,
    /// Labor cost the worker contributed.
    pub labor_cost: Decimal,
}

/// Economics of a work order at the moment it became done.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrderSnapshot {
    /// Unique identifier for the snapshot.
    pub id: Uuid,
    /// The tenant.
    pub tenant_id: String,
    /// The completed work order.
    pub work_order_id: String,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
    /// Aggregated economics.
    pub totals: WorkOrderTotals,
    /// Whole days between work order start and completion, inclusive.
    pub duration_days: i64,
    /// Task lines.
    pub tasks: Vec<SnapshotTaskLine>,
    /// Worker lines.
    pub workers: Vec<SnapshotWorkerLine>,
}
