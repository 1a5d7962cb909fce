//! Work order model.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Derived status of a work order. Never set directly by users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    /// No task has started.
    #[default]
    Waiting,
    /// At least one task is in progress.
    InProgress,
    /// Every task is done.
    Done,
}

/// Aggregated economics of a work order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkOrderTotals {
    /// Sum of task values.
    pub total_value: Decimal,
    /// Sum of task material costs.
    pub material_cost: Decimal,
    /// Sum of budgeted labor.
    pub planned_labor_cost: Decimal,
    /// Sum of actual labor.
    pub actual_labor_cost: Decimal,
    /// Sum of transport shares.
    pub transport_share: Decimal,
    /// Sum of service fees.
    pub services_total: Decimal,
    /// Value minus material, transport and services.
    pub gross_profit: Decimal,
    /// Gross profit minus actual labor.
    pub net_profit: Decimal,
    /// Net profit as a percentage of value.
    pub profit_margin: Decimal,
    /// Planned minus actual labor.
    pub labor_variance: Decimal,
}

/// A batch of production tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrder {
    /// Unique identifier for the work order.
    pub id: String,
    /// The tenant the work order belongs to.
    pub tenant_id: String,
    /// Display name or number.
    pub name: String,
    /// Work order class (e.g. "production", "installation").
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Derived status.
    #[serde(default)]
    pub status: WorkOrderStatus,
    /// Earliest task start.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Latest task completion, set once done.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Scheduled start.
    #[serde(default)]
    pub planned_start: Option<NaiveDate>,
    /// Scheduled end.
    #[serde(default)]
    pub planned_end: Option<NaiveDate>,
    /// Aggregated economics.
    #[serde(default)]
    pub totals: WorkOrderTotals,
    /// When the aggregate was last recomputed.
    #[serde(default)]
    pub recalculated_at: Option<DateTime<Utc>>,
}

fn default_kind() -> String {
    "production".to_string()
}

impl WorkOrder {
    /// Returns true if the work order's active interval covers `date`.
    ///
    /// Completed work orders still cover their historical span.
    pub fn active_on(&self, date: NaiveDate) -> bool {
        match self.started_at {
            Some(start) => {
                start.date_naive() <= date
                    && self.completed_at.is_none_or(|end| end.date_naive() >= date)
            }
            None => false,
        }
    }

    /// Returns true once every task is done.
    pub fn is_done(&self) -> bool {
        self.status == WorkOrderStatus::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn work_order() -> WorkOrder {
        WorkOrder {
            id: "wo_1".to_string(),
            tenant_id: "acme".to_string(),
            name: "WO-2024-017".to_string(),
            kind: "production".to_string(),
            status: WorkOrderStatus::InProgress,
            started_at: Some(Utc.with_ymd_and_hms(2024, 4, 29, 7, 0, 0).unwrap()),
            completed_at: None,
            planned_start: None,
            planned_end: None,
            totals: WorkOrderTotals::default(),
            recalculated_at: None,
        }
    }

    #[test]
    fn test_open_work_order_covers_later_dates() {
        let wo = work_order();
        assert!(!wo.active_on(NaiveDate::from_ymd_opt(2024, 4, 28).unwrap()));
        assert!(wo.active_on(NaiveDate::from_ymd_opt(2024, 4, 29).unwrap()));
        assert!(wo.active_on(NaiveDate::from_ymd_opt(2024, 12, 1).unwrap()));
    }

    #[test]
    fn test_completed_work_order_covers_its_span() {
        let mut wo = work_order();
        wo.status = WorkOrderStatus::Done;
        wo.completed_at = Some(Utc.with_ymd_and_hms(2024, 5, 3, 16, 0, 0).unwrap());
        assert!(wo.active_on(NaiveDate::from_ymd_opt(2024, 5, 3).unwrap()));
        assert!(!wo.active_on(NaiveDate::from_ymd_opt(2024, 5, 4).unwrap()));
        assert!(wo.is_done());
    }

    #[test]
    fn test_unstarted_work_order_covers_nothing() {
        let mut wo = work_order();
        wo.started_at = None;
        assert!(!wo.active_on(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()));
    }

    #[test]
    fn test_kind_defaults_to_production() {
        let json = r#"{"id": "wo_9", "tenant_id": "acme", "name": "WO-9"}"#;
        let wo: WorkOrder = serde_json::from_str(json).unwrap();
        assert_eq!(wo.kind, "production");
        assert_eq!(wo.status, WorkOrderStatus::Waiting);
        assert_eq!(wo.totals, WorkOrderTotals::default());
    }
}
