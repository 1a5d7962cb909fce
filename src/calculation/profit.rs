//! Work order aggregation and profit.
//!
//! The profit formula is fixed:
//!
//! ```text
//! gross  = value - material - transport - services
//! net    = gross - actual labor
//! margin = net / value * 100    (0 when value is 0)
//! variance = planned labor - actual labor
//! ```

use rust_decimal::Decimal;

use crate::models::{TaskStatus, WorkOrderStatus, WorkOrderTotals};

/// The cost figures of one task that feed the work order aggregate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFigures {
    /// Contracted value.
    pub value: Decimal,
    /// Material cost.
    pub material_cost: Decimal,
    /// Budgeted labor.
    pub planned_labor_cost: Decimal,
    /// Actual labor.
    pub actual_labor_cost: Decimal,
    /// Transport share.
    pub transport_share: Decimal,
    /// Service fees.
    pub services_total: Decimal,
}

/// Net profit as a percentage of value, rounded to two places.
pub fn profit_margin(net_profit: Decimal, value: Decimal) -> Decimal {
    if value.is_zero() {
        return Decimal::ZERO;
    }
    (net_profit / value * Decimal::ONE_HUNDRED).round_dp(2)
}

/// Sums task figures and applies the profit formula.
pub fn calculate_totals<'a, I>(tasks: I) -> WorkOrderTotals
where
    I: IntoIterator<Item = &'a TaskFigures>,
{
    let mut totals = WorkOrderTotals::default();
    for task in tasks {
        totals.total_value += task.value;
        totals.material_cost += task.material_cost;
        totals.planned_labor_cost += task.planned_labor_cost;
        totals.actual_labor_cost += task.actual_labor_cost;
        totals.transport_share += task.transport_share;
        totals.services_total += task.services_total;
    }

    totals.gross_profit = totals.total_value
        - totals.material_cost
        - totals.transport_share
        - totals.services_total;
    totals.net_profit = totals.gross_profit - totals.actual_labor_cost;
    totals.profit_margin = profit_margin(totals.net_profit, totals.total_value);
    totals.labor_variance = totals.planned_labor_cost - totals.actual_labor_cost;
    totals
}

/// Derives a work order's status from its tasks.
///
/// Done when every task is done, in progress when any task is in progress,
/// waiting otherwise (including a work order without tasks).
pub fn derive_work_order_status<I>(statuses: I) -> WorkOrderStatus
where
    I: IntoIterator<Item = TaskStatus>,
{
    let mut any = false;
    let mut all_done = true;
    let mut any_in_progress = false;
    for status in statuses {
        any = true;
        all_done &= status == TaskStatus::Done;
        any_in_progress |= status == TaskStatus::InProgress;
    }

    if any && all_done {
        WorkOrderStatus::Done
    } else if any_in_progress {
        WorkOrderStatus::InProgress
    } else {
        WorkOrderStatus::Waiting
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn figures(value: &str, material: &str, planned: &str, actual: &str) -> TaskFigures {
        TaskFigures {
            value: dec(value),
            material_cost: dec(material),
            planned_labor_cost: dec(planned),
            actual_labor_cost: dec(actual),
            ..TaskFigures::default()
        }
    }

    #[test]
    fn test_profit_formula() {
        let mut first = figures("1000", "300", "200", "150");
        first.transport_share = dec("50");
        let mut second = figures("500", "100", "100", "120");
        second.services_total = dec("30");

        let totals = calculate_totals(&[first, second]);
        assert_eq!(totals.total_value, dec("1500"));
        assert_eq!(totals.material_cost, dec("400"));
        assert_eq!(totals.gross_profit, dec("1020"));
        assert_eq!(totals.net_profit, dec("750"));
        assert_eq!(totals.profit_margin, dec("50.00"));
        assert_eq!(totals.labor_variance, dec("30"));
    }

    #[test]
    fn test_margin_zero_when_value_zero() {
        let totals = calculate_totals(&[figures("0", "100", "0", "50")]);
        assert_eq!(totals.net_profit, dec("-150"));
        assert_eq!(totals.profit_margin, Decimal::ZERO);
    }

    #[test]
    fn test_negative_margin() {
        assert_eq!(profit_margin(dec("-25"), dec("200")), dec("-12.50"));
    }

    #[test]
    fn test_margin_rounds_to_cents() {
        assert_eq!(profit_margin(dec("1"), dec("3")), dec("33.33"));
    }

    #[test]
    fn test_empty_work_order_totals() {
        let totals = calculate_totals(&Vec::<TaskFigures>::new());
        assert_eq!(totals, WorkOrderTotals::default());
    }

    #[test]
    fn test_work_order_status_all_done() {
        let status = derive_work_order_status([TaskStatus::Done, TaskStatus::Done]);
        assert_eq!(status, WorkOrderStatus::Done);
    }

    #[test]
    fn test_work_order_status_any_in_progress() {
        let status = derive_work_order_status([
            TaskStatus::Done,
            TaskStatus::InProgress,
            TaskStatus::Waiting,
        ]);
        assert_eq!(status, WorkOrderStatus::InProgress);
    }

    #[test]
    fn test_work_order_status_waiting() {
        assert_eq!(
            derive_work_order_status([TaskStatus::Waiting, TaskStatus::Done]),
            WorkOrderStatus::Waiting
        );
        assert_eq!(derive_work_order_status(std::iter::empty()), WorkOrderStatus::Waiting);
    }
}
