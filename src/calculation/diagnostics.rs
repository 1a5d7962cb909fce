//! Advisory diagnostics.
//!
//! Nothing here blocks an operation. Findings are returned as
//! [`Diagnostic`] values for the caller to show.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::config::DiagnosticSettings;
use crate::models::{Diagnostic, Severity, WorkOrder, WorkOrderTask};

/// Work order has no contracted value.
pub const ZERO_VALUE: &str = "ZERO_VALUE";
/// A task has no material cost.
pub const ZERO_MATERIAL_COST: &str = "ZERO_MATERIAL_COST";
/// Net profit is negative.
pub const NEGATIVE_MARGIN: &str = "NEGATIVE_MARGIN";
/// Margin is positive but below the configured threshold.
pub const LOW_MARGIN: &str = "LOW_MARGIN";
/// Actual labor exceeds the budget.
pub const LABOR_OVER_PLAN: &str = "LABOR_OVER_PLAN";
/// A finished work order accrued no labor.
pub const NO_LABOR_RECORDED: &str = "NO_LABOR_RECORDED";
/// A worker expected on site has no attendance.
pub const MISSING_ATTENDANCE: &str = "MISSING_ATTENDANCE";

/// Checks a work order's aggregate and tasks for suspicious economics.
pub fn profit_warnings(
    work_order: &WorkOrder,
    tasks: &[WorkOrderTask],
    settings: &DiagnosticSettings,
) -> Vec<Diagnostic> {
    let totals = &work_order.totals;
    let mut warnings = Vec::new();

    if totals.total_value.is_zero() {
        warnings.push(Diagnostic::new(
            ZERO_VALUE,
            Severity::High,
            &work_order.id,
            format!("Work order {} has no contracted value", work_order.name),
        ));
    }

    for task in tasks.iter().filter(|t| t.material_cost.is_zero()) {
        warnings.push(Diagnostic::new(
            ZERO_MATERIAL_COST,
            Severity::Medium,
            &task.id,
            format!("Task {} for product {} has no material cost", task.id, task.product_id),
        ));
    }

    if totals.net_profit < Decimal::ZERO {
        warnings.push(Diagnostic::new(
            NEGATIVE_MARGIN,
            Severity::High,
            &work_order.id,
            format!(
                "Net profit is {} ({}% margin)",
                totals.net_profit, totals.profit_margin
            ),
        ));
    } else if !totals.total_value.is_zero() && totals.profit_margin < settings.low_margin_percent {
        warnings.push(Diagnostic::new(
            LOW_MARGIN,
            Severity::Medium,
            &work_order.id,
            format!(
                "Margin {}% is below {}%",
                totals.profit_margin, settings.low_margin_percent
            ),
        ));
    }

    if totals.planned_labor_cost > Decimal::ZERO
        && totals.actual_labor_cost > totals.planned_labor_cost
    {
        warnings.push(Diagnostic::new(
            LABOR_OVER_PLAN,
            Severity::Medium,
            &work_order.id,
            format!(
                "Actual labor {} exceeds planned {} by {}",
                totals.actual_labor_cost,
                totals.planned_labor_cost,
                -totals.labor_variance
            ),
        ));
    }

    if work_order.is_done() && !tasks.is_empty() && totals.actual_labor_cost.is_zero() {
        warnings.push(Diagnostic::new(
            NO_LABOR_RECORDED,
            Severity::Low,
            &work_order.id,
            "Work order is done but no labor was recorded",
        ));
    }

    warnings
}

/// Flags expected workers that have no attendance record for `date`.
///
/// `expected` maps each expected worker to the tasks they are eligible on.
/// `recorded` holds the workers with any attendance record for the date.
pub fn missing_attendance(
    date: NaiveDate,
    expected: &BTreeMap<String, BTreeSet<String>>,
    recorded: &BTreeSet<String>,
) -> Vec<Diagnostic> {
    expected
        .iter()
        .filter(|(worker, _)| !recorded.contains(*worker))
        .map(|(worker, tasks)| {
            let task_list: Vec<&str> = tasks.iter().map(String::as_str).collect();
            Diagnostic::new(
                MISSING_ATTENDANCE,
                Severity::Medium,
                worker,
                format!(
                    "No attendance on {} for worker assigned to active task(s) {}",
                    date,
                    task_list.join(", ")
                ),
            )
        })
        .collect()
}
