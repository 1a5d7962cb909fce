//! Eligibility of workers for task assignments on a date.
//!
//! A worker accrues labor cost on a task when the task's work order and the
//! task itself are active on the date, the worker is assigned (directly, or
//! to a process or subtask as worker or helper), and nothing covering that
//! assignment is paused on the date.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::models::{WorkLog, WorkOrder, WorkOrderTask};

/// A task a worker accrues cost on, with its work order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct EligibleAssignment {
    /// The task.
    pub task_id: String,
    /// The work order containing the task.
    pub work_order_id: String,
}

/// Work orders whose active interval covers `date`.
pub fn work_orders_active_on<'a>(
    work_orders: &'a [WorkOrder],
    date: NaiveDate,
) -> impl Iterator<Item = &'a WorkOrder> {
    work_orders.iter().filter(move |wo| wo.active_on(date))
}

/// Finds every task the worker is eligible on for `date`.
///
/// `tasks` may contain tasks of any work order; only those belonging to a
/// work order active on `date` are considered. The result is ordered by
/// task id and holds each task once.
pub fn find_eligible_assignments(
    worker_id: &str,
    date: NaiveDate,
    work_orders: &[WorkOrder],
    tasks: &[WorkOrderTask],
) -> Vec<EligibleAssignment> {
    let active: BTreeSet<&str> = work_orders_active_on(work_orders, date)
        .map(|wo| wo.id.as_str())
        .collect();

    let eligible: BTreeMap<&str, &str> = tasks
        .iter()
        .filter(|t| active.contains(t.work_order_id.as_str()))
        .filter(|t| t.is_worker_eligible(worker_id, date))
        .map(|t| (t.id.as_str(), t.work_order_id.as_str()))
        .collect();

    eligible
        .into_iter()
        .map(|(task_id, work_order_id)| EligibleAssignment {
            task_id: task_id.to_string(),
            work_order_id: work_order_id.to_string(),
        })
        .collect()
}

/// Existing logs whose task is no longer an eligible assignment.
pub fn stale_logs<'a>(existing: &'a [WorkLog], eligible: &[EligibleAssignment]) -> Vec<&'a WorkLog> {
    existing
        .iter()
        .filter(|log| !eligible.iter().any(|a| a.task_id == log.task_id))
        .collect()
}

/// Workers expected to record attendance on `date`, with their tasks.
///
/// These are all workers eligible on some task of a work order active on
/// the date.
pub fn expected_assignments(
    date: NaiveDate,
    work_orders: &[WorkOrder],
    tasks: &[WorkOrderTask],
) -> BTreeMap<String, BTreeSet<String>> {
    let active: BTreeSet<&str> = work_orders_active_on(work_orders, date)
        .map(|wo| wo.id.as_str())
        .collect();

    let mut expected: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for task in tasks
        .iter()
        .filter(|t| active.contains(t.work_order_id.as_str()))
    {
        for worker in task.involved_workers() {
            if task.is_worker_eligible(&worker, date) {
                expected.entry(worker).or_default().insert(task.id.clone());
            }
        }
    }
    expected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Decomposition, PausePeriod, Process, TaskStatus, WorkOrderStatus, WorkOrderTotals,
    };
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal::Decimal;

    fn at(m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, m, d, h, 0, 0).unwrap()
    }

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn work_order(id: &str, started: DateTime<Utc>, completed: Option<DateTime<Utc>>) -> WorkOrder {
        WorkOrder {
            id: id.to_string(),
            tenant_id: "acme".to_string(),
            name: id.to_uppercase(),
            kind: "production".to_string(),
            status: if completed.is_some() {
                WorkOrderStatus::Done
            } else {
                WorkOrderStatus::InProgress
            },
            started_at: Some(started),
            completed_at: completed,
            planned_start: None,
            planned_end: None,
            totals: WorkOrderTotals::default(),
            recalculated_at: None,
        }
    }

    fn task(id: &str, work_order_id: &str, workers: &[&str]) -> WorkOrderTask {
        WorkOrderTask {
            id: id.to_string(),
            tenant_id: "acme".to_string(),
            work_order_id: work_order_id.to_string(),
            product_id: format!("p_{}", id),
            project_id: "prj_1".to_string(),
            quantity: 1,
            status: TaskStatus::InProgress,
            started_at: Some(at(4, 29, 8)),
            completed_at: None,
            is_paused: false,
            pause_periods: vec![],
            assigned_workers: workers.iter().map(|w| w.to_string()).collect(),
            decomposition: Decomposition::Whole,
            value: Decimal::ZERO,
            offer_id: None,
            value_backfill_attempted: false,
            material_cost: Decimal::ZERO,
            material_cost_overridden: false,
            planned_labor_cost: Decimal::ZERO,
            actual_labor_cost: Decimal::ZERO,
            transport_share: Decimal::ZERO,
            services_total: Decimal::ZERO,
            frozen: false,
            frozen_labor_cost: None,
        }
    }

    #[test]
    fn test_finds_tasks_across_work_orders_sorted_by_task_id() {
        let work_orders = vec![
            work_order("wo_1", at(4, 29, 7), None),
            work_order("wo_2", at(4, 30, 7), None),
        ];
        let tasks = vec![
            task("t_3", "wo_2", &["w_a"]),
            task("t_1", "wo_1", &["w_a"]),
            task("t_2", "wo_1", &["w_a", "w_b"]),
        ];

        let eligible = find_eligible_assignments("w_a", date(5, 1), &work_orders, &tasks);
        let ids: Vec<&str> = eligible.iter().map(|a| a.task_id.as_str()).collect();
        assert_eq!(ids, vec!["t_1", "t_2", "t_3"]);
        assert_eq!(eligible[2].work_order_id, "wo_2");
    }

    #[test]
    fn test_excludes_tasks_of_work_orders_not_yet_started() {
        let work_orders = vec![work_order("wo_1", at(5, 2, 7), None)];
        let tasks = vec![task("t_1", "wo_1", &["w_a"])];
        assert!(find_eligible_assignments("w_a", date(5, 1), &work_orders, &tasks).is_empty());
    }

    #[test]
    fn test_includes_completed_work_order_within_its_span() {
        let work_orders = vec![work_order("wo_1", at(4, 29, 7), Some(at(5, 3, 16)))];
        let mut done = task("t_1", "wo_1", &["w_a"]);
        done.status = TaskStatus::Done;
        done.completed_at = Some(at(5, 3, 16));
        let tasks = vec![done];

        assert_eq!(
            find_eligible_assignments("w_a", date(5, 2), &work_orders, &tasks).len(),
            1
        );
        assert!(find_eligible_assignments("w_a", date(5, 6), &work_orders, &tasks).is_empty());
    }

    #[test]
    fn test_paused_task_is_excluded() {
        let work_orders = vec![work_order("wo_1", at(4, 29, 7), None)];
        let mut paused = task("t_2", "wo_1", &["w_a"]);
        paused.is_paused = true;
        paused.pause_periods.push(PausePeriod {
            started_at: at(5, 1, 9),
            ended_at: None,
        });
        let tasks = vec![task("t_1", "wo_1", &["w_a"]), paused];

        let eligible = find_eligible_assignments("w_a", date(5, 1), &work_orders, &tasks);
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].task_id, "t_1");
    }

    #[test]
    fn test_process_helper_is_eligible() {
        let work_orders = vec![work_order("wo_1", at(4, 29, 7), None)];
        let mut staged = task("t_1", "wo_1", &[]);
        staged.decomposition = Decomposition::Processes(vec![Process {
            name: "Assembly".to_string(),
            status: TaskStatus::InProgress,
            worker_id: Some("w_s".to_string()),
            helpers: vec!["w_h".to_string()],
            started_at: Some(at(4, 30, 8)),
            completed_at: None,
        }]);
        let tasks = vec![staged];

        assert_eq!(
            find_eligible_assignments("w_h", date(5, 1), &work_orders, &tasks).len(),
            1
        );
    }

    #[test]
    fn test_stale_logs_are_those_without_eligible_task() {
        let now = Utc::now();
        let make = |task_id: &str| WorkLog {
            tenant_id: "acme".to_string(),
            worker_id: "w_a".to_string(),
            task_id: task_id.to_string(),
            work_order_id: "wo_1".to_string(),
            date: date(5, 1),
            daily_rate: Decimal::new(3000, 2),
            original_daily_rate: Decimal::new(9000, 2),
            split_factor: 3,
            created_at: now,
            updated_at: now,
        };
        let existing = vec![make("t_1"), make("t_2"), make("t_3")];
        let eligible = vec![
            EligibleAssignment {
                task_id: "t_1".to_string(),
                work_order_id: "wo_1".to_string(),
            },
            EligibleAssignment {
                task_id: "t_3".to_string(),
                work_order_id: "wo_1".to_string(),
            },
        ];

        let stale = stale_logs(&existing, &eligible);
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].task_id, "t_2");
    }

    #[test]
    fn test_expected_assignments_on_date() {
        let work_orders = vec![work_order("wo_1", at(4, 29, 7), None)];
        let tasks = vec![
            task("t_1", "wo_1", &["w_a", "w_b"]),
            task("t_2", "wo_1", &["w_a"]),
            task("t_3", "wo_9", &["w_c"]),
        ];

        let expected = expected_assignments(date(5, 1), &work_orders, &tasks);
        assert_eq!(
            expected.keys().cloned().collect::<Vec<_>>(),
            vec!["w_a".to_string(), "w_b".to_string()]
        );
        assert_eq!(expected["w_a"].len(), 2);
    }
}
