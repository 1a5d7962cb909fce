//! Work order recalculation.
//!
//! Recomputes the costs of every task of a work order, writes the synced
//! task fields back, rolls them up into the work order aggregate and
//! derives its status. A work order that just became done gets a snapshot.
//! Product and project statuses are propagated afterwards.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::calculation::{
    FreezeAction, TaskFigures, backfill_value, calculate_totals, derive_work_order_status,
    freeze_action, needs_value_backfill, profit_warnings, resolve_labor_cost,
    resolve_material_cost, select_offer,
};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    AuditStep, AuditTrace, RecalculationResult, SnapshotTaskLine, SnapshotWorkerLine,
    TaskCostLine, TaskStatus, WorkLog, WorkOrder, WorkOrderSnapshot, WorkOrderStatus,
    WorkOrderTask,
};

use super::Engine;

fn inclusive_days(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end.date_naive() - start.date_naive()).num_days() + 1
}

fn task_completion(task: &WorkOrderTask) -> Option<DateTime<Utc>> {
    task.completed_at
        .or_else(|| task.decomposition.latest_completion())
}

impl Engine {
    /// Recalculates one work order.
    ///
    /// Runs under the work order's lock. Snapshot creation and status
    /// propagation are best effort and never fail the recalculation.
    pub async fn recalculate_work_order(
        &self,
        tenant: &str,
        work_order_id: &str,
    ) -> EngineResult<RecalculationResult> {
        let started = Instant::now();
        let guard = self.locks.acquire(tenant, work_order_id).await;

        let mut work_order = self
            .store
            .get_work_order(tenant, work_order_id)
            .await?
            .ok_or_else(|| EngineError::WorkOrderNotFound {
                id: work_order_id.to_string(),
            })?;
        let tasks = self.store.tasks_for_work_order(tenant, work_order_id).await?;

        let mut trace = AuditTrace::default();
        let mut figures = Vec::with_capacity(tasks.len());
        let mut lines = Vec::with_capacity(tasks.len());
        let mut costed = Vec::with_capacity(tasks.len());
        let mut logs_by_task: BTreeMap<String, Vec<WorkLog>> = BTreeMap::new();

        for original in tasks {
            let logs = self.store.work_logs_for_task(tenant, &original.id).await?;
            let task = self.cost_task(tenant, &original, &logs, &mut trace).await?;

            if task != original {
                self.write_back_costs(tenant, &task).await?;
            }

            figures.push(TaskFigures {
                value: task.value,
                material_cost: task.material_cost,
                planned_labor_cost: task.planned_labor_cost,
                actual_labor_cost: task.actual_labor_cost,
                transport_share: task.transport_share,
                services_total: task.services_total,
            });
            lines.push(TaskCostLine {
                task_id: task.id.clone(),
                status: task.status,
                frozen: task.frozen,
                value: task.value,
                material_cost: task.material_cost,
                actual_labor_cost: task.actual_labor_cost,
            });
            logs_by_task.insert(task.id.clone(), logs);
            costed.push(task);
        }

        let previous_status = work_order.status;
        let totals = calculate_totals(&figures);
        let status = derive_work_order_status(costed.iter().map(|t| t.status));
        let now = Utc::now();

        if let Some(start) = costed.iter().filter_map(|t| t.effective_start()).min() {
            work_order.started_at = Some(start);
        }
        work_order.completed_at = match status {
            WorkOrderStatus::Done => costed.iter().filter_map(task_completion).max().or(Some(now)),
            _ => None,
        };
        work_order.status = status;
        work_order.totals = totals.clone();
        work_order.recalculated_at = Some(now);

        trace.steps.push(AuditStep {
            step_number: trace.next_step_number(),
            rule_id: "work_order_totals".to_string(),
            subject: work_order.id.clone(),
            input: serde_json::json!({ "tasks": costed.len() }),
            output: serde_json::json!({
                "total_value": totals.total_value.to_string(),
                "net_profit": totals.net_profit.to_string(),
                "profit_margin": totals.profit_margin.to_string(),
                "status": status,
            }),
            reasoning: format!(
                "Net profit {} on value {} ({}% margin); status {:?}",
                totals.net_profit, totals.total_value, totals.profit_margin, status
            ),
        });

        self.store.save_work_order(work_order.clone()).await?;

        let mut snapshot_written = false;
        if status == WorkOrderStatus::Done && previous_status != WorkOrderStatus::Done {
            let snapshot = build_snapshot(&work_order, &costed, &logs_by_task, now);
            match self.store.save_snapshot(snapshot).await {
                Ok(()) => snapshot_written = true,
                Err(e) => warn!(
                    tenant,
                    work_order_id,
                    error = %e,
                    "Could not write completion snapshot"
                ),
            }
        }
        drop(guard);

        trace
            .warnings
            .extend(profit_warnings(&work_order, &costed, self.config.diagnostics()));

        let products: BTreeSet<String> = costed.iter().map(|t| t.product_id.clone()).collect();
        let projects: BTreeSet<String> = costed.iter().map(|t| t.project_id.clone()).collect();
        let status_changes = self.propagate(tenant, &products, &projects).await;

        trace.duration_us = started.elapsed().as_micros() as u64;

        info!(
            tenant,
            work_order_id,
            ?previous_status,
            ?status,
            net_profit = %totals.net_profit,
            actual_labor = %totals.actual_labor_cost,
            snapshot_written,
            status_changes = status_changes.len(),
            "Recalculated work order"
        );

        Ok(RecalculationResult {
            work_order_id: work_order.id,
            previous_status,
            status,
            totals,
            tasks: lines,
            products,
            snapshot_written,
            status_changes,
            calculated_at: now,
            audit_trace: trace,
        })
    }

    /// Stores the cost fields of `costed` on the current task document.
    ///
    /// Task mutations may have saved the task since it was read, so only
    /// the cost fields are written over the stored copy.
    async fn write_back_costs(&self, tenant: &str, costed: &WorkOrderTask) -> EngineResult<()> {
        let Some(stored) = self.store.get_task(tenant, &costed.id).await? else {
            warn!(tenant, task_id = %costed.id, "Task vanished during recalculation");
            return Ok(());
        };
        let mut task = stored.clone();
        task.take_costs_from(costed);
        if task != stored {
            debug!(tenant, task_id = %task.id, "Writing back synced task costs");
            self.store.save_task(task).await?;
        }
        Ok(())
    }

    /// Applies the cost rules to one task and returns the updated copy.
    async fn cost_task(
        &self,
        tenant: &str,
        original: &WorkOrderTask,
        logs: &[WorkLog],
        trace: &mut AuditTrace,
    ) -> EngineResult<WorkOrderTask> {
        let mut task = original.clone();
        let action = freeze_action(&task);

        if action == FreezeAction::Reopen {
            task.reopen();
            trace.steps.push(AuditStep {
                step_number: trace.next_step_number(),
                rule_id: "reopen".to_string(),
                subject: task.id.clone(),
                input: serde_json::json!({ "status": task.status }),
                output: serde_json::json!({ "frozen": false }),
                reasoning: "Task is no longer done; costs unlocked".to_string(),
            });
        }

        let current_material = if task.frozen || task.material_cost_overridden {
            None
        } else {
            self.materials.material_cost(tenant, &task.product_id).await?
        };
        let material = resolve_material_cost(&task, current_material, trace.next_step_number());
        task.material_cost = material.amount;
        trace.steps.push(material.audit_step);

        let logged: Decimal = logs.iter().map(|l| l.daily_rate).sum();
        let labor = resolve_labor_cost(&task, logged, trace.next_step_number());
        task.actual_labor_cost = labor.amount;
        trace.steps.push(labor.audit_step);

        let policy = self.config.costing().offer_backfill;
        if needs_value_backfill(&task, policy) {
            match self.offers.accepted_offers(tenant, &task.product_id).await {
                Ok(offers) => {
                    let offer = select_offer(&task, &offers, policy);
                    let value = backfill_value(&task, offer, policy, trace.next_step_number());
                    task.value = value.amount;
                    task.value_backfill_attempted = true;
                    trace.steps.push(value.audit_step);
                }
                Err(e) => warn!(
                    tenant,
                    task_id = %task.id,
                    error = %e,
                    "Offer lookup failed; value backfill deferred"
                ),
            }
        }

        if action == FreezeAction::Freeze {
            task.freeze(task.actual_labor_cost);
            trace.steps.push(AuditStep {
                step_number: trace.next_step_number(),
                rule_id: "freeze".to_string(),
                subject: task.id.clone(),
                input: serde_json::json!({ "status": TaskStatus::Done }),
                output: serde_json::json!({
                    "material_cost": task.material_cost.to_string(),
                    "frozen_labor_cost": task.actual_labor_cost.to_string(),
                }),
                reasoning: "Task completed; material and labor costs locked".to_string(),
            });
        }

        Ok(task)
    }
}

fn build_snapshot(
    work_order: &WorkOrder,
    tasks: &[WorkOrderTask],
    logs_by_task: &BTreeMap<String, Vec<WorkLog>>,
    taken_at: DateTime<Utc>,
) -> WorkOrderSnapshot {
    let task_lines = tasks
        .iter()
        .map(|t| SnapshotTaskLine {
            task_id: t.id.clone(),
            product_id: t.product_id.clone(),
            quantity: t.quantity,
            material_cost: t.material_cost,
            labor_cost: t.actual_labor_cost,
            duration_days: match (t.effective_start(), task_completion(t)) {
                (Some(start), Some(end)) => inclusive_days(start, end),
                _ => 0,
            },
        })
        .collect();

    let mut per_worker: BTreeMap<&str, (BTreeSet<chrono::NaiveDate>, Decimal)> = BTreeMap::new();
    for log in logs_by_task.values().flatten() {
        let entry = per_worker.entry(log.worker_id.as_str()).or_default();
        entry.0.insert(log.date);
        entry.1 += log.daily_rate;
    }
    let worker_lines = per_worker
        .into_iter()
        .map(|(worker_id, (days, labor_cost))| SnapshotWorkerLine {
            worker_id: worker_id.to_string(),
            days: days.len() as u32,
            labor_cost,
        })
        .collect();

    WorkOrderSnapshot {
        id: Uuid::new_v4(),
        tenant_id: work_order.tenant_id.clone(),
        work_order_id: work_order.id.clone(),
        taken_at,
        totals: work_order.totals.clone(),
        duration_days: match (work_order.started_at, work_order.completed_at) {
            (Some(start), Some(end)) => inclusive_days(start, end),
            _ => 0,
        },
        tasks: task_lines,
        workers: worker_lines,
    }
}
