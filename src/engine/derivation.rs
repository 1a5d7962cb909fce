//! Work log derivation.
//!
//! Turns one attendance fact (worker, date, status) into the set of work
//! logs that should exist for it. A working day runs three passes:
//!
//! 1. count the eligible assignments,
//! 2. create the missing logs at `rate / count`, skipping existing ones,
//! 3. re-read every log of the worker and date and rewrite any whose split
//!    drifted from the current count.
//!
//! Logs of tasks that are no longer eligible are removed before pass 3. A
//! non-working day removes every log of the worker and date.

use std::collections::BTreeSet;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::calculation::{find_eligible_assignments, reconcile_split, split_daily_rate, stale_logs};
use crate::error::EngineResult;
use crate::models::{AttendanceStatus, DerivationOutcome, WorkLog, WorkOrder, WorkOrderTask};

use super::Engine;

impl Engine {
    /// Derives or removes the work logs of a worker on a date.
    ///
    /// Returns counts and the work orders whose labor cost may have
    /// changed. Work orders are not recalculated here.
    pub async fn derive_or_cleanup(
        &self,
        tenant: &str,
        worker_id: &str,
        date: NaiveDate,
        status: AttendanceStatus,
        daily_rate: Decimal,
    ) -> EngineResult<DerivationOutcome> {
        let (work_orders, tasks) = self.candidates_on(tenant, date).await?;

        let outcome = if status.is_working() {
            self.derive_working_day(tenant, worker_id, date, daily_rate, &work_orders, &tasks)
                .await?
        } else {
            self.cleanup_non_working_day(tenant, worker_id, date, &work_orders, &tasks)
                .await?
        };

        info!(
            tenant,
            worker_id,
            %date,
            ?status,
            created = outcome.created,
            skipped = outcome.skipped,
            rewritten = outcome.rewritten,
            deleted = outcome.deleted,
            affected = outcome.affected_work_orders.len(),
            "Derived work logs"
        );
        Ok(outcome)
    }

    /// Work orders active on the date and their tasks.
    pub(super) async fn candidates_on(
        &self,
        tenant: &str,
        date: NaiveDate,
    ) -> EngineResult<(Vec<WorkOrder>, Vec<WorkOrderTask>)> {
        let work_orders: Vec<WorkOrder> = self
            .store
            .list_work_orders(tenant)
            .await?
            .into_iter()
            .filter(|wo| wo.active_on(date))
            .collect();

        let mut tasks = Vec::new();
        for wo in &work_orders {
            tasks.extend(self.store.tasks_for_work_order(tenant, &wo.id).await?);
        }
        Ok((work_orders, tasks))
    }

    async fn derive_working_day(
        &self,
        tenant: &str,
        worker_id: &str,
        date: NaiveDate,
        daily_rate: Decimal,
        work_orders: &[WorkOrder],
        tasks: &[WorkOrderTask],
    ) -> EngineResult<DerivationOutcome> {
        let mut outcome = DerivationOutcome::default();
        let eligible = find_eligible_assignments(worker_id, date, work_orders, tasks);
        let existing = self
            .store
            .work_logs_for_worker_date(tenant, worker_id, date)
            .await?;

        for stale in stale_logs(&existing, &eligible) {
            match self.store.delete_work_log(tenant, &stale.key()).await {
                Ok(()) => {
                    debug!(tenant, worker_id, task_id = %stale.task_id, %date, "Removed stale work log");
                    outcome.deleted += 1;
                    outcome
                        .affected_work_orders
                        .insert(stale.work_order_id.clone());
                }
                Err(e) => warn!(
                    tenant,
                    worker_id,
                    task_id = %stale.task_id,
                    %date,
                    error = %e,
                    "Could not remove stale work log"
                ),
            }
        }

        // Pass 1 and 2: every eligible assignment gets a log at the current split.
        let now = Utc::now();
        let shares = split_daily_rate(daily_rate, eligible.len());
        let split_factor = eligible.len() as u32;
        for (assignment, share) in eligible.iter().zip(shares) {
            outcome
                .affected_work_orders
                .insert(assignment.work_order_id.clone());
            let log = WorkLog {
                tenant_id: tenant.to_string(),
                worker_id: worker_id.to_string(),
                task_id: assignment.task_id.clone(),
                work_order_id: assignment.work_order_id.clone(),
                date,
                daily_rate: share,
                original_daily_rate: daily_rate,
                split_factor,
                created_at: now,
                updated_at: now,
            };
            if self.store.insert_work_log_if_absent(log).await? {
                debug!(tenant, worker_id, task_id = %assignment.task_id, %date, %share, "Created work log");
                outcome.created += 1;
            } else {
                outcome.skipped += 1;
            }
        }

        // Pass 3: reconcile whatever is stored now against the current count.
        let stored = self
            .store
            .work_logs_for_worker_date(tenant, worker_id, date)
            .await?;
        let tolerance = self.config.costing().split_tolerance;
        for corrected in reconcile_split(&stored, daily_rate, tolerance, now) {
            debug!(
                tenant,
                worker_id,
                task_id = %corrected.task_id,
                %date,
                rate = %corrected.daily_rate,
                "Rewrote work log split"
            );
            outcome
                .affected_work_orders
                .insert(corrected.work_order_id.clone());
            self.store.upsert_work_log(corrected).await?;
            outcome.rewritten += 1;
        }

        Ok(outcome)
    }

    async fn cleanup_non_working_day(
        &self,
        tenant: &str,
        worker_id: &str,
        date: NaiveDate,
        work_orders: &[WorkOrder],
        tasks: &[WorkOrderTask],
    ) -> EngineResult<DerivationOutcome> {
        let mut outcome = DerivationOutcome::default();

        // Collect the affected work orders before the evidence is removed.
        let eligible: BTreeSet<String> = find_eligible_assignments(worker_id, date, work_orders, tasks)
            .into_iter()
            .map(|a| a.work_order_id)
            .collect();
        outcome.affected_work_orders.extend(eligible);

        let existing = self
            .store
            .work_logs_for_worker_date(tenant, worker_id, date)
            .await?;
        for log in existing {
            self.store.delete_work_log(tenant, &log.key()).await?;
            outcome.deleted += 1;
            outcome.affected_work_orders.insert(log.work_order_id);
        }

        Ok(outcome)
    }
}
