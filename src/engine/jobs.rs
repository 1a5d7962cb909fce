//! Reconciliation and backfill jobs.
//!
//! Jobs are stateless batch drivers over the pipeline primitives. They can
//! be re-run at any time, continue past individual failures and report
//! partial progress through an optional callback.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};
use crate::models::{AttendanceRecord, AttendanceStatus, DerivationOutcome, StatusChange};

use super::Engine;
use super::tasks::derivation_span;

/// Progress of a running job, reported after each processed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobProgress {
    /// Job name.
    pub job: String,
    /// Items processed so far.
    pub processed: usize,
    /// Items the job will process.
    pub total: usize,
    /// The item just processed.
    pub subject: String,
}

/// Progress callback accepted by every job.
pub type ProgressFn<'a> = dyn Fn(&JobProgress) + Send + Sync + 'a;

/// An item a job could not process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    /// The item (work order, record or worker id).
    pub subject: String,
    /// Why it failed.
    pub message: String,
}

/// Summary of a batch job.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobReport {
    /// Job name.
    pub job: String,
    /// Items the job set out to process.
    pub total: usize,
    /// Items processed successfully.
    pub processed: usize,
    /// Items that failed.
    pub failed: usize,
    /// Documents created.
    pub created: usize,
    /// Documents left alone because they already existed.
    pub skipped: usize,
    /// Work orders touched by the job.
    pub affected_work_orders: BTreeSet<String>,
    /// Failure details.
    pub failures: Vec<JobFailure>,
}

impl JobReport {
    fn new(job: &str, total: usize) -> Self {
        Self {
            job: job.to_string(),
            total,
            ..Self::default()
        }
    }

    fn fail(&mut self, subject: impl Into<String>, error: &EngineError) {
        self.failed += 1;
        self.failures.push(JobFailure {
            subject: subject.into(),
            message: error.to_string(),
        });
    }

    fn report(&self, subject: &str, progress: Option<&ProgressFn<'_>>) {
        if let Some(progress) = progress {
            progress(&JobProgress {
                job: self.job.clone(),
                processed: self.processed + self.failed + self.skipped,
                total: self.total,
                subject: subject.to_string(),
            });
        }
    }
}

/// Summary of the startup sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupSyncReport {
    /// Work orders that received a schedule.
    pub scheduled: Vec<String>,
    /// Recalculation of the active work orders.
    pub recalculation: JobReport,
    /// Product and project status changes applied.
    pub status_changes: Vec<StatusChange>,
}

/// Summary of a full status repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairReport {
    /// Tasks inspected.
    pub tasks_checked: usize,
    /// Tasks whose status or timestamps were corrected.
    pub tasks_repaired: Vec<String>,
    /// Work log changes from re-deriving the repaired tasks' workers.
    pub derivation: DerivationOutcome,
    /// Recalculation of every work order.
    pub recalculation: JobReport,
    /// Product and project status changes applied.
    pub status_changes: Vec<StatusChange>,
}

fn weekend_days(year: i32, month: u32) -> EngineResult<Vec<NaiveDate>> {
    if !(1..=12).contains(&month) {
        return Err(EngineError::InvalidInput {
            field: "month".to_string(),
            message: format!("month must be between 1 and 12, got {}", month),
        });
    }
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| EngineError::InvalidInput {
        field: "year".to_string(),
        message: format!("year {} is out of range", year),
    })?;

    Ok(first
        .iter_days()
        .take_while(|d| d.month() == month)
        .filter(|d| matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .collect())
}

impl Engine {
    /// Recalculates every work order that is not done.
    pub async fn recalculate_all_active(
        &self,
        tenant: &str,
        progress: Option<&ProgressFn<'_>>,
    ) -> EngineResult<JobReport> {
        let active: BTreeSet<String> = self
            .store
            .list_work_orders(tenant)
            .await?
            .into_iter()
            .filter(|wo| !wo.is_done())
            .map(|wo| wo.id)
            .collect();
        let report = self
            .recalculate_reporting(tenant, "recalculate_all_active", &active, progress)
            .await;
        info!(tenant, total = report.total, failed = report.failed, "Recalculated active work orders");
        Ok(report)
    }

    /// Replays work log derivation for stored attendance in a date range,
    /// then recalculates every affected work order once.
    pub async fn backfill_from_attendance(
        &self,
        tenant: &str,
        from: NaiveDate,
        to: NaiveDate,
        progress: Option<&ProgressFn<'_>>,
    ) -> EngineResult<JobReport> {
        if from > to {
            return Err(EngineError::InvalidInput {
                field: "date_from".to_string(),
                message: format!("{} is after {}", from, to),
            });
        }

        let records = self.store.list_attendance(tenant, from, to).await?;
        let mut report = JobReport::new("backfill_from_attendance", records.len());
        let mut derived = DerivationOutcome::default();

        for record in &records {
            match self.derive_for_record(tenant, record).await {
                Ok(outcome) => {
                    report.processed += 1;
                    derived.merge(outcome);
                }
                Err(e) => {
                    warn!(tenant, record_id = %record.id, error = %e, "Backfill derivation failed");
                    report.fail(&record.id, &e);
                }
            }
            report.report(&record.id, progress);
        }

        report.created = derived.created as usize;
        report.skipped = derived.skipped as usize;
        for (id, result) in self
            .recalculate_many(tenant, &derived.affected_work_orders)
            .await
        {
            if let Err(e) = result {
                report.failures.push(JobFailure {
                    subject: id,
                    message: e.to_string(),
                });
            }
        }
        report.affected_work_orders = derived.affected_work_orders;

        info!(
            tenant,
            %from,
            %to,
            records = report.total,
            created = report.created,
            rewritten = derived.rewritten,
            deleted = derived.deleted,
            failed = report.failed,
            "Backfilled work logs from attendance"
        );
        Ok(report)
    }

    /// Records weekend attendance for Saturdays and Sundays of a month.
    ///
    /// Existing records are never overwritten. An empty worker list means
    /// every worker in the directory. Writes go out in groups no larger
    /// than the configured batch size; a failed group is counted and the
    /// job moves on.
    pub async fn auto_populate_weekends(
        &self,
        tenant: &str,
        worker_ids: &[String],
        year: i32,
        month: u32,
        progress: Option<&ProgressFn<'_>>,
    ) -> EngineResult<JobReport> {
        let days = weekend_days(year, month)?;
        let workers: Vec<String> = if worker_ids.is_empty() {
            self.workers
                .list_workers(tenant)
                .await?
                .into_iter()
                .map(|w| w.id)
                .collect()
        } else {
            worker_ids.to_vec()
        };

        let mut report = JobReport::new("auto_populate_weekends", workers.len() * days.len());
        let now = Utc::now();
        let mut pending = Vec::new();
        for worker_id in &workers {
            for &date in &days {
                match self.store.get_attendance(tenant, worker_id, date).await {
                    Ok(Some(_)) => {
                        report.skipped += 1;
                        continue;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(tenant, worker_id = %worker_id, date = %date, error = %e, "Could not read attendance");
                        report.fail(AttendanceRecord::key(worker_id, date), &e);
                        continue;
                    }
                }
                pending.push(AttendanceRecord::new(
                    tenant,
                    worker_id,
                    date,
                    AttendanceStatus::Weekend,
                    None,
                    now,
                ));
            }
        }

        let batch_size = self.config.jobs().write_batch_size.max(1);
        for chunk in pending.chunks(batch_size) {
            let subject = format!(
                "{}..{}",
                chunk.first().map(|r| r.id.as_str()).unwrap_or_default(),
                chunk.last().map(|r| r.id.as_str()).unwrap_or_default()
            );
            match self.store.upsert_attendance_batch(chunk.to_vec()).await {
                Ok(()) => {
                    report.created += chunk.len();
                    report.processed += chunk.len();
                }
                Err(e) => {
                    warn!(tenant, batch = %subject, size = chunk.len(), error = %e, "Weekend batch write failed");
                    report.failed += chunk.len();
                    report.failures.push(JobFailure {
                        subject: subject.clone(),
                        message: e.to_string(),
                    });
                }
            }
            report.report(&subject, progress);
        }

        info!(
            tenant,
            year,
            month,
            workers = workers.len(),
            created = report.created,
            skipped = report.skipped,
            failed = report.failed,
            "Populated weekend attendance"
        );
        Ok(report)
    }

    /// Schedules orphaned work orders, recalculates the active ones and
    /// resyncs every project.
    pub async fn run_startup_sync(
        &self,
        tenant: &str,
        progress: Option<&ProgressFn<'_>>,
    ) -> EngineResult<StartupSyncReport> {
        let today = Utc::now().date_naive();
        let days = i64::from(self.config.jobs().default_work_order_days);
        let mut scheduled = Vec::new();
        let mut active = BTreeSet::new();

        for mut work_order in self.store.list_work_orders(tenant).await? {
            if work_order.is_done() {
                continue;
            }
            active.insert(work_order.id.clone());
            if work_order.planned_start.is_some() || work_order.started_at.is_none() {
                continue;
            }

            let start = work_order.started_at.map(|s| s.date_naive()).unwrap_or(today);
            work_order.planned_start = Some(start);
            work_order.planned_end = Some(start + Duration::days(days));
            let id = work_order.id.clone();
            match self.store.save_work_order(work_order).await {
                Ok(()) => scheduled.push(id),
                Err(e) => warn!(tenant, work_order_id = %id, error = %e, "Could not schedule work order"),
            }
        }

        let recalculation = self
            .recalculate_reporting(tenant, "startup_sync", &active, progress)
            .await;
        let status_changes = self.sync_all_projects(tenant).await?;

        info!(
            tenant,
            scheduled = scheduled.len(),
            recalculated = recalculation.processed,
            failed = recalculation.failed,
            status_changes = status_changes.len(),
            "Startup sync finished"
        );
        Ok(StartupSyncReport {
            scheduled,
            recalculation,
            status_changes,
        })
    }

    /// Corrects tasks whose status or timestamps disagree with their stage
    /// breakdown, then recalculates every work order and resyncs every
    /// project.
    pub async fn repair_all_statuses(
        &self,
        tenant: &str,
        progress: Option<&ProgressFn<'_>>,
    ) -> EngineResult<RepairReport> {
        let now = Utc::now();
        let tasks = self.store.list_tasks(tenant).await?;
        let tasks_checked = tasks.len();
        let mut tasks_repaired = Vec::new();
        let mut workers = BTreeSet::new();
        let mut span: Option<(NaiveDate, NaiveDate)> = None;

        for before in tasks {
            let mut task = before.clone();
            if !task.sync_with_stages(now) {
                continue;
            }
            let id = task.id.clone();
            let (from, to) = derivation_span(&before, &task, now);
            workers.extend(before.involved_workers());
            workers.extend(task.involved_workers());
            match self.store.save_task(task).await {
                Ok(()) => {
                    tasks_repaired.push(id);
                    span = Some(match span {
                        Some((f, t)) => (f.min(from), t.max(to)),
                        None => (from, to),
                    });
                }
                Err(e) => warn!(tenant, task_id = %id, error = %e, "Could not repair task"),
            }
        }

        // Logs derived while a task had the wrong status are redone before
        // costs are rolled up again.
        let derivation = match span {
            Some((from, to)) => self.rederive(tenant, &workers, from, to).await,
            None => DerivationOutcome::default(),
        };

        let all: BTreeSet<String> = self
            .store
            .list_work_orders(tenant)
            .await?
            .into_iter()
            .map(|wo| wo.id)
            .collect();
        let recalculation = self
            .recalculate_reporting(tenant, "repair_all_statuses", &all, progress)
            .await;
        let status_changes = self.sync_all_projects(tenant).await?;

        info!(
            tenant,
            tasks_checked,
            repaired = tasks_repaired.len(),
            rewritten = derivation.rewritten,
            deleted = derivation.deleted,
            recalculated = recalculation.processed,
            status_changes = status_changes.len(),
            "Repaired statuses"
        );
        Ok(RepairReport {
            tasks_checked,
            tasks_repaired,
            derivation,
            recalculation,
            status_changes,
        })
    }

    /// Recalculates work orders with bounded parallelism, reporting each.
    async fn recalculate_reporting(
        &self,
        tenant: &str,
        job: &str,
        work_order_ids: &BTreeSet<String>,
        progress: Option<&ProgressFn<'_>>,
    ) -> JobReport {
        let mut report = JobReport::new(job, work_order_ids.len());
        let parallelism = self.config.jobs().max_parallel_recalculations.max(1);
        let mut results = stream::iter(work_order_ids.iter().cloned())
            .map(|id| async move {
                let result = self.recalculate_work_order(tenant, &id).await;
                (id, result)
            })
            .buffer_unordered(parallelism);

        while let Some((id, result)) = results.next().await {
            match result {
                Ok(_) => report.processed += 1,
                Err(e) => {
                    warn!(tenant, work_order_id = %id, error = %e, "Recalculation failed");
                    report.fail(&id, &e);
                }
            }
            report.report(&id, progress);
            report.affected_work_orders.insert(id);
        }
        report
    }

    /// Syncs the products of every project, then the project itself.
    async fn sync_all_projects(&self, tenant: &str) -> EngineResult<Vec<StatusChange>> {
        let mut changes = Vec::new();
        for project in self.store.list_projects(tenant).await? {
            let products: BTreeSet<String> = match self
                .store
                .products_for_project(tenant, &project.id)
                .await
            {
                Ok(products) => products.into_iter().map(|p| p.id).collect(),
                Err(e) => {
                    warn!(tenant, project_id = %project.id, error = %e, "Could not list products");
                    continue;
                }
            };
            let projects = BTreeSet::from([project.id]);
            changes.extend(self.propagate(tenant, &products, &projects).await);
        }
        Ok(changes)
    }
}
