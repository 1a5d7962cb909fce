//! Task mutations.
//!
//! Each mutation writes the task, then re-derives the work logs of every
//! worker the task involves (before or after the change) over the task's
//! active span, and finally recalculates the affected work orders. Only the
//! task write can fail the call.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::models::{
    Decomposition, DerivationOutcome, PausePeriod, Process, StageVisit, SubTask, TaskStatus,
    WorkOrderTask,
};

use super::Engine;

/// The outcome of a task mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMutationResult {
    /// The task as stored after the mutation and recalculation.
    pub task: WorkOrderTask,
    /// False when the mutation was a no-op.
    pub changed: bool,
    /// Work log changes caused by the mutation.
    pub derivation: DerivationOutcome,
    /// Work orders recalculated afterwards.
    pub recalculated: Vec<String>,
    /// Work orders whose recalculation failed.
    pub failed_recalculations: Vec<String>,
}

/// Dates whose work logs a change to `before` -> `after` can affect.
pub(super) fn derivation_span(
    before: &WorkOrderTask,
    after: &WorkOrderTask,
    now: DateTime<Utc>,
) -> (NaiveDate, NaiveDate) {
    let today = now.date_naive().max(Utc::now().date_naive());
    let from = [before.effective_start(), after.effective_start()]
        .into_iter()
        .flatten()
        .min()
        .map(|start| start.date_naive())
        .unwrap_or(today);
    (from, today.max(from))
}

fn carry_over(incoming: &mut SubTask, stored: &SubTask) {
    if incoming.stage_history.is_empty() {
        incoming.stage_history = stored.stage_history.clone();
    }
    if incoming.pause_periods.is_empty() {
        incoming.pause_periods = stored.pause_periods.clone();
        incoming.is_paused = stored.is_paused;
    }
    incoming.started_at = incoming.started_at.or(stored.started_at);
    if incoming.status == TaskStatus::Done {
        incoming.completed_at = incoming.completed_at.or(stored.completed_at);
    }
}

fn validate_subtask(sub_task: &SubTask, engine: &Engine) -> EngineResult<()> {
    if sub_task.id.trim().is_empty() {
        return Err(EngineError::InvalidInput {
            field: "id".to_string(),
            message: "subtask id must not be empty".to_string(),
        });
    }
    if sub_task.quantity == 0 {
        return Err(EngineError::InvalidInput {
            field: "quantity".to_string(),
            message: format!("subtask {} must have a positive quantity", sub_task.id),
        });
    }
    if !engine.config.stages().is_known_stage(&sub_task.stage) {
        return Err(EngineError::UnknownStage {
            stage: sub_task.stage.clone(),
        });
    }
    Ok(())
}

impl Engine {
    async fn load_task(&self, tenant: &str, task_id: &str) -> EngineResult<WorkOrderTask> {
        self.store
            .get_task(tenant, task_id)
            .await?
            .ok_or_else(|| EngineError::TaskNotFound {
                id: task_id.to_string(),
            })
    }

    /// Pauses or resumes a task now.
    pub async fn toggle_pause(
        &self,
        tenant: &str,
        task_id: &str,
        paused: bool,
    ) -> EngineResult<TaskMutationResult> {
        self.toggle_pause_at(tenant, task_id, paused, Utc::now()).await
    }

    /// Pauses or resumes a task at the given instant.
    ///
    /// Pausing opens a pause period, resuming closes the open one. Asking
    /// for the state the task is already in changes nothing. Pauses cover
    /// whole days: the day a pause ends is still paused.
    pub async fn toggle_pause_at(
        &self,
        tenant: &str,
        task_id: &str,
        paused: bool,
        at: DateTime<Utc>,
    ) -> EngineResult<TaskMutationResult> {
        let before = self.load_task(tenant, task_id).await?;
        let mut task = before.clone();

        if paused && !task.is_paused {
            task.is_paused = true;
            task.pause_periods.push(PausePeriod {
                started_at: at,
                ended_at: None,
            });
        } else if !paused && task.is_paused {
            task.is_paused = false;
            for period in task.pause_periods.iter_mut().filter(|p| p.is_open()) {
                period.ended_at = Some(at);
            }
        }

        self.apply_task_change(tenant, before, task, at).await
    }

    /// Replaces the legacy process list of a task.
    pub async fn update_task_processes(
        &self,
        tenant: &str,
        task_id: &str,
        processes: Vec<Process>,
    ) -> EngineResult<TaskMutationResult> {
        let stages = self.config.stages();
        if let Some(unknown) = processes.iter().find(|p| !stages.is_known_stage(&p.name)) {
            return Err(EngineError::UnknownStage {
                stage: unknown.name.clone(),
            });
        }

        let before = self.load_task(tenant, task_id).await?;
        let mut task = before.clone();
        let now = Utc::now();
        task.decomposition = Decomposition::Processes(processes);
        task.sync_with_stages(now);

        self.apply_task_change(tenant, before, task, now).await
    }

    /// Creates subtasks or replaces the ones with matching ids.
    ///
    /// The quantities of all subtasks may not exceed the task quantity. A
    /// task tracked whole or through processes switches to subtasks. History
    /// the caller leaves empty (pauses, stage visits, timestamps) keeps its
    /// stored value.
    pub async fn create_or_update_subtasks(
        &self,
        tenant: &str,
        task_id: &str,
        sub_tasks: Vec<SubTask>,
    ) -> EngineResult<TaskMutationResult> {
        for sub_task in &sub_tasks {
            validate_subtask(sub_task, self)?;
        }

        let before = self.load_task(tenant, task_id).await?;
        let mut merged: BTreeMap<String, SubTask> = match &before.decomposition {
            Decomposition::SubTasks(existing) => existing
                .iter()
                .map(|s| (s.id.clone(), s.clone()))
                .collect(),
            _ => BTreeMap::new(),
        };
        for mut sub_task in sub_tasks {
            if let Some(stored) = merged.get(&sub_task.id) {
                carry_over(&mut sub_task, stored);
            }
            merged.insert(sub_task.id.clone(), sub_task);
        }

        let total: u32 = merged.values().map(|s| s.quantity).sum();
        if total > before.quantity {
            return Err(EngineError::InvalidInput {
                field: "quantity".to_string(),
                message: format!(
                    "subtask quantities total {} but task {} has {}",
                    total, before.id, before.quantity
                ),
            });
        }

        let mut task = before.clone();
        let now = Utc::now();
        task.decomposition = Decomposition::SubTasks(merged.into_values().collect());
        task.sync_with_stages(now);

        self.apply_task_change(tenant, before, task, now).await
    }

    /// Moves a subtask to another stage now.
    pub async fn move_sub_task(
        &self,
        tenant: &str,
        task_id: &str,
        sub_task_id: &str,
        target_stage: &str,
    ) -> EngineResult<TaskMutationResult> {
        self.move_sub_task_at(tenant, task_id, sub_task_id, target_stage, Utc::now())
            .await
    }

    /// Moves a subtask to another stage at the given instant.
    ///
    /// Moving to the done marker completes the subtask and keeps its last
    /// production stage. Any other target must be a known stage and puts
    /// the subtask (back) in progress.
    pub async fn move_sub_task_at(
        &self,
        tenant: &str,
        task_id: &str,
        sub_task_id: &str,
        target_stage: &str,
        at: DateTime<Utc>,
    ) -> EngineResult<TaskMutationResult> {
        let stages = self.config.stages();
        let completes = target_stage == stages.done_marker;
        if !completes && !stages.is_known_stage(target_stage) {
            return Err(EngineError::UnknownStage {
                stage: target_stage.to_string(),
            });
        }

        let before = self.load_task(tenant, task_id).await?;
        let mut task = before.clone();
        let not_found = || EngineError::SubTaskNotFound {
            task_id: task_id.to_string(),
            sub_task_id: sub_task_id.to_string(),
        };
        let Decomposition::SubTasks(sub_tasks) = &mut task.decomposition else {
            return Err(not_found());
        };
        let sub_task = sub_tasks
            .iter_mut()
            .find(|s| s.id == sub_task_id)
            .ok_or_else(not_found)?;

        if completes {
            sub_task.status = TaskStatus::Done;
            sub_task.started_at.get_or_insert(at);
            sub_task.completed_at = Some(at);
        } else {
            sub_task.stage = target_stage.to_string();
            sub_task.status = TaskStatus::InProgress;
            sub_task.started_at.get_or_insert(at);
            sub_task.completed_at = None;
        }
        sub_task.stage_history.push(StageVisit {
            stage: target_stage.to_string(),
            entered_at: at,
        });
        debug!(tenant, task_id, sub_task_id, target_stage, "Moved subtask");
        task.sync_with_stages(at);

        self.apply_task_change(tenant, before, task, at).await
    }

    /// Writes a mutated task and cascades the change.
    async fn apply_task_change(
        &self,
        tenant: &str,
        before: WorkOrderTask,
        mut after: WorkOrderTask,
        now: DateTime<Utc>,
    ) -> EngineResult<TaskMutationResult> {
        if before == after {
            debug!(tenant, task_id = %after.id, "Task mutation changed nothing");
            return Ok(TaskMutationResult {
                task: after,
                changed: false,
                derivation: DerivationOutcome::default(),
                recalculated: vec![],
                failed_recalculations: vec![],
            });
        }

        {
            // Recalculation writes cost fields under this lock; keep its
            // latest values instead of the ones read before the mutation.
            let _guard = self.locks.acquire(tenant, &after.work_order_id).await;
            if let Some(stored) = self.store.get_task(tenant, &after.id).await? {
                after.take_costs_from(&stored);
            }
            self.store.save_task(after.clone()).await?;
        }

        let mut workers: BTreeSet<String> = before.involved_workers();
        workers.extend(after.involved_workers());
        let (from, to) = derivation_span(&before, &after, now);
        let derivation = self.rederive(tenant, &workers, from, to).await;

        let mut affected = derivation.affected_work_orders.clone();
        affected.insert(after.work_order_id.clone());
        let (recalculated, failed_recalculations) =
            self.recalculate_affected(tenant, &affected).await;

        let task = match self.store.get_task(tenant, &after.id).await {
            Ok(Some(stored)) => stored,
            _ => after,
        };

        info!(
            tenant,
            task_id = %task.id,
            status = ?task.status,
            paused = task.is_paused,
            workers = workers.len(),
            rewritten = derivation.rewritten,
            deleted = derivation.deleted,
            recalculated = recalculated.len(),
            "Applied task mutation"
        );

        Ok(TaskMutationResult {
            task,
            changed: true,
            derivation,
            recalculated,
            failed_recalculations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::{Fixture, at, date, dec};
    use crate::models::AttendanceStatus;

    fn sub_task(id: &str, quantity: u32, stage: &str, workers: &[&str]) -> SubTask {
        SubTask {
            id: id.to_string(),
            quantity,
            stage: stage.to_string(),
            status: TaskStatus::Waiting,
            workers: workers.iter().map(|w| w.to_string()).collect(),
            helpers: vec![],
            is_paused: false,
            pause_periods: vec![],
            started_at: None,
            completed_at: None,
            stage_history: vec![],
        }
    }

    async fn present(fx: &Fixture) {
        fx.engine
            .record_attendance("acme", "w_a", date(5, 1), AttendanceStatus::Present, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_pausing_task_resplits_rate() {
        let fx = Fixture::scenario().await;
        present(&fx).await;

        let result = fx
            .engine
            .toggle_pause_at("acme", "t_2", true, at(5, 1, 8))
            .await
            .unwrap();

        assert!(result.changed);
        assert!(result.task.is_paused);
        assert_eq!(result.derivation.deleted, 1);
        assert_eq!(result.derivation.rewritten, 2);
        let logs = fx.store.all_work_logs("acme").await;
        assert_eq!(logs.len(), 2);
        assert!(logs.iter().all(|l| l.daily_rate == dec("45.00")));
        assert_eq!(fx.work_order("wo_1").await.totals.actual_labor_cost, dec("45.00"));
        assert_eq!(fx.work_order("wo_2").await.totals.actual_labor_cost, dec("45.00"));
    }

    #[tokio::test]
    async fn test_pausing_twice_is_a_no_op() {
        let fx = Fixture::scenario().await;
        fx.engine
            .toggle_pause_at("acme", "t_2", true, at(5, 1, 8))
            .await
            .unwrap();
        let again = fx
            .engine
            .toggle_pause_at("acme", "t_2", true, at(5, 1, 9))
            .await
            .unwrap();

        assert!(!again.changed);
        assert_eq!(fx.task("t_2").await.pause_periods.len(), 1);
    }

    #[tokio::test]
    async fn test_resume_closes_open_pause() {
        let fx = Fixture::scenario().await;
        fx.engine
            .toggle_pause_at("acme", "t_2", true, at(5, 1, 8))
            .await
            .unwrap();
        let result = fx
            .engine
            .toggle_pause_at("acme", "t_2", false, at(5, 2, 8))
            .await
            .unwrap();

        assert!(!result.task.is_paused);
        let period = &result.task.pause_periods[0];
        assert_eq!(period.ended_at, Some(at(5, 2, 8)));
        assert!(result.task.paused_on(date(5, 2)));
        assert!(!result.task.paused_on(date(5, 3)));
    }

    #[tokio::test]
    async fn test_missing_task_is_not_found() {
        let fx = Fixture::scenario().await;
        let result = fx.engine.toggle_pause("acme", "t_9", true).await;
        assert!(matches!(result, Err(EngineError::TaskNotFound { .. })));
    }

    #[tokio::test]
    async fn test_process_helper_becomes_eligible() {
        let fx = Fixture::scenario().await;
        fx.engine
            .record_attendance("acme", "w_z", date(5, 1), AttendanceStatus::Present, None)
            .await
            .unwrap();
        assert!(fx.store.all_work_logs("acme").await.is_empty());

        let processes = vec![Process {
            name: "Cutting".to_string(),
            status: TaskStatus::InProgress,
            worker_id: Some("w_a".to_string()),
            helpers: vec!["w_z".to_string()],
            started_at: Some(at(4, 29, 8)),
            completed_at: None,
        }];
        let result = fx
            .engine
            .update_task_processes("acme", "t_3", processes)
            .await
            .unwrap();

        assert_eq!(result.derivation.created, 1);
        let logs = fx.store.all_work_logs("acme").await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].worker_id, "w_z");
        assert_eq!(logs[0].daily_rate, dec("80.00"));
        assert_eq!(fx.product("p_3").await.status, "Cutting");
    }

    #[tokio::test]
    async fn test_process_submitted_done_gets_completion_stamp() {
        let fx = Fixture::scenario().await;
        let processes = vec![Process {
            name: "Cutting".to_string(),
            status: TaskStatus::Done,
            worker_id: Some("w_z".to_string()),
            helpers: vec![],
            started_at: Some(at(4, 29, 8)),
            completed_at: None,
        }];
        let result = fx
            .engine
            .update_task_processes("acme", "t_3", processes)
            .await
            .unwrap();

        let Decomposition::Processes(stored) = &result.task.decomposition else {
            panic!("expected processes");
        };
        let completed = stored[0].completed_at.expect("completion stamped");
        assert_eq!(result.task.status, TaskStatus::Done);
        assert_eq!(result.task.completed_at, Some(completed));
        let day_after = completed.date_naive() + chrono::Duration::days(1);
        assert!(result.task.is_worker_eligible("w_z", completed.date_naive()));
        assert!(!result.task.is_worker_eligible("w_z", day_after));
    }

    #[tokio::test]
    async fn test_unknown_process_stage_is_rejected() {
        let fx = Fixture::scenario().await;
        let processes = vec![Process {
            name: "Painting".to_string(),
            status: TaskStatus::Waiting,
            worker_id: None,
            helpers: vec![],
            started_at: None,
            completed_at: None,
        }];
        let result = fx.engine.update_task_processes("acme", "t_3", processes).await;
        assert!(matches!(result, Err(EngineError::UnknownStage { .. })));
    }

    #[tokio::test]
    async fn test_subtasks_upsert_by_id() {
        let fx = Fixture::scenario().await;
        fx.engine
            .create_or_update_subtasks("acme", "t_3", vec![sub_task("s_1", 1, "Cutting", &["w_a"])])
            .await
            .unwrap();
        let result = fx
            .engine
            .create_or_update_subtasks(
                "acme",
                "t_3",
                vec![
                    sub_task("s_1", 1, "Drilling", &["w_a"]),
                    sub_task("s_2", 1, "Cutting", &["w_b"]),
                ],
            )
            .await
            .unwrap();

        let Decomposition::SubTasks(items) = &result.task.decomposition else {
            panic!("expected subtasks");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].stage, "Drilling");
        assert_eq!(result.task.status, TaskStatus::Waiting);
    }

    #[tokio::test]
    async fn test_subtask_update_keeps_stored_history() {
        let fx = Fixture::scenario().await;
        fx.engine
            .create_or_update_subtasks("acme", "t_3", vec![sub_task("s_1", 1, "Cutting", &["w_a"])])
            .await
            .unwrap();
        fx.engine
            .move_sub_task_at("acme", "t_3", "s_1", "Drilling", at(5, 1, 9))
            .await
            .unwrap();

        let mut update = sub_task("s_1", 1, "Drilling", &["w_a", "w_b"]);
        update.status = TaskStatus::InProgress;
        let result = fx
            .engine
            .create_or_update_subtasks("acme", "t_3", vec![update])
            .await
            .unwrap();

        let Decomposition::SubTasks(items) = &result.task.decomposition else {
            panic!("expected subtasks");
        };
        assert_eq!(items[0].workers.len(), 2);
        assert_eq!(items[0].started_at, Some(at(5, 1, 9)));
        assert_eq!(items[0].stage_history.len(), 1);
    }

    #[tokio::test]
    async fn test_subtask_quantities_cannot_exceed_task() {
        let fx = Fixture::scenario().await;
        let result = fx
            .engine
            .create_or_update_subtasks(
                "acme",
                "t_3",
                vec![
                    sub_task("s_1", 2, "Cutting", &["w_a"]),
                    sub_task("s_2", 1, "Cutting", &["w_a"]),
                ],
            )
            .await;
        assert!(matches!(result, Err(EngineError::InvalidInput { .. })));

        let zero = fx
            .engine
            .create_or_update_subtasks("acme", "t_3", vec![sub_task("s_1", 0, "Cutting", &[])])
            .await;
        assert!(matches!(zero, Err(EngineError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_moving_subtasks_through_to_done() {
        let fx = Fixture::scenario().await;
        fx.engine
            .create_or_update_subtasks(
                "acme",
                "t_3",
                vec![
                    sub_task("s_1", 1, "Cutting", &["w_a"]),
                    sub_task("s_2", 1, "Cutting", &["w_a"]),
                ],
            )
            .await
            .unwrap();

        let moved = fx
            .engine
            .move_sub_task_at("acme", "t_3", "s_1", "Assembly", at(5, 1, 9))
            .await
            .unwrap();
        assert_eq!(moved.task.status, TaskStatus::InProgress);
        assert_eq!(fx.product("p_3").await.status, "Assembly");

        fx.engine
            .move_sub_task_at("acme", "t_3", "s_1", "Done", at(5, 2, 15))
            .await
            .unwrap();
        fx.engine
            .move_sub_task_at("acme", "t_3", "s_2", "Assembly", at(5, 2, 9))
            .await
            .unwrap();
        let done = fx
            .engine
            .move_sub_task_at("acme", "t_3", "s_2", "Done", at(5, 3, 12))
            .await
            .unwrap();

        assert_eq!(done.task.status, TaskStatus::Done);
        assert_eq!(done.task.completed_at, Some(at(5, 3, 12)));
        assert!(done.task.frozen);
        let Decomposition::SubTasks(items) = &done.task.decomposition else {
            panic!("expected subtasks");
        };
        assert!(items.iter().all(|s| s.stage == "Assembly"));
        assert_eq!(items[0].stage_history.len(), 2);
        assert_eq!(fx.product("p_3").await.status, "Ready");
        assert!(fx.work_order("wo_2").await.is_done());
    }

    #[tokio::test]
    async fn test_move_to_unknown_stage_or_subtask_fails() {
        let fx = Fixture::scenario().await;
        fx.engine
            .create_or_update_subtasks("acme", "t_3", vec![sub_task("s_1", 1, "Cutting", &["w_a"])])
            .await
            .unwrap();

        let stage = fx.engine.move_sub_task("acme", "t_3", "s_1", "Painting").await;
        assert!(matches!(stage, Err(EngineError::UnknownStage { .. })));
        let missing = fx.engine.move_sub_task("acme", "t_3", "s_9", "Drilling").await;
        assert!(matches!(missing, Err(EngineError::SubTaskNotFound { .. })));
        let whole = fx.engine.move_sub_task("acme", "t_1", "s_1", "Drilling").await;
        assert!(matches!(whole, Err(EngineError::SubTaskNotFound { .. })));
    }
}
