//! Work order tasks and their decomposition into stages.
//!
//! A [`WorkOrderTask`] is one product-quantity unit inside a work order. It
//! is tracked either as a whole, through legacy ordered [`Process`] stages,
//! or through quantity-split [`SubTask`]s. Both decompositions implement
//! [`StageTracked`], which is the single contract used for status, timing
//! and eligibility derivation.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle status shared by tasks, processes and subtasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started.
    #[default]
    Waiting,
    /// Work has started.
    InProgress,
    /// Work is complete.
    Done,
}

/// A period during which work was paused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PausePeriod {
    /// When the pause began.
    pub started_at: DateTime<Utc>,
    /// When the pause ended, `None` while still paused.
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

impl PausePeriod {
    /// Returns true if any part of `date` falls inside the pause.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.started_at.date_naive() <= date
            && self.ended_at.is_none_or(|end| end.date_naive() >= date)
    }

    /// Returns true if the pause has not been closed.
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

fn any_pause_covers(periods: &[PausePeriod], date: NaiveDate) -> bool {
    periods.iter().any(|p| p.covers(date))
}

fn interval_covers(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    date: NaiveDate,
) -> bool {
    match start {
        Some(start) => {
            start.date_naive() <= date && end.is_none_or(|end| end.date_naive() >= date)
        }
        None => false,
    }
}

/// Common contract for the stages a task can be decomposed into.
pub trait StageTracked {
    /// The stage this item represents or currently sits in.
    fn stage_name(&self) -> &str;
    /// The item's own status.
    fn status(&self) -> TaskStatus;
    /// When work on the item began.
    fn started_at(&self) -> Option<DateTime<Utc>>;
    /// When the item was completed.
    fn completed_at(&self) -> Option<DateTime<Utc>>;
    /// Returns true if the worker is assigned to the item as worker or helper.
    fn involves(&self, worker_id: &str) -> bool;
    /// All workers and helpers on the item.
    fn workers(&self) -> Vec<&str>;

    /// Returns true if the item was paused on `date`.
    fn paused_on(&self, _date: NaiveDate) -> bool {
        false
    }

    /// Returns true if the item was being worked on `date`.
    fn active_on(&self, date: NaiveDate) -> bool {
        let end = match self.status() {
            TaskStatus::Done => self.completed_at(),
            _ => None,
        };
        interval_covers(self.started_at(), end, date)
    }

    /// Returns true if the worker accrues cost on this item on `date`.
    fn eligible(&self, worker_id: &str, date: NaiveDate) -> bool {
        self.involves(worker_id) && self.active_on(date) && !self.paused_on(date)
    }
}

/// A legacy ordered production stage (e.g. Cutting, Assembly).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    /// Stage name.
    pub name: String,
    /// Stage status.
    #[serde(default)]
    pub status: TaskStatus,
    /// The responsible worker.
    #[serde(default)]
    pub worker_id: Option<String>,
    /// Additional helpers.
    #[serde(default)]
    pub helpers: Vec<String>,
    /// When the stage began.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When the stage was completed.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl StageTracked for Process {
    fn stage_name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> TaskStatus {
        self.status
    }

    fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    fn involves(&self, worker_id: &str) -> bool {
        self.worker_id.as_deref() == Some(worker_id) || self.helpers.iter().any(|h| h == worker_id)
    }

    fn workers(&self) -> Vec<&str> {
        self.worker_id
            .iter()
            .map(String::as_str)
            .chain(self.helpers.iter().map(String::as_str))
            .collect()
    }
}

/// A recorded stage transition of a subtask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageVisit {
    /// Stage entered.
    pub stage: String,
    /// When it was entered.
    pub entered_at: DateTime<Utc>,
}

/// A quantity-partitioned split of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTask {
    /// Identifier, unique within the task.
    pub id: String,
    /// Number of units in this split.
    pub quantity: u32,
    /// The stage the split is in (the last stage reached once done).
    pub stage: String,
    /// Split status.
    #[serde(default)]
    pub status: TaskStatus,
    /// Assigned workers.
    #[serde(default)]
    pub workers: Vec<String>,
    /// Assigned helpers.
    #[serde(default)]
    pub helpers: Vec<String>,
    /// Whether the split is currently paused.
    #[serde(default)]
    pub is_paused: bool,
    /// Pause history of the split.
    #[serde(default)]
    pub pause_periods: Vec<PausePeriod>,
    /// When work on the split began.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When the split was completed.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Stage transitions in the order they happened.
    #[serde(default)]
    pub stage_history: Vec<StageVisit>,
}

impl StageTracked for SubTask {
    fn stage_name(&self) -> &str {
        &self.stage
    }

    fn status(&self) -> TaskStatus {
        self.status
    }

    fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    fn involves(&self, worker_id: &str) -> bool {
        self.workers.iter().chain(self.helpers.iter()).any(|w| w == worker_id)
    }

    fn workers(&self) -> Vec<&str> {
        self.workers
            .iter()
            .chain(self.helpers.iter())
            .map(String::as_str)
            .collect()
    }

    fn paused_on(&self, date: NaiveDate) -> bool {
        any_pause_covers(&self.pause_periods, date)
    }
}

/// How a task is broken down for tracking.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum Decomposition {
    /// Tracked as a single unit.
    #[default]
    Whole,
    /// Legacy ordered stages.
    Processes(Vec<Process>),
    /// Quantity splits with independent stage tracking.
    SubTasks(Vec<SubTask>),
}

fn derive_status<T: StageTracked>(items: &[T]) -> Option<TaskStatus> {
    if items.is_empty() {
        return None;
    }
    if items.iter().all(|i| i.status() == TaskStatus::Done) {
        Some(TaskStatus::Done)
    } else if items.iter().any(|i| i.status() != TaskStatus::Waiting) {
        Some(TaskStatus::InProgress)
    } else {
        Some(TaskStatus::Waiting)
    }
}

fn earliest_start<T: StageTracked>(items: &[T]) -> Option<DateTime<Utc>> {
    items.iter().filter_map(|i| i.started_at()).min()
}

fn latest_completion<T: StageTracked>(items: &[T]) -> Option<DateTime<Utc>> {
    items.iter().filter_map(|i| i.completed_at()).max()
}

fn last_completed<T: StageTracked>(items: &[T]) -> Option<&str> {
    items
        .iter()
        .filter(|i| i.status() == TaskStatus::Done)
        .max_by_key(|i| i.completed_at())
        .map(|i| i.stage_name())
}

/// Fills in the timestamps a started or finished stage is missing.
fn stamp_stage(
    status: TaskStatus,
    started_at: &mut Option<DateTime<Utc>>,
    completed_at: &mut Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    let before = (*started_at, *completed_at);
    if status == TaskStatus::Done && completed_at.is_none() {
        *completed_at = Some(now);
    }
    if status != TaskStatus::Waiting && started_at.is_none() {
        *started_at = completed_at.or(Some(now));
    }
    before != (*started_at, *completed_at)
}

fn stage_position(stage_order: &[String], stage: &str) -> usize {
    stage_order
        .iter()
        .position(|s| s == stage)
        .unwrap_or(usize::MAX)
}

impl Decomposition {
    /// Stamps `now` on stages that are done or in progress without the
    /// matching timestamps, so a finished stage stops being open-ended.
    pub fn stamp_missing_timestamps(&mut self, now: DateTime<Utc>) -> bool {
        let mut changed = false;
        match self {
            Decomposition::Whole => {}
            Decomposition::Processes(items) => {
                for p in items {
                    changed |= stamp_stage(p.status, &mut p.started_at, &mut p.completed_at, now);
                }
            }
            Decomposition::SubTasks(items) => {
                for s in items {
                    changed |= stamp_stage(s.status, &mut s.started_at, &mut s.completed_at, now);
                }
            }
        }
        changed
    }

    /// Derives the task status from its stages, `None` when tracked whole.
    pub fn derived_status(&self) -> Option<TaskStatus> {
        match self {
            Decomposition::Whole => None,
            Decomposition::Processes(items) => derive_status(items),
            Decomposition::SubTasks(items) => derive_status(items),
        }
    }

    /// Earliest stage start.
    pub fn earliest_start(&self) -> Option<DateTime<Utc>> {
        match self {
            Decomposition::Whole => None,
            Decomposition::Processes(items) => earliest_start(items),
            Decomposition::SubTasks(items) => earliest_start(items),
        }
    }

    /// Latest stage completion.
    pub fn latest_completion(&self) -> Option<DateTime<Utc>> {
        match self {
            Decomposition::Whole => None,
            Decomposition::Processes(items) => latest_completion(items),
            Decomposition::SubTasks(items) => latest_completion(items),
        }
    }

    /// Returns true if the worker accrues cost through a stage on `date`.
    pub fn is_worker_eligible(&self, worker_id: &str, date: NaiveDate) -> bool {
        match self {
            Decomposition::Whole => false,
            Decomposition::Processes(items) => items.iter().any(|i| i.eligible(worker_id, date)),
            Decomposition::SubTasks(items) => items.iter().any(|i| i.eligible(worker_id, date)),
        }
    }

    /// All workers and helpers assigned to any stage.
    pub fn involved_workers(&self) -> BTreeSet<String> {
        let names: Vec<&str> = match self {
            Decomposition::Whole => Vec::new(),
            Decomposition::Processes(items) => items.iter().flat_map(|i| i.workers()).collect(),
            Decomposition::SubTasks(items) => items.iter().flat_map(|i| i.workers()).collect(),
        };
        names.into_iter().map(str::to_string).collect()
    }

    /// The stage currently being worked.
    ///
    /// For processes this is the first in-progress stage in list order. For
    /// subtasks it is the least advanced in-progress split according to
    /// `stage_order`.
    pub fn active_stage(&self, stage_order: &[String]) -> Option<&str> {
        match self {
            Decomposition::Whole => None,
            Decomposition::Processes(items) => items
                .iter()
                .find(|p| p.status == TaskStatus::InProgress)
                .map(|p| p.name.as_str()),
            Decomposition::SubTasks(items) => items
                .iter()
                .filter(|s| s.status == TaskStatus::InProgress)
                .min_by_key(|s| stage_position(stage_order, &s.stage))
                .map(|s| s.stage.as_str()),
        }
    }

    /// The most recently completed stage.
    pub fn last_completed_stage(&self) -> Option<&str> {
        match self {
            Decomposition::Whole => None,
            Decomposition::Processes(items) => last_completed(items),
            Decomposition::SubTasks(items) => last_completed(items),
        }
    }

    /// The last recorded stage of a finished task.
    ///
    /// For processes this is the last stage in list order; for subtasks it is
    /// the most advanced stage any split reached.
    pub fn final_stage(&self, stage_order: &[String]) -> Option<&str> {
        match self {
            Decomposition::Whole => None,
            Decomposition::Processes(items) => items.last().map(|p| p.name.as_str()),
            Decomposition::SubTasks(items) => items
                .iter()
                .filter(|s| stage_position(stage_order, &s.stage) != usize::MAX)
                .max_by_key(|s| stage_position(stage_order, &s.stage))
                .map(|s| s.stage.as_str()),
        }
    }
}

/// One product-quantity unit of work inside a work order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrderTask {
    /// Unique identifier for the task.
    pub id: String,
    /// The tenant the task belongs to.
    pub tenant_id: String,
    /// The owning work order.
    pub work_order_id: String,
    /// The product being produced.
    pub product_id: String,
    /// The project the product belongs to.
    pub project_id: String,
    /// Number of product units.
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Current status.
    #[serde(default)]
    pub status: TaskStatus,
    /// When work began.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When work was completed.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Whether the task is currently paused.
    #[serde(default)]
    pub is_paused: bool,
    /// Pause history.
    #[serde(default)]
    pub pause_periods: Vec<PausePeriod>,
    /// Workers assigned to the task as a whole.
    #[serde(default)]
    pub assigned_workers: Vec<String>,
    /// Stage breakdown.
    #[serde(default)]
    pub decomposition: Decomposition,
    /// Contracted selling value of the task.
    #[serde(default)]
    pub value: Decimal,
    /// Accepted pricing offer the task was created from.
    #[serde(default)]
    pub offer_id: Option<String>,
    /// Set once the value has been recovered from an offer.
    #[serde(default)]
    pub value_backfill_attempted: bool,
    /// Material cost of the task.
    #[serde(default)]
    pub material_cost: Decimal,
    /// Material cost was entered by hand and must not be recomputed.
    #[serde(default)]
    pub material_cost_overridden: bool,
    /// Budgeted labor cost.
    #[serde(default)]
    pub planned_labor_cost: Decimal,
    /// Actual labor cost as last aggregated.
    #[serde(default)]
    pub actual_labor_cost: Decimal,
    /// Share of transport cost charged to the task.
    #[serde(default)]
    pub transport_share: Decimal,
    /// Service fees charged to the task.
    #[serde(default)]
    pub services_total: Decimal,
    /// Costs are locked because the task is complete.
    #[serde(default)]
    pub frozen: bool,
    /// Labor cost captured when the task was frozen.
    #[serde(default)]
    pub frozen_labor_cost: Option<Decimal>,
}

fn default_quantity() -> u32 {
    1
}

impl WorkOrderTask {
    /// Effective start: the task's own start, else its earliest stage start.
    pub fn effective_start(&self) -> Option<DateTime<Utc>> {
        self.started_at.or_else(|| self.decomposition.earliest_start())
    }

    /// Returns true if the task's active interval covers `date`.
    ///
    /// Completed tasks cover their historical span so backdated attendance
    /// still finds them.
    pub fn active_on(&self, date: NaiveDate) -> bool {
        let end = match self.status {
            TaskStatus::Done => self
                .completed_at
                .or_else(|| self.decomposition.latest_completion()),
            _ => None,
        };
        interval_covers(self.effective_start(), end, date)
    }

    /// Returns true if a task-level pause covers `date`.
    pub fn paused_on(&self, date: NaiveDate) -> bool {
        any_pause_covers(&self.pause_periods, date)
    }

    /// Returns true if the worker accrues cost on this task on `date`.
    pub fn is_worker_eligible(&self, worker_id: &str, date: NaiveDate) -> bool {
        if !self.active_on(date) || self.paused_on(date) {
            return false;
        }
        self.assigned_workers.iter().any(|w| w == worker_id)
            || self.decomposition.is_worker_eligible(worker_id, date)
    }

    /// Every worker assigned directly or through a stage.
    pub fn involved_workers(&self) -> BTreeSet<String> {
        let mut workers = self.decomposition.involved_workers();
        workers.extend(self.assigned_workers.iter().cloned());
        workers
    }

    /// Locks the task's costs at completion.
    pub fn freeze(&mut self, labor_cost: Decimal) {
        self.frozen = true;
        self.frozen_labor_cost = Some(labor_cost);
    }

    /// Unlocks the task's costs after it leaves the done state.
    pub fn reopen(&mut self) {
        self.frozen = false;
        self.frozen_labor_cost = None;
    }

    /// Copies the fields owned by cost aggregation from `costed`.
    ///
    /// Status, stages, pauses and assignments stay as they are.
    pub fn take_costs_from(&mut self, costed: &WorkOrderTask) {
        self.value = costed.value;
        self.value_backfill_attempted = costed.value_backfill_attempted;
        self.material_cost = costed.material_cost;
        self.actual_labor_cost = costed.actual_labor_cost;
        self.frozen = costed.frozen;
        self.frozen_labor_cost = costed.frozen_labor_cost;
    }

    /// Brings status and timestamps in line with the stage breakdown.
    ///
    /// Returns true if anything changed. Tasks tracked whole are only
    /// checked for missing timestamps.
    pub fn sync_with_stages(&mut self, now: DateTime<Utc>) -> bool {
        let before = (self.status, self.started_at, self.completed_at);
        let stamped = self.decomposition.stamp_missing_timestamps(now);

        if let Some(status) = self.decomposition.derived_status() {
            self.status = status;
            if let Some(start) = self.decomposition.earliest_start() {
                self.started_at = Some(start);
            }
        }

        match self.status {
            TaskStatus::Done => {
                if self.completed_at.is_none() || self.decomposition.derived_status().is_some() {
                    self.completed_at = self
                        .decomposition
                        .latest_completion()
                        .or(self.completed_at)
                        .or(Some(now));
                }
                if self.started_at.is_none() {
                    self.started_at = self.completed_at;
                }
            }
            TaskStatus::InProgress => {
                self.completed_at = None;
                if self.started_at.is_none() {
                    self.started_at = Some(now);
                }
            }
            TaskStatus::Waiting => {
                self.completed_at = None;
                if self.decomposition.derived_status().is_some() {
                    self.started_at = self.decomposition.earliest_start();
                }
            }
        }

        stamped || before != (self.status, self.started_at, self.completed_at)
    }
}
