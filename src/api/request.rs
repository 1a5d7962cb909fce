//! Request types for the labor cost API.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AttendanceStatus, Process, SubTask, TaskStatus};

/// Body of `POST /tenants/:tenant/attendance`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordAttendanceRequest {
    /// The worker.
    pub worker_id: String,
    /// The calendar date.
    pub date: NaiveDate,
    /// The worker's status on that date.
    pub status: AttendanceStatus,
    /// Free-form notes; omitted notes keep the stored ones.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Query of `GET /tenants/:tenant/attendance/warnings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateQuery {
    /// The calendar date to check.
    pub date: NaiveDate,
}

/// Body of `POST /tenants/:tenant/tasks/:task_id/pause`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TogglePauseRequest {
    /// True to pause, false to resume.
    pub paused: bool,
    /// When the change happened; defaults to now.
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

/// A process in an update request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRequest {
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

/// Body of `PUT /tenants/:tenant/tasks/:task_id/processes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProcessesRequest {
    /// The complete process list, in stage order.
    pub processes: Vec<ProcessRequest>,
}

/// A subtask in an upsert request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTaskRequest {
    /// Identifier, unique within the task.
    pub id: String,
    /// Number of units.
    pub quantity: u32,
    /// Current stage.
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
    /// When work on the split began.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When the split was completed.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Body of `POST /tenants/:tenant/tasks/:task_id/subtasks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertSubTasksRequest {
    /// Subtasks to create or replace.
    pub sub_tasks: Vec<SubTaskRequest>,
}

/// Body of `POST /tenants/:tenant/tasks/:task_id/subtasks/:sub_task_id/move`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveSubTaskRequest {
    /// A configured stage, or the done marker.
    pub target_stage: String,
    /// When the move happened; defaults to now.
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

/// Body of `POST /tenants/:tenant/jobs/backfill`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillRequest {
    /// First date (inclusive).
    pub date_from: NaiveDate,
    /// Last date (inclusive).
    pub date_to: NaiveDate,
}

/// Body of `POST /tenants/:tenant/jobs/weekends`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekendsRequest {
    /// Workers to populate; empty means every worker.
    #[serde(default)]
    pub workers: Vec<String>,
    /// Calendar year.
    pub year: i32,
    /// Calendar month, 1 to 12.
    pub month: u32,
}

impl From<ProcessRequest> for Process {
    fn from(req: ProcessRequest) -> Self {
        Process {
            name: req.name,
            status: req.status,
            worker_id: req.worker_id,
            helpers: req.helpers,
            started_at: req.started_at,
            completed_at: req.completed_at,
        }
    }
}

impl From<SubTaskRequest> for SubTask {
    fn from(req: SubTaskRequest) -> Self {
        SubTask {
            id: req.id,
            quantity: req.quantity,
            stage: req.stage,
            status: req.status,
            workers: req.workers,
            helpers: req.helpers,
            is_paused: false,
            pause_periods: vec![],
            started_at: req.started_at,
            completed_at: req.completed_at,
            stage_history: vec![],
        }
    }
}
