//! HTTP API for the labor cost engine.
//!
//! Exposes attendance entry, task mutations, work order recalculation,
//! diagnostics and the batch jobs as tenant-scoped JSON endpoints.

mod handlers;
mod request;
mod response;
mod state;

pub use handlers::create_router;
pub use request::{
    BackfillRequest, DateQuery, MoveSubTaskRequest, ProcessRequest, RecordAttendanceRequest,
    SubTaskRequest, TogglePauseRequest, UpdateProcessesRequest, UpsertSubTasksRequest,
    WeekendsRequest,
};
pub use response::{ApiError, ApiErrorResponse};
pub use state::AppState;
