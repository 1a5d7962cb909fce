//! HTTP request handlers for the labor cost API.
//!
//! Every route is scoped by tenant. Handlers tag the request with a
//! correlation id, call one engine operation and serialize its result.

use std::time::Instant;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EngineResult;
use crate::models::{Process, SubTask};

use super::request::{
    BackfillRequest, DateQuery, MoveSubTaskRequest, RecordAttendanceRequest, TogglePauseRequest,
    UpdateProcessesRequest, UpsertSubTasksRequest, WeekendsRequest,
};
use super::response::{ApiError, ApiErrorResponse};
use super::state::AppState;

/// Creates the API router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/tenants/:tenant/attendance", post(record_attendance_handler))
        .route(
            "/tenants/:tenant/attendance/warnings",
            get(missing_attendance_handler),
        )
        .route("/tenants/:tenant/tasks/:task_id/pause", post(toggle_pause_handler))
        .route(
            "/tenants/:tenant/tasks/:task_id/processes",
            put(update_processes_handler),
        )
        .route(
            "/tenants/:tenant/tasks/:task_id/subtasks",
            post(upsert_subtasks_handler),
        )
        .route(
            "/tenants/:tenant/tasks/:task_id/subtasks/:sub_task_id/move",
            post(move_sub_task_handler),
        )
        .route(
            "/tenants/:tenant/work-orders/:work_order_id/recalculate",
            post(recalculate_handler),
        )
        .route(
            "/tenants/:tenant/work-orders/:work_order_id/warnings",
            get(profit_warnings_handler),
        )
        .route(
            "/tenants/:tenant/jobs/recalculate-active",
            post(recalculate_active_handler),
        )
        .route("/tenants/:tenant/jobs/backfill", post(backfill_handler))
        .route("/tenants/:tenant/jobs/weekends", post(weekends_handler))
        .route("/tenants/:tenant/jobs/startup-sync", post(startup_sync_handler))
        .route("/tenants/:tenant/jobs/repair", post(repair_handler))
        .with_state(state)
}

/// Turns an engine result into a JSON response and logs the outcome.
fn respond<T: Serialize>(
    correlation_id: Uuid,
    operation: &str,
    started: Instant,
    result: EngineResult<T>,
) -> Response {
    match result {
        Ok(body) => {
            info!(
                correlation_id = %correlation_id,
                operation,
                duration_us = started.elapsed().as_micros() as u64,
                "Request completed"
            );
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                Json(body),
            )
                .into_response()
        }
        Err(err) => {
            warn!(
                correlation_id = %correlation_id,
                operation,
                error = %err,
                "Request failed"
            );
            ApiErrorResponse::from(err).into_response()
        }
    }
}

/// Maps a JSON body rejection onto a 400 response.
fn json_rejection(correlation_id: Uuid, rejection: JsonRejection) -> Response {
    let error = match rejection {
        JsonRejection::JsonDataError(err) => {
            let body_text = err.body_text();
            warn!(correlation_id = %correlation_id, error = %body_text, "JSON data error");
            if body_text.contains("missing field") {
                ApiError::validation_error(body_text)
            } else {
                ApiError::malformed_json(body_text)
            }
        }
        JsonRejection::JsonSyntaxError(err) => {
            warn!(correlation_id = %correlation_id, error = %err, "JSON syntax error");
            ApiError::malformed_json(format!("Invalid JSON syntax: {}", err))
        }
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::new("MISSING_CONTENT_TYPE", "Content-Type must be application/json")
        }
        _ => ApiError::malformed_json("Failed to parse request body"),
    };
    ApiErrorResponse::bad_request(error).into_response()
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Handler for `POST /tenants/:tenant/attendance`.
async fn record_attendance_handler(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    payload: Result<Json<RecordAttendanceRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let started = Instant::now();
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return json_rejection(correlation_id, rejection),
    };
    info!(
        correlation_id = %correlation_id,
        tenant = %tenant,
        worker_id = %request.worker_id,
        date = %request.date,
        status = ?request.status,
        "Recording attendance"
    );

    let result = state
        .engine()
        .record_attendance(
            &tenant,
            &request.worker_id,
            request.date,
            request.status,
            request.notes,
        )
        .await;
    respond(correlation_id, "record_attendance", started, result)
}

/// Handler for `GET /tenants/:tenant/attendance/warnings?date=YYYY-MM-DD`.
async fn missing_attendance_handler(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    query: Result<Query<DateQuery>, QueryRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let started = Instant::now();
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => {
            warn!(correlation_id = %correlation_id, error = %rejection, "Invalid query");
            return ApiErrorResponse::bad_request(ApiError::validation_error(rejection.body_text()))
                .into_response();
        }
    };

    let result = state
        .engine()
        .missing_attendance_warnings(&tenant, query.date)
        .await;
    respond(correlation_id, "missing_attendance_warnings", started, result)
}

/// Handler for `POST /tenants/:tenant/tasks/:task_id/pause`.
async fn toggle_pause_handler(
    State(state): State<AppState>,
    Path((tenant, task_id)): Path<(String, String)>,
    payload: Result<Json<TogglePauseRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let started = Instant::now();
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return json_rejection(correlation_id, rejection),
    };

    let engine = state.engine();
    let result = match request.at {
        Some(at) => {
            engine
                .toggle_pause_at(&tenant, &task_id, request.paused, at)
                .await
        }
        None => engine.toggle_pause(&tenant, &task_id, request.paused).await,
    };
    respond(correlation_id, "toggle_pause", started, result)
}

/// Handler for `PUT /tenants/:tenant/tasks/:task_id/processes`.
async fn update_processes_handler(
    State(state): State<AppState>,
    Path((tenant, task_id)): Path<(String, String)>,
    payload: Result<Json<UpdateProcessesRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let started = Instant::now();
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return json_rejection(correlation_id, rejection),
    };

    let processes: Vec<Process> = request.processes.into_iter().map(Into::into).collect();
    let result = state
        .engine()
        .update_task_processes(&tenant, &task_id, processes)
        .await;
    respond(correlation_id, "update_task_processes", started, result)
}

/// Handler for `POST /tenants/:tenant/tasks/:task_id/subtasks`.
async fn upsert_subtasks_handler(
    State(state): State<AppState>,
    Path((tenant, task_id)): Path<(String, String)>,
    payload: Result<Json<UpsertSubTasksRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let started = Instant::now();
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return json_rejection(correlation_id, rejection),
    };

    let sub_tasks: Vec<SubTask> = request.sub_tasks.into_iter().map(Into::into).collect();
    let result = state
        .engine()
        .create_or_update_subtasks(&tenant, &task_id, sub_tasks)
        .await;
    respond(correlation_id, "create_or_update_subtasks", started, result)
}

/// Handler for `POST /tenants/:tenant/tasks/:task_id/subtasks/:sub_task_id/move`.
async fn move_sub_task_handler(
    State(state): State<AppState>,
    Path((tenant, task_id, sub_task_id)): Path<(String, String, String)>,
    payload: Result<Json<MoveSubTaskRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let started = Instant::now();
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return json_rejection(correlation_id, rejection),
    };

    let engine = state.engine();
    let result = match request.at {
        Some(at) => {
            engine
                .move_sub_task_at(&tenant, &task_id, &sub_task_id, &request.target_stage, at)
                .await
        }
        None => {
            engine
                .move_sub_task(&tenant, &task_id, &sub_task_id, &request.target_stage)
                .await
        }
    };
    respond(correlation_id, "move_sub_task", started, result)
}

/// Handler for `POST /tenants/:tenant/work-orders/:work_order_id/recalculate`.
async fn recalculate_handler(
    State(state): State<AppState>,
    Path((tenant, work_order_id)): Path<(String, String)>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let started = Instant::now();
    let result = state
        .engine()
        .recalculate_work_order(&tenant, &work_order_id)
        .await;
    respond(correlation_id, "recalculate_work_order", started, result)
}

/// Handler for `GET /tenants/:tenant/work-orders/:work_order_id/warnings`.
async fn profit_warnings_handler(
    State(state): State<AppState>,
    Path((tenant, work_order_id)): Path<(String, String)>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let started = Instant::now();
    let result = state
        .engine()
        .validate_work_order_profit_warnings(&tenant, &work_order_id)
        .await;
    respond(correlation_id, "validate_work_order_profit_warnings", started, result)
}

/// Handler for `POST /tenants/:tenant/jobs/recalculate-active`.
async fn recalculate_active_handler(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let started = Instant::now();
    let result = state.engine().recalculate_all_active(&tenant, None).await;
    respond(correlation_id, "recalculate_all_active", started, result)
}

/// Handler for `POST /tenants/:tenant/jobs/backfill`.
async fn backfill_handler(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    payload: Result<Json<BackfillRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let started = Instant::now();
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return json_rejection(correlation_id, rejection),
    };

    let result = state
        .engine()
        .backfill_from_attendance(&tenant, request.date_from, request.date_to, None)
        .await;
    respond(correlation_id, "backfill_from_attendance", started, result)
}

/// Handler for `POST /tenants/:tenant/jobs/weekends`.
async fn weekends_handler(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    payload: Result<Json<WeekendsRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let started = Instant::now();
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return json_rejection(correlation_id, rejection),
    };

    let result = state
        .engine()
        .auto_populate_weekends(&tenant, &request.workers, request.year, request.month, None)
        .await;
    respond(correlation_id, "auto_populate_weekends", started, result)
}

/// Handler for `POST /tenants/:tenant/jobs/startup-sync`.
async fn startup_sync_handler(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let started = Instant::now();
    let result = state.engine().run_startup_sync(&tenant, None).await;
    respond(correlation_id, "run_startup_sync", started, result)
}

/// Handler for `POST /tenants/:tenant/jobs/repair`.
async fn repair_handler(State(state): State<AppState>, Path(tenant): Path<String>) -> Response {
    let correlation_id = Uuid::new_v4();
    let started = Instant::now();
    let result = state.engine().repair_all_statuses(&tenant, None).await;
    respond(correlation_id, "repair_all_statuses", started, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigLoader;
    use crate::store::InMemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn create_test_router() -> Router {
        let config = ConfigLoader::load("./config/furniture")
            .expect("Failed to load config")
            .into_config();
        create_router(AppState::in_memory(Arc::new(InMemoryStore::new()), config))
    }

    async fn send(router: Router, method: &str, uri: &str, body: &str) -> (StatusCode, ApiError) {
        let response = router
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("Content-Type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_returns_200() {
        let response = create_test_router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_json_returns_400() {
        let (status, error) = send(
            create_test_router(),
            "POST",
            "/tenants/acme/attendance",
            "{invalid json",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error.code, "MALFORMED_JSON");
    }

    #[tokio::test]
    async fn test_missing_field_returns_validation_error() {
        let (status, error) = send(
            create_test_router(),
            "POST",
            "/tenants/acme/attendance",
            r#"{"date": "2024-05-01", "status": "present"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error.code, "VALIDATION_ERROR");
        assert!(error.message.contains("worker_id"));
    }

    #[tokio::test]
    async fn test_unknown_worker_returns_404() {
        let (status, error) = send(
            create_test_router(),
            "POST",
            "/tenants/acme/attendance",
            r#"{"worker_id": "w_404", "date": "2024-05-01", "status": "present"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error.code, "WORKER_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_bad_month_returns_400() {
        let (status, error) = send(
            create_test_router(),
            "POST",
            "/tenants/acme/jobs/weekends",
            r#"{"year": 2024, "month": 13}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error.code, "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_invalid_warning_date_returns_400() {
        let (status, error) = send(
            create_test_router(),
            "GET",
            "/tenants/acme/attendance/warnings?date=yesterday",
            "",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error.code, "VALIDATION_ERROR");
    }
}
