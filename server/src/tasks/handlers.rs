//! Task HTTP Handlers
//!
//! All task routes sit behind the authentication middleware; the owner id
//! comes from the verified identity, never from the request body.

use crate::error::ApiError;
use crate::extractors::CurrentUser;
use crate::models::{
    ApiResponse, CreateTaskRequest, PositionUpdateRequest, TaskQuery, TimeUpdateRequest,
    UpdateTaskRequest,
};
use crate::Services;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// GET /api/tasks
pub async fn list_tasks(
    State(services): State<Arc<Services>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<TaskQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let data = services.tasks.list(user.id, &query).await;
    Ok(Json(ApiResponse::new(data, "Tasks fetched successfully")))
}

/// GET /api/tasks/stats/summary
///
/// Registered as a literal route so "summary" is never parsed as a task id.
pub async fn stats_summary(
    State(services): State<Arc<Services>>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let data = services.tasks.stats(user.id).await;
    Ok(Json(ApiResponse::new(
        data,
        "Statistics fetched successfully",
    )))
}

/// GET /api/tasks/:id
pub async fn get_task(
    State(services): State<Arc<Services>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let task = services.tasks.get(user.id, id).await?;
    Ok(Json(ApiResponse::new(task, "Task fetched successfully")))
}

/// POST /api/tasks
pub async fn create_task(
    State(services): State<Arc<Services>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let task = services.tasks.create(user.id, req).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(task, "Task created successfully")),
    ))
}

/// PUT /api/tasks/:id
pub async fn update_task(
    State(services): State<Arc<Services>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let task = services.tasks.update(user.id, id, req).await?;

    Ok(Json(ApiResponse::new(task, "Task updated successfully")))
}

/// DELETE /api/tasks/:id
pub async fn delete_task(
    State(services): State<Arc<Services>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    services.tasks.delete(user.id, id).await?;
    Ok(Json(ApiResponse::new(
        json!(null),
        "Task deleted successfully",
    )))
}

/// PATCH /api/tasks/:id/position
pub async fn update_position(
    State(services): State<Arc<Services>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<PositionUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let task = services.tasks.update_position(user.id, id, req).await?;
    Ok(Json(ApiResponse::new(task, "Task position updated")))
}

/// PATCH /api/tasks/:id/time
pub async fn update_time(
    State(services): State<Arc<Services>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<TimeUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let task = services.tasks.update_time(user.id, id, req).await?;
    Ok(Json(ApiResponse::new(task, "Task time updated")))
}
