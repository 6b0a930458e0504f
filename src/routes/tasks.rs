use actix_web::http::StatusCode;
use actix_web::{delete, get, patch, post, put, web, HttpRequest, HttpResponse};
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::middleware::request_id;
use crate::models::{Task, TaskCreate, TaskStatus, TaskUpdate};
use crate::response::success_response;

const TASK_COLUMNS: &str =
    "task_id, user_id, title, description, deadline, completed, status, created_at, updated_at";

/// Point-reads a task scoped to its owner. A task owned by someone else and
/// a task that does not exist are the same `NotFound` to the caller.
async fn fetch_owned(pool: &PgPool, task_id: Uuid, owner: Uuid) -> Result<Task, AppError> {
    let task = sqlx::query_as::<_, Task>(&format!(
        "SELECT {} FROM tasks WHERE task_id = $1 AND user_id = $2",
        TASK_COLUMNS
    ))
    .bind(task_id)
    .bind(owner)
    .fetch_optional(pool)
    .await?;

    task.ok_or_else(|| AppError::NotFound("Task not found".to_string()))
}

/// Create a task for the authenticated user. The status is resolved against
/// the current clock before the row is written, so a deadline already in the
/// past comes back as `missed` immediately.
#[post("")]
pub async fn create_task(
    pool: web::Data<PgPool>,
    payload: web::Json<TaskCreate>,
    user: CurrentUser,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let request_id = request_id::current(&req);
    payload.validate()?;

    let status = TaskStatus::resolve(false, payload.deadline, Utc::now());

    let task = sqlx::query_as::<_, Task>(&format!(
        "INSERT INTO tasks (task_id, user_id, title, description, deadline, completed, status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {}",
        TASK_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(user.0.user_id)
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(payload.deadline)
    .bind(false)
    .bind(status)
    .fetch_one(pool.get_ref())
    .await?;

    log::info!(
        "request_id={} task created task_id={}",
        request_id,
        task.task_id
    );

    Ok(success_response(
        &request_id,
        StatusCode::CREATED,
        "Task created successfully",
        task,
    ))
}

/// List the authenticated user's tasks, newest first. Status is re-resolved
/// against the current clock before serialization; a task fetched yesterday
/// as `upcoming` may legitimately read as `missed` today.
#[get("")]
pub async fn list_tasks(
    pool: web::Data<PgPool>,
    user: CurrentUser,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let request_id = request_id::current(&req);

    let mut tasks = sqlx::query_as::<_, Task>(&format!(
        "SELECT {} FROM tasks WHERE user_id = $1 ORDER BY created_at DESC",
        TASK_COLUMNS
    ))
    .bind(user.0.user_id)
    .fetch_all(pool.get_ref())
    .await?;

    let now = Utc::now();
    for task in &mut tasks {
        task.refresh_status(now);
    }

    Ok(success_response(
        &request_id,
        StatusCode::OK,
        "Tasks retrieved successfully",
        tasks,
    ))
}

/// Fetch a single task by id, status re-resolved.
#[get("/{id}")]
pub async fn get_task(
    pool: web::Data<PgPool>,
    task_id: web::Path<Uuid>,
    user: CurrentUser,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let request_id = request_id::current(&req);

    let mut task = fetch_owned(pool.get_ref(), task_id.into_inner(), user.0.user_id).await?;
    task.refresh_status(Utc::now());

    Ok(success_response(
        &request_id,
        StatusCode::OK,
        "Task retrieved successfully",
        task,
    ))
}

/// Partially update a task. Only the fields present in the payload are
/// applied; the status is re-resolved afterwards and the row is written in a
/// single atomic UPDATE whose RETURNING clause is what the caller sees.
#[put("/{id}")]
pub async fn update_task(
    pool: web::Data<PgPool>,
    task_id: web::Path<Uuid>,
    payload: web::Json<TaskUpdate>,
    user: CurrentUser,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let request_id = request_id::current(&req);
    payload.validate()?;

    let mut task = fetch_owned(pool.get_ref(), task_id.into_inner(), user.0.user_id).await?;

    let payload = payload.into_inner();
    if let Some(title) = payload.title {
        task.title = title;
    }
    if let Some(description) = payload.description {
        task.description = Some(description);
    }
    if let Some(deadline) = payload.deadline {
        task.deadline = deadline;
    }
    if let Some(completed) = payload.completed {
        task.completed = completed;
    }
    task.refresh_status(Utc::now());

    let task = sqlx::query_as::<_, Task>(&format!(
        "UPDATE tasks \
         SET title = $1, description = $2, deadline = $3, completed = $4, status = $5, updated_at = NOW() \
         WHERE task_id = $6 AND user_id = $7 \
         RETURNING {}",
        TASK_COLUMNS
    ))
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.deadline)
    .bind(task.completed)
    .bind(task.status)
    .bind(task.task_id)
    .bind(task.user_id)
    .fetch_one(pool.get_ref())
    .await?;

    log::info!(
        "request_id={} task updated task_id={}",
        request_id,
        task.task_id
    );

    Ok(success_response(
        &request_id,
        StatusCode::OK,
        "Task updated successfully",
        task,
    ))
}

/// Mark a task completed. Completion takes precedence over an elapsed
/// deadline, so the resolved status is always `completed`; repeating the
/// call is a no-op in observable effect.
#[patch("/{id}/complete")]
pub async fn complete_task(
    pool: web::Data<PgPool>,
    task_id: web::Path<Uuid>,
    user: CurrentUser,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let request_id = request_id::current(&req);

    let mut task = fetch_owned(pool.get_ref(), task_id.into_inner(), user.0.user_id).await?;

    // Already completed: nothing to write, echo the task as-is.
    if task.completed {
        task.refresh_status(Utc::now());
        return Ok(success_response(
            &request_id,
            StatusCode::OK,
            "Task marked as completed",
            task,
        ));
    }

    task.completed = true;
    task.refresh_status(Utc::now());

    let task = sqlx::query_as::<_, Task>(&format!(
        "UPDATE tasks SET completed = $1, status = $2, updated_at = NOW() \
         WHERE task_id = $3 AND user_id = $4 \
         RETURNING {}",
        TASK_COLUMNS
    ))
    .bind(task.completed)
    .bind(task.status)
    .bind(task.task_id)
    .bind(task.user_id)
    .fetch_one(pool.get_ref())
    .await?;

    log::info!(
        "request_id={} task completed task_id={}",
        request_id,
        task.task_id
    );

    Ok(success_response(
        &request_id,
        StatusCode::OK,
        "Task marked as completed",
        task,
    ))
}

/// Delete a task. Answers 204 with an empty body; the correlation id still
/// travels in the X-Request-ID header.
#[delete("/{id}")]
pub async fn delete_task(
    pool: web::Data<PgPool>,
    task_id: web::Path<Uuid>,
    user: CurrentUser,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let request_id = request_id::current(&req);

    let result = sqlx::query("DELETE FROM tasks WHERE task_id = $1 AND user_id = $2")
        .bind(task_id.into_inner())
        .bind(user.0.user_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Task not found".to_string()));
    }

    log::info!("request_id={} task deleted", request_id);
    Ok(HttpResponse::NoContent().finish())
}
