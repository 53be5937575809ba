//! HTTP server implementation.
//!
//! This module provides the axum-based HTTP server that serves the browser
//! client and exposes the task REST API and the insights endpoint.

use axum::{
    Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Json},
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use super::templates;
use crate::db::Database;
use crate::error::{ApiError, ApiResult};
use crate::insights::{InsightsSummary, compute_insights, today};
use crate::types::{
    NewTask, Priority, Task, TaskListQuery, TaskPatch, TaskSort, TaskStatus, parse_date,
};

/// Server state shared across handlers.
#[derive(Clone)]
pub struct DashboardServer {
    /// Reference to the task database.
    db: Arc<Database>,
}

impl DashboardServer {
    /// Create a new server state around an open database.
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Get the database reference.
    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }
}

/// Health check response.
#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

// =============================================================================
// Request parsing
// =============================================================================

/// Treat blank strings the same as absent values (HTML forms send them).
///
/// Applies to enum and date fields of both create and update bodies. The value
/// itself is passed on untouched.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse an optional field, counting blank strings as absent.
fn parse_field<T>(field: &str, value: Option<String>) -> ApiResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    non_empty(value)
        .map(|v| v.parse::<T>().map_err(|e| ApiError::invalid_value(field, e)))
        .transpose()
}

fn parse_date_field(field: &str, value: &str) -> ApiResult<chrono::NaiveDate> {
    parse_date(value).map_err(|e| ApiError::invalid_value(field, format!("invalid {}: {}", field, e)))
}

/// Task ids in paths that are not integers cannot name an existing task.
fn parse_task_id(raw: &str) -> ApiResult<i64> {
    raw.parse().map_err(|_| ApiError::task_not_found(raw))
}

/// Request body for `POST /tasks`.
#[derive(Debug, Default, Deserialize)]
pub struct CreateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
    pub status: Option<String>,
}

impl CreateTaskRequest {
    /// Validate required fields and enum values.
    pub fn validate(self) -> ApiResult<NewTask> {
        let title = non_empty(self.title);
        let due_date = non_empty(self.due_date);

        let (title, due_date) = match (title, due_date) {
            (Some(title), Some(due_date)) => (title, due_date),
            (None, _) => return Err(ApiError::missing_fields("title")),
            (_, None) => return Err(ApiError::missing_fields("due_date")),
        };

        let mut task = NewTask::new(title, parse_date_field("due_date", &due_date)?)
            .with_description(self.description.unwrap_or_default());
        if let Some(priority) = parse_field::<Priority>("priority", self.priority)? {
            task = task.with_priority(priority);
        }
        if let Some(status) = parse_field::<TaskStatus>("status", self.status)? {
            task = task.with_status(status);
        }
        Ok(task)
    }
}

/// Request body for `PATCH /tasks/{id}`. Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
    pub status: Option<String>,
}

impl UpdateTaskRequest {
    /// Validate provided fields. An update naming no field is rejected.
    pub fn validate(self) -> ApiResult<TaskPatch> {
        let title = match self.title {
            Some(title) if title.trim().is_empty() => {
                return Err(ApiError::invalid_value("title", "title must not be empty"));
            }
            title => title,
        };

        let due_date = match non_empty(self.due_date) {
            Some(raw) => Some(parse_date_field("due_date", &raw)?),
            None => None,
        };

        let patch = TaskPatch {
            title,
            description: self.description,
            priority: parse_field::<Priority>("priority", self.priority)?,
            due_date,
            status: parse_field::<TaskStatus>("status", self.status)?,
        };

        if patch.is_empty() {
            return Err(ApiError::no_updatable_fields());
        }
        Ok(patch)
    }
}

/// Query parameters for `GET /tasks`.
#[derive(Debug, Default, Deserialize)]
pub struct TaskListParams {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub sort: Option<String>,
}

impl TaskListParams {
    /// Filters compare against the stored names exactly. A value that names no
    /// stored status or priority cannot match any row, so `None` is returned.
    /// Empty values mean "no filter".
    pub fn into_query(self) -> Option<TaskListQuery> {
        let status = match non_empty(self.status) {
            Some(raw) => Some(TaskStatus::from_canonical(&raw)?),
            None => None,
        };
        let priority = match non_empty(self.priority) {
            Some(raw) => Some(Priority::from_canonical(&raw)?),
            None => None,
        };
        Some(TaskListQuery {
            status,
            priority,
            sort: TaskSort::from_param(self.sort.as_deref()),
        })
    }
}

/// Query parameters for `GET /insights`.
#[derive(Debug, Default, Deserialize)]
pub struct InsightsParams {
    /// Reference date; today (UTC) when absent.
    pub date: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Root endpoint - serves the browser client.
async fn root() -> Html<&'static str> {
    Html(templates::INDEX_TEMPLATE)
}

/// Client script referenced by the index page.
async fn app_js() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        templates::APP_SCRIPT,
    )
}

/// Health check endpoint.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_tasks(
    State(state): State<DashboardServer>,
    Query(params): Query<TaskListParams>,
) -> ApiResult<Json<Vec<Task>>> {
    let Some(query) = params.into_query() else {
        debug!("Filter value matches no stored task");
        return Ok(Json(Vec::new()));
    };
    let tasks = state.db().list_tasks(&query)?;
    Ok(Json(tasks))
}

async fn create_task(
    State(state): State<DashboardServer>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let Json(request) = payload?;
    let task = state.db().create_task(request.validate()?)?;
    info!(task_id = task.id, "Task created");
    Ok((StatusCode::CREATED, Json(task)))
}

async fn get_task(
    State(state): State<DashboardServer>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<Task>> {
    let task_id = parse_task_id(&raw_id)?;
    state
        .db()
        .get_task(task_id)?
        .map(Json)
        .ok_or_else(|| ApiError::task_not_found(task_id))
}

async fn update_task(
    State(state): State<DashboardServer>,
    Path(raw_id): Path<String>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> ApiResult<Json<Task>> {
    let Json(request) = payload?;
    let patch = request.validate()?;
    let task_id = parse_task_id(&raw_id)?;

    state
        .db()
        .update_task(task_id, &patch)?
        .map(Json)
        .ok_or_else(|| ApiError::task_not_found(task_id))
}

async fn delete_task(
    State(state): State<DashboardServer>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let task_id = parse_task_id(&raw_id)?;
    if !state.db().delete_task(task_id)? {
        return Err(ApiError::task_not_found(task_id));
    }
    info!(task_id, "Task deleted");
    Ok(Json(json!({ "success": true })))
}

async fn insights(
    State(state): State<DashboardServer>,
    Query(params): Query<InsightsParams>,
) -> ApiResult<Json<InsightsSummary>> {
    let reference_date = match non_empty(params.date) {
        Some(raw) => parse_date_field("date", &raw)?,
        None => today(),
    };
    let summary = compute_insights(state.db().as_ref(), reference_date)?;
    Ok(Json(summary))
}

/// Build the router with all routes.
pub fn build_router(state: DashboardServer) -> Router {
    // The browser client may be served from another origin during development.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Browser client
        .route("/", get(root))
        .route("/app.js", get(app_js))
        // Task API
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/{task_id}",
            get(get_task).patch(update_task).delete(delete_task),
        )
        .route("/insights", get(insights))
        .route("/api/health", get(health))
        // Add middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server on the given address.
///
/// Returns a oneshot sender that signals graceful shutdown, the address the
/// server is bound to, and the handle of the serving task.
pub async fn start_server(
    db: Arc<Database>,
    addr: SocketAddr,
) -> anyhow::Result<(oneshot::Sender<()>, SocketAddr, JoinHandle<()>)> {
    let app = build_router(DashboardServer::new(db));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    info!("Task tracker listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Server shutting down");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((shutdown_tx, bound_addr, handle))
}
