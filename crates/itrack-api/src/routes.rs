//! HTTP routes for the itrack REST API

use crate::error::ApiError;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use itrack_core::{
    AssigneeTotal, BulkStatusResult, Comment, ImportSummary, Issue, IssueDetail, IssueUpdate,
    NewComment, NewIssue, ResolutionLatency, Timeline, Tracker, User, labels::IssueLabels,
};
use serde::Deserialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state
pub struct AppState {
    tracker: Mutex<Tracker>,
    max_upload_bytes: usize,
}

impl AppState {
    pub fn new(tracker: Tracker, max_upload_bytes: usize) -> Self {
        Self {
            tracker: Mutex::new(tracker),
            max_upload_bytes,
        }
    }

    fn tracker(&self) -> Result<MutexGuard<'_, Tracker>, ApiError> {
        self.tracker
            .lock()
            .map_err(|_| ApiError::internal("tracker lock poisoned"))
    }
}

#[derive(Debug, Deserialize)]
struct CreateUserRequest {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplaceLabelsRequest {
    labels: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BulkStatusRequest {
    issue_ids: Vec<i64>,
    status: String,
}

/// Build the router over `state`
pub fn router(state: Arc<AppState>) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route("/health", get(health))
        .route("/users", get(list_users).post(create_user))
        .route("/issues", get(list_issues).post(create_issue))
        .route("/issues/bulk-status", post(bulk_update_status))
        .route("/issues/import", post(import_issues).layer(upload_limit))
        .route("/issues/{id}", get(get_issue).patch(update_issue))
        .route("/issues/{id}/timeline", get(issue_timeline))
        .route("/issues/{id}/labels", put(replace_labels))
        .route("/issues/{id}/comments", post(add_comment))
        .route("/reports/top-assignees", get(top_assignees))
        .route("/reports/latency", get(resolution_latency))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<User> {
    Ok(Json(state.tracker()?.create_user(&req.name)?))
}

async fn list_users(State(state): State<Arc<AppState>>) -> ApiResult<Vec<User>> {
    Ok(Json(state.tracker()?.list_users()?))
}

async fn create_issue(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewIssue>,
) -> ApiResult<Issue> {
    Ok(Json(state.tracker()?.create_issue(&req)?))
}

/// List issues, optionally filtered by `?status=`
async fn list_issues(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Issue>> {
    Ok(Json(state.tracker()?.list_issues(query.status.as_deref())?))
}

async fn get_issue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<IssueDetail> {
    Ok(Json(state.tracker()?.get_issue(id)?))
}

/// Apply a version-checked partial update
async fn update_issue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<IssueUpdate>,
) -> ApiResult<Issue> {
    Ok(Json(state.tracker()?.update_issue(id, &req)?))
}

async fn issue_timeline(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Timeline> {
    Ok(Json(state.tracker()?.timeline(id)?))
}

/// Replace the full label set of an issue
async fn replace_labels(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<ReplaceLabelsRequest>,
) -> ApiResult<IssueLabels> {
    Ok(Json(state.tracker()?.replace_labels(id, &req.labels)?))
}

/// All-or-nothing status change across several issues
///
/// Unknown ids are a bad request here rather than a 404.
async fn bulk_update_status(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BulkStatusRequest>,
) -> ApiResult<BulkStatusResult> {
    let result = state
        .tracker()?
        .bulk_update_status(&req.issue_ids, &req.status)
        .map_err(|e| {
            let err = ApiError::from(e);
            if err.status == StatusCode::NOT_FOUND {
                err.with_status(StatusCode::BAD_REQUEST)
            } else {
                err
            }
        })?;
    Ok(Json(result))
}

async fn add_comment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<NewComment>,
) -> ApiResult<Comment> {
    Ok(Json(state.tracker()?.add_comment(id, &req)?))
}

/// Import issues from the multipart field `file`, which must be a `.csv`
async fn import_issues(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<ImportSummary> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), "multipart", e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_ascii_lowercase();
        if !file_name.ends_with(".csv") {
            return Err(ApiError::bad_request("validation", "Only CSV files are allowed"));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::new(e.status(), "multipart", e.body_text()))?;
        upload = Some(bytes);
        break;
    }

    let bytes = upload
        .ok_or_else(|| ApiError::bad_request("validation", "missing multipart field 'file'"))?;
    tracing::info!(bytes = bytes.len(), "importing CSV upload");
    Ok(Json(state.tracker()?.import_csv(bytes.as_ref())?))
}

async fn top_assignees(State(state): State<Arc<AppState>>) -> ApiResult<Vec<AssigneeTotal>> {
    Ok(Json(state.tracker()?.top_assignees()?))
}

async fn resolution_latency(
    State(state): State<Arc<AppState>>,
) -> ApiResult<ResolutionLatency> {
    Ok(Json(state.tracker()?.resolution_latency()?))
}
