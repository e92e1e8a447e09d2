//! JSON HTTP routes for teams, users, pull requests and statistics.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::AppError;
use crate::models::{
    AssignmentStats, BulkDeactivateResult, PullRequest, PullRequestShort, Team, TeamMember, User,
};
use crate::services::pull_requests::PullRequestManager;

/// Shared state for the API routes.
#[derive(Clone)]
pub struct ApiState {
    pub manager: Arc<PullRequestManager>,
}

// ── Error handling ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    code: String,
    message: String,
}

#[derive(Serialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

/// Error response wrapper for handlers.
enum ApiErr {
    App(AppError),
    MissingParam(&'static str),
    BadJson(String),
    Timeout,
}

impl ApiErr {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiErr::MissingParam(_) => (StatusCode::BAD_REQUEST, "MISSING_PARAM"),
            ApiErr::BadJson(_) => (StatusCode::BAD_REQUEST, "INVALID_PAYLOAD"),
            ApiErr::Timeout => (StatusCode::REQUEST_TIMEOUT, "TIMEOUT"),
            ApiErr::App(err) => match err {
                AppError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                AppError::InvalidPayload { .. } => (StatusCode::BAD_REQUEST, "INVALID_PAYLOAD"),
                AppError::AlreadyExists { resource, .. } if resource == "Team" => {
                    (StatusCode::CONFLICT, "TEAM_EXISTS")
                }
                AppError::AlreadyExists { .. } => (StatusCode::CONFLICT, "PR_EXISTS"),
                AppError::PrMerged { .. } => (StatusCode::CONFLICT, "PR_MERGED"),
                AppError::NotAssigned { .. } => (StatusCode::CONFLICT, "NOT_ASSIGNED"),
                AppError::NoCandidate { .. } => (StatusCode::CONFLICT, "NO_CANDIDATE"),
                AppError::Store { .. } | AppError::NotConfigured { .. } | AppError::Internal { .. } => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                }
            },
        }
    }

    fn message(&self) -> String {
        match self {
            ApiErr::App(err) => err.to_string(),
            ApiErr::MissingParam(name) => format!("missing required parameter: {}", name),
            ApiErr::BadJson(msg) => msg.clone(),
            ApiErr::Timeout => "request timed out".to_string(),
        }
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("[server] Request failed: {}", self.message());
        }
        (
            status,
            Json(ApiErrorEnvelope {
                error: ApiErrorBody {
                    code: code.to_string(),
                    message: self.message(),
                },
            }),
        )
            .into_response()
    }
}

impl From<AppError> for ApiErr {
    fn from(err: AppError) -> Self {
        Self::App(err)
    }
}

impl From<JsonRejection> for ApiErr {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadJson(rejection.body_text())
    }
}

/// Error envelope for a request cut off by the timeout layer.
pub(crate) fn request_timeout_response() -> Response {
    ApiErr::Timeout.into_response()
}

/// Required string parameter: present and not blank.
fn required(value: Option<String>, name: &'static str) -> Result<String, ApiErr> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiErr::MissingParam(name)),
    }
}

// ── Request / response types ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct AddTeamBody {
    team_name: Option<String>,
    members: Option<Vec<TeamMember>>,
}

#[derive(Deserialize)]
struct TeamQuery {
    team_name: Option<String>,
}

#[derive(Deserialize)]
struct DeactivateUsersBody {
    team_name: Option<String>,
    user_ids: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct SetIsActiveBody {
    user_id: Option<String>,
    is_active: Option<bool>,
}

#[derive(Deserialize)]
struct UserQuery {
    user_id: Option<String>,
}

#[derive(Deserialize)]
struct CreatePrBody {
    pull_request_id: Option<String>,
    pull_request_name: Option<String>,
    author_id: Option<String>,
}

#[derive(Deserialize)]
struct MergePrBody {
    pull_request_id: Option<String>,
}

#[derive(Deserialize)]
struct ReassignPrBody {
    pull_request_id: Option<String>,
    old_user_id: Option<String>,
}

#[derive(Serialize)]
struct TeamResponse {
    team: Team,
}

#[derive(Serialize)]
struct UserResponse {
    user: User,
}

#[derive(Serialize)]
struct PrResponse {
    pr: PullRequest,
}

#[derive(Serialize)]
struct ReassignResponse {
    pr: PullRequest,
    replaced_by: String,
}

#[derive(Serialize)]
struct DeactivateResponse {
    result: BulkDeactivateResult,
}

#[derive(Serialize)]
struct ReviewListResponse {
    user_id: String,
    pull_requests: Vec<PullRequestShort>,
}

// ── Route builder ────────────────────────────────────────────────────────────

/// Build the API routes.
pub fn api_routes() -> Router<ApiState> {
    Router::new()
        .route("/health", get(health))
        .route("/team/add", post(add_team))
        .route("/team/get", get(get_team))
        .route("/team/deactivateUsers", post(deactivate_users))
        .route("/users/setIsActive", post(set_is_active))
        .route("/users/getReview", get(get_review))
        .route("/pullRequest/create", post(create_pr))
        .route("/pullRequest/merge", post(merge_pr))
        .route("/pullRequest/reassign", post(reassign_pr))
        .route("/stats/assignments", get(assignment_stats))
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /health
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// POST /team/add: create a team with its members.
async fn add_team(
    State(state): State<ApiState>,
    body: Result<Json<AddTeamBody>, JsonRejection>,
) -> Result<(StatusCode, Json<TeamResponse>), ApiErr> {
    let Json(body) = body?;
    let team_name = required(body.team_name, "team_name")?;
    let members = body.members.ok_or(ApiErr::MissingParam("members"))?;

    let team = state
        .manager
        .directory()
        .add_team(&Team { team_name, members })
        .await?;

    Ok((StatusCode::CREATED, Json(TeamResponse { team })))
}

/// GET /team/get?team_name=X
async fn get_team(
    State(state): State<ApiState>,
    Query(query): Query<TeamQuery>,
) -> Result<Json<Team>, ApiErr> {
    let team_name = required(query.team_name, "team_name")?;
    let team = state.manager.directory().get_team(&team_name).await?;
    Ok(Json(team))
}

/// POST /team/deactivateUsers: deactivate members and reassign their reviews.
async fn deactivate_users(
    State(state): State<ApiState>,
    body: Result<Json<DeactivateUsersBody>, JsonRejection>,
) -> Result<Json<DeactivateResponse>, ApiErr> {
    let Json(body) = body?;
    let team_name = required(body.team_name, "team_name")?;
    let user_ids = body.user_ids.ok_or(ApiErr::MissingParam("user_ids"))?;

    let result = state.manager.bulk_deactivate(&team_name, &user_ids).await?;
    Ok(Json(DeactivateResponse { result }))
}

/// POST /users/setIsActive
async fn set_is_active(
    State(state): State<ApiState>,
    body: Result<Json<SetIsActiveBody>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiErr> {
    let Json(body) = body?;
    let user_id = required(body.user_id, "user_id")?;
    let is_active = body.is_active.ok_or(ApiErr::MissingParam("is_active"))?;

    let user = state
        .manager
        .directory()
        .set_user_activity_durable(&user_id, is_active)
        .await?;
    Ok(Json(UserResponse { user }))
}

/// GET /users/getReview?user_id=X: pull requests the user reviews.
async fn get_review(
    State(state): State<ApiState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ReviewListResponse>, ApiErr> {
    let user_id = required(query.user_id, "user_id")?;
    let pull_requests = state.manager.list_for_reviewer(&user_id).await?;
    Ok(Json(ReviewListResponse {
        user_id,
        pull_requests,
    }))
}

/// POST /pullRequest/create
async fn create_pr(
    State(state): State<ApiState>,
    body: Result<Json<CreatePrBody>, JsonRejection>,
) -> Result<(StatusCode, Json<PrResponse>), ApiErr> {
    let Json(body) = body?;
    let pull_request_id = required(body.pull_request_id, "pull_request_id")?;
    let pull_request_name = required(body.pull_request_name, "pull_request_name")?;
    let author_id = required(body.author_id, "author_id")?;

    let pr = state
        .manager
        .create(&author_id, &pull_request_name, &pull_request_id)
        .await?;
    Ok((StatusCode::CREATED, Json(PrResponse { pr })))
}

/// POST /pullRequest/merge
async fn merge_pr(
    State(state): State<ApiState>,
    body: Result<Json<MergePrBody>, JsonRejection>,
) -> Result<Json<PrResponse>, ApiErr> {
    let Json(body) = body?;
    let pull_request_id = required(body.pull_request_id, "pull_request_id")?;

    let pr = state.manager.merge(&pull_request_id).await?;
    Ok(Json(PrResponse { pr }))
}

/// POST /pullRequest/reassign
async fn reassign_pr(
    State(state): State<ApiState>,
    body: Result<Json<ReassignPrBody>, JsonRejection>,
) -> Result<Json<ReassignResponse>, ApiErr> {
    let Json(body) = body?;
    let pull_request_id = required(body.pull_request_id, "pull_request_id")?;
    let old_user_id = required(body.old_user_id, "old_user_id")?;

    let result = state
        .manager
        .reassign(&pull_request_id, &old_user_id)
        .await?;
    Ok(Json(ReassignResponse {
        pr: result.pr,
        replaced_by: result.replaced_by,
    }))
}

/// GET /stats/assignments
async fn assignment_stats(State(state): State<ApiState>) -> Result<Json<AssignmentStats>, ApiErr> {
    let stats = state.manager.assignment_stats().await?;
    Ok(Json(stats))
}
