//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::NaiveDate;
use habit_tracker_core::{
    domain::{CoreHabitEntry, Difficulty, Goal, GoalStatus, HabitStatus, WeeklyChecklistHistoryRecord, WeeklyChecklistItem},
    lifecycle::PromotionOutcome,
    ports::{NewGoal, PortError},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_checklist_handler,
        create_checklist_handler,
        set_day_check_handler,
        set_completed_handler,
        promote_handler,
        delete_checklist_handler,
        list_history_handler,
        list_core_habits_handler,
        create_core_habit_handler,
        set_core_habit_status_handler,
        delete_core_habit_handler,
        list_goals_handler,
        create_goal_handler,
        set_goal_status_handler,
        delete_goal_handler,
        generate_from_goal_handler,
    ),
    components(
        schemas(
            ChecklistItemResponse,
            HistoryRecordResponse,
            CoreHabitResponse,
            GoalResponse,
            PromoteResponse,
            GenerateResponse,
            CreateChecklistRequest,
            SetFlagRequest,
            PromoteRequest,
            CreateCoreHabitRequest,
            SetStatusRequest,
            CreateGoalRequest,
        )
    ),
    tags(
        (name = "Habit Tracker API", description = "Weekly checklists, core habits and goals.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct ChecklistItemResponse {
    id: Uuid,
    title: String,
    period_start: NaiveDate,
    period_end: NaiveDate,
    day_checks: Vec<bool>,
    checked_count: u8,
    is_completed: bool,
    promoted_to_core: bool,
}

impl From<WeeklyChecklistItem> for ChecklistItemResponse {
    fn from(item: WeeklyChecklistItem) -> Self {
        Self {
            checked_count: item.checked_count(),
            id: item.id,
            title: item.title,
            period_start: item.period_start,
            period_end: item.period_end,
            day_checks: item.day_checks.to_vec(),
            is_completed: item.is_completed,
            promoted_to_core: item.promoted_to_core,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct HistoryRecordResponse {
    id: Uuid,
    weekly_item_id: Uuid,
    title: String,
    period_start: NaiveDate,
    period_end: NaiveDate,
    checked_count: i16,
    promoted_to_core: bool,
}

impl From<WeeklyChecklistHistoryRecord> for HistoryRecordResponse {
    fn from(record: WeeklyChecklistHistoryRecord) -> Self {
        Self {
            id: record.id,
            weekly_item_id: record.weekly_item_id,
            title: record.title,
            period_start: record.period_start,
            period_end: record.period_end,
            checked_count: record.checked_count,
            promoted_to_core: record.promoted_to_core,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CoreHabitResponse {
    id: Uuid,
    title: String,
    difficulty: String,
    status: String,
    source_weekly_item_id: Option<Uuid>,
}

impl From<CoreHabitEntry> for CoreHabitResponse {
    fn from(entry: CoreHabitEntry) -> Self {
        Self {
            id: entry.id,
            title: entry.title,
            difficulty: entry.difficulty.as_str().to_string(),
            status: entry.status.as_str().to_string(),
            source_weekly_item_id: entry.source_weekly_item_id,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct GoalResponse {
    id: Uuid,
    title: String,
    rationale: String,
    category: Option<String>,
    target: Option<String>,
    status: String,
}

impl From<Goal> for GoalResponse {
    fn from(goal: Goal) -> Self {
        Self {
            id: goal.id,
            title: goal.title,
            rationale: goal.rationale,
            category: goal.category,
            target: goal.target,
            status: goal.status.as_str().to_string(),
        }
    }
}

/// Whether a promotion call created a new core entry or found one already there.
#[derive(Serialize, ToSchema)]
pub struct PromoteResponse {
    promoted: bool,
    entry: Option<CoreHabitResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct GenerateResponse {
    inserted: usize,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateChecklistRequest {
    title: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SetFlagRequest {
    value: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct PromoteRequest {
    /// Optional tier for the new core habit; defaults to "easy".
    difficulty: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateCoreHabitRequest {
    title: String,
    /// Manual creation is only permitted in the "easy" tier.
    difficulty: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct SetStatusRequest {
    status: String,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateGoalRequest {
    title: String,
    rationale: Option<String>,
    category: Option<String>,
    target: Option<String>,
}

//=========================================================================================
// Error Translation
//=========================================================================================

/// Translates a port error into a response once, at the handler boundary.
/// Quota and progress failures keep their human-readable reason; upstream
/// failures are logged and collapsed to a generic body.
fn port_error_response(e: PortError) -> (StatusCode, String) {
    match e {
        PortError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::QuotaExceeded(msg) => (StatusCode::TOO_MANY_REQUESTS, msg),
        PortError::InsufficientProgress(msg) => (StatusCode::CONFLICT, msg),
        PortError::Upstream(msg) => {
            error!("Upstream failure: {}", msg);
            (
                StatusCode::BAD_GATEWAY,
                "An upstream service failed".to_string(),
            )
        }
    }
}

/// Difficulty requested for a promotion. The body is optional; no body (or
/// no difficulty field) leaves the choice to the domain default of "easy".
fn requested_difficulty(
    body: Option<PromoteRequest>,
) -> Result<Option<Difficulty>, (StatusCode, String)> {
    body.and_then(|p| p.difficulty)
        .as_deref()
        .map(parse_difficulty)
        .transpose()
}

fn parse_difficulty(s: &str) -> Result<Difficulty, (StatusCode, String)> {
    match s {
        "easy" => Ok(Difficulty::Easy),
        "normal" => Ok(Difficulty::Normal),
        "hard" => Ok(Difficulty::Hard),
        other => Err((
            StatusCode::BAD_REQUEST,
            format!("'{}' is not a difficulty (easy|normal|hard)", other),
        )),
    }
}

fn parse_habit_status(s: &str) -> Result<HabitStatus, (StatusCode, String)> {
    match s {
        "active" => Ok(HabitStatus::Active),
        "archived" => Ok(HabitStatus::Archived),
        other => Err((
            StatusCode::BAD_REQUEST,
            format!("'{}' is not a status (active|archived)", other),
        )),
    }
}

fn parse_goal_status(s: &str) -> Result<GoalStatus, (StatusCode, String)> {
    match s {
        "active" => Ok(GoalStatus::Active),
        "done" => Ok(GoalStatus::Done),
        other => Err((
            StatusCode::BAD_REQUEST,
            format!("'{}' is not a status (active|done)", other),
        )),
    }
}

//=========================================================================================
// Checklist Handlers
//=========================================================================================

/// List the current weekly checklist. Expired windows are rolled over into
/// history before the list is returned.
#[utoipa::path(
    get,
    path = "/checklist",
    responses(
        (status = 200, description = "The user's checklist items", body = [ChecklistItemResponse]),
        (status = 401, description = "Missing or invalid identity header")
    )
)]
pub async fn list_checklist_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let items = app_state
        .lifecycle
        .list_checklist(user_id)
        .await
        .map_err(port_error_response)?;
    let body: Vec<ChecklistItemResponse> = items.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

/// Create a checklist item in the current Monday-aligned week.
#[utoipa::path(
    post,
    path = "/checklist",
    request_body = CreateChecklistRequest,
    responses(
        (status = 201, description = "Item created", body = ChecklistItemResponse),
        (status = 400, description = "Empty title")
    )
)]
pub async fn create_checklist_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(payload): Json<CreateChecklistRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let item = app_state
        .lifecycle
        .create_checklist_item(user_id, &payload.title)
        .await
        .map_err(port_error_response)?;
    Ok((StatusCode::CREATED, Json(ChecklistItemResponse::from(item))))
}

/// Set one day flag on a checklist item.
#[utoipa::path(
    put,
    path = "/checklist/{id}/days/{day_index}",
    request_body = SetFlagRequest,
    params(
        ("id" = Uuid, Path, description = "Checklist item id"),
        ("day_index" = usize, Path, description = "Day offset from period_start, 0-6")
    ),
    responses(
        (status = 204, description = "Flag updated"),
        (status = 400, description = "Index out of range or checklist completed"),
        (status = 404, description = "No such item for this user")
    )
)]
pub async fn set_day_check_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path((id, day_index)): Path<(Uuid, usize)>,
    Json(payload): Json<SetFlagRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    app_state
        .lifecycle
        .toggle_day_check(user_id, id, day_index, payload.value)
        .await
        .map_err(port_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Toggle the whole-checklist completion flag.
#[utoipa::path(
    put,
    path = "/checklist/{id}/completed",
    request_body = SetFlagRequest,
    params(("id" = Uuid, Path, description = "Checklist item id")),
    responses(
        (status = 204, description = "Flag updated"),
        (status = 404, description = "No such item for this user")
    )
)]
pub async fn set_completed_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetFlagRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    app_state
        .lifecycle
        .toggle_completed(user_id, id, payload.value)
        .await
        .map_err(port_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Promote a checklist item with at least 5 checked days into the core
/// habit list. A second call on an already-promoted item is a no-op.
/// The body is optional; without one the new entry lands in the "easy" tier.
#[utoipa::path(
    post,
    path = "/checklist/{id}/promote",
    request_body(content = PromoteRequest, description = "Optional tier override"),
    params(("id" = Uuid, Path, description = "Checklist item id")),
    responses(
        (status = 200, description = "Promotion result", body = PromoteResponse),
        (status = 409, description = "Fewer than 5 days checked"),
        (status = 404, description = "No such item for this user")
    )
)]
pub async fn promote_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    payload: Option<Json<PromoteRequest>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let difficulty = requested_difficulty(payload.map(|Json(p)| p))?;
    let outcome = app_state
        .lifecycle
        .promote(user_id, id, difficulty)
        .await
        .map_err(port_error_response)?;
    let body = match outcome {
        PromotionOutcome::Promoted(entry) => PromoteResponse {
            promoted: true,
            entry: Some(entry.into()),
        },
        PromotionOutcome::AlreadyPromoted => PromoteResponse {
            promoted: false,
            entry: None,
        },
    };
    Ok(Json(body))
}

/// Delete a checklist item. If it was promoted, the derived core habit
/// entry is removed in the same step.
#[utoipa::path(
    delete,
    path = "/checklist/{id}",
    params(("id" = Uuid, Path, description = "Checklist item id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "No such item for this user")
    )
)]
pub async fn delete_checklist_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    app_state
        .lifecycle
        .delete_checklist_item(user_id, id)
        .await
        .map_err(port_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// List archived checklist windows, newest first.
#[utoipa::path(
    get,
    path = "/history",
    responses(
        (status = 200, description = "Rollover history", body = [HistoryRecordResponse])
    )
)]
pub async fn list_history_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let records = app_state
        .lifecycle
        .list_history(user_id)
        .await
        .map_err(port_error_response)?;
    let body: Vec<HistoryRecordResponse> = records.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

//=========================================================================================
// Core Habit Handlers
//=========================================================================================

/// List core habit entries across all tiers.
#[utoipa::path(
    get,
    path = "/core-habits",
    responses(
        (status = 200, description = "Core habit entries", body = [CoreHabitResponse])
    )
)]
pub async fn list_core_habits_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let entries = app_state
        .lifecycle
        .list_core_habits(user_id)
        .await
        .map_err(port_error_response)?;
    let body: Vec<CoreHabitResponse> = entries.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

/// Manually add a core habit. Only the "easy" tier may be created directly;
/// harder tiers are earned through promotion.
#[utoipa::path(
    post,
    path = "/core-habits",
    request_body = CreateCoreHabitRequest,
    responses(
        (status = 201, description = "Entry created", body = CoreHabitResponse),
        (status = 400, description = "Empty title or non-easy tier")
    )
)]
pub async fn create_core_habit_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(payload): Json<CreateCoreHabitRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let difficulty = match payload.difficulty.as_deref() {
        Some(s) => parse_difficulty(s)?,
        None => Difficulty::Easy,
    };
    let entry = app_state
        .lifecycle
        .create_core_habit(user_id, &payload.title, difficulty)
        .await
        .map_err(port_error_response)?;
    Ok((StatusCode::CREATED, Json(CoreHabitResponse::from(entry))))
}

/// Archive or unarchive a core habit entry.
#[utoipa::path(
    put,
    path = "/core-habits/{id}/status",
    request_body = SetStatusRequest,
    params(("id" = Uuid, Path, description = "Core habit entry id")),
    responses(
        (status = 204, description = "Status updated"),
        (status = 404, description = "No such entry for this user")
    )
)]
pub async fn set_core_habit_status_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetStatusRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let status = parse_habit_status(&payload.status)?;
    app_state
        .lifecycle
        .set_core_habit_status(user_id, id, status)
        .await
        .map_err(port_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a core habit entry. The source checklist item, if any, keeps its
/// promoted flag.
#[utoipa::path(
    delete,
    path = "/core-habits/{id}",
    params(("id" = Uuid, Path, description = "Core habit entry id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "No such entry for this user")
    )
)]
pub async fn delete_core_habit_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    app_state
        .lifecycle
        .delete_core_habit(user_id, id)
        .await
        .map_err(port_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Goal Handlers
//=========================================================================================

/// List the user's goals.
#[utoipa::path(
    get,
    path = "/goals",
    responses(
        (status = 200, description = "Goals", body = [GoalResponse])
    )
)]
pub async fn list_goals_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let goals = app_state
        .lifecycle
        .list_goals(user_id)
        .await
        .map_err(port_error_response)?;
    let body: Vec<GoalResponse> = goals.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

/// Create a goal. At most 3 active goals are allowed per user.
#[utoipa::path(
    post,
    path = "/goals",
    request_body = CreateGoalRequest,
    responses(
        (status = 201, description = "Goal created", body = GoalResponse),
        (status = 429, description = "Active goal cap reached")
    )
)]
pub async fn create_goal_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(payload): Json<CreateGoalRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let goal = app_state
        .lifecycle
        .create_goal(NewGoal {
            user_id,
            title: payload.title,
            rationale: payload.rationale.unwrap_or_default(),
            category: payload.category,
            target: payload.target,
        })
        .await
        .map_err(port_error_response)?;
    Ok((StatusCode::CREATED, Json(GoalResponse::from(goal))))
}

/// Mark a goal active or done.
#[utoipa::path(
    put,
    path = "/goals/{id}/status",
    request_body = SetStatusRequest,
    params(("id" = Uuid, Path, description = "Goal id")),
    responses(
        (status = 204, description = "Status updated"),
        (status = 404, description = "No such goal for this user")
    )
)]
pub async fn set_goal_status_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetStatusRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let status = parse_goal_status(&payload.status)?;
    app_state
        .lifecycle
        .set_goal_status(user_id, id, status)
        .await
        .map_err(port_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a goal.
#[utoipa::path(
    delete,
    path = "/goals/{id}",
    params(("id" = Uuid, Path, description = "Goal id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "No such goal for this user")
    )
)]
pub async fn delete_goal_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    app_state
        .lifecycle
        .delete_goal(user_id, id)
        .await
        .map_err(port_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Generate 2-3 checklist items from a goal via the task LLM. Refused with
/// 429 once the user has created 9 items in the current week; the quota is
/// checked before the LLM is called.
#[utoipa::path(
    post,
    path = "/goals/{id}/generate",
    params(("id" = Uuid, Path, description = "Goal id")),
    responses(
        (status = 201, description = "Items generated", body = GenerateResponse),
        (status = 429, description = "Weekly generation quota reached"),
        (status = 502, description = "Task generator failed or returned unusable output")
    )
)]
pub async fn generate_from_goal_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let inserted = app_state
        .lifecycle
        .generate_from_goal(user_id, id)
        .await
        .map_err(port_error_response)?;
    Ok((StatusCode::CREATED, Json(GenerateResponse { inserted })))
}
