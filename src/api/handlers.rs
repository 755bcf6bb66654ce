use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::AppError;
use crate::models::{Goal, Motivation};
use crate::AppState;

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Deserialize)]
pub struct CreateGoalRequest {
    pub name: String,
    pub description: String,
}

#[derive(Serialize)]
pub struct CreateGoalResponse {
    pub message: String,
    pub goal_id: i64,
}

#[derive(Deserialize)]
pub struct UpdateGoalRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Deserialize)]
pub struct MotivationRequest {
    pub quote: Option<String>,
    pub link: Option<String>,
}

// ── Goal handlers ────────────────────────────────────────────

/// POST /api/v1/goals — create a new goal
pub async fn create_goal(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateGoalRequest>,
) -> Result<(StatusCode, Json<CreateGoalResponse>), AppError> {
    if payload.name.trim().is_empty() || payload.description.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "goal name and description are required".into(),
        ));
    }
    if payload.name.len() > 80 {
        return Err(AppError::InvalidInput(
            "goal name must be at most 80 characters".into(),
        ));
    }

    let goal = state
        .db
        .create_goal(payload.name.trim(), payload.description.trim())
        .await?;

    tracing::info!(goal_id = goal.id, "goal created");
    Ok((
        StatusCode::CREATED,
        Json(CreateGoalResponse {
            message: "goal created successfully".into(),
            goal_id: goal.id,
        }),
    ))
}

/// GET /api/v1/goals — list goals, newest first
pub async fn list_goals(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Vec<Goal>>, AppError> {
    let limit = params.limit.unwrap_or(10).clamp(1, 100);
    let offset = params.offset.unwrap_or(0).max(0);
    let goals = state.db.list_goals(limit, offset).await?;
    Ok(Json(goals))
}

/// GET /api/v1/goals/:id
pub async fn get_goal(
    State(state): State<Arc<AppState>>,
    Path(goal_id): Path<i64>,
) -> Result<Json<Goal>, AppError> {
    let goal = state
        .db
        .fetch_goal(goal_id)
        .await?
        .ok_or(AppError::GoalNotFound)?;
    Ok(Json(goal))
}

/// PATCH /api/v1/goals/:id — partial update
pub async fn update_goal(
    State(state): State<Arc<AppState>>,
    Path(goal_id): Path<i64>,
    Json(payload): Json<UpdateGoalRequest>,
) -> Result<Json<Goal>, AppError> {
    if payload.name.is_none() && payload.description.is_none() {
        return Err(AppError::InvalidInput("nothing to update".into()));
    }
    for field in [&payload.name, &payload.description] {
        if matches!(field, Some(v) if v.trim().is_empty()) {
            return Err(AppError::InvalidInput(
                "goal name and description cannot be blank".into(),
            ));
        }
    }
    if matches!(&payload.name, Some(n) if n.len() > 80) {
        return Err(AppError::InvalidInput(
            "goal name must be at most 80 characters".into(),
        ));
    }

    let goal = state
        .db
        .update_goal(goal_id, payload.name.as_deref(), payload.description.as_deref())
        .await?
        .ok_or(AppError::GoalNotFound)?;
    Ok(Json(goal))
}

/// DELETE /api/v1/goals/:id — cascades motivations and access tokens
pub async fn delete_goal(
    State(state): State<Arc<AppState>>,
    Path(goal_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !state.db.delete_goal(goal_id).await? {
        return Err(AppError::GoalNotFound);
    }
    tracing::info!(goal_id, "goal deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ── Motivation handlers ──────────────────────────────────────

/// POST /api/v1/goals/:id/motivations
pub async fn create_motivation(
    State(state): State<Arc<AppState>>,
    Path(goal_id): Path<i64>,
    Json(payload): Json<MotivationRequest>,
) -> Result<(StatusCode, Json<Motivation>), AppError> {
    validate_motivation(&payload, true)?;
    if state.db.fetch_goal(goal_id).await?.is_none() {
        return Err(AppError::GoalNotFound);
    }

    let motivation = state
        .db
        .insert_motivation(goal_id, payload.quote.as_deref(), payload.link.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(motivation)))
}

/// GET /api/v1/goals/:id/motivations
pub async fn list_motivations(
    State(state): State<Arc<AppState>>,
    Path(goal_id): Path<i64>,
) -> Result<Json<Vec<Motivation>>, AppError> {
    if state.db.fetch_goal(goal_id).await?.is_none() {
        return Err(AppError::GoalNotFound);
    }
    let motivations = state.db.list_motivations(goal_id).await?;
    Ok(Json(motivations))
}

/// PATCH /api/v1/motivations/:id
pub async fn update_motivation(
    State(state): State<Arc<AppState>>,
    Path(motivation_id): Path<i64>,
    Json(payload): Json<MotivationRequest>,
) -> Result<Json<Motivation>, AppError> {
    validate_motivation(&payload, false)?;
    let motivation = state
        .db
        .update_motivation(motivation_id, payload.quote.as_deref(), payload.link.as_deref())
        .await?
        .ok_or(AppError::MotivationNotFound)?;
    Ok(Json(motivation))
}

/// DELETE /api/v1/motivations/:id
pub async fn delete_motivation(
    State(state): State<Arc<AppState>>,
    Path(motivation_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !state.db.delete_motivation(motivation_id).await? {
        return Err(AppError::MotivationNotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

fn validate_motivation(payload: &MotivationRequest, require_content: bool) -> Result<(), AppError> {
    if require_content && payload.quote.is_none() && payload.link.is_none() {
        return Err(AppError::InvalidInput(
            "a motivation needs a quote or a link".into(),
        ));
    }
    if matches!(&payload.quote, Some(q) if q.len() > 500) {
        return Err(AppError::InvalidInput(
            "quote must be at most 500 characters".into(),
        ));
    }
    if let Some(link) = &payload.link {
        let parsed = url::Url::parse(link)
            .map_err(|_| AppError::InvalidInput(format!("invalid link: {}", link)))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(AppError::InvalidInput(
                "links must use http or https".into(),
            ));
        }
    }
    Ok(())
}

// Kept for parity with the original API, which exposed a JSON health body.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "message": "Healthy" }))
}
