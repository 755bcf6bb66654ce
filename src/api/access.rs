//! The QR access boundary: token issuance, QR images, the secret-gated
//! permanent flow, and token-gated goal views.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderName, StatusCode},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::AppError;
use crate::models::AccessToken;
use crate::{qr, secret, AppState};

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Deserialize)]
pub struct IssueTokenRequest {
    pub ttl_secs: Option<i64>,
}

#[derive(Serialize)]
pub struct IssueTokenResponse {
    pub token_id: String,
    pub goal_id: i64,
    pub expires_at: Option<DateTime<Utc>>,
    /// The URL a QR code for this token would encode.
    pub access_url: String,
}

#[derive(Deserialize)]
pub struct QrParams {
    pub ttl_secs: Option<i64>,
}

#[derive(Deserialize)]
pub struct UnlockRequest {
    pub secret: String,
}

#[derive(Deserialize)]
pub struct AccessParams {
    pub token: String,
}

// ── Handlers ─────────────────────────────────────────────────

/// POST /api/v1/goals/:id/access-tokens — issue a one-time token
pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    Path(goal_id): Path<i64>,
    payload: Option<Json<IssueTokenRequest>>,
) -> Result<(StatusCode, Json<IssueTokenResponse>), AppError> {
    let requested = payload.and_then(|Json(p)| p.ttl_secs);
    let token = state
        .access
        .generate(goal_id, effective_ttl(requested, &state))
        .await?;

    let access_url = access_url(&state, &token.token_id);
    Ok((
        StatusCode::CREATED,
        Json(IssueTokenResponse {
            token_id: token.token_id,
            goal_id: token.goal_id,
            expires_at: token.expires_at,
            access_url,
        }),
    ))
}

/// GET /api/v1/goals/:id/qrcode — issue a token and render it as a QR PNG
pub async fn goal_qrcode(
    State(state): State<Arc<AppState>>,
    Path(goal_id): Path<i64>,
    Query(params): Query<QrParams>,
) -> Result<([(HeaderName, String); 2], Vec<u8>), AppError> {
    let token = state
        .access
        .generate(goal_id, effective_ttl(params.ttl_secs, &state))
        .await?;

    let png = qr::render_png(&access_url(&state, &token.token_id))?;
    Ok((
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=qrcode.png".to_string(),
            ),
        ],
        png,
    ))
}

/// GET /api/v1/goals/:id/qrcode/permanent — rotate the goal's access
/// secret and render the unlock link as a QR PNG. The plaintext secret
/// travels once, in the X-Goal-Secret header.
pub async fn permanent_qrcode(
    State(state): State<Arc<AppState>>,
    Path(goal_id): Path<i64>,
) -> Result<([(HeaderName, String); 3], Vec<u8>), AppError> {
    let goal_secret = secret::generate_secret();
    if !state
        .db
        .set_goal_secret_hash(goal_id, &secret::digest(&goal_secret))
        .await?
    {
        return Err(AppError::GoalNotFound);
    }

    let unlock_url = format!(
        "{}/unlock?goal_id={}",
        state.config.frontend_url.trim_end_matches('/'),
        goal_id
    );
    let png = qr::render_png(&unlock_url)?;

    tracing::info!(goal_id, "rotated goal access secret");
    Ok((
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=permanent_qrcode.png".to_string(),
            ),
            (HeaderName::from_static("x-goal-secret"), goal_secret),
        ],
        png,
    ))
}

/// POST /api/v1/goals/:id/unlock — trade the goal secret for a
/// short-lived one-time token
pub async fn unlock_goal(
    State(state): State<Arc<AppState>>,
    Path(goal_id): Path<i64>,
    Json(payload): Json<UnlockRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let goal = state
        .db
        .fetch_goal(goal_id)
        .await?
        .ok_or(AppError::GoalNotFound)?;

    let stored = goal.access_secret_hash.ok_or(AppError::InvalidSecret)?;
    if !secret::verify_secret(&payload.secret, &stored) {
        tracing::warn!(goal_id, "rejected unlock attempt with bad secret");
        return Err(AppError::InvalidSecret);
    }

    let ttl = Duration::seconds(state.config.unlock_token_ttl_secs);
    let token = state.access.generate(goal_id, Some(ttl)).await?;

    Ok(Json(json!({
        "token": token.token_id,
        "goal_id": token.goal_id,
        "expires_at": token.expires_at,
    })))
}

/// GET /api/v1/access?token= — redeem a token and view the goal
pub async fn view_goal(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AccessParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let goal_id = state.access.verify(&params.token).await?;

    let goal = state
        .db
        .fetch_goal(goal_id)
        .await?
        .ok_or(AppError::GoalNotFound)?;
    let motivations = state.db.list_motivations(goal_id).await?;

    Ok(Json(json!({
        "goal_id": goal.id,
        "goal_details": {
            "name": goal.name,
            "description": goal.description,
            "motivations": motivations
                .iter()
                .map(|m| json!({ "id": m.id, "quote": m.quote, "link": m.link }))
                .collect::<Vec<_>>(),
        },
    })))
}

/// DELETE /api/v1/access-tokens/:token_id — owner-initiated revocation
pub async fn revoke_token(
    State(state): State<Arc<AppState>>,
    Path(token_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.access.revoke(&token_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/goals/:id/access-tokens — administrative listing
pub async fn list_goal_tokens(
    State(state): State<Arc<AppState>>,
    Path(goal_id): Path<i64>,
) -> Result<Json<Vec<AccessToken>>, AppError> {
    let tokens = state.access.list_for_goal(goal_id).await?;
    Ok(Json(tokens))
}

/// Ttl precedence: explicit request beats the configured default; a
/// configured default of 0 means no time expiry at all.
fn effective_ttl(requested: Option<i64>, state: &AppState) -> Option<Duration> {
    match requested {
        Some(secs) => Some(Duration::seconds(secs)),
        None if state.config.default_token_ttl_secs > 0 => {
            Some(Duration::seconds(state.config.default_token_ttl_secs))
        }
        None => None,
    }
}

fn access_url(state: &AppState, token_id: &str) -> String {
    format!(
        "{}/access?token={}",
        state.config.frontend_url.trim_end_matches('/'),
        token_id
    )
}
