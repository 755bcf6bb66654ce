use std::sync::Arc;

use axum::{
    http::StatusCode,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub mod access;
pub mod handlers;
pub mod search;

/// Build the API router.
/// All routes are relative — the caller mounts this under `/api/v1`.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/goals",
            get(handlers::list_goals).post(handlers::create_goal),
        )
        .route(
            "/goals/:id",
            get(handlers::get_goal)
                .patch(handlers::update_goal)
                .delete(handlers::delete_goal),
        )
        .route(
            "/goals/:id/motivations",
            get(handlers::list_motivations).post(handlers::create_motivation),
        )
        .route(
            "/motivations/:id",
            patch(handlers::update_motivation).delete(handlers::delete_motivation),
        )
        // QR / one-time access boundary
        .route(
            "/goals/:id/access-tokens",
            get(access::list_goal_tokens).post(access::issue_token),
        )
        .route("/goals/:id/qrcode", get(access::goal_qrcode))
        .route("/goals/:id/qrcode/permanent", get(access::permanent_qrcode))
        .route("/goals/:id/unlock", post(access::unlock_goal))
        .route("/access", get(access::view_goal))
        .route("/access-tokens/:token_id", delete(access::revoke_token))
        // Live search
        .route("/search/ws", get(search::ws_search))
        .layer(TraceLayer::new_for_http())
        .fallback(fallback_404)
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}
