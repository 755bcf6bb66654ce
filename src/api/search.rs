//! Live goal search over a WebSocket.
//!
//! Each text frame is a standalone query: `{"query", "page", "page_size"}`.
//! The reply is always a JSON array; protocol errors answer with an empty
//! one rather than closing the connection.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use serde::Deserialize;

use crate::AppState;

#[derive(Deserialize)]
struct SearchRequest {
    #[serde(default)]
    query: String,
    #[serde(default = "default_page")]
    page: i64,
    #[serde(default = "default_page_size")]
    page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    3
}

/// GET /api/v1/search/ws
pub async fn ws_search(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_search(socket, state))
}

async fn handle_search(mut socket: WebSocket, state: Arc<AppState>) {
    while let Some(Ok(msg)) = socket.recv().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let reply = run_search(&state, &text).await;
        if socket.send(Message::Text(reply)).await.is_err() {
            break;
        }
    }
    tracing::debug!("search socket closed");
}

async fn run_search(state: &AppState, frame: &str) -> String {
    let Ok(req) = serde_json::from_str::<SearchRequest>(frame) else {
        return "[]".to_string();
    };
    if req.query.trim().is_empty() {
        return "[]".to_string();
    }

    let page = req.page.max(1);
    let page_size = req.page_size.clamp(1, 50);
    let offset = (page - 1) * page_size;

    match state.db.search_goals(req.query.trim(), page_size, offset).await {
        Ok(goals) => serde_json::to_string(&goals).unwrap_or_else(|_| "[]".to_string()),
        Err(e) => {
            tracing::error!("goal search failed: {}", e);
            "[]".to_string()
        }
    }
}
