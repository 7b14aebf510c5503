pub mod chat;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat::chat))
        .route("/metrics", get(chat::metrics))
        .route("/healthz", get(chat::healthz))
}
