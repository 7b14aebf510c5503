//! Chat API endpoints.
//!
//! - `POST /chat`    — run one turn, return the reply (+ citations etc.)
//! - `GET /metrics`  — JSON counter snapshot
//! - `GET /healthz`  — liveness probe
//!
//! Only input validation produces a 400; every downstream failure is a
//! graceful 200 with a fallback reply (the runtime guarantees that).

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use crate::runtime::{run_turn, TurnRequest};
use crate::state::AppState;

/// Maximum user message length, characters.
const MAX_MESSAGE_CHARS: usize = 2_000;
/// Maximum thread ID length.
const MAX_THREAD_ID_CHARS: usize = 64;

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub message: String,
    #[serde(default, rename = "threadId")]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub receipts: bool,
}

fn bad_request(error: &str) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": error })),
    )
        .into_response()
}

/// Schema validation for the request body. Everything here is a 400;
/// nothing past this point can be.
fn validate(body: &ChatBody) -> std::result::Result<(), &'static str> {
    if body.message.trim().is_empty() {
        return Err("message must not be empty");
    }
    if body.message.chars().count() > MAX_MESSAGE_CHARS {
        return Err("message exceeds 2000 characters");
    }
    if let Some(ref thread_id) = body.thread_id {
        if thread_id.chars().count() > MAX_THREAD_ID_CHARS {
            return Err("threadId exceeds 64 characters");
        }
    }
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /chat
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return bad_request(&format!("invalid request body: {rejection}")),
    };

    if let Err(reason) = validate(&body) {
        return bad_request(reason);
    }

    let response = run_turn(
        &state,
        TurnRequest {
            message: body.message,
            thread_id: body.thread_id,
            receipts: body.receipts,
        },
    )
    .await;

    let mut out = serde_json::json!({
        "reply": response.reply,
        "threadId": response.thread_id,
    });
    if !response.citations.is_empty() {
        out["citations"] = serde_json::json!(response.citations);
    }
    if !response.facts.is_empty() {
        out["facts"] = serde_json::json!(response.facts);
    }
    if !response.decisions.is_empty() {
        out["decisions"] = serde_json::json!(response.decisions);
    }
    if let Some(receipts) = response.receipts {
        out["receipts"] = receipts;
    }

    Json(out).into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /metrics, GET /healthz
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

pub async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(message: &str, thread_id: Option<&str>) -> ChatBody {
        ChatBody {
            message: message.into(),
            thread_id: thread_id.map(str::to_owned),
            receipts: false,
        }
    }

    #[test]
    fn empty_message_rejected() {
        assert!(validate(&body("", None)).is_err());
        assert!(validate(&body("   ", None)).is_err());
    }

    #[test]
    fn message_length_boundary() {
        let exactly = "x".repeat(2_000);
        assert!(validate(&body(&exactly, None)).is_ok());

        let over = "x".repeat(2_001);
        assert!(validate(&body(&over, None)).is_err());
    }

    #[test]
    fn thread_id_length_boundary() {
        let exactly = "t".repeat(64);
        assert!(validate(&body("hi", Some(&exactly))).is_ok());

        let over = "t".repeat(65);
        assert!(validate(&body("hi", Some(&over))).is_err());
    }

    #[test]
    fn multibyte_length_counts_chars_not_bytes() {
        // 2000 chars of 'é' is 4000 bytes but still valid.
        let msg = "é".repeat(2_000);
        assert!(validate(&body(&msg, None)).is_ok());
    }
}
