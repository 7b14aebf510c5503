//! Small LLM classifier calls used by the router and gate.
//!
//! Every helper degrades to `None` on transport absence, timeout, or a
//! malformed reply — the router always has a non-LLM path to fall back
//! on. Replies are parsed tolerantly: strict JSON first, then the first
//! balanced `{…}` substring.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use wf_domain::chat::Message;
use wf_domain::route::Intent;
use wf_domain::slots::{self, SlotMap};
use wf_providers::{ChatRequest, LlmTransport, ResponseFormat};

use super::prompts;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tolerant JSON extraction
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse strict JSON, or the first balanced `{…}` block (brace counting
/// that respects string literals and escapes).
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        if v.is_object() {
            return Some(v);
        }
    }

    let start = trimmed.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in trimmed[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &trimmed[start..start + offset + ch.len_utf8()];
                    return serde_json::from_str(candidate).ok();
                }
            }
            _ => {}
        }
    }
    None
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Classifier handle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentAnswer {
    Yes,
    No,
    Unclear,
}

pub struct Classifiers {
    transport: Option<Arc<dyn LlmTransport>>,
    model: String,
    timeout: Duration,
}

impl Classifiers {
    pub fn new(
        transport: Option<Arc<dyn LlmTransport>>,
        model: String,
        timeout_ms: u64,
    ) -> Self {
        Self {
            transport,
            model,
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    /// One bounded JSON call: system prompt + user text → parsed object.
    async fn json_call(&self, system: &str, user: &str) -> Option<Value> {
        let transport = self.transport.as_ref()?;
        let req = ChatRequest {
            messages: vec![Message::system(system), Message::user(user)],
            model: Some(self.model.clone()),
            response_format: ResponseFormat::Json,
            temperature: Some(0.0),
        };
        match tokio::time::timeout(self.timeout, transport.chat(req)).await {
            Ok(Ok(reply)) => extract_json(&reply.content),
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "classifier call failed");
                None
            }
            Err(_) => {
                tracing::debug!("classifier call timed out");
                None
            }
        }
    }

    /// The LLM router: intent + confidence + slot delta.
    pub async fn llm_router(&self, message: &str, prior: &SlotMap) -> Option<(Intent, f64, SlotMap)> {
        let user = if prior.is_empty() {
            message.to_owned()
        } else {
            format!(
                "Known context: {}\nMessage: {message}",
                serde_json::to_string(prior).unwrap_or_default()
            )
        };
        let json = self.json_call(prompts::ROUTER_SYSTEM, &user).await?;

        let intent = Intent::parse(json.get("intent").and_then(Value::as_str)?);
        let confidence = json
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.5)
            .clamp(0.0, 1.0);

        let mut slots = SlotMap::new();
        if let Some(obj) = json.get("slots").and_then(Value::as_object) {
            for (k, v) in obj {
                if let Some(s) = v.as_str() {
                    if !s.trim().is_empty() {
                        slots.insert(k.clone(), s.trim().to_owned());
                    }
                }
            }
        }
        Some((intent, confidence, slots))
    }

    /// Classify the user's reply to a deep-research consent prompt.
    /// Defaults to `Unclear` when the classifier is unavailable.
    pub async fn consent_reply(&self, message: &str) -> ConsentAnswer {
        // Cheap lexical pass first; most replies are one word.
        let lowered = message.trim().to_lowercase();
        if ["yes", "yes please", "sure", "ok", "okay", "go ahead", "do it", "yep"]
            .contains(&lowered.as_str())
        {
            return ConsentAnswer::Yes;
        }
        if ["no", "no thanks", "nope", "skip", "don't", "not now"].contains(&lowered.as_str()) {
            return ConsentAnswer::No;
        }

        match self.json_call(prompts::CONSENT_SYSTEM, message).await {
            Some(json) => match json.get("answer").and_then(Value::as_str) {
                Some("yes") => ConsentAnswer::Yes,
                Some("no") => ConsentAnswer::No,
                _ => ConsentAnswer::Unclear,
            },
            None => ConsentAnswer::Unclear,
        }
    }

    /// True when the classifier is confident the new message is about a
    /// different place than `prev_location`.
    pub async fn context_switched(&self, prev_location: &str, message: &str) -> Option<bool> {
        let user = format!("Previous location: {prev_location}\nNew message: {message}");
        let json = self.json_call(prompts::CONTEXT_SWITCH_SYSTEM, &user).await?;
        json.get("verdict")
            .and_then(Value::as_str)
            .map(|v| v == "different")
    }

    /// The city the message explicitly names, if any.
    pub async fn parse_city(&self, message: &str) -> Option<String> {
        let json = self.json_call(prompts::CITY_PARSE_SYSTEM, message).await?;
        json.get("city")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_owned)
    }

    /// Second-opinion intent classification.
    pub async fn second_intent(&self, message: &str) -> Option<(Intent, f64)> {
        let json = self.json_call(prompts::INTENT_RETRY_SYSTEM, message).await?;
        let intent = Intent::parse(json.get("intent").and_then(Value::as_str)?);
        let confidence = json.get("confidence").and_then(Value::as_f64)?.clamp(0.0, 1.0);
        Some((intent, confidence))
    }

    /// Synthesize a web-search query from the raw message.
    pub async fn optimize_query(&self, message: &str) -> Option<String> {
        let json = self.json_call(prompts::QUERY_OPTIMIZER_SYSTEM, message).await?;
        json.get("query")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_owned)
    }

    /// Flight slot extraction; relative dates come back verbatim.
    pub async fn flight_slots(&self, message: &str) -> SlotMap {
        let mut out = SlotMap::new();
        if let Some(json) = self.json_call(prompts::FLIGHT_SLOTS_SYSTEM, message).await {
            for key in [
                slots::ORIGIN_CITY,
                slots::DESTINATION_CITY,
                slots::DEPARTURE_DATE,
                slots::RETURN_DATE,
            ] {
                if let Some(v) = json.get(key).and_then(Value::as_str) {
                    if !v.trim().is_empty() {
                        out.insert(key.to_owned(), v.trim().to_owned());
                    }
                }
            }
        }
        out
    }

    /// LLM complexity verdict, for when the heuristic is inconclusive.
    pub async fn complexity(&self, message: &str) -> Option<(bool, f64, String)> {
        let json = self.json_call(prompts::COMPLEXITY_SYSTEM, message).await?;
        let is_complex = json.get("isComplex").and_then(Value::as_bool)?;
        let confidence = json
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.5)
            .clamp(0.0, 1.0);
        let reasoning = json
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        Some((is_complex, confidence, reasoning))
    }
}
