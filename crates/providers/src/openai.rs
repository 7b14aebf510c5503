//! OpenAI-compatible adapter.
//!
//! Works with OpenAI, Azure-style gateways, Ollama, vLLM, and any other
//! endpoint that follows the chat-completions contract. Non-streaming
//! only; the runtime consumes completed messages.

use serde_json::Value;

use wf_domain::chat::{Message, Role, ToolCall, ToolDefinition};
use wf_domain::config::LlmConfig;
use wf_domain::{Error, Result};

use crate::traits::{
    ChatReply, ChatRequest, LlmTransport, ResponseFormat, ToolChatReply, ToolChatRequest,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct OpenAiCompatTransport {
    id: String,
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    default_model: String,
}

impl OpenAiCompatTransport {
    pub fn new(base_url: &str, cfg: &LlmConfig) -> Result<Self> {
        // The outer per-call timeout is the real bound; this is a net
        // against a wedged connection surviving past the turn.
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| Error::Http(format!("building LLM client: {e}")))?;

        Ok(Self {
            id: "openai-compat".into(),
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: cfg.api_key.clone(),
            default_model: cfg.model.clone(),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    async fn post_completions(&self, body: Value) -> Result<Value> {
        let mut rb = self
            .client
            .post(self.completions_url())
            .header("Content-Type", "application/json");
        if let Some(ref key) = self.api_key {
            rb = rb.header("Authorization", format!("Bearer {key}"));
        }

        let resp = rb.json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(format!("LLM request: {e}"))
            } else {
                Error::Http(format!("LLM request: {e}"))
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("HTTP {status}: {text}"),
            });
        }

        resp.json().await.map_err(|e| Error::Provider {
            provider: self.id.clone(),
            message: format!("unparseable response body: {e}"),
        })
    }
}

#[async_trait::async_trait]
impl LlmTransport for OpenAiCompatTransport {
    async fn chat(&self, req: ChatRequest) -> Result<ChatReply> {
        let model = req.model.as_deref().unwrap_or(&self.default_model);
        let body = build_chat_body(&req.messages, &[], model, req.response_format, req.temperature);
        let json = self.post_completions(body).await?;
        let reply = parse_reply(&json)?;
        Ok(ChatReply {
            content: reply.content.unwrap_or_default(),
        })
    }

    async fn chat_with_tools(&self, req: ToolChatRequest) -> Result<ToolChatReply> {
        let model = req.model.as_deref().unwrap_or(&self.default_model);
        let body = build_chat_body(
            &req.messages,
            &req.tools,
            model,
            ResponseFormat::Text,
            req.temperature,
        );
        let json = self.post_completions(body).await?;
        parse_reply(&json)
    }

    fn transport_id(&self) -> &str {
        &self.id
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire conversion (pure, tested)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn msg_to_wire(msg: &Message) -> Value {
    let mut obj = serde_json::json!({
        "role": role_to_str(msg.role),
        "content": msg.content,
    });
    if msg.role == Role::Tool {
        if let Some(ref name) = msg.name {
            obj["name"] = Value::String(name.clone());
        }
        if let Some(ref id) = msg.tool_call_id {
            obj["tool_call_id"] = Value::String(id.clone());
        }
    }
    if let Some(ref calls) = msg.tool_calls {
        obj["tool_calls"] = Value::Array(
            calls
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "id": c.call_id,
                        "type": "function",
                        "function": { "name": c.tool_name, "arguments": c.arguments }
                    })
                })
                .collect(),
        );
        if msg.content.is_empty() {
            obj["content"] = Value::Null;
        }
    }
    obj
}

fn tool_to_wire(def: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": def.name,
            "description": def.description,
            "parameters": def.parameters,
        }
    })
}

fn build_chat_body(
    messages: &[Message],
    tools: &[ToolDefinition],
    model: &str,
    format: ResponseFormat,
    temperature: Option<f32>,
) -> Value {
    let wire_messages: Vec<Value> = messages.iter().map(msg_to_wire).collect();

    let mut body = serde_json::json!({
        "model": model,
        "messages": wire_messages,
    });
    if !tools.is_empty() {
        body["tools"] = Value::Array(tools.iter().map(tool_to_wire).collect());
    }
    if format == ResponseFormat::Json {
        body["response_format"] = serde_json::json!({"type": "json_object"});
    }
    if let Some(t) = temperature {
        body["temperature"] = serde_json::json!(t);
    }
    body
}

/// Extract `choices[0].message` into a [`ToolChatReply`].
fn parse_reply(json: &Value) -> Result<ToolChatReply> {
    let choice = json
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| Error::Provider {
            provider: "openai-compat".into(),
            message: "response has no choices".into(),
        })?;

    let message = match choice.get("message") {
        Some(m) => m,
        None => return Ok(ToolChatReply::default()),
    };

    let content = message
        .get("content")
        .and_then(|c| c.as_str())
        .map(str::to_owned);

    let mut tool_calls = Vec::new();
    if let Some(calls) = message.get("tool_calls").and_then(|t| t.as_array()) {
        for call in calls {
            let call_id = call.get("id").and_then(|v| v.as_str()).unwrap_or_default();
            let function = match call.get("function") {
                Some(f) => f,
                None => continue,
            };
            let name = function.get("name").and_then(|v| v.as_str()).unwrap_or_default();
            if name.is_empty() {
                continue;
            }
            let arguments = function
                .get("arguments")
                .and_then(|v| v.as_str())
                .unwrap_or("{}")
                .to_owned();
            tool_calls.push(ToolCall {
                call_id: call_id.to_owned(),
                tool_name: name.to_owned(),
                arguments,
            });
        }
    }

    let finish_reason = choice
        .get("finish_reason")
        .and_then(|v| v.as_str())
        .map(str::to_owned);

    Ok(ToolChatReply {
        content,
        tool_calls,
        finish_reason,
    })
}
