use async_trait::async_trait;

use wf_domain::chat::{Message, ToolCall, ToolDefinition};
use wf_domain::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / reply types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Response-shape hint. `Json` asks the endpoint for a JSON object when
/// it supports that mode; callers still parse defensively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Text,
    Json,
}

/// A plain completion request (router, classifiers, planner).
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    /// Model override; `None` uses the transport default.
    pub model: Option<String>,
    pub response_format: ResponseFormat,
    pub temperature: Option<f32>,
}

/// A plain completion reply.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub content: String,
}

/// A function-calling completion request (actor loop).
#[derive(Debug, Clone, Default)]
pub struct ToolChatRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

/// A function-calling completion reply: either final text, tool calls,
/// or (from a misbehaving endpoint) neither.
#[derive(Debug, Clone, Default)]
pub struct ToolChatReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: Option<String>,
}

impl ToolChatReply {
    /// True when the model produced nothing usable.
    pub fn is_empty(&self) -> bool {
        self.tool_calls.is_empty() && self.content.as_deref().map_or(true, |c| c.trim().is_empty())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Transport trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The two LLM operations the runtime needs. Per-call deadlines are the
/// caller's job (`tokio::time::timeout` around the future) so that mock
/// and real transports are bounded identically.
#[async_trait]
pub trait LlmTransport: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatReply>;

    async fn chat_with_tools(&self, req: ToolChatRequest) -> Result<ToolChatReply>;

    /// A unique identifier for this transport instance.
    fn transport_id(&self) -> &str;
}
