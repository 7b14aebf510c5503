//! Scripted transport for tests.
//!
//! A FIFO of canned replies consumed by both trait methods, plus a call
//! log for assertions. When the script runs dry, `chat` falls back to the
//! configured default JSON (handy for classifier calls a test does not
//! care about) and `chat_with_tools` returns an empty reply, which the
//! actor treats as "no message".

use std::collections::VecDeque;

use parking_lot::Mutex;

use wf_domain::chat::{Role, ToolCall};
use wf_domain::Result;

use crate::traits::{ChatReply, ChatRequest, LlmTransport, ToolChatReply, ToolChatRequest};

/// One scripted reply.
#[derive(Debug, Clone, Default)]
pub struct MockReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl MockReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_call(name: &str, args: serde_json::Value) -> Self {
        Self::tool_calls(&[(name, args)])
    }

    pub fn tool_calls(calls: &[(&str, serde_json::Value)]) -> Self {
        Self {
            content: None,
            tool_calls: calls
                .iter()
                .enumerate()
                .map(|(i, (name, args))| ToolCall {
                    call_id: format!("call_{i}"),
                    tool_name: (*name).to_owned(),
                    arguments: args.to_string(),
                })
                .collect(),
        }
    }
}

/// A recorded transport call, for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// "chat" or "chat_with_tools".
    pub kind: &'static str,
    /// Content of the last user message in the request.
    pub last_user: String,
    /// Names of the tools offered, when function-calling.
    pub tool_names: Vec<String>,
}

#[derive(Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<MockReply>>,
    calls: Mutex<Vec<RecordedCall>>,
    default_chat: Option<String>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reply `chat` returns once the script is exhausted.
    pub fn with_default_chat(mut self, content: impl Into<String>) -> Self {
        self.default_chat = Some(content.into());
        self
    }

    pub fn push(&self, reply: MockReply) -> &Self {
        self.script.lock().push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }

    fn pop(&self) -> Option<MockReply> {
        self.script.lock().pop_front()
    }

    fn record(&self, kind: &'static str, messages: &[wf_domain::chat::Message], tools: &[String]) {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.calls.lock().push(RecordedCall {
            kind,
            last_user,
            tool_names: tools.to_vec(),
        });
    }
}

#[async_trait::async_trait]
impl LlmTransport for MockTransport {
    async fn chat(&self, req: ChatRequest) -> Result<ChatReply> {
        self.record("chat", &req.messages, &[]);
        match self.pop() {
            Some(reply) => Ok(ChatReply {
                content: reply.content.unwrap_or_default(),
            }),
            None => Ok(ChatReply {
                content: self.default_chat.clone().unwrap_or_default(),
            }),
        }
    }

    async fn chat_with_tools(&self, req: ToolChatRequest) -> Result<ToolChatReply> {
        let tool_names: Vec<String> = req.tools.iter().map(|t| t.name.clone()).collect();
        self.record("chat_with_tools", &req.messages, &tool_names);
        match self.pop() {
            Some(reply) => Ok(ToolChatReply {
                content: reply.content,
                tool_calls: reply.tool_calls,
                finish_reason: None,
            }),
            None => Ok(ToolChatReply::default()),
        }
    }

    fn transport_id(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wf_domain::chat::Message;

    #[tokio::test]
    async fn script_is_consumed_in_order() {
        let mock = MockTransport::new();
        mock.push(MockReply::text("first"));
        mock.push(MockReply::tool_call("weather", serde_json::json!({"city": "Rome"})));

        let r1 = mock
            .chat(ChatRequest {
                messages: vec![Message::user("a")],
                ..ChatRequest::default()
            })
            .await
            .unwrap();
        assert_eq!(r1.content, "first");

        let r2 = mock
            .chat_with_tools(ToolChatRequest {
                messages: vec![Message::user("b")],
                ..ToolChatRequest::default()
            })
            .await
            .unwrap();
        assert_eq!(r2.tool_calls[0].tool_name, "weather");
        assert_eq!(mock.remaining(), 0);
    }

    #[tokio::test]
    async fn exhausted_script_uses_default_chat() {
        let mock = MockTransport::new().with_default_chat("{}");
        let r = mock.chat(ChatRequest::default()).await.unwrap();
        assert_eq!(r.content, "{}");

        let r = mock.chat_with_tools(ToolChatRequest::default()).await.unwrap();
        assert!(r.is_empty());
    }

    #[tokio::test]
    async fn calls_are_recorded() {
        let mock = MockTransport::new().with_default_chat("x");
        mock.chat(ChatRequest {
            messages: vec![Message::system("s"), Message::user("question")],
            ..ChatRequest::default()
        })
        .await
        .unwrap();

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].kind, "chat");
        assert_eq!(calls[0].last_user, "question");
    }
}
