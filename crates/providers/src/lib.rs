//! LLM transport layer.
//!
//! The runtime talks to exactly two operations: a plain completion
//! ([`LlmTransport::chat`]) used by the router, classifiers, and planner,
//! and a function-calling completion ([`LlmTransport::chat_with_tools`])
//! used by the actor loop. Replies are delivered as completed messages;
//! there is no token streaming on this surface.

mod mock;
mod openai;
mod traits;

pub use mock::{MockReply, MockTransport, RecordedCall};
pub use openai::OpenAiCompatTransport;
pub use traits::{ChatReply, ChatRequest, LlmTransport, ResponseFormat, ToolChatReply, ToolChatRequest};

use std::sync::Arc;

use wf_domain::config::LlmConfig;
use wf_domain::Result;

/// Build the configured transport, or `None` when no endpoint is set
/// (the gateway still boots; turns degrade to the generic fallback).
pub fn create_transport(cfg: &LlmConfig) -> Result<Option<Arc<dyn LlmTransport>>> {
    match cfg.base_url.as_deref() {
        Some(base_url) => {
            let transport = OpenAiCompatTransport::new(base_url, cfg)?;
            Ok(Some(Arc::new(transport)))
        }
        None => Ok(None),
    }
}
