use std::sync::Arc;

use wf_domain::config::Config;
use wf_providers::LlmTransport;
use wf_sessions::SlotMemory;
use wf_tools::ToolRegistry;

use crate::metrics::Metrics;
use crate::runtime::thread_lock::ThreadLockMap;

/// Shared application state passed to all API handlers and the REPL.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// `None` when no LLM endpoint is configured; turns degrade to the
    /// generic fallback instead of failing to boot.
    pub transport: Option<Arc<dyn LlmTransport>>,
    pub sessions: SlotMemory,
    pub tools: Arc<ToolRegistry>,
    pub metrics: Arc<Metrics>,
    /// One-turn-at-a-time serialization per thread.
    pub thread_locks: Arc<ThreadLockMap>,
}
