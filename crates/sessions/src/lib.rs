//! Thread-scoped conversational state.
//!
//! A [`SessionBackend`] is a per-thread KV holding message history, the
//! slot map, and named JSON blobs, all under one TTL that refreshes on
//! every read or write. Two backends ship: an in-process store and a
//! remote KV client, selected by `SESSION_KIND`.
//!
//! [`SlotMemory`] is the typed view the turn driver uses on top of a
//! backend: slot normalization, placeholder resolution, and consent-state
//! clearing live there.

mod memory;
mod remote;
mod slot_memory;

pub use memory::MemorySessionStore;
pub use remote::RemoteSessionStore;
pub use slot_memory::{is_temporal_reference, normalize_slots, resolve_placeholder, SlotMemory};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use wf_domain::chat::Message;
use wf_domain::config::{SessionConfig, SessionKind};
use wf_domain::slots::SlotMap;
use wf_domain::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Capability trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Thread-scoped session storage.
///
/// Contracts (both backends):
/// - every operation is atomic per call; append + trim + TTL refresh is
///   one unit,
/// - `get_msgs` returns oldest-first,
/// - every read extends the thread TTL,
/// - operations honor the configured per-op timeout and fail with
///   [`Error::Timeout`] instead of hanging the turn.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Message history, oldest-first, optionally limited to the newest `limit`.
    async fn get_msgs(&self, thread_id: &str, limit: Option<usize>) -> Result<Vec<Message>>;

    /// Append a message, trimming the oldest beyond `cap`.
    async fn append_msg(&self, thread_id: &str, msg: Message, cap: usize) -> Result<()>;

    async fn get_slots(&self, thread_id: &str) -> Result<SlotMap>;

    /// Merge `put` into the slot map and delete the `del` keys.
    /// Empty-string values in `put` are dropped, never stored.
    async fn set_slots(&self, thread_id: &str, put: SlotMap, del: &[String]) -> Result<()>;

    async fn get_json(&self, kind: &str, thread_id: &str) -> Result<Option<Value>>;

    async fn set_json(&self, kind: &str, thread_id: &str, value: Value) -> Result<()>;

    /// Refresh the thread TTL without touching its contents.
    async fn expire(&self, thread_id: &str, ttl: Duration) -> Result<()>;

    /// Drop all state for the thread.
    async fn clear(&self, thread_id: &str) -> Result<()>;
}

/// Build the configured backend.
pub fn create_backend(cfg: &SessionConfig) -> Result<Arc<dyn SessionBackend>> {
    match cfg.kind {
        SessionKind::Memory => Ok(Arc::new(MemorySessionStore::new(cfg))),
        SessionKind::Remote => {
            let url = cfg
                .remote_url
                .as_deref()
                .ok_or_else(|| Error::Config("SESSION_KIND=remote requires SESSION_REMOTE_URL".into()))?;
            Ok(Arc::new(RemoteSessionStore::new(url, cfg)?))
        }
    }
}
