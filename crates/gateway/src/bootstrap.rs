//! Application-state construction shared by `serve` and `chat`.

use std::sync::Arc;

use anyhow::Context;

use wf_domain::config::{Config, ConfigSeverity};
use wf_sessions::SlotMemory;
use wf_tools::OutboundHttp;

use crate::metrics::Metrics;
use crate::runtime::thread_lock::ThreadLockMap;
use crate::state::AppState;

/// Validate the config and assemble the shared [`AppState`].
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Session backend ──────────────────────────────────────────────
    let backend = wf_sessions::create_backend(&config.session)
        .context("initializing session backend")?;
    tracing::info!(kind = ?config.session.kind, ttl_sec = config.session.ttl_sec, "session backend ready");

    // ── LLM transport ────────────────────────────────────────────────
    let transport = wf_providers::create_transport(&config.llm)
        .context("initializing LLM transport")?;
    match &transport {
        Some(t) => tracing::info!(transport = t.transport_id(), model = %config.llm.model, "LLM transport ready"),
        None => tracing::warn!("no LLM transport configured — turns will use the generic fallback"),
    }

    // ── Tool catalog ─────────────────────────────────────────────────
    let outbound = Arc::new(OutboundHttp::new(&config.tools).context("building outbound HTTP stack")?);
    let tools = Arc::new(wf_tools::build_registry(&config.tools, outbound));
    tracing::info!(tools = tools.len(), "tool catalog ready");

    Ok(AppState {
        config,
        transport,
        sessions: SlotMemory::new(backend),
        tools,
        metrics: Arc::new(Metrics::new()),
        thread_locks: Arc::new(ThreadLockMap::new()),
    })
}
