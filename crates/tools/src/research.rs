//! `deepResearch` — multi-source research through a dedicated service
//! (`POST {base}/research {"query": ...}` returning `{"report",
//! "sources": [...]}`). Only runs after the consent gate has been
//! answered; the router and route gating enforce that, not this tool.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use wf_domain::config::ToolsConfig;
use wf_domain::{Error, Result};

use crate::{parse_args, Family, OutboundHttp, ToolCtx, ToolInvoker, ToolOutcome, ToolRegistry, ToolSpec, DEEP_RESEARCH};

#[derive(Debug, Deserialize)]
struct ResearchArgs {
    query: String,
}

struct ResearchTool {
    outbound: Arc<OutboundHttp>,
    base_url: Option<String>,
}

#[async_trait]
impl ToolInvoker for ResearchTool {
    async fn invoke(&self, args: &Value, ctx: &ToolCtx) -> Result<ToolOutcome> {
        let args: ResearchArgs = parse_args(DEEP_RESEARCH, args)?;
        let base = self.base_url.as_deref().ok_or_else(|| Error::Tool {
            tool: DEEP_RESEARCH.into(),
            reason: "RESEARCH_BASE_URL is not configured".into(),
        })?;

        let json = self
            .outbound
            .post_json(
                Family::Research,
                &format!("{}/research", base.trim_end_matches('/')),
                &serde_json::json!({ "query": args.query }),
                &[],
                ctx,
            )
            .await?;

        let report = json
            .get("report")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        if report.is_empty() {
            return Err(Error::Tool {
                tool: DEEP_RESEARCH.into(),
                reason: "research service returned an empty report".into(),
            });
        }

        let sources: Vec<String> = json
            .get("sources")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        let mut outcome = ToolOutcome::new(report).with_payload(serde_json::json!({
            "sourceCount": sources.len(),
        }));
        for s in sources {
            outcome = outcome.with_citation(s);
        }
        Ok(outcome)
    }
}

pub(crate) fn register(registry: &mut ToolRegistry, cfg: &ToolsConfig, outbound: Arc<OutboundHttp>) {
    registry.register(ToolSpec {
        name: DEEP_RESEARCH,
        description: "In-depth multi-source research for complex trip planning. Slow; only for questions that genuinely need it.",
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The research question" }
            },
            "required": ["query"]
        }),
        family: Family::Research,
        default_timeout: Duration::from_millis(cfg.research_timeout_ms),
        invoker: Arc::new(ResearchTool {
            outbound,
            base_url: cfg.research_base_url.clone(),
        }),
    });
}
