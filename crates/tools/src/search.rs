//! `search` — web search through a JSON POST contract
//! (`POST {base}/search {"q": ..., "num": ...}` returning
//! `{"results": [{"title", "url", "snippet"}, ...]}`).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use wf_domain::config::ToolsConfig;
use wf_domain::{Error, Result};

use crate::{parse_args, Family, OutboundHttp, ToolCtx, ToolInvoker, ToolOutcome, ToolRegistry, ToolSpec, SEARCH};

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default = "d_num")]
    num: usize,
}

fn d_num() -> usize {
    5
}

struct SearchTool {
    outbound: Arc<OutboundHttp>,
    base_url: Option<String>,
    api_key: Option<String>,
}

#[async_trait]
impl ToolInvoker for SearchTool {
    async fn invoke(&self, args: &Value, ctx: &ToolCtx) -> Result<ToolOutcome> {
        let args: SearchArgs = parse_args(SEARCH, args)?;
        let base = self.base_url.as_deref().ok_or_else(|| Error::Tool {
            tool: SEARCH.into(),
            reason: "SEARCH_BASE_URL is not configured".into(),
        })?;

        let mut headers = Vec::new();
        if let Some(ref key) = self.api_key {
            headers.push(("X-Api-Key", key.clone()));
        }

        let json = self
            .outbound
            .post_json(
                Family::Search,
                &format!("{}/search", base.trim_end_matches('/')),
                &serde_json::json!({ "q": args.query, "num": args.num }),
                &headers,
                ctx,
            )
            .await?;

        let results = json
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if results.is_empty() {
            return Err(Error::Tool {
                tool: SEARCH.into(),
                reason: format!("no results for '{}'", args.query),
            });
        }

        let urls: Vec<String> = results
            .iter()
            .filter_map(|r| r.get("url").and_then(Value::as_str))
            .take(args.num)
            .map(str::to_owned)
            .collect();
        let titles: Vec<&str> = results
            .iter()
            .filter_map(|r| r.get("title").and_then(Value::as_str))
            .take(3)
            .collect();

        let mut outcome = ToolOutcome::new(format!(
            "Top results for '{}': {}",
            args.query,
            titles.join("; ")
        ))
        .with_payload(serde_json::json!({ "results": results }));
        for url in urls {
            outcome = outcome.with_citation(url);
        }
        Ok(outcome)
    }
}

pub(crate) fn register(registry: &mut ToolRegistry, cfg: &ToolsConfig, outbound: Arc<OutboundHttp>) {
    registry.register(ToolSpec {
        name: SEARCH,
        description: "Web search. Returns titles, URLs, and snippets.",
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" },
                "num": { "type": "integer", "description": "Max results (default 5)" }
            },
            "required": ["query"]
        }),
        family: Family::Search,
        default_timeout: Duration::from_millis(cfg.search_timeout_ms),
        invoker: Arc::new(SearchTool {
            outbound,
            base_url: cfg.search_base_url.clone(),
            api_key: cfg.search_api_key.clone(),
        }),
    });
}
