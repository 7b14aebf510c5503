//! The policy pair: `vectaraQuery` (semantic lookup against the travel
//! policy knowledge base) and `extractPolicyWithCrawlee` (live page
//! extraction through the crawler service for policies the KB lacks).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use wf_domain::config::ToolsConfig;
use wf_domain::{Error, Result};

use crate::{parse_args, Family, OutboundHttp, ToolCtx, ToolInvoker, ToolOutcome, ToolRegistry, ToolSpec, EXTRACT_POLICY, VECTARA_QUERY};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// vectaraQuery
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
struct VectaraArgs {
    query: String,
    #[serde(default = "d_limit")]
    limit: usize,
}

fn d_limit() -> usize {
    3
}

struct VectaraTool {
    outbound: Arc<OutboundHttp>,
    base_url: Option<String>,
    api_key: Option<String>,
}

#[async_trait]
impl ToolInvoker for VectaraTool {
    async fn invoke(&self, args: &Value, ctx: &ToolCtx) -> Result<ToolOutcome> {
        let args: VectaraArgs = parse_args(VECTARA_QUERY, args)?;
        let base = self.base_url.as_deref().ok_or_else(|| Error::Tool {
            tool: VECTARA_QUERY.into(),
            reason: "VECTARA_BASE_URL is not configured".into(),
        })?;

        let mut headers = Vec::new();
        if let Some(ref key) = self.api_key {
            headers.push(("x-api-key", key.clone()));
        }

        let json = self
            .outbound
            .post_json(
                Family::Policy,
                &format!("{}/v2/query", base.trim_end_matches('/')),
                &serde_json::json!({
                    "query": args.query,
                    "search": { "limit": args.limit },
                    "generation": { "max_used_search_results": args.limit },
                }),
                &headers,
                ctx,
            )
            .await?;

        let answer = json
            .get("summary")
            .or_else(|| json.get("answer"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        if answer.is_empty() {
            return Err(Error::Tool {
                tool: VECTARA_QUERY.into(),
                reason: format!("knowledge base has no answer for '{}'", args.query),
            });
        }

        let documents: Vec<String> = json
            .pointer("/search_results")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|r| r.pointer("/document_id").and_then(Value::as_str))
                    .map(|id| format!("policy-kb:{id}"))
                    .collect()
            })
            .unwrap_or_default();

        let mut outcome = ToolOutcome::new(answer).with_source("policy-kb");
        for doc in documents {
            outcome = outcome.with_citation(doc);
        }
        Ok(outcome)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// extractPolicyWithCrawlee
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
struct ExtractArgs {
    url: String,
    #[serde(default)]
    topic: Option<String>,
}

struct ExtractPolicyTool {
    outbound: Arc<OutboundHttp>,
    base_url: Option<String>,
}

#[async_trait]
impl ToolInvoker for ExtractPolicyTool {
    async fn invoke(&self, args: &Value, ctx: &ToolCtx) -> Result<ToolOutcome> {
        let args: ExtractArgs = parse_args(EXTRACT_POLICY, args)?;
        if !args.url.starts_with("http://") && !args.url.starts_with("https://") {
            return Err(Error::InvalidArgs(format!(
                "{EXTRACT_POLICY}: url must be absolute, got '{}'",
                args.url
            )));
        }
        let base = self.base_url.as_deref().ok_or_else(|| Error::Tool {
            tool: EXTRACT_POLICY.into(),
            reason: "CRAWLER_BASE_URL is not configured".into(),
        })?;

        let json = self
            .outbound
            .post_json(
                Family::Policy,
                &format!("{}/extract", base.trim_end_matches('/')),
                &serde_json::json!({ "url": args.url, "topic": args.topic }),
                &[],
                ctx,
            )
            .await?;

        let text = json
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        if text.is_empty() {
            return Err(Error::Tool {
                tool: EXTRACT_POLICY.into(),
                reason: format!("no extractable policy text at {}", args.url),
            });
        }

        Ok(ToolOutcome::new(text)
            .with_source(args.url.clone())
            .with_payload(serde_json::json!({
                "url": args.url,
                "title": json.get("title").cloned().unwrap_or(Value::Null),
            })))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub(crate) fn register(registry: &mut ToolRegistry, cfg: &ToolsConfig, outbound: Arc<OutboundHttp>) {
    registry.register(ToolSpec {
        name: VECTARA_QUERY,
        description: "Query the travel-policy knowledge base (visas, baggage, entry requirements).",
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Policy question" },
                "limit": { "type": "integer", "description": "Max passages (default 3)" }
            },
            "required": ["query"]
        }),
        family: Family::Policy,
        default_timeout: Duration::from_millis(8_000),
        invoker: Arc::new(VectaraTool {
            outbound: outbound.clone(),
            base_url: cfg.vectara_base_url.clone(),
            api_key: cfg.vectara_api_key.clone(),
        }),
    });

    registry.register(ToolSpec {
        name: EXTRACT_POLICY,
        description: "Extract policy text from a live web page (airline baggage rules, embassy visa pages).",
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "Absolute page URL" },
                "topic": { "type": "string", "description": "Optional topic to focus extraction" }
            },
            "required": ["url"]
        }),
        family: Family::Policy,
        default_timeout: Duration::from_millis(cfg.policy_timeout_clamped_ms()),
        invoker: Arc::new(ExtractPolicyTool {
            outbound,
            base_url: cfg.crawler_base_url.clone(),
        }),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn extract_rejects_relative_urls() {
        let tool = ExtractPolicyTool {
            outbound: Arc::new(OutboundHttp::new(&ToolsConfig::default()).unwrap()),
            base_url: Some("http://localhost".into()),
        };
        let err = tool
            .invoke(&serde_json::json!({"url": "airline.com/baggage"}), &ToolCtx::unbounded())
            .await;
        assert!(matches!(err, Err(Error::InvalidArgs(_))));
    }
}
