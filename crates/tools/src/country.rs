//! `getCountry` — basic country facts (capital, currency, languages)
//! from a restcountries-compatible endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use wf_domain::config::ToolsConfig;
use wf_domain::{Error, Result};

use crate::{parse_args, Family, OutboundHttp, ToolCtx, ToolInvoker, ToolOutcome, ToolRegistry, ToolSpec, GET_COUNTRY};

#[derive(Debug, Deserialize)]
struct CountryArgs {
    country: String,
}

struct CountryTool {
    outbound: Arc<OutboundHttp>,
    base_url: String,
}

#[async_trait]
impl ToolInvoker for CountryTool {
    async fn invoke(&self, args: &Value, ctx: &ToolCtx) -> Result<ToolOutcome> {
        let args: CountryArgs = parse_args(GET_COUNTRY, args)?;

        let url = format!("{}/v3.1/name/{}", self.base_url, args.country);
        let json = self
            .outbound
            .get_json(
                Family::Search,
                &url,
                &[("fields", "name,capital,currencies,languages,region".into())],
                &[],
                ctx,
            )
            .await?;

        let hit = json.get(0).ok_or_else(|| Error::Tool {
            tool: GET_COUNTRY.into(),
            reason: format!("no country match for '{}'", args.country),
        })?;

        let name = hit
            .pointer("/name/common")
            .and_then(Value::as_str)
            .unwrap_or(&args.country);
        let capital = hit
            .pointer("/capital/0")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let languages: Vec<&str> = hit
            .get("languages")
            .and_then(Value::as_object)
            .map(|m| m.values().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let summary = format!(
            "{name}: capital {capital}, languages {}",
            if languages.is_empty() { "unknown".to_owned() } else { languages.join(", ") }
        );
        Ok(ToolOutcome::new(summary)
            .with_source("restcountries.com")
            .with_payload(serde_json::json!({
                "name": name,
                "capital": capital,
                "region": hit.get("region").cloned().unwrap_or(Value::Null),
                "currencies": hit.get("currencies").cloned().unwrap_or(Value::Null),
            })))
    }
}

pub(crate) fn register(registry: &mut ToolRegistry, cfg: &ToolsConfig, outbound: Arc<OutboundHttp>) {
    registry.register(ToolSpec {
        name: GET_COUNTRY,
        description: "Country facts: capital, region, currencies, languages.",
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "country": { "type": "string", "description": "Country name" }
            },
            "required": ["country"]
        }),
        family: Family::Search,
        default_timeout: Duration::from_millis(7_000),
        invoker: Arc::new(CountryTool {
            outbound,
            base_url: cfg.country_base_url.clone(),
        }),
    });
}
