//! `getAttractions` — points of interest near a city from an
//! OpenTripMap-compatible endpoint (geoname lookup, then radius query).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use wf_domain::config::ToolsConfig;
use wf_domain::{Error, Result};

use crate::{parse_args, Family, OutboundHttp, ToolCtx, ToolInvoker, ToolOutcome, ToolRegistry, ToolSpec, GET_ATTRACTIONS};

#[derive(Debug, Deserialize)]
struct AttractionsArgs {
    city: String,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default = "d_limit")]
    limit: usize,
}

fn d_limit() -> usize {
    5
}

struct AttractionsTool {
    outbound: Arc<OutboundHttp>,
    base_url: String,
    api_key: Option<String>,
}

#[async_trait]
impl ToolInvoker for AttractionsTool {
    async fn invoke(&self, args: &Value, ctx: &ToolCtx) -> Result<ToolOutcome> {
        let args: AttractionsArgs = parse_args(GET_ATTRACTIONS, args)?;
        let api_key = self.api_key.clone().ok_or_else(|| Error::Tool {
            tool: GET_ATTRACTIONS.into(),
            reason: "ATTRACTIONS_API_KEY is not configured".into(),
        })?;

        let geoname_url = format!("{}/0.1/en/places/geoname", self.base_url);
        let geo = self
            .outbound
            .get_json(
                Family::Search,
                &geoname_url,
                &[("name", args.city.clone()), ("apikey", api_key.clone())],
                &[],
                ctx,
            )
            .await?;
        let lat = geo.get("lat").and_then(Value::as_f64).ok_or_else(|| Error::Tool {
            tool: GET_ATTRACTIONS.into(),
            reason: format!("no geoname match for '{}'", args.city),
        })?;
        let lon = geo.get("lon").and_then(Value::as_f64).unwrap_or_default();

        let radius_url = format!("{}/0.1/en/places/radius", self.base_url);
        let mut query = vec![
            ("radius", "10000".to_owned()),
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
            ("rate", "3".to_owned()),
            ("format", "json".to_owned()),
            ("limit", args.limit.to_string()),
            ("apikey", api_key),
        ];
        if let Some(ref kind) = args.kind {
            query.push(("kinds", kind.clone()));
        }
        let places = self
            .outbound
            .get_json(Family::Search, &radius_url, &query, &[], ctx)
            .await?;

        let names: Vec<String> = places
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|p| p.get("name").and_then(Value::as_str))
                    .filter(|n| !n.is_empty())
                    .take(args.limit)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        if names.is_empty() {
            return Err(Error::Tool {
                tool: GET_ATTRACTIONS.into(),
                reason: format!("no rated attractions near '{}'", args.city),
            });
        }

        let summary = format!("Top attractions in {}: {}", args.city, names.join(", "));
        Ok(ToolOutcome::new(summary)
            .with_source("opentripmap.com")
            .with_payload(serde_json::json!({ "city": args.city, "attractions": names })))
    }
}

pub(crate) fn register(registry: &mut ToolRegistry, cfg: &ToolsConfig, outbound: Arc<OutboundHttp>) {
    registry.register(ToolSpec {
        name: GET_ATTRACTIONS,
        description: "Rated points of interest near a city, optionally filtered by kind (museums, churches, natural).",
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "city": { "type": "string", "description": "City name" },
                "kind": { "type": "string", "description": "Optional category filter" },
                "limit": { "type": "integer", "description": "Max results (default 5)" }
            },
            "required": ["city"]
        }),
        family: Family::Search,
        default_timeout: Duration::from_millis(cfg.attractions_timeout_ms),
        invoker: Arc::new(AttractionsTool {
            outbound,
            base_url: cfg.attractions_base_url.clone(),
            api_key: cfg.attractions_api_key.clone(),
        }),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_to_five() {
        let args: AttractionsArgs =
            parse_args(GET_ATTRACTIONS, &serde_json::json!({"city": "Rome"})).unwrap();
        assert_eq!(args.limit, 5);
    }
}
