//! `destinationSuggest` — curated destination ideas by month and travel
//! style. Pure local lookup; deterministic and offline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use wf_domain::Result;

use crate::{parse_args, Family, ToolCtx, ToolInvoker, ToolOutcome, ToolRegistry, ToolSpec, DESTINATION_SUGGEST};

#[derive(Debug, Deserialize)]
struct DestinationArgs {
    #[serde(default)]
    month: Option<String>,
    #[serde(default)]
    style: Option<String>,
    #[serde(default)]
    region: Option<String>,
}

/// (destination, region, styles, best months 1-12)
const CATALOG: &[(&str, &str, &[&str], &[u32])] = &[
    ("Lisbon", "europe", &["city", "budget", "food"], &[3, 4, 5, 9, 10]),
    ("Kyoto", "asia", &["culture", "food"], &[3, 4, 10, 11]),
    ("Reykjavik", "europe", &["nature", "adventure"], &[6, 7, 8]),
    ("Queenstown", "oceania", &["adventure", "nature"], &[12, 1, 2]),
    ("Marrakech", "africa", &["culture", "budget"], &[3, 4, 10, 11]),
    ("Vancouver", "americas", &["city", "nature"], &[6, 7, 8, 9]),
    ("Dubrovnik", "europe", &["beach", "culture"], &[5, 6, 9]),
    ("Bangkok", "asia", &["city", "budget", "food"], &[11, 12, 1, 2]),
    ("Cape Town", "africa", &["nature", "beach"], &[1, 2, 3, 11, 12]),
    ("Cartagena", "americas", &["beach", "culture"], &[12, 1, 2, 3]),
    ("Tromsø", "europe", &["nature", "winter"], &[12, 1, 2, 3]),
    ("Bali", "asia", &["beach", "nature"], &[5, 6, 7, 8, 9]),
];

fn month_number(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "january", "february", "march", "april", "may", "june", "july", "august", "september",
        "october", "november", "december",
    ];
    let lowered = name.trim().to_lowercase();
    MONTHS
        .iter()
        .position(|m| m.starts_with(&lowered) && lowered.len() >= 3)
        .map(|i| i as u32 + 1)
}

fn suggest(month: Option<u32>, style: Option<&str>, region: Option<&str>) -> Vec<&'static str> {
    CATALOG
        .iter()
        .filter(|(_, r, styles, months)| {
            month.map_or(true, |m| months.contains(&m))
                && style.map_or(true, |s| styles.iter().any(|x| s.to_lowercase().contains(x)))
                && region.map_or(true, |want| r.eq_ignore_ascii_case(want))
        })
        .map(|(name, ..)| *name)
        .collect()
}

struct DestinationTool;

#[async_trait]
impl ToolInvoker for DestinationTool {
    async fn invoke(&self, args: &Value, _ctx: &ToolCtx) -> Result<ToolOutcome> {
        let args: DestinationArgs = parse_args(DESTINATION_SUGGEST, args)?;
        let month = args.month.as_deref().and_then(month_number);
        let picks = suggest(month, args.style.as_deref(), args.region.as_deref());

        let summary = if picks.is_empty() {
            "No curated destinations match those filters; broadening the search is recommended"
                .to_owned()
        } else {
            format!("Suggested destinations: {}", picks.join(", "))
        };

        Ok(ToolOutcome::new(summary)
            .with_payload(serde_json::json!({ "destinations": picks })))
    }
}

pub(crate) fn register(registry: &mut ToolRegistry) {
    registry.register(ToolSpec {
        name: DESTINATION_SUGGEST,
        description: "Suggest destinations matching a travel month, style (beach, culture, nature, adventure, city, food, budget), and region.",
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "month": { "type": "string", "description": "Travel month, e.g. 'June'" },
                "style": { "type": "string", "description": "Travel style keywords" },
                "region": { "type": "string", "enum": ["europe", "asia", "africa", "americas", "oceania"] }
            }
        }),
        family: Family::Local,
        default_timeout: Duration::from_millis(1_000),
        invoker: Arc::new(DestinationTool),
    });
}
