//! `packingSuggest` — packing list from a temperature band plus trip
//! specifics. The band comes from an explicit temperature when the model
//! passes one through (usually harvested from a prior `weather` call),
//! otherwise from a coarse month table.
//!
//! Emits the band and both item lists in the payload so the blend stage
//! can surface them as verifiable facts.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use wf_domain::Result;

use crate::{parse_args, Family, ToolCtx, ToolInvoker, ToolOutcome, ToolRegistry, ToolSpec, PACKING_SUGGEST};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Freezing,
    Cold,
    Mild,
    Warm,
    Hot,
}

impl Band {
    pub fn as_str(&self) -> &'static str {
        match self {
            Band::Freezing => "freezing",
            Band::Cold => "cold",
            Band::Mild => "mild",
            Band::Warm => "warm",
            Band::Hot => "hot",
        }
    }
}

pub fn band_for_temp(temp_c: f64) -> Band {
    match temp_c {
        t if t < 0.0 => Band::Freezing,
        t if t < 10.0 => Band::Cold,
        t if t < 20.0 => Band::Mild,
        t if t < 27.0 => Band::Warm,
        _ => Band::Hot,
    }
}

/// Northern-hemisphere month heuristic, used only when no temperature is
/// available.
fn band_for_month(month: u32) -> Band {
    match month {
        12 | 1 | 2 => Band::Cold,
        3 | 4 | 11 => Band::Mild,
        5 | 6 | 9 | 10 => Band::Warm,
        7 | 8 => Band::Hot,
        _ => Band::Mild,
    }
}

fn base_items(band: Band) -> Vec<&'static str> {
    let mut items = vec!["passport and documents", "phone charger", "toiletries"];
    items.extend(match band {
        Band::Freezing => vec!["insulated coat", "thermal layers", "gloves and hat", "waterproof boots"],
        Band::Cold => vec!["warm jacket", "sweaters", "scarf"],
        Band::Mild => vec!["light jacket", "layers", "comfortable walking shoes"],
        Band::Warm => vec!["t-shirts", "light trousers", "sunglasses"],
        Band::Hot => vec!["breathable clothing", "sun hat", "sunscreen", "refillable water bottle"],
    });
    items
}

fn special_items(activities: &[String], group: Option<&str>) -> Vec<&'static str> {
    let mut items = Vec::new();
    let joined = activities.join(" ").to_lowercase();
    if joined.contains("beach") || joined.contains("swim") {
        items.extend(["swimwear", "beach towel", "flip-flops"]);
    }
    if joined.contains("hik") || joined.contains("trek") {
        items.extend(["hiking boots", "daypack", "blister plasters"]);
    }
    if joined.contains("business") || joined.contains("conference") {
        items.extend(["business attire", "laptop and adapter"]);
    }
    if joined.contains("ski") || joined.contains("snow") {
        items.extend(["ski gear", "goggles"]);
    }
    if let Some(g) = group {
        let g = g.to_lowercase();
        if g.contains("toddler") || g.contains("baby") || g.contains("infant") {
            items.extend(["travel stroller", "baby supplies", "snacks for the little one"]);
        }
        if g.contains("family") || g.contains("kids") {
            items.extend(["entertainment for children", "first-aid kit"]);
        }
    }
    items
}

#[derive(Debug, Deserialize)]
struct PackingArgs {
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    month: Option<String>,
    /// Average temperature in Celsius, when known.
    #[serde(rename = "tempC", default)]
    temp_c: Option<f64>,
    #[serde(default)]
    activities: Vec<String>,
    #[serde(rename = "groupType", default)]
    group_type: Option<String>,
}

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

struct PackingTool;

#[async_trait]
impl ToolInvoker for PackingTool {
    async fn invoke(&self, args: &Value, _ctx: &ToolCtx) -> Result<ToolOutcome> {
        let args: PackingArgs = parse_args(PACKING_SUGGEST, args)?;

        let band = match args.temp_c {
            Some(t) => band_for_temp(t),
            None => args
                .month
                .as_deref()
                .and_then(month_number)
                .map(band_for_month)
                .unwrap_or(Band::Mild),
        };

        let base = base_items(band);
        let special = special_items(&args.activities, args.group_type.as_deref());

        let place = args.city.as_deref().unwrap_or("your destination");
        let mut summary = format!(
            "Packing for {place} ({} weather): {}",
            band.as_str(),
            base.join(", ")
        );
        if !special.is_empty() {
            summary.push_str(&format!("; also: {}", special.join(", ")));
        }

        Ok(ToolOutcome::new(summary).with_payload(serde_json::json!({
            "packingBand": band.as_str(),
            "packingItemsBase": base,
            "packingItemsSpecial": special,
        })))
    }
}

pub(crate) fn register(registry: &mut ToolRegistry) {
    registry.register(ToolSpec {
        name: PACKING_SUGGEST,
        description: "Packing list for a destination, from temperature (tempC, ideally from a prior weather call) or month, plus activities and group type.",
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "city": { "type": "string", "description": "Destination city" },
                "month": { "type": "string", "description": "Travel month when dates are loose" },
                "tempC": { "type": "number", "description": "Average temperature in Celsius, when known" },
                "activities": { "type": "array", "items": { "type": "string" }, "description": "Planned activities" },
                "groupType": { "type": "string", "description": "Who is traveling (family, couple, solo, with toddler)" }
            }
        }),
        family: Family::Local,
        default_timeout: Duration::from_millis(1_000),
        invoker: Arc::new(PackingTool),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_bands() {
        assert_eq!(band_for_temp(-5.0), Band::Freezing);
        assert_eq!(band_for_temp(5.0), Band::Cold);
        assert_eq!(band_for_temp(15.0), Band::Mild);
        assert_eq!(band_for_temp(22.0), Band::Warm);
        assert_eq!(band_for_temp(30.0), Band::Hot);
    }

    #[test]
    fn explicit_temperature_beats_month() {
        // August would say Hot; an explicit 5C wins.
        let band = match Some(5.0) {
            Some(t) => band_for_temp(t),
            None => band_for_month(8),
        };
        assert_eq!(band, Band::Cold);
    }

    #[test]
    fn special_items_for_toddler_group() {
        let items = special_items(&[], Some("family with toddler"));
        assert!(items.contains(&"travel stroller"));
        assert!(items.contains(&"entertainment for children"));
    }

    #[tokio::test]
    async fn invoke_emits_band_facts() {
        let tool = PackingTool;
        let outcome = tool
            .invoke(
                &serde_json::json!({
                    "city": "Reykjavik",
                    "tempC": 3.0,
                    "activities": ["hiking"]
                }),
                &ToolCtx::unbounded(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.payload["packingBand"], "cold");
        assert!(outcome.payload["packingItemsSpecial"]
            .as_array()
            .unwrap()
            .iter()
            .any(|v| v == "hiking boots"));
        assert!(outcome.summary.contains("Reykjavik"));
    }

    #[tokio::test]
    async fn invoke_with_no_signal_defaults_mild() {
        let tool = PackingTool;
        let outcome = tool
            .invoke(&serde_json::json!({}), &ToolCtx::unbounded())
            .await
            .unwrap();
        assert_eq!(outcome.payload["packingBand"], "mild");
    }
}
