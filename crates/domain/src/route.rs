//! Routing control types: the intent taxonomy, the router's per-turn
//! verdict, and the planner's control block.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Intent
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Weather,
    Packing,
    Attractions,
    Destinations,
    Flights,
    Policy,
    WebSearch,
    System,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Weather => "weather",
            Intent::Packing => "packing",
            Intent::Attractions => "attractions",
            Intent::Destinations => "destinations",
            Intent::Flights => "flights",
            Intent::Policy => "policy",
            Intent::WebSearch => "web_search",
            Intent::System => "system",
            Intent::Unknown => "unknown",
        }
    }

    /// Parse an intent label leniently (router LLMs emit a few aliases).
    pub fn parse(s: &str) -> Intent {
        match s.trim().to_ascii_lowercase().as_str() {
            "weather" => Intent::Weather,
            "packing" => Intent::Packing,
            "attractions" | "poi" | "sights" => Intent::Attractions,
            "destinations" | "destination" => Intent::Destinations,
            "flights" | "flight" => Intent::Flights,
            "policy" | "visas" | "visa" => Intent::Policy,
            "web_search" | "web" | "search" => Intent::WebSearch,
            "system" => Intent::System,
            _ => Intent::Unknown,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Router result
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The router's verdict for one turn: intent, whether external tools are
/// expected, a slot delta to merge, and a confidence score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterResult {
    pub intent: Intent,
    pub need_external: bool,
    /// Slot delta for this turn; the driver merges it into persisted slots.
    #[serde(default)]
    pub slots: BTreeMap<String, String>,
    pub confidence: f64,
}

impl RouterResult {
    pub fn new(intent: Intent, confidence: f64) -> Self {
        Self {
            intent,
            need_external: !matches!(intent, Intent::System | Intent::Unknown),
            slots: BTreeMap::new(),
            confidence,
        }
    }

    pub fn with_slot(mut self, key: &str, value: impl Into<String>) -> Self {
        let v = value.into();
        if !v.is_empty() {
            self.slots.insert(key.to_string(), v);
        }
        self
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Planner control block
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A tool-call hint the planner suggests for the actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedCall {
    pub tool: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// Consent the planner believes is needed before expensive research.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentHint {
    pub kind: String,
    pub query: String,
}

/// The planner's strict-JSON control block. Every field is optional in
/// the wire form; absent fields degrade to "no guidance".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanControl {
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub missing: Vec<String>,
    #[serde(default)]
    pub consent: Option<ConsentHint>,
    #[serde(default)]
    pub calls: Vec<PlannedCall>,
    #[serde(default)]
    pub blend: Option<String>,
    #[serde(default)]
    pub verify: Option<String>,
}

impl PlanControl {
    /// The route as an [`Intent`], when present and well-formed.
    pub fn route_intent(&self) -> Option<Intent> {
        let r = self.route.as_deref()?;
        match Intent::parse(r) {
            Intent::Unknown if r != "unknown" => None,
            intent => Some(intent),
        }
    }
}
