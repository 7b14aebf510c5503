//! The tool catalog: a static registry of typed tools the actor loop can
//! dispatch, plus the shared outbound HTTP stack (per-family pacing,
//! backoff for idempotent GETs, deadline and cancellation enforcement).
//!
//! Every tool validates its arguments into a typed struct before doing
//! anything; a validation failure is terminal for that call. Successful
//! results carry a one-line `summary`, an optional `source`, and zero or
//! more `citations` — the only strings the blend stage will ever cite.

mod amadeus;
mod attractions;
mod country;
mod destinations;
mod http;
mod irrops;
mod limiter;
mod packing;
mod pnr;
mod policy;
mod research;
mod retry;
mod search;
mod weather;

pub use http::OutboundHttp;
pub use limiter::RateLimiter;
pub use retry::RetryPolicy;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use wf_domain::chat::ToolDefinition;
use wf_domain::config::ToolsConfig;
use wf_domain::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool names
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const WEATHER: &str = "weather";
pub const GET_COUNTRY: &str = "getCountry";
pub const GET_ATTRACTIONS: &str = "getAttractions";
pub const DESTINATION_SUGGEST: &str = "destinationSuggest";
pub const AMADEUS_RESOLVE_CITY: &str = "amadeusResolveCity";
pub const AMADEUS_AIRPORTS_FOR_CITY: &str = "amadeusAirportsForCity";
pub const AMADEUS_SEARCH_FLIGHTS: &str = "amadeusSearchFlights";
pub const SEARCH: &str = "search";
pub const DEEP_RESEARCH: &str = "deepResearch";
pub const VECTARA_QUERY: &str = "vectaraQuery";
pub const EXTRACT_POLICY: &str = "extractPolicyWithCrawlee";
pub const PNR_PARSE: &str = "pnrParse";
pub const IRROPS_PROCESS: &str = "irropsProcess";
pub const PACKING_SUGGEST: &str = "packingSuggest";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Provider families (rate-limiter buckets)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Weather,
    Search,
    Amadeus,
    Policy,
    Research,
    /// Pure-local tools; never touch the limiter.
    Local,
}

impl Family {
    pub fn as_str(&self) -> &'static str {
        match self {
            Family::Weather => "weather",
            Family::Search => "search",
            Family::Amadeus => "amadeus",
            Family::Policy => "policy",
            Family::Research => "research",
            Family::Local => "local",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Invocation context and outcome
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What a tool gets for one invocation: the turn's cancellation signal
/// and the effective deadline the caller computed for this call.
#[derive(Clone)]
pub struct ToolCtx {
    pub signal: CancellationToken,
    pub deadline: Duration,
}

impl ToolCtx {
    /// A context for tests: generous deadline, never cancelled.
    pub fn unbounded() -> Self {
        Self {
            signal: CancellationToken::new(),
            deadline: Duration::from_secs(60),
        }
    }
}

/// The successful result shape. Everything the runtime grounds a reply
/// on comes through here.
#[derive(Debug, Clone, Default)]
pub struct ToolOutcome {
    pub summary: String,
    pub source: Option<String>,
    pub citations: Vec<String>,
    /// Extra structured payload, merged into the tool-role message.
    pub payload: Value,
}

impl ToolOutcome {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            source: None,
            citations: Vec::new(),
            payload: Value::Null,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        let s = source.into();
        if !self.citations.contains(&s) {
            self.citations.push(s.clone());
        }
        self.source = Some(s);
        self
    }

    pub fn with_citation(mut self, citation: impl Into<String>) -> Self {
        let c = citation.into();
        if !self.citations.contains(&c) {
            self.citations.push(c);
        }
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// The `{ok:true, ...}` JSON fed back to the LLM as a tool message.
    pub fn to_json(&self) -> Value {
        let mut obj = serde_json::json!({
            "ok": true,
            "summary": self.summary,
        });
        if let Some(ref s) = self.source {
            obj["source"] = Value::String(s.clone());
        }
        if !self.citations.is_empty() {
            obj["citations"] = serde_json::json!(self.citations);
        }
        if let Value::Object(ref extra) = self.payload {
            for (k, v) in extra {
                obj[k] = v.clone();
            }
        }
        obj
    }
}

/// One tool implementation behind the registry seam.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, args: &Value, ctx: &ToolCtx) -> Result<ToolOutcome>;
}

/// Parse a tool's argument value into its typed struct. A failure here is
/// terminal for the call and classified as a validation failure.
pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(tool: &str, args: &Value) -> Result<T> {
    serde_json::from_value(args.clone())
        .map_err(|e| Error::InvalidArgs(format!("{tool}: {e}")))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ToolSpec + registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// JSON Schema for the function-calling definition.
    pub parameters: Value,
    pub family: Family,
    pub default_timeout: Duration,
    pub invoker: Arc<dyn ToolInvoker>,
}

impl ToolSpec {
    /// The function-calling definition exposed to the LLM.
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.to_owned(),
            description: self.description.to_owned(),
            parameters: self.parameters.clone(),
        }
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    specs: BTreeMap<String, Arc<ToolSpec>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: ToolSpec) {
        self.specs.insert(spec.name.to_owned(), Arc::new(spec));
    }

    pub fn get(&self, name: &str) -> Option<Arc<ToolSpec>> {
        self.specs.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.specs.keys().map(String::as_str).collect()
    }

    /// The specs a given route may use.
    pub fn specs_for_route(&self, route: &str) -> Vec<Arc<ToolSpec>> {
        self.specs
            .values()
            .filter(|s| route_allows(route, s.name))
            .cloned()
            .collect()
    }

    /// Function-calling definitions for a route.
    pub fn definitions_for_route(&self, route: &str) -> Vec<ToolDefinition> {
        self.specs_for_route(route)
            .iter()
            .map(|s| s.definition())
            .collect()
    }
}

/// Route-based tool gating. Research-flavored routes never touch the
/// flight stack; packing never escalates to deep research.
pub fn route_allows(route: &str, tool: &str) -> bool {
    match route {
        "destinations" | "web" | "web_search" | "policy" | "visas" => !tool.starts_with("amadeus"),
        "packing" => tool != DEEP_RESEARCH,
        _ => true,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Catalog builder
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Build the full production catalog against a shared outbound stack.
pub fn build_registry(cfg: &ToolsConfig, outbound: Arc<OutboundHttp>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    weather::register(&mut registry, cfg, outbound.clone());
    country::register(&mut registry, cfg, outbound.clone());
    attractions::register(&mut registry, cfg, outbound.clone());
    destinations::register(&mut registry);
    amadeus::register(&mut registry, cfg, outbound.clone());
    search::register(&mut registry, cfg, outbound.clone());
    research::register(&mut registry, cfg, outbound.clone());
    policy::register(&mut registry, cfg, outbound);
    pnr::register(&mut registry);
    irrops::register(&mut registry);
    packing::register(&mut registry);

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_gating_matrix() {
        for route in ["destinations", "web", "web_search", "policy", "visas"] {
            assert!(!route_allows(route, AMADEUS_RESOLVE_CITY), "{route}");
            assert!(!route_allows(route, AMADEUS_SEARCH_FLIGHTS), "{route}");
            assert!(route_allows(route, SEARCH), "{route}");
        }
        assert!(!route_allows("packing", DEEP_RESEARCH));
        assert!(route_allows("packing", WEATHER));
        assert!(route_allows("flights", AMADEUS_SEARCH_FLIGHTS));
        assert!(route_allows("weather", DEEP_RESEARCH));
    }

    #[test]
    fn outcome_json_shape() {
        let outcome = ToolOutcome::new("sunny, 25C")
            .with_source("open-meteo.com")
            .with_payload(serde_json::json!({"tempC": 25}));
        let json = outcome.to_json();
        assert_eq!(json["ok"], true);
        assert_eq!(json["summary"], "sunny, 25C");
        assert_eq!(json["source"], "open-meteo.com");
        assert_eq!(json["citations"][0], "open-meteo.com");
        assert_eq!(json["tempC"], 25);
    }

    #[test]
    fn with_source_does_not_duplicate_citation() {
        let outcome = ToolOutcome::new("x")
            .with_citation("a.com")
            .with_source("a.com");
        assert_eq!(outcome.citations, vec!["a.com"]);
    }

    #[test]
    fn full_catalog_registers_every_tool() {
        let cfg = ToolsConfig::default();
        let outbound = Arc::new(OutboundHttp::new(&cfg).unwrap());
        let registry = build_registry(&cfg, outbound);
        for name in [
            WEATHER,
            GET_COUNTRY,
            GET_ATTRACTIONS,
            DESTINATION_SUGGEST,
            AMADEUS_RESOLVE_CITY,
            AMADEUS_AIRPORTS_FOR_CITY,
            AMADEUS_SEARCH_FLIGHTS,
            SEARCH,
            DEEP_RESEARCH,
            VECTARA_QUERY,
            EXTRACT_POLICY,
            PNR_PARSE,
            IRROPS_PROCESS,
            PACKING_SUGGEST,
        ] {
            assert!(registry.get(name).is_some(), "missing {name}");
        }
        assert_eq!(registry.len(), 14);
    }

    #[test]
    fn definitions_for_route_filters_amadeus() {
        let cfg = ToolsConfig::default();
        let outbound = Arc::new(OutboundHttp::new(&cfg).unwrap());
        let registry = build_registry(&cfg, outbound);
        let defs = registry.definitions_for_route("policy");
        assert!(defs.iter().all(|d| !d.name.starts_with("amadeus")));
        assert_eq!(defs.len(), 11);
    }
}
