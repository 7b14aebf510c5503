//! Process-wide counters behind `GET /metrics` and the REPL `/metrics`
//! command. Cheap to bump from anywhere; the snapshot is a plain JSON
//! object, not a metrics-protocol export.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::Value;

#[derive(Default)]
pub struct Metrics {
    messages_total: AtomicU64,
    answers_with_citations_total: AtomicU64,
    chat_turns: Mutex<BTreeMap<String, u64>>,
    router_low_conf: Mutex<BTreeMap<String, u64>>,
    clarify_requests: Mutex<BTreeMap<String, u64>>,
    fallbacks: Mutex<BTreeMap<String, u64>>,
    gated_skips: Mutex<BTreeMap<String, u64>>,
    arg_parse_failures: Mutex<BTreeMap<String, u64>>,
    plan_routes: Mutex<BTreeMap<String, u64>>,
}

fn bump(map: &Mutex<BTreeMap<String, u64>>, key: &str) {
    *map.lock().entry(key.to_owned()).or_insert(0) += 1;
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_message(&self) {
        self.messages_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_citation_answer(&self) {
        self.answers_with_citations_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_turn(&self, intent: &str) {
        bump(&self.chat_turns, intent);
    }

    pub fn inc_low_conf(&self, intent: &str) {
        bump(&self.router_low_conf, intent);
    }

    pub fn inc_clarify(&self, key: &str) {
        bump(&self.clarify_requests, key);
    }

    pub fn inc_fallback(&self, kind: &str) {
        bump(&self.fallbacks, kind);
    }

    pub fn inc_gated_skip(&self, tool: &str) {
        bump(&self.gated_skips, tool);
    }

    pub fn inc_arg_parse_failure(&self, tool: &str) {
        bump(&self.arg_parse_failures, tool);
    }

    /// Route the planner published (distinct from the router's verdict).
    pub fn inc_plan_route(&self, route: &str) {
        bump(&self.plan_routes, route);
    }

    pub fn gated_skip_total(&self) -> u64 {
        self.gated_skips.lock().values().sum()
    }

    pub fn snapshot(&self) -> Value {
        serde_json::json!({
            "messages_total": self.messages_total.load(Ordering::Relaxed),
            "chat_turns": *self.chat_turns.lock(),
            "router_low_conf": *self.router_low_conf.lock(),
            "clarify_requests": *self.clarify_requests.lock(),
            "fallbacks": *self.fallbacks.lock(),
            "gated_skips": *self.gated_skips.lock(),
            "arg_parse_failures": *self.arg_parse_failures.lock(),
            "plan_routes": *self.plan_routes.lock(),
            "answers_with_citations_total": self.answers_with_citations_total.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counts() {
        let m = Metrics::new();
        m.inc_message();
        m.inc_message();
        m.inc_turn("weather");
        m.inc_turn("weather");
        m.inc_turn("flights");
        m.inc_fallback("generic");
        m.inc_gated_skip("amadeusResolveCity");
        m.inc_citation_answer();

        let snap = m.snapshot();
        assert_eq!(snap["messages_total"], 2);
        assert_eq!(snap["chat_turns"]["weather"], 2);
        assert_eq!(snap["chat_turns"]["flights"], 1);
        assert_eq!(snap["fallbacks"]["generic"], 1);
        assert_eq!(snap["gated_skips"]["amadeusResolveCity"], 1);
        assert_eq!(snap["answers_with_citations_total"], 1);
        assert_eq!(m.gated_skip_total(), 1);
    }

    #[test]
    fn empty_snapshot_has_all_keys() {
        let snap = Metrics::new().snapshot();
        for key in [
            "messages_total",
            "chat_turns",
            "router_low_conf",
            "clarify_requests",
            "fallbacks",
            "answers_with_citations_total",
        ] {
            assert!(snap.get(key).is_some(), "missing {key}");
        }
    }
}
