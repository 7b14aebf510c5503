//! Typed slot layer over a session backend.
//!
//! Pure slot logic (normalization, placeholder resolution, temporal-token
//! detection) lives in free functions so it tests without a store; the
//! [`SlotMemory`] wrapper binds them to a backend for the turn driver.

use std::sync::Arc;

use wf_domain::chat::Message;
use wf_domain::route::Intent;
use wf_domain::slots::{self, SlotMap};
use wf_domain::Result;

use crate::SessionBackend;

/// Placeholder tokens that refer back to an earlier location.
const PLACEHOLDERS: [&str; 5] = ["there", "here", "same place", "that place", "same city"];

/// Relative time expressions kept verbatim in date slots.
const TEMPORAL_REFS: [&str; 10] = [
    "today",
    "tonight",
    "tomorrow",
    "now",
    "this week",
    "this weekend",
    "this evening",
    "this morning",
    "next week",
    "next month",
];

/// True iff `s` is a relative time expression ("tomorrow", "next week").
/// These stay verbatim in `dates`/`departureDate`; resolution to a
/// calendar date happens inside the flight tools, not in slot state.
pub fn is_temporal_reference(s: &str) -> bool {
    let lowered = s.trim().to_lowercase();
    TEMPORAL_REFS.contains(&lowered.as_str())
}

fn is_placeholder(s: &str) -> bool {
    let lowered = s.trim().to_lowercase();
    PLACEHOLDERS.contains(&lowered.as_str())
}

/// Resolve a placeholder location token against prior slots, by the
/// fixed precedence `city > destinationCity > country > originCity >
/// region`. A non-placeholder value passes through; a placeholder with
/// nothing to resolve against returns `None` (the token is dropped).
pub fn resolve_placeholder(value: &str, prev: &SlotMap) -> Option<String> {
    if !is_placeholder(value) {
        return Some(value.to_string());
    }
    slots::primary_location(prev).map(str::to_owned)
}

/// Normalize a router slot delta against the prior slot map.
///
/// - empty-string values are dropped,
/// - placeholder tokens in location keys resolve against the prior
///   primary location, or drop when nothing is there to resolve,
/// - for `flights`, a placeholder in `originCity`/`destinationCity`
///   resolves the same way, and the prior origin/destination survive
///   unless the delta explicitly overwrites them (merge semantics),
/// - temporal tokens in time keys are preserved verbatim.
pub fn normalize_slots(prev: &SlotMap, incoming: &SlotMap, intent: Intent) -> SlotMap {
    let mut out = SlotMap::new();

    for (key, value) in incoming {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        let is_location = slots::LOCATION_KEYS.contains(&key.as_str());
        if is_location {
            match resolve_placeholder(value, prev) {
                Some(resolved) => {
                    out.insert(key.clone(), resolved);
                }
                None => {
                    tracing::debug!(key = %key, "dropping unresolvable placeholder slot");
                }
            }
            continue;
        }

        out.insert(key.clone(), value.to_string());
    }

    // Flight turns often re-state only one endpoint; make sure a bare
    // "city" does not shadow an explicit destination.
    if intent == Intent::Flights
        && out.contains_key(slots::CITY)
        && (out.contains_key(slots::DESTINATION_CITY) || prev.contains_key(slots::DESTINATION_CITY))
    {
        out.remove(slots::CITY);
    }

    out
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SlotMemory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The turn driver's handle on per-thread state. The driver is the only
/// component that persists slot changes; router and gate return deltas.
#[derive(Clone)]
pub struct SlotMemory {
    backend: Arc<dyn SessionBackend>,
}

impl SlotMemory {
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn SessionBackend> {
        &self.backend
    }

    pub async fn slots(&self, thread_id: &str) -> Result<SlotMap> {
        self.backend.get_slots(thread_id).await
    }

    /// Merge a normalized delta and delete `del` keys in one call.
    pub async fn merge(&self, thread_id: &str, put: SlotMap, del: &[String]) -> Result<()> {
        self.backend.set_slots(thread_id, put, del).await
    }

    pub async fn history(&self, thread_id: &str, limit: usize) -> Result<Vec<Message>> {
        self.backend.get_msgs(thread_id, Some(limit)).await
    }

    pub async fn record(&self, thread_id: &str, msg: Message, cap: usize) -> Result<()> {
        self.backend.append_msg(thread_id, msg, cap).await
    }

    /// Delete every consent / clarification / complexity key, leaving the
    /// rest of the slot map untouched.
    pub async fn clear_consent_state(&self, thread_id: &str) -> Result<()> {
        let current = self.backend.get_slots(thread_id).await?;
        let del: Vec<String> = current
            .keys()
            .filter(|k| slots::is_consent_key(k))
            .cloned()
            .collect();
        if del.is_empty() {
            return Ok(());
        }
        self.backend.set_slots(thread_id, SlotMap::new(), &del).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemorySessionStore;
    use wf_domain::config::SessionConfig;

    fn map(pairs: &[(&str, &str)]) -> SlotMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn temporal_references() {
        for s in ["today", "Tomorrow", "THIS WEEKEND", "next month", " now "] {
            assert!(is_temporal_reference(s), "{s} should be temporal");
        }
        for s in ["June", "2026-08-01", "in two weeks", ""] {
            assert!(!is_temporal_reference(s), "{s} should not be temporal");
        }
    }

    #[test]
    fn placeholder_resolves_by_precedence() {
        let prev = map(&[("country", "Japan"), ("originCity", "Osaka")]);
        assert_eq!(resolve_placeholder("there", &prev).as_deref(), Some("Japan"));

        let prev = map(&[("city", "Kyoto"), ("country", "Japan")]);
        assert_eq!(resolve_placeholder("same place", &prev).as_deref(), Some("Kyoto"));
    }

    #[test]
    fn placeholder_with_no_prior_location_drops() {
        assert_eq!(resolve_placeholder("there", &SlotMap::new()), None);
        let out = normalize_slots(&SlotMap::new(), &map(&[("city", "there")]), Intent::Weather);
        assert!(out.is_empty());
    }

    #[test]
    fn concrete_values_pass_through() {
        assert_eq!(
            resolve_placeholder("Lisbon", &SlotMap::new()).as_deref(),
            Some("Lisbon")
        );
    }

    #[test]
    fn normalize_drops_empty_and_whitespace() {
        let out = normalize_slots(
            &SlotMap::new(),
            &map(&[("city", "  "), ("month", "June")]),
            Intent::Weather,
        );
        assert_eq!(out, map(&[("month", "June")]));
    }

    #[test]
    fn normalize_resolves_location_placeholder() {
        let prev = map(&[("city", "Paris")]);
        let out = normalize_slots(&prev, &map(&[("city", "there")]), Intent::Packing);
        assert_eq!(out.get("city").map(String::as_str), Some("Paris"));
    }

    #[test]
    fn flights_city_does_not_shadow_destination() {
        let prev = map(&[("destinationCity", "LON"), ("originCity", "NYC")]);
        let out = normalize_slots(&prev, &map(&[("city", "London")]), Intent::Flights);
        assert!(!out.contains_key("city"));

        // Without any destination in sight, city is kept.
        let out = normalize_slots(&SlotMap::new(), &map(&[("city", "London")]), Intent::Flights);
        assert!(out.contains_key("city"));
    }

    #[test]
    fn temporal_tokens_survive_normalization() {
        let out = normalize_slots(
            &SlotMap::new(),
            &map(&[("departureDate", "tomorrow")]),
            Intent::Flights,
        );
        assert_eq!(out.get("departureDate").map(String::as_str), Some("tomorrow"));
    }

    #[tokio::test]
    async fn clear_consent_state_leaves_other_slots() {
        let backend = Arc::new(MemorySessionStore::new(&SessionConfig::default()));
        let mem = SlotMemory::new(backend);
        mem.merge(
            "t1",
            map(&[
                ("city", "Rome"),
                ("awaiting_deep_research_consent", "true"),
                ("pending_deep_research_query", "plan a trip"),
                ("complexity_score", "0.8"),
                ("clarification_options", "a|b"),
            ]),
            &[],
        )
        .await
        .unwrap();

        mem.clear_consent_state("t1").await.unwrap();
        let slots = mem.slots("t1").await.unwrap();
        assert_eq!(slots, map(&[("city", "Rome")]));
    }
}
