//! Slot-key vocabulary shared by the router, slot memory, and driver.
//!
//! Slots are plain string key/value pairs persisted per thread. An absent
//! key means "unknown"; empty-string values are never stored.

use std::collections::BTreeMap;

/// The slot map for one thread. `BTreeMap` keeps iteration deterministic.
pub type SlotMap = BTreeMap<String, String>;

// ── Location ──────────────────────────────────────────────────────
pub const CITY: &str = "city";
pub const DESTINATION_CITY: &str = "destinationCity";
pub const ORIGIN_CITY: &str = "originCity";
pub const COUNTRY: &str = "country";
pub const REGION: &str = "region";

// ── Time ──────────────────────────────────────────────────────────
pub const MONTH: &str = "month";
pub const DATES: &str = "dates";
pub const DEPARTURE_DATE: &str = "departureDate";
pub const RETURN_DATE: &str = "returnDate";
pub const TRAVEL_WINDOW: &str = "travelWindow";
pub const SEASON: &str = "season";

// ── Profile ───────────────────────────────────────────────────────
pub const TRAVELER_PROFILE: &str = "travelerProfile";
pub const TRAVEL_STYLE: &str = "travelStyle";
pub const GROUP_TYPE: &str = "groupType";
pub const BUDGET_LEVEL: &str = "budgetLevel";
pub const ACTIVITY_TYPE: &str = "activityType";

// ── Consent / clarification ───────────────────────────────────────
pub const AWAITING_DEEP_RESEARCH_CONSENT: &str = "awaiting_deep_research_consent";
pub const PENDING_DEEP_RESEARCH_QUERY: &str = "pending_deep_research_query";
pub const AWAITING_FLIGHT_CLARIFICATION: &str = "awaiting_flight_clarification_consent";
pub const PENDING_FLIGHT_CLARIFICATION_QUERY: &str = "pending_flight_clarification_query";
pub const CLARIFICATION_OPTIONS: &str = "clarification_options";
pub const CLARIFICATION_REASONING: &str = "clarification_reasoning";

// ── Aux ───────────────────────────────────────────────────────────
pub const COMPLEXITY_SCORE: &str = "complexity_score";
pub const COMPLEXITY_REASONING: &str = "complexity_reasoning";
pub const SEARCH_QUERY: &str = "search_query";

/// Location keys in placeholder-resolution precedence order.
pub const LOCATION_PRECEDENCE: [&str; 5] = [CITY, DESTINATION_CITY, COUNTRY, ORIGIN_CITY, REGION];

/// All location keys (reset together on a context switch).
pub const LOCATION_KEYS: [&str; 5] = [CITY, DESTINATION_CITY, ORIGIN_CITY, COUNTRY, REGION];

/// All time keys.
pub const TIME_KEYS: [&str; 6] = [MONTH, DATES, DEPARTURE_DATE, RETURN_DATE, TRAVEL_WINDOW, SEASON];

/// All traveler-profile keys.
pub const PROFILE_KEYS: [&str; 5] = [
    TRAVELER_PROFILE,
    TRAVEL_STYLE,
    GROUP_TYPE,
    BUDGET_LEVEL,
    ACTIVITY_TYPE,
];

/// True if `key` is part of the consent / clarification state machine.
pub fn is_consent_key(key: &str) -> bool {
    key.starts_with("awaiting_") && key.ends_with("_consent")
        || key.starts_with("pending_") && key.ends_with("_query")
        || key.starts_with("complexity_")
        || key == CLARIFICATION_OPTIONS
        || key == CLARIFICATION_REASONING
}

/// The primary location in a slot map, by precedence.
pub fn primary_location(slots: &SlotMap) -> Option<&str> {
    LOCATION_PRECEDENCE
        .iter()
        .find_map(|k| slots.get(*k).map(|v| v.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consent_keys_recognized() {
        assert!(is_consent_key(AWAITING_DEEP_RESEARCH_CONSENT));
        assert!(is_consent_key(PENDING_DEEP_RESEARCH_QUERY));
        assert!(is_consent_key("awaiting_web_search_consent"));
        assert!(is_consent_key(COMPLEXITY_SCORE));
        assert!(is_consent_key(CLARIFICATION_OPTIONS));
        assert!(!is_consent_key(CITY));
        assert!(!is_consent_key(MONTH));
    }

    #[test]
    fn primary_location_follows_precedence() {
        let mut slots = SlotMap::new();
        slots.insert(REGION.into(), "Tuscany".into());
        slots.insert(COUNTRY.into(), "Italy".into());
        assert_eq!(primary_location(&slots), Some("Italy"));

        slots.insert(CITY.into(), "Florence".into());
        assert_eq!(primary_location(&slots), Some("Florence"));
    }

    #[test]
    fn primary_location_empty_map() {
        assert_eq!(primary_location(&SlotMap::new()), None);
    }
}
