//! Intent routing and slot extraction.
//!
//! A guard pipeline where the first stage that returns wins: empty
//! guard, consent-state handling, flight clarification, flight
//! fast-path, complexity gate, lightweight keyword classifier, LLM
//! router. Slot-producing results then pass through the post stages:
//! context-switch detection, explicit-city guard, intent override,
//! flight slot enhancement, low-confidence correction, and search-query
//! synthesis.
//!
//! The router never writes the session store. It returns a slot delta
//! plus a reset-set; the driver is the sole persister.

use std::sync::OnceLock;

use regex::Regex;

use wf_domain::config::TurnConfig;
use wf_domain::route::{Intent, RouterResult};
use wf_domain::slots::{self, SlotMap};
use wf_sessions::is_temporal_reference;

use crate::metrics::Metrics;

use super::classify::{Classifiers, ConsentAnswer};
use super::gate::{self, ComplexityVerdict};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outcome types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A routed turn: the verdict plus the slot keys to delete before the
/// delta is merged.
#[derive(Debug)]
pub struct RoutedTurn {
    pub result: RouterResult,
    pub resets: Vec<String>,
    pub decisions: Vec<String>,
}

#[derive(Debug)]
pub enum RouteOutcome {
    /// An earlier turn parked on deep-research consent; this message
    /// answers it.
    Consent(ConsentAnswer),
    /// Park this turn: ask the user before running expensive research.
    ConsentRequest { verdict: ComplexityVerdict },
    Routed(RoutedTurn),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn route_turn(
    message: &str,
    prev_slots: &SlotMap,
    classifiers: &Classifiers,
    config: &TurnConfig,
    metrics: &Metrics,
) -> RouteOutcome {
    let mut decisions = Vec::new();

    // 1. Empty guard.
    if message.trim().is_empty() {
        return RouteOutcome::Routed(RoutedTurn {
            result: RouterResult::new(Intent::Unknown, 0.1),
            resets: Vec::new(),
            decisions: vec!["route:empty_message".into()],
        });
    }

    // 2. Consent-state handling.
    if prev_slots
        .get(slots::AWAITING_DEEP_RESEARCH_CONSENT)
        .map(String::as_str)
        == Some("true")
    {
        let answer = classifiers.consent_reply(message).await;
        tracing::debug!(?answer, "consent reply classified");
        return RouteOutcome::Consent(answer);
    }

    // 3. Flight clarification.
    if prev_slots
        .get(slots::AWAITING_FLIGHT_CLARIFICATION)
        .map(String::as_str)
        == Some("true")
    {
        let clarification_resets: Vec<String> = vec![
            slots::AWAITING_FLIGHT_CLARIFICATION.into(),
            slots::PENDING_FLIGHT_CLARIFICATION_QUERY.into(),
            slots::CLARIFICATION_OPTIONS.into(),
            slots::CLARIFICATION_REASONING.into(),
        ];
        match interpret_flight_clarification(message) {
            FlightClarification::DirectSearch => {
                decisions.push("route:flight_clarification=direct_search".into());
                let mut result = RouterResult::new(Intent::Flights, 0.9);
                result.slots = classifiers.flight_slots(message).await;
                return RouteOutcome::Routed(RoutedTurn {
                    result,
                    resets: clarification_resets,
                    decisions,
                });
            }
            FlightClarification::WebResearch => {
                decisions.push("route:flight_clarification=web_research".into());
                let query = prev_slots
                    .get(slots::PENDING_FLIGHT_CLARIFICATION_QUERY)
                    .cloned()
                    .unwrap_or_else(|| message.to_owned());
                let result =
                    RouterResult::new(Intent::WebSearch, 0.85).with_slot(slots::SEARCH_QUERY, query);
                return RouteOutcome::Routed(RoutedTurn {
                    result,
                    resets: clarification_resets,
                    decisions,
                });
            }
            FlightClarification::Ambiguous => {
                decisions.push("route:flight_clarification=ambiguous".into());
                // Fall through to normal routing; the flag still clears.
                // The resets ride along on whatever the pipeline decides.
                let mut outcome =
                    route_message(message, prev_slots, classifiers, config, metrics, decisions)
                        .await;
                if let RouteOutcome::Routed(ref mut routed) = outcome {
                    routed.resets.extend(clarification_resets);
                }
                return outcome;
            }
        }
    }

    route_message(message, prev_slots, classifiers, config, metrics, decisions).await
}

/// Stages 4–7 plus the post pipeline.
async fn route_message(
    message: &str,
    prev_slots: &SlotMap,
    classifiers: &Classifiers,
    config: &TurnConfig,
    metrics: &Metrics,
    mut decisions: Vec<String>,
) -> RouteOutcome {
    // 4. Flight fast-path.
    if let Some(flight_slots) = flight_fast_path(message) {
        decisions.push("route:flight_fast_path".into());
        let mut result = RouterResult::new(Intent::Flights, 0.95);
        result.slots = flight_slots;
        let routed = post_route(message, prev_slots, result, classifiers, metrics, decisions).await;
        return RouteOutcome::Routed(routed);
    }

    // 5. Complexity gate.
    if config.deep_research_enabled {
        let verdict = gate::assess(message, classifiers).await;
        if verdict.is_complex && verdict.confidence >= 0.75 {
            tracing::info!(
                confidence = verdict.confidence,
                "complex turn parked for deep-research consent"
            );
            return RouteOutcome::ConsentRequest { verdict };
        }
    }

    // 6. Lightweight keyword classifier.
    let preliminary = match lightweight_classify(message) {
        Some(result) if result.confidence >= 0.7 => {
            decisions.push(format!("route:lightweight={}", result.intent));
            Some(result)
        }
        _ => None,
    };

    // 7. LLM router.
    let result = match preliminary {
        Some(result) => result,
        None => match classifiers.llm_router(message, prev_slots).await {
            Some((intent, confidence, llm_slots)) => {
                decisions.push(format!("route:llm={intent}"));
                let mut result = RouterResult::new(intent, confidence);
                result.slots = llm_slots;
                result
            }
            None => {
                decisions.push("route:llm_unavailable".into());
                RouterResult::new(Intent::Unknown, 0.2)
            }
        },
    };

    let routed = post_route(message, prev_slots, result, classifiers, metrics, decisions).await;
    RouteOutcome::Routed(routed)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Post stages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn post_route(
    message: &str,
    prev_slots: &SlotMap,
    mut result: RouterResult,
    classifiers: &Classifiers,
    metrics: &Metrics,
    mut decisions: Vec<String>,
) -> RoutedTurn {
    let mut resets = Vec::new();

    // a. Context-switch detection + stale-guard.
    let prev_location = slots::primary_location(prev_slots).map(str::to_owned);
    let new_location = slots::primary_location(&result.slots).map(str::to_owned);
    let switched = match (&prev_location, &new_location) {
        (Some(prev), Some(new)) => !locations_match(prev, new),
        (Some(prev), None) => classifiers
            .context_switched(prev, message)
            .await
            .unwrap_or(false),
        _ => false,
    };

    if switched {
        decisions.push("slots:context_switch_reset".into());
        for key in slots::LOCATION_KEYS
            .iter()
            .chain(slots::TIME_KEYS.iter())
            .chain(slots::PROFILE_KEYS.iter())
        {
            resets.push((*key).to_string());
        }
        for key in prev_slots.keys().filter(|k| slots::is_consent_key(k)) {
            resets.push(key.clone());
        }
    } else {
        // Stale-guard: drop time/profile carried from earlier turns when
        // the new turn brings no fresh signal of its own.
        let fresh_time = slots::TIME_KEYS.iter().any(|k| result.slots.contains_key(*k))
            || has_time_signal(message);
        if !fresh_time {
            for key in slots::TIME_KEYS.iter().filter(|k| prev_slots.contains_key(**k)) {
                resets.push((*key).to_string());
                decisions.push(format!("slots:stale_time_dropped:{key}"));
            }
        }
        let fresh_profile = slots::PROFILE_KEYS.iter().any(|k| result.slots.contains_key(*k));
        if !fresh_profile {
            for key in slots::PROFILE_KEYS.iter().filter(|k| prev_slots.contains_key(**k)) {
                resets.push((*key).to_string());
            }
        }
    }

    // b. Explicit-city guard: drop a city nothing confirms.
    if let Some(city) = result.slots.get(slots::CITY).cloned() {
        let in_message = contains_ci(message, &city);
        let in_prior = prev_slots
            .get(slots::CITY)
            .map(|p| locations_match(p, &city))
            .unwrap_or(false);
        let confirmed = in_message
            || in_prior
            || matches!(classifiers.parse_city(message).await, Some(parsed) if locations_match(&parsed, &city));
        if !confirmed {
            decisions.push(format!("slots:unconfirmed_city_dropped:{city}"));
            result.slots.remove(slots::CITY);
        }
    }

    // c. Intent override: weather wording wins over a flights guess.
    if result.intent == Intent::Flights && has_weather_cue(message) && !has_flight_cue(message) {
        decisions.push("route:override_flights_to_weather".into());
        result.intent = Intent::Weather;
    }

    // d. Flight slot enhancement.
    if result.intent == Intent::Flights {
        let extracted = classifiers.flight_slots(message).await;
        for (k, v) in extracted {
            result.slots.entry(k).or_insert(v);
        }
    }

    // e. Correction pass for low confidence.
    if result.confidence < 0.6 || result.intent == Intent::Unknown {
        metrics.inc_low_conf(result.intent.as_str());
        if let Some((intent, confidence)) = classifiers.second_intent(message).await {
            if confidence >= 0.75 && intent != Intent::Unknown {
                decisions.push(format!("route:corrected_to={intent}"));
                result.intent = intent;
                result.confidence = confidence;
                result.need_external = !matches!(intent, Intent::System | Intent::Unknown);
            }
        }
    }

    // f. Search-query synthesis.
    if result.intent == Intent::WebSearch
        && !result.slots.contains_key(slots::SEARCH_QUERY)
        && !prev_slots.contains_key(slots::SEARCH_QUERY)
    {
        let query = classifiers
            .optimize_query(message)
            .await
            .unwrap_or_else(|| message.to_owned());
        result.slots.insert(slots::SEARCH_QUERY.to_owned(), query);
    }

    RoutedTurn {
        result,
        resets,
        decisions,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Flight clarification
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

enum FlightClarification {
    DirectSearch,
    WebResearch,
    Ambiguous,
}

fn interpret_flight_clarification(message: &str) -> FlightClarification {
    let lowered = message.to_lowercase();
    let direct = ["direct", "search", "book", "first option", "option 1", "just search"];
    let web = ["research", "web", "online", "look up", "second option", "option 2"];
    let hits_direct = direct.iter().any(|k| lowered.contains(k));
    let hits_web = web.iter().any(|k| lowered.contains(k));
    match (hits_direct, hits_web) {
        (true, false) => FlightClarification::DirectSearch,
        (false, true) => FlightClarification::WebResearch,
        _ => FlightClarification::Ambiguous,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Flight fast-path
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn fast_path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bflights?\b[^.!?]*\bfrom\s+(.+?)\s+to\s+(.+)").expect("static pattern")
    })
}

fn iso_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static pattern"))
}

/// "flights from X to Y [date]" → origin/destination[/departureDate].
/// Relative date words stay verbatim.
pub fn flight_fast_path(message: &str) -> Option<SlotMap> {
    let trimmed = message.trim().trim_end_matches(['?', '.', '!']);
    let caps = fast_path_re().captures(trimmed)?;
    let origin = caps[1].trim().to_owned();
    let mut destination = caps[2].trim().to_owned();
    let mut departure: Option<String> = None;

    // Peel a trailing date expression off the destination: a two-word
    // temporal ("next week"), a one-word temporal ("tomorrow"), or an
    // ISO date.
    let words: Vec<&str> = destination.split_whitespace().collect();
    for take in [2usize, 1] {
        if words.len() > take {
            let tail = words[words.len() - take..].join(" ");
            if is_temporal_reference(&tail) || (take == 1 && iso_date_re().is_match(&tail)) {
                departure = Some(tail);
                destination = words[..words.len() - take].join(" ");
                break;
            }
        }
    }

    if origin.is_empty() || destination.is_empty() {
        return None;
    }

    let mut out = SlotMap::new();
    out.insert(slots::ORIGIN_CITY.to_owned(), origin);
    out.insert(slots::DESTINATION_CITY.to_owned(), destination);
    if let Some(d) = departure {
        out.insert(slots::DEPARTURE_DATE.to_owned(), d);
    }
    Some(out)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Lightweight keyword classifier
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn city_entity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:in|at|about|near|around)\s+([A-ZÀ-Þ][a-zA-Zà-ÿ'\-]+(?:\s+[A-ZÀ-Þ][a-zA-Zà-ÿ'\-]+)?)")
            .expect("static pattern")
    })
}

fn month_entity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // A preposition keeps the modal verb "may" from reading as a month.
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:in|for|during|next|this)\s+(january|february|march|april|may|june|july|august|september|october|november|december)\b")
            .expect("static pattern")
    })
}

/// Local intent + entity model: keyword match with fixed confidences,
/// regex entity extraction. No network.
pub fn lightweight_classify(message: &str) -> Option<RouterResult> {
    let lowered = message.to_lowercase();

    let (intent, confidence) = if has_flight_cue(message) {
        (Intent::Flights, 0.8)
    } else if has_weather_cue(message) {
        (Intent::Weather, 0.85)
    } else if contains_any(&lowered, &["pack", "packing", "suitcase", "luggage", "what to wear", "what should i bring"]) {
        (Intent::Packing, 0.8)
    } else if contains_any(&lowered, &["visa", "passport", "baggage policy", "entry requirement", "customs", "allowance"]) {
        (Intent::Policy, 0.8)
    } else if contains_any(&lowered, &["attraction", "things to do", "what to see", "sights", "museum", "worth visiting"]) {
        (Intent::Attractions, 0.75)
    } else if contains_any(&lowered, &["where should i go", "where to go", "destination idea", "recommend a place", "suggest somewhere"]) {
        (Intent::Destinations, 0.75)
    } else {
        return None;
    };

    let mut result = RouterResult::new(intent, confidence);
    if let Some(caps) = city_entity_re().captures(message) {
        result = result.with_slot(slots::CITY, caps[1].trim());
    }
    if let Some(caps) = month_entity_re().captures(message) {
        let month = caps[1].to_lowercase();
        let mut chars = month.chars();
        let capitalized = match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => month,
        };
        result = result.with_slot(slots::MONTH, capitalized);
    }
    Some(result)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Cue + comparison helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

pub fn has_weather_cue(message: &str) -> bool {
    contains_any(
        &message.to_lowercase(),
        &["weather", "forecast", "temperature", "rain", "sunny", "climate", "how hot", "how cold"],
    )
}

pub fn has_flight_cue(message: &str) -> bool {
    contains_any(&message.to_lowercase(), &["flight", "fly ", "flying", "airfare", "plane ticket"])
}

fn has_time_signal(message: &str) -> bool {
    month_entity_re().is_match(message)
        || message
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .windows(2)
            .any(|w| is_temporal_reference(&w.join(" ")))
        || message.split_whitespace().any(is_temporal_reference)
}

/// Fold whitespace, case, and common diacritics for location compare.
fn normalize_location(s: &str) -> String {
    s.chars()
        .filter_map(|c| {
            let folded = match c {
                'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
                'è' | 'é' | 'ê' | 'ë' => 'e',
                'ì' | 'í' | 'î' | 'ï' => 'i',
                'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => 'o',
                'ù' | 'ú' | 'û' | 'ü' => 'u',
                'ñ' => 'n',
                'ç' => 'c',
                'ß' => 's',
                other => other,
            };
            let lowered = folded.to_ascii_lowercase();
            lowered.is_alphanumeric().then_some(lowered)
        })
        .collect()
}

pub fn locations_match(a: &str, b: &str) -> bool {
    let (a, b) = (
        normalize_location(&a.to_lowercase()),
        normalize_location(&b.to_lowercase()),
    );
    !a.is_empty() && a == b
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_path_extracts_cities_and_relative_date() {
        let slots_map = flight_fast_path("flights from NYC to LON tomorrow").unwrap();
        assert_eq!(slots_map.get("originCity").map(String::as_str), Some("NYC"));
        assert_eq!(slots_map.get("destinationCity").map(String::as_str), Some("LON"));
        assert_eq!(slots_map.get("departureDate").map(String::as_str), Some("tomorrow"));
    }

    #[test]
    fn fast_path_two_word_temporal() {
        let slots_map = flight_fast_path("any flights from Tel Aviv to Rome next week?").unwrap();
        assert_eq!(slots_map.get("originCity").map(String::as_str), Some("Tel Aviv"));
        assert_eq!(slots_map.get("destinationCity").map(String::as_str), Some("Rome"));
        assert_eq!(slots_map.get("departureDate").map(String::as_str), Some("next week"));
    }

    #[test]
    fn fast_path_iso_date() {
        let slots_map = flight_fast_path("flight from Oslo to Paris 2026-08-12").unwrap();
        assert_eq!(slots_map.get("departureDate").map(String::as_str), Some("2026-08-12"));
    }

    #[test]
    fn fast_path_without_date() {
        let slots_map = flight_fast_path("flights from Boston to Denver").unwrap();
        assert!(!slots_map.contains_key("departureDate"));
        assert_eq!(slots_map.get("destinationCity").map(String::as_str), Some("Denver"));
    }

    #[test]
    fn fast_path_requires_flight_word() {
        assert!(flight_fast_path("trains from Boston to Denver").is_none());
        assert!(flight_fast_path("weather in Paris").is_none());
    }

    #[test]
    fn lightweight_weather_with_city_and_month() {
        let result = lightweight_classify("weather in Paris in June?").unwrap();
        assert_eq!(result.intent, Intent::Weather);
        assert!(result.confidence >= 0.7);
        assert_eq!(result.slots.get("city").map(String::as_str), Some("Paris"));
        assert_eq!(result.slots.get("month").map(String::as_str), Some("June"));
    }

    #[test]
    fn lightweight_unmatched_returns_none() {
        assert!(lightweight_classify("what about Tokyo?").is_none());
    }

    #[test]
    fn lightweight_policy() {
        let result = lightweight_classify("do I need a visa for Japan?").unwrap();
        assert_eq!(result.intent, Intent::Policy);
    }

    #[test]
    fn location_match_is_diacritic_and_space_insensitive() {
        assert!(locations_match("São Paulo", "sao paulo"));
        assert!(locations_match("Zürich", "zurich"));
        assert!(locations_match("New York", "newyork"));
        assert!(!locations_match("Paris", "Tokyo"));
        assert!(!locations_match("", ""));
    }

    #[test]
    fn weather_cue_does_not_fire_on_flight_talk() {
        assert!(has_weather_cue("how hot is it in Rome"));
        assert!(!has_weather_cue("book a flight to Rome"));
        assert!(has_flight_cue("book a flight to Rome"));
    }

    #[test]
    fn clarification_keywords() {
        assert!(matches!(
            interpret_flight_clarification("just search for flights"),
            FlightClarification::DirectSearch
        ));
        assert!(matches!(
            interpret_flight_clarification("do the web research instead"),
            FlightClarification::WebResearch
        ));
        assert!(matches!(
            interpret_flight_clarification("hmm not sure"),
            FlightClarification::Ambiguous
        ));
    }

    #[test]
    fn time_signal_detection() {
        assert!(has_time_signal("weather in June"));
        assert!(has_time_signal("leaving tomorrow"));
        assert!(has_time_signal("going next week"));
        assert!(!has_time_signal("what about the museums"));
    }
}
