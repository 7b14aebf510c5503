use serde::{Deserialize, Serialize};

use super::{env_opt, env_str, env_u64};

/// Endpoints, credentials, and deadlines for the outbound tool catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Minimum spacing between outbound call starts per provider family, ms.
    #[serde(default = "d_min_spacing_ms")]
    pub min_spacing_ms: u64,

    // ── Weather / geocoding ───────────────────────────────────────
    #[serde(default = "d_weather_base_url")]
    pub weather_base_url: String,
    #[serde(default = "d_geocode_base_url")]
    pub geocode_base_url: String,
    #[serde(default = "d_weather_timeout_ms")]
    pub weather_timeout_ms: u64,

    // ── Country facts ─────────────────────────────────────────────
    #[serde(default = "d_country_base_url")]
    pub country_base_url: String,

    // ── Attractions ───────────────────────────────────────────────
    #[serde(default = "d_attractions_base_url")]
    pub attractions_base_url: String,
    #[serde(default)]
    pub attractions_api_key: Option<String>,
    #[serde(default = "d_attractions_timeout_ms")]
    pub attractions_timeout_ms: u64,

    // ── Amadeus (flights) ─────────────────────────────────────────
    #[serde(default = "d_amadeus_base_url")]
    pub amadeus_base_url: String,
    #[serde(default)]
    pub amadeus_client_id: Option<String>,
    #[serde(default)]
    pub amadeus_client_secret: Option<String>,
    #[serde(default = "d_flights_timeout_ms")]
    pub flights_timeout_ms: u64,

    // ── Web search / deep research ────────────────────────────────
    #[serde(default)]
    pub search_base_url: Option<String>,
    #[serde(default)]
    pub search_api_key: Option<String>,
    #[serde(default = "d_search_timeout_ms")]
    pub search_timeout_ms: u64,
    #[serde(default)]
    pub research_base_url: Option<String>,
    #[serde(default = "d_research_timeout_ms")]
    pub research_timeout_ms: u64,

    // ── Policy knowledge base + page extraction ───────────────────
    #[serde(default)]
    pub vectara_base_url: Option<String>,
    #[serde(default)]
    pub vectara_api_key: Option<String>,
    #[serde(default)]
    pub crawler_base_url: Option<String>,
    /// Clamped to [2s, 90s] at read time.
    #[serde(default = "d_policy_timeout_ms")]
    pub policy_timeout_ms: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            min_spacing_ms: d_min_spacing_ms(),
            weather_base_url: d_weather_base_url(),
            geocode_base_url: d_geocode_base_url(),
            weather_timeout_ms: d_weather_timeout_ms(),
            country_base_url: d_country_base_url(),
            attractions_base_url: d_attractions_base_url(),
            attractions_api_key: None,
            attractions_timeout_ms: d_attractions_timeout_ms(),
            amadeus_base_url: d_amadeus_base_url(),
            amadeus_client_id: None,
            amadeus_client_secret: None,
            flights_timeout_ms: d_flights_timeout_ms(),
            search_base_url: None,
            search_api_key: None,
            search_timeout_ms: d_search_timeout_ms(),
            research_base_url: None,
            research_timeout_ms: d_research_timeout_ms(),
            vectara_base_url: None,
            vectara_api_key: None,
            crawler_base_url: None,
            policy_timeout_ms: d_policy_timeout_ms(),
        }
    }
}

impl ToolsConfig {
    pub fn from_env() -> Self {
        Self {
            min_spacing_ms: env_u64("TOOL_MIN_SPACING_MS", d_min_spacing_ms()),
            weather_base_url: env_str("WEATHER_BASE_URL", &d_weather_base_url()),
            geocode_base_url: env_str("GEOCODE_BASE_URL", &d_geocode_base_url()),
            weather_timeout_ms: env_u64("WEATHER_TIMEOUT_MS", d_weather_timeout_ms()),
            country_base_url: env_str("COUNTRY_BASE_URL", &d_country_base_url()),
            attractions_base_url: env_str("ATTRACTIONS_BASE_URL", &d_attractions_base_url()),
            attractions_api_key: env_opt("ATTRACTIONS_API_KEY"),
            attractions_timeout_ms: env_u64("ATTRACTIONS_TIMEOUT_MS", d_attractions_timeout_ms()),
            amadeus_base_url: env_str("AMADEUS_BASE_URL", &d_amadeus_base_url()),
            amadeus_client_id: env_opt("AMADEUS_CLIENT_ID"),
            amadeus_client_secret: env_opt("AMADEUS_CLIENT_SECRET"),
            flights_timeout_ms: env_u64("FLIGHTS_TIMEOUT_MS", d_flights_timeout_ms()),
            search_base_url: env_opt("SEARCH_BASE_URL"),
            search_api_key: env_opt("SEARCH_API_KEY"),
            search_timeout_ms: env_u64("SEARCH_TIMEOUT_MS", d_search_timeout_ms()),
            research_base_url: env_opt("RESEARCH_BASE_URL"),
            research_timeout_ms: env_u64("DEEP_RESEARCH_TIMEOUT_MS", d_research_timeout_ms()),
            vectara_base_url: env_opt("VECTARA_BASE_URL"),
            vectara_api_key: env_opt("VECTARA_API_KEY"),
            crawler_base_url: env_opt("CRAWLER_BASE_URL"),
            policy_timeout_ms: env_u64("POLICY_TIMEOUT_MS", d_policy_timeout_ms()),
        }
    }

    /// The policy-extraction deadline, clamped to its contract bounds.
    pub fn policy_timeout_clamped_ms(&self) -> u64 {
        self.policy_timeout_ms.clamp(2_000, 90_000)
    }
}

fn d_min_spacing_ms() -> u64 {
    100
}
fn d_weather_base_url() -> String {
    "https://api.open-meteo.com".into()
}
fn d_geocode_base_url() -> String {
    "https://geocoding-api.open-meteo.com".into()
}
fn d_weather_timeout_ms() -> u64 {
    7_000
}
fn d_country_base_url() -> String {
    "https://restcountries.com".into()
}
fn d_attractions_base_url() -> String {
    "https://api.opentripmap.com".into()
}
fn d_attractions_timeout_ms() -> u64 {
    8_000
}
fn d_amadeus_base_url() -> String {
    "https://test.api.amadeus.com".into()
}
fn d_flights_timeout_ms() -> u64 {
    12_000
}
fn d_search_timeout_ms() -> u64 {
    9_000
}
fn d_research_timeout_ms() -> u64 {
    15_000
}
fn d_policy_timeout_ms() -> u64 {
    30_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_timeout_is_clamped() {
        let mut cfg = ToolsConfig::default();
        cfg.policy_timeout_ms = 1;
        assert_eq!(cfg.policy_timeout_clamped_ms(), 2_000);
        cfg.policy_timeout_ms = 500_000;
        assert_eq!(cfg.policy_timeout_clamped_ms(), 90_000);
        cfg.policy_timeout_ms = 30_000;
        assert_eq!(cfg.policy_timeout_clamped_ms(), 30_000);
    }
}
