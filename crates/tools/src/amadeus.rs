//! The Amadeus flight stack: `amadeusResolveCity`,
//! `amadeusAirportsForCity`, and `amadeusSearchFlights`.
//!
//! All three share one OAuth client-credentials token, cached until
//! shortly before expiry. The token POST is never retried; the data GETs
//! go through the shared retrying GET path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;

use wf_domain::config::ToolsConfig;
use wf_domain::{Error, Result};

use crate::{
    parse_args, Family, OutboundHttp, ToolCtx, ToolInvoker, ToolOutcome, ToolRegistry, ToolSpec,
    AMADEUS_AIRPORTS_FOR_CITY, AMADEUS_RESOLVE_CITY, AMADEUS_SEARCH_FLIGHTS,
};

/// Refresh the token this long before the server-side expiry.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

const SOURCE: &str = "amadeus.com";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Shared client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct CachedToken {
    token: String,
    expires_at: Instant,
}

struct AmadeusClient {
    outbound: Arc<OutboundHttp>,
    base_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    token: Mutex<Option<CachedToken>>,
}

impl AmadeusClient {
    fn new(cfg: &ToolsConfig, outbound: Arc<OutboundHttp>) -> Self {
        Self {
            outbound,
            base_url: cfg.amadeus_base_url.trim_end_matches('/').to_owned(),
            client_id: cfg.amadeus_client_id.clone(),
            client_secret: cfg.amadeus_client_secret.clone(),
            token: Mutex::new(None),
        }
    }

    async fn bearer(&self, ctx: &ToolCtx) -> Result<String> {
        if let Some(cached) = self.token.lock().as_ref() {
            if cached.expires_at > Instant::now() {
                return Ok(cached.token.clone());
            }
        }

        let (id, secret) = match (&self.client_id, &self.client_secret) {
            (Some(i), Some(s)) => (i.clone(), s.clone()),
            _ => {
                return Err(Error::Tool {
                    tool: "amadeus".into(),
                    reason: "AMADEUS_CLIENT_ID / AMADEUS_CLIENT_SECRET are not configured".into(),
                })
            }
        };

        let url = format!("{}/v1/security/oauth2/token", self.base_url);
        let json = self
            .outbound
            .post_form(
                Family::Amadeus,
                &url,
                &[
                    ("grant_type", "client_credentials".to_owned()),
                    ("client_id", id),
                    ("client_secret", secret),
                ],
                ctx,
            )
            .await?;

        let token = json
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Tool {
                tool: "amadeus".into(),
                reason: "token response missing access_token".into(),
            })?
            .to_owned();
        let expires_in = json.get("expires_in").and_then(Value::as_u64).unwrap_or(1_799);

        let expires_at = Instant::now() + Duration::from_secs(expires_in).saturating_sub(TOKEN_SLACK);
        *self.token.lock() = Some(CachedToken {
            token: token.clone(),
            expires_at,
        });
        Ok(token)
    }

    async fn get(&self, path: &str, query: &[(&str, String)], ctx: &ToolCtx) -> Result<Value> {
        let token = self.bearer(ctx).await?;
        let url = format!("{}{path}", self.base_url);
        self.outbound
            .get_json(
                Family::Amadeus,
                &url,
                query,
                &[("Authorization", format!("Bearer {token}"))],
                ctx,
            )
            .await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// amadeusResolveCity
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
struct ResolveCityArgs {
    keyword: String,
}

struct ResolveCityTool {
    client: Arc<AmadeusClient>,
}

#[async_trait]
impl ToolInvoker for ResolveCityTool {
    async fn invoke(&self, args: &Value, ctx: &ToolCtx) -> Result<ToolOutcome> {
        let args: ResolveCityArgs = parse_args(AMADEUS_RESOLVE_CITY, args)?;

        let json = self
            .client
            .get(
                "/v1/reference-data/locations/cities",
                &[("keyword", args.keyword.clone()), ("max", "1".into())],
                ctx,
            )
            .await?;

        let hit = json.pointer("/data/0").ok_or_else(|| Error::Tool {
            tool: AMADEUS_RESOLVE_CITY.into(),
            reason: format!("no city match for '{}'", args.keyword),
        })?;

        let code = hit.get("iataCode").and_then(Value::as_str).unwrap_or_default();
        let name = hit.get("name").and_then(Value::as_str).unwrap_or(&args.keyword);
        if code.is_empty() {
            return Err(Error::Tool {
                tool: AMADEUS_RESOLVE_CITY.into(),
                reason: format!("city '{name}' has no IATA code"),
            });
        }

        Ok(ToolOutcome::new(format!("{name} resolves to city code {code}"))
            .with_source(SOURCE)
            .with_payload(serde_json::json!({ "cityCode": code, "name": name })))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// amadeusAirportsForCity
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
struct AirportsArgs {
    #[serde(rename = "cityCode")]
    city_code: String,
}

struct AirportsTool {
    client: Arc<AmadeusClient>,
}

#[async_trait]
impl ToolInvoker for AirportsTool {
    async fn invoke(&self, args: &Value, ctx: &ToolCtx) -> Result<ToolOutcome> {
        let args: AirportsArgs = parse_args(AMADEUS_AIRPORTS_FOR_CITY, args)?;

        let json = self
            .client
            .get(
                "/v1/reference-data/locations",
                &[
                    ("subType", "AIRPORT".into()),
                    ("keyword", args.city_code.clone()),
                ],
                ctx,
            )
            .await?;

        let airports: Vec<String> = json
            .get("data")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|a| a.get("iataCode").and_then(Value::as_str))
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        if airports.is_empty() {
            return Err(Error::Tool {
                tool: AMADEUS_AIRPORTS_FOR_CITY.into(),
                reason: format!("no airports for city code '{}'", args.city_code),
            });
        }

        Ok(
            ToolOutcome::new(format!("Airports for {}: {}", args.city_code, airports.join(", ")))
                .with_source(SOURCE)
                .with_payload(serde_json::json!({ "airports": airports })),
        )
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// amadeusSearchFlights
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
struct SearchFlightsArgs {
    origin: String,
    destination: String,
    #[serde(rename = "departureDate")]
    departure_date: String,
    #[serde(rename = "returnDate", default)]
    return_date: Option<String>,
    #[serde(default = "d_adults")]
    adults: u32,
}

fn d_adults() -> u32 {
    1
}

/// Resolve relative date words the router preserves verbatim
/// ("tomorrow", "next week") into ISO dates at call time.
fn resolve_departure_date(raw: &str) -> String {
    let today = chrono::Utc::now().date_naive();
    match raw.trim().to_lowercase().as_str() {
        "today" | "now" | "tonight" | "this evening" | "this morning" => today.to_string(),
        "tomorrow" => (today + chrono::Duration::days(1)).to_string(),
        "this week" | "this weekend" => (today + chrono::Duration::days(3)).to_string(),
        "next week" => (today + chrono::Duration::days(7)).to_string(),
        "next month" => (today + chrono::Duration::days(30)).to_string(),
        _ => raw.trim().to_owned(),
    }
}

struct SearchFlightsTool {
    client: Arc<AmadeusClient>,
}

#[async_trait]
impl ToolInvoker for SearchFlightsTool {
    async fn invoke(&self, args: &Value, ctx: &ToolCtx) -> Result<ToolOutcome> {
        let args: SearchFlightsArgs = parse_args(AMADEUS_SEARCH_FLIGHTS, args)?;
        let departure = resolve_departure_date(&args.departure_date);

        let mut query = vec![
            ("originLocationCode", args.origin.to_uppercase()),
            ("destinationLocationCode", args.destination.to_uppercase()),
            ("departureDate", departure.clone()),
            ("adults", args.adults.to_string()),
            ("max", "5".to_owned()),
        ];
        if let Some(ref ret) = args.return_date {
            query.push(("returnDate", resolve_departure_date(ret)));
        }

        let json = self
            .client
            .get("/v2/shopping/flight-offers", &query, ctx)
            .await?;

        let offers = json.get("data").and_then(Value::as_array).cloned().unwrap_or_default();
        if offers.is_empty() {
            return Err(Error::Tool {
                tool: AMADEUS_SEARCH_FLIGHTS.into(),
                reason: format!(
                    "no offers {}->{} on {departure}",
                    args.origin, args.destination
                ),
            });
        }

        let cheapest = offers
            .iter()
            .filter_map(|o| o.pointer("/price/grandTotal").and_then(Value::as_str))
            .filter_map(|p| p.parse::<f64>().ok())
            .fold(f64::INFINITY, f64::min);
        let currency = offers[0]
            .pointer("/price/currency")
            .and_then(Value::as_str)
            .unwrap_or("EUR");

        let summary = format!(
            "{} offers {}->{} on {departure}, from {cheapest:.2} {currency}",
            offers.len(),
            args.origin.to_uppercase(),
            args.destination.to_uppercase(),
        );
        Ok(ToolOutcome::new(summary)
            .with_source(SOURCE)
            .with_payload(serde_json::json!({
                "offerCount": offers.len(),
                "cheapest": cheapest,
                "currency": currency,
                "departureDate": departure,
            })))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub(crate) fn register(registry: &mut ToolRegistry, cfg: &ToolsConfig, outbound: Arc<OutboundHttp>) {
    let client = Arc::new(AmadeusClient::new(cfg, outbound));

    registry.register(ToolSpec {
        name: AMADEUS_RESOLVE_CITY,
        description: "Resolve a city name to its IATA city code.",
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "keyword": { "type": "string", "description": "City name or partial name" }
            },
            "required": ["keyword"]
        }),
        family: Family::Amadeus,
        default_timeout: Duration::from_millis(7_000),
        invoker: Arc::new(ResolveCityTool {
            client: client.clone(),
        }),
    });

    registry.register(ToolSpec {
        name: AMADEUS_AIRPORTS_FOR_CITY,
        description: "List airport IATA codes serving a city code.",
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "cityCode": { "type": "string", "description": "IATA city code, e.g. 'PAR'" }
            },
            "required": ["cityCode"]
        }),
        family: Family::Amadeus,
        default_timeout: Duration::from_millis(7_000),
        invoker: Arc::new(AirportsTool {
            client: client.clone(),
        }),
    });

    registry.register(ToolSpec {
        name: AMADEUS_SEARCH_FLIGHTS,
        description: "Search flight offers between two IATA codes. Dates may be ISO (2026-08-12) or relative ('tomorrow', 'next week').",
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "origin": { "type": "string", "description": "Origin IATA code" },
                "destination": { "type": "string", "description": "Destination IATA code" },
                "departureDate": { "type": "string", "description": "Departure date" },
                "returnDate": { "type": "string", "description": "Optional return date" },
                "adults": { "type": "integer", "description": "Travelers (default 1)" }
            },
            "required": ["origin", "destination", "departureDate"]
        }),
        family: Family::Amadeus,
        default_timeout: Duration::from_millis(cfg.flights_timeout_ms),
        invoker: Arc::new(SearchFlightsTool { client }),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_dates_resolve_forward() {
        let today = chrono::Utc::now().date_naive();
        assert_eq!(resolve_departure_date("today"), today.to_string());
        assert_eq!(
            resolve_departure_date("Tomorrow"),
            (today + chrono::Duration::days(1)).to_string()
        );
        assert_eq!(
            resolve_departure_date("next week"),
            (today + chrono::Duration::days(7)).to_string()
        );
    }

    #[test]
    fn iso_dates_pass_through() {
        assert_eq!(resolve_departure_date("2026-08-12"), "2026-08-12");
    }

    #[test]
    fn search_args_accept_camel_case() {
        let args: SearchFlightsArgs = parse_args(
            AMADEUS_SEARCH_FLIGHTS,
            &serde_json::json!({
                "origin": "nyc",
                "destination": "lon",
                "departureDate": "tomorrow"
            }),
        )
        .unwrap();
        assert_eq!(args.adults, 1);
        assert!(args.return_date.is_none());
    }
}
