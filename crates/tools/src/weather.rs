//! `weather` — geocode a city, then fetch the current conditions and a
//! short forecast from an Open-Meteo-compatible endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use wf_domain::config::ToolsConfig;
use wf_domain::{Error, Result};

use crate::{parse_args, Family, OutboundHttp, ToolCtx, ToolInvoker, ToolOutcome, ToolRegistry, ToolSpec, WEATHER};

#[derive(Debug, Deserialize)]
struct WeatherArgs {
    city: String,
    #[serde(default)]
    country: Option<String>,
}

struct WeatherTool {
    outbound: Arc<OutboundHttp>,
    geocode_base: String,
    forecast_base: String,
}

impl WeatherTool {
    /// Resolve a city name to coordinates. First match wins.
    async fn geocode(&self, city: &str, ctx: &ToolCtx) -> Result<(f64, f64, String)> {
        let url = format!("{}/v1/search", self.geocode_base);
        let json = self
            .outbound
            .get_json(
                Family::Weather,
                &url,
                &[("name", city.to_owned()), ("count", "1".into())],
                &[],
                ctx,
            )
            .await?;

        let hit = json
            .get("results")
            .and_then(|r| r.get(0))
            .ok_or_else(|| Error::Tool {
                tool: WEATHER.into(),
                reason: format!("no geocoding match for '{city}'"),
            })?;

        let lat = hit.get("latitude").and_then(Value::as_f64).unwrap_or_default();
        let lon = hit.get("longitude").and_then(Value::as_f64).unwrap_or_default();
        let label = hit
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(city)
            .to_owned();
        Ok((lat, lon, label))
    }
}

#[async_trait]
impl ToolInvoker for WeatherTool {
    async fn invoke(&self, args: &Value, ctx: &ToolCtx) -> Result<ToolOutcome> {
        let args: WeatherArgs = parse_args(WEATHER, args)?;
        let query = match &args.country {
            Some(c) => format!("{}, {c}", args.city),
            None => args.city.clone(),
        };

        let (lat, lon, label) = self.geocode(&query, ctx).await?;

        let url = format!("{}/v1/forecast", self.forecast_base);
        let json = self
            .outbound
            .get_json(
                Family::Weather,
                &url,
                &[
                    ("latitude", lat.to_string()),
                    ("longitude", lon.to_string()),
                    ("current", "temperature_2m,precipitation,wind_speed_10m".into()),
                    ("daily", "temperature_2m_max,temperature_2m_min,precipitation_sum".into()),
                    ("forecast_days", "3".into()),
                ],
                &[],
                ctx,
            )
            .await?;

        let current = json.get("current").cloned().unwrap_or(Value::Null);
        let temp = current
            .get("temperature_2m")
            .and_then(Value::as_f64)
            .unwrap_or_default();
        let wind = current
            .get("wind_speed_10m")
            .and_then(Value::as_f64)
            .unwrap_or_default();

        let summary = format!("Current weather in {label}: {temp:.0}°C, wind {wind:.0} km/h");
        Ok(ToolOutcome::new(summary)
            .with_source("open-meteo.com")
            .with_payload(serde_json::json!({
                "city": label,
                "tempC": temp,
                "current": current,
                "daily": json.get("daily").cloned().unwrap_or(Value::Null),
            })))
    }
}

pub(crate) fn register(registry: &mut ToolRegistry, cfg: &ToolsConfig, outbound: Arc<OutboundHttp>) {
    registry.register(ToolSpec {
        name: WEATHER,
        description: "Current conditions and a 3-day forecast for a city.",
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "city": { "type": "string", "description": "City name" },
                "country": { "type": "string", "description": "Optional country to disambiguate" }
            },
            "required": ["city"]
        }),
        family: Family::Weather,
        default_timeout: Duration::from_millis(cfg.weather_timeout_ms),
        invoker: Arc::new(WeatherTool {
            outbound,
            geocode_base: cfg.geocode_base_url.clone(),
            forecast_base: cfg.weather_base_url.clone(),
        }),
    });
}
