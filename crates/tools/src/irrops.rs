//! `irropsProcess` — classify an irregular-operations note (cancellation,
//! delay, diversion, missed connection) against a parsed booking and
//! suggest reaccommodation options. Pure local logic.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use wf_domain::{Error, Result};

use crate::pnr::parse_pnr;
use crate::{parse_args, Family, ToolCtx, ToolInvoker, ToolOutcome, ToolRegistry, ToolSpec, IRROPS_PROCESS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disruption {
    Cancellation,
    Delay,
    Diversion,
    MissedConnection,
    Unknown,
}

impl Disruption {
    fn as_str(&self) -> &'static str {
        match self {
            Disruption::Cancellation => "cancellation",
            Disruption::Delay => "delay",
            Disruption::Diversion => "diversion",
            Disruption::MissedConnection => "missed_connection",
            Disruption::Unknown => "unknown",
        }
    }
}

/// Keyword classification; first match wins, most specific first.
pub fn classify_disruption(note: &str) -> Disruption {
    let lowered = note.to_lowercase();
    if lowered.contains("missed") && lowered.contains("connect") {
        Disruption::MissedConnection
    } else if lowered.contains("cancel") {
        Disruption::Cancellation
    } else if lowered.contains("divert") {
        Disruption::Diversion
    } else if lowered.contains("delay") || lowered.contains("late") {
        Disruption::Delay
    } else {
        Disruption::Unknown
    }
}

fn options_for(disruption: Disruption, has_connection: bool) -> Vec<&'static str> {
    match disruption {
        Disruption::Cancellation => vec![
            "rebook on the next available departure with the same carrier",
            "rebook on a partner carrier on the same route",
            "request a refund if no same-day option exists",
        ],
        Disruption::Delay if has_connection => vec![
            "protect the onward connection on a later departure",
            "reroute through an alternate hub",
        ],
        Disruption::Delay => vec![
            "hold the booking; monitor the new departure time",
            "rebook on an earlier alternative if the delay exceeds 3 hours",
        ],
        Disruption::Diversion => vec![
            "arrange ground transport from the diversion airport",
            "rebook the remaining segment from the diversion airport",
        ],
        Disruption::MissedConnection => vec![
            "rebook the missed segment on the next departure",
            "reroute through an alternate hub",
            "request overnight accommodation if no same-day option exists",
        ],
        Disruption::Unknown => vec!["contact the carrier to confirm the disruption type"],
    }
}

#[derive(Debug, Deserialize)]
struct IrropsArgs {
    /// Raw PNR text for the affected booking.
    pnr: String,
    /// Free-form disruption note ("flight cancelled due to weather").
    note: String,
}

struct IrropsTool;

#[async_trait]
impl ToolInvoker for IrropsTool {
    async fn invoke(&self, args: &Value, _ctx: &ToolCtx) -> Result<ToolOutcome> {
        let args: IrropsArgs = parse_args(IRROPS_PROCESS, args)?;
        let parsed = parse_pnr(&args.pnr);
        if parsed.segments.is_empty() {
            return Err(Error::Tool {
                tool: IRROPS_PROCESS.into(),
                reason: "cannot process a disruption without parseable segments".into(),
            });
        }

        let disruption = classify_disruption(&args.note);
        let has_connection = parsed.segments.len() > 1;
        let options = options_for(disruption, has_connection);

        let affected = &parsed.segments[0];
        let summary = format!(
            "{} on {}{} {}-{}; {} option(s): {}",
            disruption.as_str(),
            affected.carrier,
            affected.flight_number,
            affected.origin,
            affected.destination,
            options.len(),
            options.join("; ")
        );

        Ok(ToolOutcome::new(summary).with_payload(serde_json::json!({
            "disruption": disruption.as_str(),
            "options": options,
            "segments": serde_json::to_value(&parsed.segments)?,
        })))
    }
}

pub(crate) fn register(registry: &mut ToolRegistry) {
    registry.register(ToolSpec {
        name: IRROPS_PROCESS,
        description: "Classify a flight disruption (cancellation, delay, diversion, missed connection) against a booking and suggest reaccommodation options.",
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "pnr": { "type": "string", "description": "Raw PNR text of the affected booking" },
                "note": { "type": "string", "description": "What happened, in plain words" }
            },
            "required": ["pnr", "note"]
        }),
        family: Family::Local,
        default_timeout: Duration::from_millis(1_000),
        invoker: Arc::new(IrropsTool),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_keywords() {
        assert_eq!(classify_disruption("Flight was CANCELLED"), Disruption::Cancellation);
        assert_eq!(classify_disruption("running 2h late"), Disruption::Delay);
        assert_eq!(classify_disruption("diverted to AMS"), Disruption::Diversion);
        assert_eq!(
            classify_disruption("we missed our connection in FRA"),
            Disruption::MissedConnection
        );
        assert_eq!(classify_disruption("something odd"), Disruption::Unknown);
    }

    #[test]
    fn missed_connection_beats_delay() {
        assert_eq!(
            classify_disruption("delayed inbound, missed the connection"),
            Disruption::MissedConnection
        );
    }

    #[test]
    fn delay_options_depend_on_connection() {
        assert!(options_for(Disruption::Delay, true)
            .iter()
            .any(|o| o.contains("connection")));
        assert!(options_for(Disruption::Delay, false)
            .iter()
            .all(|o| !o.contains("connection")));
    }

    #[tokio::test]
    async fn invoke_end_to_end() {
        let tool = IrropsTool;
        let outcome = tool
            .invoke(
                &serde_json::json!({
                    "pnr": "1 . BA 178 M 12AUG JFKLHR HK1 1830 0630",
                    "note": "flight cancelled due to strike"
                }),
                &ToolCtx::unbounded(),
            )
            .await
            .unwrap();
        assert!(outcome.summary.starts_with("cancellation on BA178"));
        assert_eq!(outcome.payload["disruption"], "cancellation");
    }
}
