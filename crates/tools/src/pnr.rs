//! `pnrParse` — parse an airline PNR text blob (record locator,
//! passenger names, flight segments) into structured data. Pure local
//! parsing, no network.
//!
//! Accepts the common GDS dump shape:
//!
//! ```text
//! RLOC: ABC123
//! 1.DOE/JOHN MR  2.DOE/JANE MRS
//! 1 . BA 178 M 12AUG JFKLHR HK1 1830 0630
//! 2 . BA 179 M 19AUG LHRJFK HK1 1100 1405
//! ```

use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use wf_domain::{Error, Result};

use crate::{parse_args, Family, ToolCtx, ToolInvoker, ToolOutcome, ToolRegistry, ToolSpec, PNR_PARSE};

#[derive(Debug, Deserialize)]
struct PnrArgs {
    text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PnrSegment {
    pub carrier: String,
    pub flight_number: String,
    pub booking_class: String,
    /// Raw GDS date, e.g. "12AUG".
    pub date: String,
    pub origin: String,
    pub destination: String,
    pub status: String,
    pub departure_time: String,
    pub arrival_time: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ParsedPnr {
    pub record_locator: Option<String>,
    pub passengers: Vec<String>,
    pub segments: Vec<PnrSegment>,
}

fn locator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*(?:RLOC|RECORD LOCATOR|PNR)\s*[:#]?\s*([A-Z0-9]{6})\b").unwrap())
}

fn passenger_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+\.([A-Z][A-Z'\-]+/[A-Z][A-Z'\- ]*?(?:\s(?:MR|MRS|MS|MSTR|CHD|INF))?)(?:\s\s|\s*$|\s+\d+\.)").unwrap())
}

fn segment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^\s*\d*\s*\.?\s*([A-Z0-9]{2})\s?(\d{1,4})\s+([A-Z])\s+(\d{2}[A-Z]{3})\s+([A-Z]{3})\s?([A-Z]{3})\s+([A-Z]{2}\d)\s+(\d{4})\s+(\d{4})",
        )
        .unwrap()
    })
}

/// Parse a PNR dump. Missing pieces are simply absent; a dump with no
/// recognizable segments is an error (the caller has nothing to act on).
pub fn parse_pnr(text: &str) -> ParsedPnr {
    let record_locator = locator_re()
        .captures(text)
        .map(|c| c[1].to_owned());

    let mut passengers = Vec::new();
    for line in text.lines() {
        for cap in passenger_re().captures_iter(line) {
            passengers.push(cap[1].trim().to_owned());
        }
    }

    let segments = segment_re()
        .captures_iter(text)
        .map(|cap| PnrSegment {
            carrier: cap[1].to_owned(),
            flight_number: cap[2].to_owned(),
            booking_class: cap[3].to_owned(),
            date: cap[4].to_owned(),
            origin: cap[5].to_owned(),
            destination: cap[6].to_owned(),
            status: cap[7].to_owned(),
            departure_time: cap[8].to_owned(),
            arrival_time: cap[9].to_owned(),
        })
        .collect();

    ParsedPnr {
        record_locator,
        passengers,
        segments,
    }
}

struct PnrTool;

#[async_trait]
impl ToolInvoker for PnrTool {
    async fn invoke(&self, args: &Value, _ctx: &ToolCtx) -> Result<ToolOutcome> {
        let args: PnrArgs = parse_args(PNR_PARSE, args)?;
        let parsed = parse_pnr(&args.text);

        if parsed.segments.is_empty() {
            return Err(Error::Tool {
                tool: PNR_PARSE.into(),
                reason: "no flight segments recognized in the PNR text".into(),
            });
        }

        let route: Vec<String> = parsed
            .segments
            .iter()
            .map(|s| format!("{}{} {}-{} {}", s.carrier, s.flight_number, s.origin, s.destination, s.date))
            .collect();
        let summary = format!(
            "PNR {} with {} passenger(s), segments: {}",
            parsed.record_locator.as_deref().unwrap_or("(no locator)"),
            parsed.passengers.len(),
            route.join(", ")
        );

        Ok(ToolOutcome::new(summary).with_payload(serde_json::to_value(&parsed)?))
    }
}

pub(crate) fn register(registry: &mut ToolRegistry) {
    registry.register(ToolSpec {
        name: PNR_PARSE,
        description: "Parse an airline booking (PNR) text dump into record locator, passengers, and flight segments.",
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Raw PNR text" }
            },
            "required": ["text"]
        }),
        family: Family::Local,
        default_timeout: Duration::from_millis(1_000),
        invoker: Arc::new(PnrTool),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "RLOC: ABC123\n1.DOE/JOHN MR  2.DOE/JANE MRS\n1 . BA 178 M 12AUG JFKLHR HK1 1830 0630\n2 . BA 179 M 19AUG LHRJFK HK1 1100 1405\n";

    #[test]
    fn parses_locator_passengers_segments() {
        let pnr = parse_pnr(SAMPLE);
        assert_eq!(pnr.record_locator.as_deref(), Some("ABC123"));
        assert_eq!(pnr.passengers, vec!["DOE/JOHN MR", "DOE/JANE MRS"]);
        assert_eq!(pnr.segments.len(), 2);

        let first = &pnr.segments[0];
        assert_eq!(first.carrier, "BA");
        assert_eq!(first.flight_number, "178");
        assert_eq!(first.origin, "JFK");
        assert_eq!(first.destination, "LHR");
        assert_eq!(first.date, "12AUG");
        assert_eq!(first.status, "HK1");
        assert_eq!(first.departure_time, "1830");
    }

    #[test]
    fn segment_without_row_number_still_parses() {
        let pnr = parse_pnr("LH 400 Y 03SEP FRAJFK HK2 1010 1255");
        assert_eq!(pnr.segments.len(), 1);
        assert_eq!(pnr.segments[0].carrier, "LH");
        assert_eq!(pnr.segments[0].status, "HK2");
    }

    #[test]
    fn garbage_yields_empty_parse() {
        let pnr = parse_pnr("hello, can you help me with my trip?");
        assert!(pnr.record_locator.is_none());
        assert!(pnr.segments.is_empty());
    }

    #[tokio::test]
    async fn invoke_fails_without_segments() {
        let tool = PnrTool;
        let err = tool
            .invoke(&serde_json::json!({"text": "nothing here"}), &ToolCtx::unbounded())
            .await;
        assert!(matches!(err, Err(Error::Tool { .. })));
    }

    #[tokio::test]
    async fn invoke_summarizes_route() {
        let tool = PnrTool;
        let outcome = tool
            .invoke(&serde_json::json!({"text": SAMPLE}), &ToolCtx::unbounded())
            .await
            .unwrap();
        assert!(outcome.summary.contains("ABC123"));
        assert!(outcome.summary.contains("BA178 JFK-LHR 12AUG"));
        assert!(outcome.source.is_none());
    }
}
