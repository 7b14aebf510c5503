//! Per-turn execution ledger.
//!
//! Records every tool invocation keyed by `(tool, canonical(args))` so a
//! turn never repeats a call whose outcome is still fresh: successes are
//! reused, provider blocks (403/429) stay blocked, and deterministic
//! argument failures are not retried. The instance is turn-local and
//! discarded with the turn; within-turn dedupe is a separate `seen` set
//! owned by the actor.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;

use wf_domain::config::LedgerConfig;
use wf_domain::Error;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Canonical argument serialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Stable serialization: object keys sorted recursively, arrays kept in
/// order, scalars in their default string form.
pub fn canonical_args(value: &Value) -> String {
    fn write(value: &Value, out: &mut String) {
        match value {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                out.push('{');
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&serde_json::to_string(key).expect("string serializes"));
                    out.push(':');
                    write(&map[*key], out);
                }
                out.push('}');
            }
            Value::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write(item, out);
                }
                out.push(']');
            }
            scalar => out.push_str(&scalar.to_string()),
        }
    }

    let mut out = String::new();
    write(value, &mut out);
    out
}

/// The ledger key for one invocation.
pub fn ledger_key(tool: &str, args: &Value) -> String {
    format!("{tool}:{}", canonical_args(args))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outcome classification
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The error label fed back to the LLM and recorded in decisions.
pub fn classify_error(e: &Error) -> &'static str {
    match e {
        Error::Timeout(_) | Error::Cancelled(_) => "timeout",
        Error::InvalidArgs(_) => "invalid_args",
        Error::HttpStatus { status: 403, .. } => "http_403",
        Error::HttpStatus { status: 429, .. } => "http_429",
        Error::HttpStatus { status, .. } if *status >= 500 => "upstream_5xx",
        Error::HttpStatus { .. } => "upstream_4xx",
        _ => "tool_error",
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Ledger
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub ok: bool,
    pub http_status: Option<u16>,
    pub error_class: Option<&'static str>,
    recorded_at: Instant,
    ttl: Duration,
}

impl LedgerEntry {
    fn fresh(&self) -> bool {
        self.recorded_at.elapsed() < self.ttl
    }
}

pub struct ExecutionLedger {
    entries: HashMap<String, LedgerEntry>,
    config: LedgerConfig,
    /// Count of successes recorded this turn (for decisions/receipts).
    successes: usize,
}

impl ExecutionLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            entries: HashMap::new(),
            config,
            successes: 0,
        }
    }

    /// True iff a prior outcome for this call is still within its TTL.
    pub fn should_skip(&self, tool: &str, args: &Value) -> bool {
        self.entries
            .get(&ledger_key(tool, args))
            .map(LedgerEntry::fresh)
            .unwrap_or(false)
    }

    pub fn finish_ok(&mut self, tool: &str, args: &Value) {
        self.successes += 1;
        self.entries.insert(
            ledger_key(tool, args),
            LedgerEntry {
                ok: true,
                http_status: None,
                error_class: None,
                recorded_at: Instant::now(),
                ttl: Duration::from_millis(self.config.success_ttl_ms),
            },
        );
    }

    pub fn finish_err(&mut self, tool: &str, args: &Value, error: &Error) {
        let status = error.http_status();
        let ttl_ms = match error {
            Error::HttpStatus { status: 403, .. } | Error::HttpStatus { status: 429, .. } => {
                self.config.http_block_ttl_ms
            }
            Error::InvalidArgs(_) => self.config.schema_fail_ttl_ms,
            _ => self.config.fail_ttl_ms,
        };
        self.entries.insert(
            ledger_key(tool, args),
            LedgerEntry {
                ok: false,
                http_status: status,
                error_class: Some(classify_error(error)),
                recorded_at: Instant::now(),
                ttl: Duration::from_millis(ttl_ms),
            },
        );
    }

    pub fn successes(&self) -> usize {
        self.successes
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_is_key_order_insensitive() {
        let a = json!({"a": 1, "b": {"d": 4, "c": 3}});
        let b = json!({"b": {"c": 3, "d": 4}, "a": 1});
        assert_eq!(canonical_args(&a), canonical_args(&b));
    }

    #[test]
    fn canonical_preserves_array_order() {
        assert_ne!(canonical_args(&json!([1, 2])), canonical_args(&json!([2, 1])));
    }

    #[test]
    fn canonical_scalars_pass_through() {
        assert_eq!(canonical_args(&json!("x")), "\"x\"");
        assert_eq!(canonical_args(&json!(5)), "5");
        assert_eq!(canonical_args(&json!(null)), "null");
    }

    #[test]
    fn success_blocks_repeat() {
        let mut ledger = ExecutionLedger::new(LedgerConfig::default());
        let args = json!({"city": "Rome"});
        assert!(!ledger.should_skip("weather", &args));
        ledger.finish_ok("weather", &args);
        assert!(ledger.should_skip("weather", &args));
        assert_eq!(ledger.successes(), 1);
    }

    #[test]
    fn different_args_do_not_collide() {
        let mut ledger = ExecutionLedger::new(LedgerConfig::default());
        ledger.finish_ok("weather", &json!({"city": "Rome"}));
        assert!(!ledger.should_skip("weather", &json!({"city": "Oslo"})));
    }

    #[test]
    fn expired_entry_does_not_skip() {
        let config = LedgerConfig {
            fail_ttl_ms: 0,
            ..LedgerConfig::default()
        };
        let mut ledger = ExecutionLedger::new(config);
        let args = json!({"q": "x"});
        ledger.finish_err("search", &args, &Error::Other("boom".into()));
        assert!(!ledger.should_skip("search", &args));
    }

    #[test]
    fn provider_block_records_status() {
        let mut ledger = ExecutionLedger::new(LedgerConfig::default());
        let args = json!({"q": "x"});
        ledger.finish_err(
            "search",
            &args,
            &Error::HttpStatus {
                status: 429,
                message: "slow down".into(),
            },
        );
        assert!(ledger.should_skip("search", &args));
        let entry = ledger.entries.get(&ledger_key("search", &args)).unwrap();
        assert_eq!(entry.http_status, Some(429));
        assert_eq!(entry.error_class, Some("http_429"));
    }

    #[test]
    fn error_classification() {
        assert_eq!(classify_error(&Error::Timeout("x".into())), "timeout");
        assert_eq!(classify_error(&Error::Cancelled("x".into())), "timeout");
        assert_eq!(classify_error(&Error::InvalidArgs("x".into())), "invalid_args");
        assert_eq!(
            classify_error(&Error::HttpStatus { status: 403, message: String::new() }),
            "http_403"
        );
        assert_eq!(
            classify_error(&Error::HttpStatus { status: 502, message: String::new() }),
            "upstream_5xx"
        );
        assert_eq!(
            classify_error(&Error::HttpStatus { status: 404, message: String::new() }),
            "upstream_4xx"
        );
        assert_eq!(classify_error(&Error::Other("x".into())), "tool_error");
    }
}
