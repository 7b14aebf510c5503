//! The actor loop: a bounded multi-step function-calling conversation.
//!
//! Each step asks the LLM for either tool calls or a final answer. Tool
//! calls run under the gate (route-allowed tools only), the per-turn
//! `seen` set (no duplicate call twice in one turn), and the execution
//! ledger (no repeat of a fresh prior outcome). Invocations within one
//! batch run concurrently; their results are appended in the order the
//! model emitted the calls.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde_json::Value;
use tracing::Instrument;

use wf_domain::chat::{Message, ToolCall};
use wf_domain::{Error, Result};
use wf_providers::{LlmTransport, ToolChatRequest};
use wf_tools::{ToolCtx, ToolOutcome, ToolRegistry, ToolSpec, DEEP_RESEARCH, PACKING_SUGGEST, WEATHER};

use crate::metrics::Metrics;

use super::clock::TurnClock;
use super::ledger::{classify_error, ledger_key, ExecutionLedger};
use super::router::has_weather_cue;

/// Hard ceiling on actor steps, regardless of configuration.
const MAX_STEPS_HARD_CAP: usize = 12;

/// Slack reserved from the remaining turn budget when computing a
/// per-tool deadline.
const TOOL_DEADLINE_SLACK: Duration = Duration::from_millis(250);

/// Minimum remaining budget to start another LLM step.
const MIN_STEP_BUDGET: Duration = Duration::from_millis(1_500);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Output types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, serde::Serialize)]
pub struct Fact {
    pub key: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Default)]
pub struct ActorOutput {
    /// Final assistant content, when the loop produced one.
    pub reply: Option<String>,
    pub facts: Vec<Fact>,
    /// Citation strings in first-seen order, not yet deduplicated.
    pub citations: Vec<String>,
    pub decisions: Vec<String>,
    pub steps: usize,
}

pub struct ActorInput<'a> {
    pub transport: Arc<dyn LlmTransport>,
    pub model: &'a str,
    pub registry: &'a ToolRegistry,
    pub route: &'a str,
    /// Set when the user declined deep research this turn.
    pub forbid_research: bool,
    /// Seeded message list: system prompt, context, plan echo, user turn.
    pub messages: Vec<Message>,
    /// The raw user message, for fallback cues.
    pub user_message: &'a str,
    /// City for the post-loop weather fallback, when known.
    pub fallback_city: Option<String>,
    pub max_steps: usize,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// The loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn run_actor(
    input: ActorInput<'_>,
    ledger: &mut ExecutionLedger,
    clock: &TurnClock,
    metrics: &Metrics,
) -> ActorOutput {
    let mut out = ActorOutput::default();
    let mut messages = input.messages.clone();
    let mut seen: HashSet<String> = HashSet::new();

    let active: Vec<Arc<ToolSpec>> = input
        .registry
        .specs_for_route(input.route)
        .into_iter()
        .filter(|s| !(input.forbid_research && s.name == DEEP_RESEARCH))
        .collect();
    let active_names: HashSet<&str> = active.iter().map(|s| s.name).collect();
    let definitions: Vec<_> = active.iter().map(|s| s.definition()).collect();

    let max_steps = input.max_steps.min(MAX_STEPS_HARD_CAP);
    for step in 0..max_steps {
        if clock.remaining() < MIN_STEP_BUDGET {
            out.decisions.push("actor:turn_budget_exhausted".into());
            break;
        }

        let req = ToolChatRequest {
            messages: messages.clone(),
            tools: definitions.clone(),
            model: Some(input.model.to_owned()),
            temperature: Some(0.2),
        };
        let budget = clock.step_budget();
        let reply = match clock
            .bound(budget, "actor step", input.transport.chat_with_tools(req))
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(step, error = %e, "actor step failed");
                out.decisions.push(format!("actor:step_error:{}", classify_error(&e)));
                break;
            }
        };
        out.steps += 1;

        if reply.is_empty() {
            out.decisions.push("actor:empty_response".into());
            break;
        }

        if reply.tool_calls.is_empty() {
            // Final assistant message.
            out.reply = reply.content.map(|c| c.trim().to_owned()).filter(|c| !c.is_empty());
            break;
        }

        let content = reply.content.unwrap_or_default();
        messages.push(Message::assistant_tool_calls(content, reply.tool_calls.clone()));

        run_tool_batch(
            &reply.tool_calls,
            input.registry,
            &active,
            &mut seen,
            ledger,
            clock,
            metrics,
            &mut messages,
            &mut out,
        )
        .await;
    }

    if out.reply.is_none() {
        weather_fallback(&input, &active_names, &mut seen, ledger, clock, metrics, &mut out).await;
    }

    out
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// One batch of tool calls
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

enum Disposition {
    /// Reject with a tool-role error payload; nothing runs.
    Reject(Value),
    /// Execute against the catalog.
    Execute { spec: Arc<ToolSpec>, args: Value },
}

#[allow(clippy::too_many_arguments)]
async fn run_tool_batch(
    calls: &[ToolCall],
    registry: &ToolRegistry,
    active: &[Arc<ToolSpec>],
    seen: &mut HashSet<String>,
    ledger: &mut ExecutionLedger,
    clock: &TurnClock,
    metrics: &Metrics,
    messages: &mut Vec<Message>,
    out: &mut ActorOutput,
) {
    // Classify every call in emission order. The `seen` insert happens at
    // classification time so a duplicate later in the same batch is
    // rejected without re-invoking the provider.
    let dispositions: Vec<Disposition> = calls
        .iter()
        .map(|tc| {
            let Some(spec) = active.iter().find(|s| s.name == tc.tool_name).cloned() else {
                // Registered but not active for this route → gated;
                // not registered at all → unknown.
                return if registry.get(&tc.tool_name).is_some() {
                    metrics.inc_gated_skip(&tc.tool_name);
                    out.decisions.push(format!("gated_skip:{}", tc.tool_name));
                    Disposition::Reject(serde_json::json!({"ok": false, "error": "gated_by_route"}))
                } else {
                    Disposition::Reject(serde_json::json!({"ok": false, "reason": "unknown_tool"}))
                };
            };

            let args: Value = match serde_json::from_str(&tc.arguments) {
                Ok(v) => v,
                Err(_) => {
                    metrics.inc_arg_parse_failure(&tc.tool_name);
                    Value::Object(Default::default())
                }
            };

            let key = ledger_key(&tc.tool_name, &args);
            if seen.contains(&key) {
                out.decisions.push(format!("duplicate_in_turn:{}", tc.tool_name));
                return Disposition::Reject(
                    serde_json::json!({"ok": false, "error": "duplicate_in_turn"}),
                );
            }
            if ledger.should_skip(&tc.tool_name, &args) {
                out.decisions.push(format!("skipped_by_ledger:{}", tc.tool_name));
                return Disposition::Reject(
                    serde_json::json!({"ok": false, "error": "skipped_by_ledger"}),
                );
            }

            seen.insert(key);
            Disposition::Execute { spec, args }
        })
        .collect();

    // Dispatch the executable subset concurrently; keep indices so the
    // results land back in emission order.
    let futures: Vec<_> = dispositions
        .iter()
        .enumerate()
        .filter_map(|(i, d)| match d {
            Disposition::Execute { spec, args } => {
                let spec = spec.clone();
                let args = args.clone();
                let deadline = spec
                    .default_timeout
                    .min(clock.remaining().saturating_sub(TOOL_DEADLINE_SLACK));
                let ctx = ToolCtx {
                    signal: clock.signal(),
                    deadline,
                };
                let span = tracing::info_span!("tool.call", tool_name = spec.name);
                Some(async move {
                    let result = invoke_bounded(&spec, &args, &ctx).await;
                    (i, result)
                }
                .instrument(span))
            }
            Disposition::Reject(_) => None,
        })
        .collect();
    let mut results: Vec<Option<Result<ToolOutcome>>> = (0..calls.len()).map(|_| None).collect();
    for (i, result) in join_all(futures).await {
        results[i] = Some(result);
    }

    // Append results in emission order.
    for ((tc, disposition), result) in calls.iter().zip(dispositions).zip(results) {
        match disposition {
            Disposition::Reject(payload) => {
                messages.push(Message::tool(&tc.tool_name, &tc.call_id, payload.to_string()));
            }
            Disposition::Execute { args, .. } => match result.expect("executed call has a result") {
                Ok(outcome) => {
                    ledger.finish_ok(&tc.tool_name, &args);
                    harvest(&tc.tool_name, &outcome, out);
                    messages.push(Message::tool(
                        &tc.tool_name,
                        &tc.call_id,
                        outcome.to_json().to_string(),
                    ));
                }
                Err(e) => {
                    let class = classify_error(&e);
                    tracing::debug!(tool = %tc.tool_name, error = %e, class, "tool call failed");
                    ledger.finish_err(&tc.tool_name, &args, &e);
                    out.decisions.push(format!("tool_error:{}:{class}", tc.tool_name));
                    messages.push(Message::tool(
                        &tc.tool_name,
                        &tc.call_id,
                        serde_json::json!({"ok": false, "error": class}).to_string(),
                    ));
                }
            },
        }
    }
}

/// Invoke under the per-call deadline, mapping elapsed time to a
/// timeout error.
async fn invoke_bounded(spec: &ToolSpec, args: &Value, ctx: &ToolCtx) -> Result<ToolOutcome> {
    if ctx.deadline.is_zero() {
        return Err(Error::Timeout(format!("{}: no budget left", spec.name)));
    }
    match tokio::time::timeout(ctx.deadline, spec.invoker.invoke(args, ctx)).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(format!(
            "{}: exceeded {} ms",
            spec.name,
            ctx.deadline.as_millis()
        ))),
    }
}

/// Pull facts and citations out of a successful outcome.
fn harvest(tool: &str, outcome: &ToolOutcome, out: &mut ActorOutput) {
    out.facts.push(Fact {
        key: tool.to_owned(),
        value: outcome.summary.clone(),
        source: outcome.source.clone(),
    });

    // Packing emits band + item lists as standalone facts so the
    // self-check can verify them later.
    if tool == PACKING_SUGGEST {
        for key in ["packingBand", "packingItemsBase", "packingItemsSpecial"] {
            if let Some(v) = outcome.payload.get(key) {
                out.facts.push(Fact {
                    key: key.to_owned(),
                    value: if let Some(s) = v.as_str() { s.to_owned() } else { v.to_string() },
                    source: None,
                });
            }
        }
    }

    for citation in &outcome.citations {
        out.citations.push(citation.clone());
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Post-loop weather fallback
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn weather_fallback(
    input: &ActorInput<'_>,
    active_names: &HashSet<&str>,
    seen: &mut HashSet<String>,
    ledger: &mut ExecutionLedger,
    clock: &TurnClock,
    metrics: &Metrics,
    out: &mut ActorOutput,
) {
    if !has_weather_cue(input.user_message) || !active_names.contains(WEATHER) {
        return;
    }
    let Some(city) = input.fallback_city.clone() else {
        return;
    };
    let Some(spec) = input.registry.get(WEATHER) else {
        return;
    };

    let args = serde_json::json!({ "city": city });
    let key = ledger_key(WEATHER, &args);
    if seen.contains(&key) || ledger.should_skip(WEATHER, &args) {
        return;
    }
    seen.insert(key);

    let deadline = spec
        .default_timeout
        .min(clock.remaining().saturating_sub(TOOL_DEADLINE_SLACK));
    let ctx = ToolCtx {
        signal: clock.signal(),
        deadline,
    };
    match invoke_bounded(&spec, &args, &ctx).await {
        Ok(outcome) => {
            ledger.finish_ok(WEATHER, &args);
            metrics.inc_fallback("weather");
            out.decisions.push("fallback:weather".into());
            harvest(WEATHER, &outcome, out);
            out.reply = Some(outcome.summary.clone());
        }
        Err(e) => {
            ledger.finish_err(WEATHER, &args, &e);
            out.decisions.push(format!("fallback:weather_failed:{}", classify_error(&e)));
        }
    }
}
