//! The turn runtime.
//!
//! [`run_turn`] is the per-turn entry point shared by the HTTP handler
//! and the REPL: load session state, route, gate on consent, plan, run
//! the actor loop under the execution ledger, blend the result, persist,
//! and always return a non-empty reply. Errors inside a turn become data
//! (tool-role payloads, ledger entries, decision strings); nothing
//! propagates past this module.

pub mod actor;
pub mod blend;
pub mod classify;
pub mod clock;
pub mod gate;
pub mod ledger;
pub mod planner;
pub mod prompts;
pub mod router;
pub mod thread_lock;

use std::time::Duration;

use serde_json::Value;
use tracing::Instrument;

use wf_domain::chat::Message;
use wf_domain::config::TurnConfig;
use wf_domain::route::Intent;
use wf_domain::slots::{self, SlotMap};
use wf_sessions::normalize_slots;

use crate::state::AppState;

use actor::{ActorInput, Fact};
use blend::BlendOutput;
use classify::{Classifiers, ConsentAnswer};
use clock::TurnClock;
use ledger::ExecutionLedger;
use router::{RouteOutcome, RoutedTurn};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / response
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub message: String,
    pub thread_id: Option<String>,
    /// Include the structured receipts payload in the response.
    pub receipts: bool,
}

#[derive(Debug)]
pub struct TurnResponse {
    pub reply: String,
    pub thread_id: String,
    pub citations: Vec<String>,
    pub facts: Vec<Fact>,
    pub decisions: Vec<String>,
    pub receipts: Option<Value>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn run_turn(state: &AppState, req: TurnRequest) -> TurnResponse {
    let thread_id = req
        .thread_id
        .clone()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    // Per-thread serialization: a second request on this thread waits
    // until the first fully persists.
    let _permit = state.thread_locks.acquire(&thread_id).await;

    let span = tracing::info_span!("turn", thread_id = %thread_id);

    state.metrics.inc_message();
    let started = std::time::Instant::now();

    let budget = Duration::from_millis(state.config.turn.timeout_ms);
    let clock = TurnClock::new(budget);

    let response = match tokio::time::timeout(
        budget,
        turn_inner(state, &req, &thread_id, &clock).instrument(span),
    )
    .await
    {
        Ok(response) => response,
        Err(_) => {
            state.metrics.inc_fallback("turn_deadline");
            tracing::warn!("turn deadline exceeded; returning fallback");
            TurnResponse {
                reply: prompts::GENERIC_FALLBACK_REPLY.to_owned(),
                thread_id: thread_id.clone(),
                citations: Vec::new(),
                facts: Vec::new(),
                decisions: vec!["fallback:turn_deadline".into()],
                receipts: None,
            }
        }
    };

    tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "turn finished");
    response
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// The turn body
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn turn_inner(
    state: &AppState,
    req: &TurnRequest,
    thread_id: &str,
    clock: &TurnClock,
) -> TurnResponse {
    let cap = state.config.session.history_cap;

    // Session reads are best-effort; a broken store degrades to an
    // empty-state turn, never a failed one.
    let prev_slots = match state.sessions.slots(thread_id).await {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "slot load failed; continuing with empty slots");
            SlotMap::new()
        }
    };
    if let Err(e) = state.sessions.history(thread_id, cap).await {
        tracing::warn!(error = %e, "history load failed");
    }
    if let Err(e) = state
        .sessions
        .record(thread_id, Message::user(&req.message), cap)
        .await
    {
        tracing::warn!(error = %e, "recording user message failed");
    }

    let classifiers = Classifiers::new(
        state.transport.clone(),
        state.config.llm.router_model().to_owned(),
        state.config.turn.classifier_timeout_ms,
    );

    let outcome = router::route_turn(
        &req.message,
        &prev_slots,
        &classifiers,
        &state.config.turn,
        &state.metrics,
    )
    .await;

    match outcome {
        RouteOutcome::ConsentRequest { verdict } => {
            consent_request_turn(state, req, thread_id, verdict).await
        }

        RouteOutcome::Consent(answer) => {
            let pending = prev_slots
                .get(slots::PENDING_DEEP_RESEARCH_QUERY)
                .cloned()
                .unwrap_or_else(|| req.message.clone());
            if let Err(e) = state.sessions.clear_consent_state(thread_id).await {
                tracing::warn!(error = %e, "clearing consent state failed");
            }
            let clean_slots: SlotMap = prev_slots
                .iter()
                .filter(|(k, _)| !slots::is_consent_key(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();

            // The gate must not re-park the rerun.
            let no_gate = TurnConfig {
                deep_research_enabled: false,
                ..state.config.turn.clone()
            };

            let (message, forbid_research, approved, decision) = match answer {
                ConsentAnswer::Yes => (pending, false, true, "consent:yes"),
                ConsentAnswer::No => (pending, true, false, "consent:no"),
                ConsentAnswer::Unclear => (req.message.clone(), false, false, "consent:unclear"),
            };
            tracing::info!(decision, "consent answered");

            let rerouted = router::route_turn(
                &message,
                &clean_slots,
                &classifiers,
                &no_gate,
                &state.metrics,
            )
            .await;
            let routed = match rerouted {
                RouteOutcome::Routed(r) => r,
                // Consent slots were just cleared, so the router cannot
                // land back in a consent branch; this is a guard.
                _ => RoutedTurn {
                    result: wf_domain::route::RouterResult::new(Intent::Unknown, 0.2),
                    resets: Vec::new(),
                    decisions: Vec::new(),
                },
            };

            let mut decisions = vec![decision.to_owned()];
            decisions.extend(routed.decisions.clone());
            routed_turn(
                state,
                req,
                thread_id,
                &message,
                &clean_slots,
                RoutedTurn { decisions, ..routed },
                clock,
                forbid_research,
                approved,
            )
            .await
        }

        RouteOutcome::Routed(routed) => {
            routed_turn(
                state,
                req,
                thread_id,
                &req.message,
                &prev_slots,
                routed,
                clock,
                false,
                false,
            )
            .await
        }
    }
}

/// Park the turn: persist consent slots and ask the user.
async fn consent_request_turn(
    state: &AppState,
    req: &TurnRequest,
    thread_id: &str,
    verdict: gate::ComplexityVerdict,
) -> TurnResponse {
    let mut put = SlotMap::new();
    put.insert(slots::AWAITING_DEEP_RESEARCH_CONSENT.into(), "true".into());
    put.insert(slots::PENDING_DEEP_RESEARCH_QUERY.into(), req.message.clone());
    put.insert(slots::COMPLEXITY_SCORE.into(), format!("{:.2}", verdict.confidence));
    put.insert(slots::COMPLEXITY_REASONING.into(), verdict.reasoning.clone());
    if let Err(e) = state.sessions.merge(thread_id, put, &[]).await {
        tracing::warn!(error = %e, "persisting consent slots failed");
    }

    state.metrics.inc_clarify("deep_research_consent");
    state.metrics.inc_turn(Intent::System.as_str());

    let reply = prompts::CONSENT_PROMPT_REPLY.to_owned();
    persist_reply(state, thread_id, &reply).await;

    let decisions = vec!["consent:requested".to_owned()];
    let receipts = req.receipts.then(|| {
        serde_json::json!({
            "facts": [],
            "decisions": decisions,
            "selfCheck": "pass",
            "complexity": { "score": verdict.confidence, "reasoning": verdict.reasoning },
        })
    });

    TurnResponse {
        reply,
        thread_id: thread_id.to_owned(),
        citations: Vec::new(),
        facts: Vec::new(),
        decisions,
        receipts,
    }
}

/// A fully routed turn: persist slots, plan, act, blend, persist reply.
#[allow(clippy::too_many_arguments)]
async fn routed_turn(
    state: &AppState,
    req: &TurnRequest,
    thread_id: &str,
    message: &str,
    prev_slots: &SlotMap,
    routed: RoutedTurn,
    clock: &TurnClock,
    forbid_research: bool,
    research_approved: bool,
) -> TurnResponse {
    let RoutedTurn {
        result,
        resets,
        decisions: mut turn_decisions,
    } = routed;
    let intent = result.intent;
    state.metrics.inc_turn(intent.as_str());

    // The driver is the sole persister of slot changes.
    let delta = normalize_slots(prev_slots, &result.slots, intent);
    if let Err(e) = state.sessions.merge(thread_id, delta.clone(), &resets).await {
        tracing::warn!(error = %e, "persisting slots failed");
    }

    // The turn's working view of the slots.
    let mut effective: SlotMap = prev_slots
        .iter()
        .filter(|(k, _)| !resets.contains(*k) && !slots::is_consent_key(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    effective.extend(delta);

    // Very low confidence on an unknown intent: polite redirect, no LLM.
    if intent == Intent::Unknown && result.confidence < 0.3 {
        state.metrics.inc_fallback("redirect");
        turn_decisions.push("fallback:redirect".into());
        let reply = prompts::REDIRECT_REPLY.to_owned();
        persist_reply(state, thread_id, &reply).await;
        return TurnResponse {
            reply,
            thread_id: thread_id.to_owned(),
            citations: Vec::new(),
            facts: Vec::new(),
            receipts: req.receipts.then(|| {
                serde_json::json!({"facts": [], "decisions": turn_decisions, "selfCheck": "pass"})
            }),
            decisions: turn_decisions,
        };
    }

    let blend_out = match &state.transport {
        Some(transport) => {
            // Planner.
            let complexity_note = effective.get(slots::COMPLEXITY_REASONING).cloned();
            let plan_out = planner::plan(
                transport,
                &state.config.llm.model,
                message,
                &effective,
                complexity_note.as_deref(),
                clock,
                &state.metrics,
            )
            .await;

            // Actor seed: system prompt, optional context, optional plan
            // echo, the user message.
            let mut messages = vec![Message::system(prompts::ACTOR_SYSTEM)];
            if !effective.is_empty() {
                messages.push(Message::system(format!(
                    "Context: {}",
                    serde_json::to_string(&effective).unwrap_or_default()
                )));
            }
            if research_approved {
                messages.push(Message::system(
                    "The user approved deep research for this request; prefer the deepResearch tool.",
                ));
            }
            if let Some(echo) = plan_out.echo {
                messages.push(echo);
            }
            messages.push(Message::user(message));

            let route = plan_out
                .plan
                .as_ref()
                .and_then(|p| p.route_intent())
                .unwrap_or(intent);

            let mut ledger = ExecutionLedger::new(state.config.ledger.clone());
            let actor_out = actor::run_actor(
                ActorInput {
                    transport: transport.clone(),
                    model: &state.config.llm.model,
                    registry: &state.tools,
                    route: route.as_str(),
                    forbid_research,
                    messages,
                    user_message: message,
                    fallback_city: slots::primary_location(&effective).map(str::to_owned),
                    max_steps: state.config.turn.max_steps,
                },
                &mut ledger,
                clock,
                &state.metrics,
            )
            .await;

            if ledger.successes() > 0 {
                turn_decisions.push(format!("ledger:successes={}", ledger.successes()));
            }
            blend::blend(actor_out, turn_decisions)
        }
        None => {
            state.metrics.inc_fallback("no_transport");
            turn_decisions.push("fallback:no_transport".into());
            blend::blend(actor::ActorOutput::default(), turn_decisions)
        }
    };

    if !blend_out.citations.is_empty() {
        state.metrics.inc_citation_answer();
    }
    if blend_out.self_check == blend::SelfCheck::Fail {
        state.metrics.inc_fallback("generic");
    }

    persist_reply(state, thread_id, &blend_out.reply).await;

    let receipts = req.receipts.then(|| blend_out.receipts());
    let BlendOutput {
        reply,
        citations,
        facts,
        decisions,
        ..
    } = blend_out;
    TurnResponse {
        reply,
        thread_id: thread_id.to_owned(),
        citations,
        facts,
        decisions,
        receipts,
    }
}

async fn persist_reply(state: &AppState, thread_id: &str, reply: &str) {
    let cap = state.config.session.history_cap;
    if let Err(e) = state
        .sessions
        .record(thread_id, Message::assistant(reply), cap)
        .await
    {
        tracing::warn!(error = %e, "recording assistant reply failed");
    }
}
