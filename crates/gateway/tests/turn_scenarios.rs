//! End-to-end turn scenarios over a scripted LLM transport and stub
//! tool invokers. No network anywhere.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use wf_domain::config::Config;
use wf_domain::{Error, Result};
use wf_gateway::metrics::Metrics;
use wf_gateway::runtime::thread_lock::ThreadLockMap;
use wf_gateway::runtime::{prompts, run_turn, TurnRequest};
use wf_gateway::state::AppState;
use wf_providers::{LlmTransport, MockReply, MockTransport};
use wf_sessions::{MemorySessionStore, SlotMemory};
use wf_tools::{Family, ToolCtx, ToolInvoker, ToolOutcome, ToolRegistry, ToolSpec};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Harness
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct StubTool {
    calls: Arc<AtomicUsize>,
    make: Box<dyn Fn() -> Result<ToolOutcome> + Send + Sync>,
}

#[async_trait]
impl ToolInvoker for StubTool {
    async fn invoke(&self, _args: &Value, _ctx: &ToolCtx) -> Result<ToolOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.make)()
    }
}

/// Register a stub tool; returns its invocation counter.
fn stub(
    registry: &mut ToolRegistry,
    name: &'static str,
    make: impl Fn() -> Result<ToolOutcome> + Send + Sync + 'static,
) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    registry.register(ToolSpec {
        name,
        description: "stub",
        parameters: json!({"type": "object", "properties": {}}),
        family: Family::Local,
        default_timeout: Duration::from_secs(5),
        invoker: Arc::new(StubTool {
            calls: calls.clone(),
            make: Box::new(make),
        }),
    });
    calls
}

fn app_state(transport: Arc<MockTransport>, registry: ToolRegistry) -> AppState {
    let config = Arc::new(Config::default());
    let backend = Arc::new(MemorySessionStore::new(&config.session));
    let transport: Arc<dyn LlmTransport> = transport;
    AppState {
        config,
        transport: Some(transport),
        sessions: SlotMemory::new(backend),
        tools: Arc::new(registry),
        metrics: Arc::new(Metrics::new()),
        thread_locks: Arc::new(ThreadLockMap::new()),
    }
}

fn request(message: &str, thread: &str) -> TurnRequest {
    TurnRequest {
        message: message.into(),
        thread_id: Some(thread.into()),
        receipts: true,
    }
}

fn amadeus_ok(summary: &str) -> ToolOutcome {
    ToolOutcome::new(summary).with_source("amadeus.com")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// A. Direct flight search, no consent needed
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn direct_flight_search() {
    let mut registry = ToolRegistry::new();
    let resolves = stub(&mut registry, wf_tools::AMADEUS_RESOLVE_CITY, || {
        Ok(amadeus_ok("resolved"))
    });
    let searches = stub(&mut registry, wf_tools::AMADEUS_SEARCH_FLIGHTS, || {
        Ok(amadeus_ok("3 offers NYC->LON, from 420.00 EUR"))
    });

    let mock = MockTransport::new();
    // flight slot extractor (router post stage)
    mock.push(MockReply::text(
        r#"{"originCity": "NYC", "destinationCity": "LON", "departureDate": "tomorrow"}"#,
    ));
    // planner
    mock.push(MockReply::text(
        r#"{"route": "flights", "confidence": 0.9, "calls": [{"tool": "amadeusResolveCity", "args": {"keyword": "NYC"}}]}"#,
    ));
    // actor: resolve both endpoints, search, then answer
    mock.push(MockReply::tool_calls(&[
        (wf_tools::AMADEUS_RESOLVE_CITY, json!({"keyword": "NYC"})),
        (wf_tools::AMADEUS_RESOLVE_CITY, json!({"keyword": "LON"})),
    ]));
    mock.push(MockReply::tool_call(
        wf_tools::AMADEUS_SEARCH_FLIGHTS,
        json!({"origin": "NYC", "destination": "LON", "departureDate": "tomorrow"}),
    ));
    mock.push(MockReply::text(
        "Cheapest is 420 EUR tomorrow morning (source: amadeus.com).",
    ));

    let state = app_state(Arc::new(mock), registry);
    let response = run_turn(&state, request("flights from NYC to LON tomorrow", "t1")).await;

    assert_eq!(resolves.load(Ordering::SeqCst), 2);
    assert_eq!(searches.load(Ordering::SeqCst), 1);
    assert!(response.reply.contains("420"));
    assert!(response.citations.contains(&"amadeus.com".to_string()));
    assert!(response
        .decisions
        .iter()
        .any(|d| d == "ledger:successes=3"));

    let slots = state.sessions.slots("t1").await.unwrap();
    assert_eq!(slots.get("originCity").map(String::as_str), Some("NYC"));
    assert_eq!(slots.get("destinationCity").map(String::as_str), Some("LON"));
    assert_eq!(slots.get("departureDate").map(String::as_str), Some("tomorrow"));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// B. Context switch across turns
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn context_switch_resets_location_and_time() {
    let registry = ToolRegistry::new();
    let mock = MockTransport::new();

    // Turn 1: "weather in Paris in June?" — the lightweight classifier
    // routes it; the complexity heuristic is inconclusive (2 categories)
    // so the LLM gate is consulted first.
    mock.push(MockReply::text(r#"{"isComplex": false, "confidence": 0.8}"#));
    mock.push(MockReply::text("not a plan"));
    mock.push(MockReply::text("June in Paris is mild."));

    // Turn 2: "what about Tokyo?" — LLM router, then planner + actor.
    mock.push(MockReply::text(
        r#"{"intent": "weather", "confidence": 0.9, "slots": {"city": "Tokyo"}}"#,
    ));
    mock.push(MockReply::text("not a plan"));
    mock.push(MockReply::text("Happy to check Tokyo — for which dates?"));

    let state = app_state(Arc::new(mock), registry);

    run_turn(&state, request("weather in Paris in June?", "t2")).await;
    let slots = state.sessions.slots("t2").await.unwrap();
    assert_eq!(slots.get("city").map(String::as_str), Some("Paris"));
    assert_eq!(slots.get("month").map(String::as_str), Some("June"));

    let response = run_turn(&state, request("what about Tokyo?", "t2")).await;
    assert!(!response.reply.is_empty());

    let slots = state.sessions.slots("t2").await.unwrap();
    assert_eq!(slots.get("city").map(String::as_str), Some("Tokyo"));
    assert!(!slots.contains_key("month"), "time slots must reset on a context switch");
    assert!(response
        .decisions
        .iter()
        .any(|d| d == "slots:context_switch_reset"));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// C. Complex query consent gate
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const COMPLEX_MSG: &str = "Plan a 10-day family trip from Tel Aviv for August with budget for 4 people including a toddler, avoiding long flights";

#[tokio::test]
async fn complex_query_parks_for_consent() {
    let state = app_state(Arc::new(MockTransport::new()), ToolRegistry::new());

    let response = run_turn(&state, request(COMPLEX_MSG, "t3")).await;

    assert_eq!(response.reply, prompts::CONSENT_PROMPT_REPLY);
    assert!(response.citations.is_empty());

    let slots = state.sessions.slots("t3").await.unwrap();
    assert_eq!(
        slots.get("awaiting_deep_research_consent").map(String::as_str),
        Some("true")
    );
    assert_eq!(
        slots.get("pending_deep_research_query").map(String::as_str),
        Some(COMPLEX_MSG)
    );
    assert_eq!(state.metrics.snapshot()["clarify_requests"]["deep_research_consent"], 1);
}

#[tokio::test]
async fn declined_consent_answers_without_research() {
    let mut registry = ToolRegistry::new();
    let research_calls = stub(&mut registry, wf_tools::DEEP_RESEARCH, || {
        Ok(ToolOutcome::new("report").with_source("research"))
    });

    let mock = MockTransport::new();
    // Turn 2 after "no": the pending query re-routes with the gate off.
    // "flights" in the query keyword-routes it to flights, so the calls
    // are: flight slot extractor, planner, actor final.
    mock.push(MockReply::text("{}"));
    mock.push(MockReply::text("not a plan"));
    mock.push(MockReply::text("Here is a rough plan without deep research."));

    let state = app_state(Arc::new(mock), registry);

    run_turn(&state, request(COMPLEX_MSG, "t4")).await;
    let response = run_turn(&state, request("no thanks", "t4")).await;

    assert!(response.reply.contains("without deep research"));
    assert_eq!(research_calls.load(Ordering::SeqCst), 0);
    assert!(response.decisions.iter().any(|d| d == "consent:no"));

    let slots = state.sessions.slots("t4").await.unwrap();
    assert!(!slots.contains_key("awaiting_deep_research_consent"));
    assert!(!slots.contains_key("pending_deep_research_query"));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// D. Ledger dedupe within a turn
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn duplicate_call_in_one_step_runs_once() {
    let mut registry = ToolRegistry::new();
    let weather_calls = stub(&mut registry, wf_tools::WEATHER, || {
        Ok(ToolOutcome::new("Rome: 25°C").with_source("open-meteo.com"))
    });

    let mock = MockTransport::new();
    mock.push(MockReply::text("not a plan"));
    mock.push(MockReply::tool_calls(&[
        (wf_tools::WEATHER, json!({"city": "Rome"})),
        (wf_tools::WEATHER, json!({"city": "Rome"})),
    ]));
    mock.push(MockReply::text("It is 25°C in Rome (open-meteo.com)."));

    let state = app_state(Arc::new(mock), registry);
    let response = run_turn(&state, request("weather in Rome", "t5")).await;

    assert_eq!(weather_calls.load(Ordering::SeqCst), 1, "provider must run once");
    assert!(response
        .decisions
        .iter()
        .any(|d| d == "duplicate_in_turn:weather"));
    assert_eq!(response.citations, vec!["open-meteo.com"]);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// E. Route gating
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn policy_route_gates_amadeus() {
    let mut registry = ToolRegistry::new();
    let amadeus_calls = stub(&mut registry, wf_tools::AMADEUS_RESOLVE_CITY, || {
        Ok(amadeus_ok("resolved"))
    });
    let vectara_calls = stub(&mut registry, wf_tools::VECTARA_QUERY, || {
        Ok(ToolOutcome::new("Japanese passport holders need a visa for China")
            .with_source("policy-kb"))
    });

    let mock = MockTransport::new();
    // Complexity heuristic sees 2 categories → LLM gate consulted.
    mock.push(MockReply::text(r#"{"isComplex": false, "confidence": 0.9}"#));
    mock.push(MockReply::text("not a plan"));
    mock.push(MockReply::tool_calls(&[
        (wf_tools::AMADEUS_RESOLVE_CITY, json!({"keyword": "China"})),
        (wf_tools::VECTARA_QUERY, json!({"query": "Japan passport visa China"})),
    ]));
    mock.push(MockReply::text(
        "A visa is required for Japanese passport holders (policy-kb).",
    ));

    let state = app_state(Arc::new(mock), registry);
    let response = run_turn(
        &state,
        request("best visa policy for Japanese passport to China", "t6"),
    )
    .await;

    assert_eq!(amadeus_calls.load(Ordering::SeqCst), 0, "amadeus must be gated");
    assert_eq!(vectara_calls.load(Ordering::SeqCst), 1);
    assert!(response
        .decisions
        .iter()
        .any(|d| d == "gated_skip:amadeusResolveCity"));
    assert_eq!(state.metrics.gated_skip_total(), 1);
    assert!(response.citations.contains(&"policy-kb".to_string()));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// F. All external calls fail
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn total_tool_failure_yields_grounded_fallback() {
    let mut registry = ToolRegistry::new();
    let weather_calls = stub(&mut registry, wf_tools::WEATHER, || {
        Err(Error::Timeout("upstream dead".into()))
    });

    let mock = MockTransport::new();
    mock.push(MockReply::text("not a plan"));
    mock.push(MockReply::tool_call(wf_tools::WEATHER, json!({"city": "Rome"})));
    // Script runs dry → the next step returns no message, ending the loop.

    let state = app_state(Arc::new(mock), registry);
    let response = run_turn(&state, request("weather in Rome", "t7")).await;

    assert_eq!(weather_calls.load(Ordering::SeqCst), 1);
    assert_eq!(response.reply, prompts::GENERIC_FALLBACK_REPLY);
    assert!(response.citations.is_empty());
    let receipts = response.receipts.expect("receipts requested");
    assert_eq!(receipts["selfCheck"], "fail");
    assert_eq!(state.metrics.snapshot()["fallbacks"]["generic"], 1);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Boundary behavior
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn unknown_low_confidence_redirects() {
    // No script: the LLM router yields nothing parseable, the correction
    // pass finds nothing, and the turn redirects without touching tools.
    let state = app_state(Arc::new(MockTransport::new()), ToolRegistry::new());
    let response = run_turn(&state, request("zzz qqq", "t8")).await;
    assert_eq!(response.reply, prompts::REDIRECT_REPLY);
    assert_eq!(state.metrics.snapshot()["fallbacks"]["redirect"], 1);
}

#[tokio::test]
async fn thread_id_is_minted_when_absent() {
    let state = app_state(Arc::new(MockTransport::new()), ToolRegistry::new());
    let response = run_turn(
        &state,
        TurnRequest {
            message: "zzz qqq".into(),
            thread_id: None,
            receipts: false,
        },
    )
    .await;
    assert!(!response.thread_id.is_empty());
    assert!(response.receipts.is_none());
}
