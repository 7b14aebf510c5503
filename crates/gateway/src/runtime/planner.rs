//! The planner phase: one bounded LLM call returning a strict-JSON
//! control block. Everything about it is best-effort — a timeout, a
//! transport error, or unparseable output all degrade to "no plan" and
//! the actor runs anyway.

use std::sync::Arc;
use std::time::Duration;

use wf_domain::chat::Message;
use wf_domain::route::PlanControl;
use wf_domain::slots::SlotMap;
use wf_providers::{ChatRequest, LlmTransport, ResponseFormat};

use crate::metrics::Metrics;

use super::classify::extract_json;
use super::clock::TurnClock;
use super::prompts;

/// Planner deadline: `min(5 s, remaining/2)`, floor 1.5 s.
fn planner_budget(clock: &TurnClock) -> Duration {
    let half = clock.remaining() / 2;
    half.min(Duration::from_secs(5)).max(Duration::from_millis(1_500))
}

pub struct PlanOutput {
    pub plan: Option<PlanControl>,
    /// Assistant-turn echo of the plan, appended to the actor's message
    /// list so the loop can read its own marching orders.
    pub echo: Option<Message>,
}

pub async fn plan(
    transport: &Arc<dyn LlmTransport>,
    model: &str,
    message: &str,
    slots: &SlotMap,
    complexity_note: Option<&str>,
    clock: &TurnClock,
    metrics: &Metrics,
) -> PlanOutput {
    let mut messages = vec![Message::system(prompts::PLANNER_SYSTEM)];
    if let Some(note) = complexity_note {
        messages.push(Message::system(format!("Complexity assessment: {note}")));
    }
    if !slots.is_empty() {
        messages.push(Message::system(format!(
            "Context: {}",
            serde_json::to_string(slots).unwrap_or_default()
        )));
    }
    messages.push(Message::user(message));

    let req = ChatRequest {
        messages,
        model: Some(model.to_owned()),
        response_format: ResponseFormat::Json,
        temperature: Some(0.0),
    };

    let budget = planner_budget(clock);
    let reply = match clock.bound(budget, "planner", transport.chat(req)).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::debug!(error = %e, "planner call failed; continuing without a plan");
            return PlanOutput { plan: None, echo: None };
        }
    };

    let plan: Option<PlanControl> =
        extract_json(&reply.content).and_then(|v| serde_json::from_value(v).ok());

    let Some(plan) = plan else {
        tracing::debug!("planner output unparseable; continuing without a plan");
        return PlanOutput { plan: None, echo: None };
    };

    let echo = match (plan.route_intent(), plan.confidence) {
        (Some(route), Some(confidence)) => {
            metrics.inc_plan_route(route.as_str());
            tracing::debug!(%route, confidence, "plan published");
            serde_json::to_string(&plan)
                .ok()
                .map(|json| Message::assistant(format!("Plan: {json}")))
        }
        _ => None,
    };

    PlanOutput {
        plan: Some(plan),
        echo,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wf_providers::{MockReply, MockTransport};

    fn transport_with(reply: MockReply) -> Arc<dyn LlmTransport> {
        let mock = MockTransport::new();
        mock.push(reply);
        Arc::new(mock)
    }

    #[tokio::test]
    async fn well_formed_plan_is_echoed() {
        let transport = transport_with(MockReply::text(
            r#"{"route": "weather", "confidence": 0.9, "calls": [{"tool": "weather", "args": {"city": "Rome"}}]}"#,
        ));
        let clock = TurnClock::new(Duration::from_secs(20));
        let metrics = Metrics::new();
        let output = plan(&transport, "m", "weather in Rome", &SlotMap::new(), None, &clock, &metrics).await;

        let plan = output.plan.unwrap();
        assert_eq!(plan.route.as_deref(), Some("weather"));
        assert_eq!(plan.calls.len(), 1);
        let echo = output.echo.unwrap();
        assert!(echo.content.starts_with("Plan: "));
    }

    #[tokio::test]
    async fn plan_embedded_in_prose_still_parses() {
        let transport = transport_with(MockReply::text(
            "Here you go: {\"route\": \"flights\", \"confidence\": 0.8} hope that helps",
        ));
        let clock = TurnClock::new(Duration::from_secs(20));
        let output = plan(&transport, "m", "x", &SlotMap::new(), None, &clock, &Metrics::new()).await;
        assert!(output.plan.is_some());
    }

    #[tokio::test]
    async fn garbage_degrades_to_no_plan() {
        let transport = transport_with(MockReply::text("I cannot plan this."));
        let clock = TurnClock::new(Duration::from_secs(20));
        let output = plan(&transport, "m", "x", &SlotMap::new(), None, &clock, &Metrics::new()).await;
        assert!(output.plan.is_none());
        assert!(output.echo.is_none());
    }

    #[tokio::test]
    async fn plan_without_route_is_kept_but_not_echoed() {
        let transport = transport_with(MockReply::text(r#"{"missing": ["city"]}"#));
        let clock = TurnClock::new(Duration::from_secs(20));
        let output = plan(&transport, "m", "x", &SlotMap::new(), None, &clock, &Metrics::new()).await;
        assert!(output.plan.is_some());
        assert!(output.echo.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn budget_floor_and_cap() {
        let clock = TurnClock::new(Duration::from_secs(60));
        assert_eq!(planner_budget(&clock), Duration::from_secs(5));

        let clock = TurnClock::new(Duration::from_secs(4));
        let budget = planner_budget(&clock);
        assert!(budget <= Duration::from_secs(2) && budget >= Duration::from_millis(1_500));

        let clock = TurnClock::new(Duration::from_millis(500));
        assert_eq!(planner_budget(&clock), Duration::from_millis(1_500));
    }
}
