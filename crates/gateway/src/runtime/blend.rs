//! Blend & cite: compose the final turn result from actor output.
//!
//! Citations deduplicate in first-seen order and cap at eight. Facts and
//! decisions become the receipts payload together with a self-check
//! verdict. The verdict never alters the user-facing reply; it only
//! reports grounding discipline.

use serde_json::Value;

use super::actor::{ActorOutput, Fact};
use super::prompts;

/// Maximum citations attached to one reply.
const CITATION_CAP: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfCheck {
    Pass,
    Warn,
    Fail,
}

impl SelfCheck {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelfCheck::Pass => "pass",
            SelfCheck::Warn => "warn",
            SelfCheck::Fail => "fail",
        }
    }
}

#[derive(Debug)]
pub struct BlendOutput {
    pub reply: String,
    pub citations: Vec<String>,
    pub facts: Vec<Fact>,
    pub decisions: Vec<String>,
    pub self_check: SelfCheck,
}

impl BlendOutput {
    /// The structured audit payload returned when the caller asks for
    /// receipts.
    pub fn receipts(&self) -> Value {
        serde_json::json!({
            "facts": self.facts,
            "decisions": self.decisions,
            "selfCheck": self.self_check.as_str(),
        })
    }
}

/// Dedupe preserving first-seen order, capped.
fn dedupe_citations(raw: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    raw.iter()
        .filter(|c| !c.trim().is_empty() && seen.insert(c.as_str()))
        .take(CITATION_CAP)
        .cloned()
        .collect()
}

pub fn blend(actor: ActorOutput, mut decisions: Vec<String>) -> BlendOutput {
    decisions.extend(actor.decisions);

    let citations = dedupe_citations(&actor.citations);

    // External claims are facts harvested from tools that named a source.
    let has_external_claims = actor.facts.iter().any(|f| f.source.is_some());

    let (reply, self_check) = match actor.reply {
        Some(reply) => {
            let verdict = if has_external_claims && citations.is_empty() {
                SelfCheck::Warn
            } else {
                SelfCheck::Pass
            };
            (reply, verdict)
        }
        None => {
            // The actor produced nothing; the generic fallback goes out
            // and the receipts say so.
            decisions.push("fallback:generic".into());
            (prompts::GENERIC_FALLBACK_REPLY.to_owned(), SelfCheck::Fail)
        }
    };

    BlendOutput {
        reply,
        citations,
        facts: actor.facts,
        decisions,
        self_check,
    }
}
