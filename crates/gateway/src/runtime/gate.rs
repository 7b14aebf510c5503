//! Complexity scoring for the deep-research consent gate.
//!
//! Heuristic first: count how many constraint categories the message
//! touches (budget, group, time, origin, location, special needs). Three
//! or more is complex; one or fewer is clearly simple. Exactly two is
//! inconclusive and falls through to the LLM classifier.

use std::sync::OnceLock;

use regex::Regex;

use super::classify::Classifiers;

#[derive(Debug, Clone)]
pub struct ComplexityVerdict {
    pub is_complex: bool,
    pub confidence: f64,
    pub reasoning: String,
}

struct Category {
    name: &'static str,
    pattern: &'static str,
}

const CATEGORIES: [Category; 6] = [
    Category {
        name: "budget",
        pattern: r"(?i)\b(budget|cheap|affordable|luxury|cost|spend|price)\b|[$€£]",
    },
    Category {
        name: "group",
        pattern: r"(?i)\b(family|kids?|children|toddler|infant|baby|couple|solo|\d+\s*(?:people|persons|adults|travell?ers))\b",
    },
    Category {
        name: "time",
        pattern: r"(?i)\b(\d+[\s-]?days?|\d+[\s-]?weeks?|january|february|march|april|may|june|july|august|september|october|november|december|weekend|month)\b",
    },
    // A capitalized word after the preposition is the signal here; the
    // prepositions themselves fold case but the place name must not.
    Category {
        name: "origin",
        pattern: r"\b(?i:from)\s+[A-Z][a-zA-Z]",
    },
    Category {
        name: "location",
        pattern: r"\b(?i:to|in|around|visiting)\s+[A-Z][a-zA-Z]",
    },
    Category {
        name: "special",
        pattern: r"(?i)\b(avoid\w*|accessib\w*|dietary|vegan|kosher|halal|visa|layovers?|non-?stop|direct\s+flights?|allerg\w*|wheelchair)\b",
    },
];

fn category_regexes() -> &'static Vec<(&'static str, Regex)> {
    static SET: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    SET.get_or_init(|| {
        CATEGORIES
            .iter()
            .map(|c| (c.name, Regex::new(c.pattern).expect("static pattern compiles")))
            .collect()
    })
}

/// Which constraint categories the message matches.
pub fn matched_categories(message: &str) -> Vec<&'static str> {
    category_regexes()
        .iter()
        .filter(|(_, re)| re.is_match(message))
        .map(|(name, _)| *name)
        .collect()
}

/// The heuristic verdict, or `None` when inconclusive (exactly two
/// categories).
pub fn heuristic_verdict(message: &str) -> Option<ComplexityVerdict> {
    let categories = matched_categories(message);
    let n = categories.len();
    match n {
        0 | 1 => Some(ComplexityVerdict {
            is_complex: false,
            confidence: 0.8,
            reasoning: format!("{n} constraint categor(ies): {}", categories.join(", ")),
        }),
        2 => None,
        _ => Some(ComplexityVerdict {
            is_complex: true,
            confidence: (0.6 + 0.1 * (n as f64 - 2.0)).min(0.95),
            reasoning: format!("{n} constraint categories: {}", categories.join(", ")),
        }),
    }
}

/// Full assessment: heuristic, then LLM fusion for the inconclusive band.
pub async fn assess(message: &str, classifiers: &Classifiers) -> ComplexityVerdict {
    if let Some(verdict) = heuristic_verdict(message) {
        return verdict;
    }
    match classifiers.complexity(message).await {
        Some((is_complex, confidence, reasoning)) => ComplexityVerdict {
            is_complex,
            confidence,
            reasoning,
        },
        None => ComplexityVerdict {
            is_complex: false,
            confidence: 0.5,
            reasoning: "heuristic inconclusive, classifier unavailable".into(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPLEX_MSG: &str = "Plan a 10-day family trip from Tel Aviv for August with budget for 4 people including a toddler, avoiding long flights";

    #[test]
    fn rich_request_matches_many_categories() {
        let cats = matched_categories(COMPLEX_MSG);
        assert!(cats.len() >= 4, "got {cats:?}");
        assert!(cats.contains(&"budget"));
        assert!(cats.contains(&"group"));
        assert!(cats.contains(&"time"));
        assert!(cats.contains(&"origin"));
    }

    #[test]
    fn complex_verdict_confidence_formula() {
        let verdict = heuristic_verdict(COMPLEX_MSG).unwrap();
        assert!(verdict.is_complex);
        assert!(verdict.confidence >= 0.75, "got {}", verdict.confidence);
        assert!(verdict.confidence <= 0.95);
    }

    #[test]
    fn simple_question_is_not_complex() {
        let verdict = heuristic_verdict("weather in Paris?").unwrap();
        assert!(!verdict.is_complex);
    }

    #[test]
    fn two_categories_is_inconclusive() {
        // "from Boston" (origin) + "kids" (group): exactly two.
        assert!(heuristic_verdict("leaving from Boston with the kids").is_none());
    }

    #[test]
    fn confidence_caps_at_095() {
        let msg = "10-day luxury family trip from Oslo to Lisbon in July for 5 people, vegan, avoid layovers";
        let verdict = heuristic_verdict(msg).unwrap();
        assert!(verdict.confidence <= 0.95);
    }
}
