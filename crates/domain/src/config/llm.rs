use serde::{Deserialize, Serialize};

use super::{env_opt, env_str, ConfigIssue};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    /// API key. Absent means the transport is unauthenticated (local models).
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model used by the planner and actor.
    #[serde(default = "d_model")]
    pub model: String,
    /// Cheaper model used by the router and the small classifiers.
    /// Falls back to `model` when unset.
    #[serde(default)]
    pub router_model: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: d_model(),
            router_model: None,
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: env_opt("LLM_BASE_URL"),
            api_key: env_opt("LLM_API_KEY"),
            model: env_str("LLM_MODEL", &d_model()),
            router_model: env_opt("LLM_ROUTER_MODEL"),
        }
    }

    /// The model the router and classifiers should use.
    pub fn router_model(&self) -> &str {
        self.router_model.as_deref().unwrap_or(&self.model)
    }

    pub(super) fn validate(&self, issues: &mut Vec<ConfigIssue>) {
        if self.base_url.is_none() {
            issues.push(ConfigIssue::warning(
                "llm.base_url",
                "LLM_BASE_URL unset — turns will answer with the generic fallback",
            ));
        }
    }
}

fn d_model() -> String {
    "gpt-4o-mini".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_model_falls_back_to_main_model() {
        let cfg = LlmConfig::default();
        assert_eq!(cfg.router_model(), cfg.model);

        let cfg = LlmConfig {
            router_model: Some("tiny".into()),
            ..LlmConfig::default()
        };
        assert_eq!(cfg.router_model(), "tiny");
    }
}
