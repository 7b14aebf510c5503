mod ledger;
mod llm;
mod server;
mod session;
mod tools;

pub use ledger::*;
pub use llm::*;
pub use server::*;
pub use session::*;
pub use tools::*;

use std::fmt;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The full runtime configuration, assembled from environment variables.
///
/// Every section has serde defaults so the whole tree can also be built
/// with `Config::default()` in tests.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub turn: TurnConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Config {
    /// Read the entire configuration from the process environment.
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(),
            session: SessionConfig::from_env(),
            llm: LlmConfig::from_env(),
            ledger: LedgerConfig::from_env(),
            turn: TurnConfig::from_env(),
            tools: ToolsConfig::from_env(),
        }
    }

    /// Validate the configuration, returning every issue found.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        self.server.validate(&mut issues);
        self.session.validate(&mut issues);
        self.llm.validate(&mut issues);
        self.turn.validate(&mut issues);
        issues
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn budget
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnConfig {
    /// Hard deadline for one turn, milliseconds.
    #[serde(default = "d_turn_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum actor LLM steps per turn (hard-capped at 12 by the actor).
    #[serde(default = "d_max_steps")]
    pub max_steps: usize,
    /// Whether the deep-research consent gate is active.
    #[serde(default = "d_deep_research_enabled")]
    pub deep_research_enabled: bool,
    /// Timeout for the small router/gate classifier LLM calls, milliseconds.
    #[serde(default = "d_classifier_timeout_ms")]
    pub classifier_timeout_ms: u64,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            timeout_ms: d_turn_timeout_ms(),
            max_steps: d_max_steps(),
            deep_research_enabled: d_deep_research_enabled(),
            classifier_timeout_ms: d_classifier_timeout_ms(),
        }
    }
}

impl TurnConfig {
    pub fn from_env() -> Self {
        Self {
            timeout_ms: env_u64("TURN_TIMEOUT_MS", d_turn_timeout_ms()),
            max_steps: env_u64("TURN_MAX_STEPS", d_max_steps() as u64) as usize,
            deep_research_enabled: env_bool("DEEP_RESEARCH_ENABLED", d_deep_research_enabled()),
            classifier_timeout_ms: env_u64("CLASSIFIER_TIMEOUT_MS", d_classifier_timeout_ms()),
        }
    }

    fn validate(&self, issues: &mut Vec<ConfigIssue>) {
        if self.timeout_ms < 2_000 {
            issues.push(ConfigIssue::error(
                "turn.timeout_ms",
                "turn deadline below 2000 ms leaves no room for a single LLM step",
            ));
        }
        if self.max_steps == 0 {
            issues.push(ConfigIssue::error("turn.max_steps", "must be at least 1"));
        }
    }
}

fn d_turn_timeout_ms() -> u64 {
    20_000
}
fn d_max_steps() -> usize {
    6
}
fn d_deep_research_enabled() -> bool {
    true
}
fn d_classifier_timeout_ms() -> u64 {
    3_000
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Validation report
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(field: &str, message: &str) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }
    pub fn warning(field: &str, message: &str) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Env helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub(crate) fn env_str(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

pub(crate) fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

pub(crate) fn env_u64(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => v.parse().unwrap_or_else(|_| {
            tracing::warn!(var = name, value = %v, "unparseable integer env var, using default");
            default
        }),
        _ => default,
    }
}

pub(crate) fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        _ => default,
    }
}
