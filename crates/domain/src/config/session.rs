use serde::{Deserialize, Serialize};

use super::{env_opt, env_str, env_u64, ConfigIssue};

/// Which session backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    #[default]
    Memory,
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub kind: SessionKind,
    /// Thread TTL in seconds, refreshed on every read or write.
    #[serde(default = "d_ttl_sec")]
    pub ttl_sec: u64,
    /// Per-operation timeout against the backend, milliseconds.
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
    /// Base URL of the remote KV service (required when kind = remote).
    #[serde(default)]
    pub remote_url: Option<String>,
    /// Message-history cap per thread; oldest messages drop first.
    #[serde(default = "d_history_cap")]
    pub history_cap: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            kind: SessionKind::Memory,
            ttl_sec: d_ttl_sec(),
            timeout_ms: d_timeout_ms(),
            remote_url: None,
            history_cap: d_history_cap(),
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Self {
        let kind = match env_str("SESSION_KIND", "memory").to_ascii_lowercase().as_str() {
            "remote" => SessionKind::Remote,
            _ => SessionKind::Memory,
        };
        Self {
            kind,
            ttl_sec: env_u64("SESSION_TTL_SEC", d_ttl_sec()),
            timeout_ms: env_u64("SESSION_TIMEOUT_MS", d_timeout_ms()),
            remote_url: env_opt("SESSION_REMOTE_URL"),
            history_cap: env_u64("SESSION_HISTORY_CAP", d_history_cap() as u64) as usize,
        }
    }

    pub(super) fn validate(&self, issues: &mut Vec<ConfigIssue>) {
        if self.kind == SessionKind::Remote && self.remote_url.is_none() {
            issues.push(ConfigIssue::error(
                "session.remote_url",
                "SESSION_KIND=remote requires SESSION_REMOTE_URL",
            ));
        }
        if self.timeout_ms == 0 {
            issues.push(ConfigIssue::error("session.timeout_ms", "must be nonzero"));
        }
        if self.history_cap == 0 {
            issues.push(ConfigIssue::error("session.history_cap", "must be at least 1"));
        }
    }
}

fn d_ttl_sec() -> u64 {
    3_600
}
fn d_timeout_ms() -> u64 {
    1_500
}
fn d_history_cap() -> usize {
    16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigSeverity;

    #[test]
    fn remote_without_url_fails_validation() {
        let cfg = SessionConfig {
            kind: SessionKind::Remote,
            ..SessionConfig::default()
        };
        let mut issues = Vec::new();
        cfg.validate(&mut issues);
        assert!(issues.iter().any(|i| i.severity == ConfigSeverity::Error));
    }

    #[test]
    fn defaults_match_contract() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.ttl_sec, 3_600);
        assert_eq!(cfg.history_cap, 16);
        assert_eq!(cfg.kind, SessionKind::Memory);
    }
}
