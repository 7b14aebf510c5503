use serde::{Deserialize, Serialize};

use super::{env_str, env_u64, ConfigIssue};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_port")]
    pub port: u16,
    /// Maximum concurrent in-flight HTTP requests.
    #[serde(default = "d_max_concurrent")]
    pub max_concurrent: usize,
    /// Log level filter used when `RUST_LOG` is unset.
    #[serde(default = "d_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: d_port(),
            max_concurrent: d_max_concurrent(),
            log_level: d_log_level(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: env_str("HOST", &d_host()),
            port: env_u64("PORT", d_port() as u64) as u16,
            max_concurrent: env_u64("MAX_CONCURRENT_REQUESTS", d_max_concurrent() as u64) as usize,
            log_level: env_str("LOG_LEVEL", &d_log_level()),
        }
    }

    pub(super) fn validate(&self, issues: &mut Vec<ConfigIssue>) {
        if self.max_concurrent == 0 {
            issues.push(ConfigIssue::error("server.max_concurrent", "must be at least 1"));
        }
    }
}

fn d_host() -> String {
    "0.0.0.0".into()
}
fn d_port() -> u16 {
    8080
}
fn d_max_concurrent() -> usize {
    256
}
fn d_log_level() -> String {
    "info".into()
}
