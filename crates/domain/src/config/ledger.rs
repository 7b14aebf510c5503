use serde::{Deserialize, Serialize};

use super::env_u64;

/// TTLs for execution-ledger entries, by outcome class (milliseconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// A successful call is not repeated for this long.
    #[serde(default = "d_success_ttl_ms")]
    pub success_ttl_ms: u64,
    /// 403/429 from a provider blocks the call for this long.
    #[serde(default = "d_http_block_ttl_ms")]
    pub http_block_ttl_ms: u64,
    /// Argument-validation failures are deterministic; long block.
    #[serde(default = "d_schema_fail_ttl_ms")]
    pub schema_fail_ttl_ms: u64,
    /// Any other failure (timeouts, 5xx, network) — short block.
    #[serde(default = "d_fail_ttl_ms")]
    pub fail_ttl_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            success_ttl_ms: d_success_ttl_ms(),
            http_block_ttl_ms: d_http_block_ttl_ms(),
            schema_fail_ttl_ms: d_schema_fail_ttl_ms(),
            fail_ttl_ms: d_fail_ttl_ms(),
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Self {
        Self {
            success_ttl_ms: env_u64("LEDGER_SUCCESS_TTL_MS", d_success_ttl_ms()),
            http_block_ttl_ms: env_u64("LEDGER_HTTP_BLOCK_TTL_MS", d_http_block_ttl_ms()),
            schema_fail_ttl_ms: env_u64("LEDGER_ZOD_FAIL_TTL_MS", d_schema_fail_ttl_ms()),
            fail_ttl_ms: env_u64("LEDGER_FAIL_TTL_MS", d_fail_ttl_ms()),
        }
    }
}

fn d_success_ttl_ms() -> u64 {
    300_000
}
fn d_http_block_ttl_ms() -> u64 {
    900_000
}
fn d_schema_fail_ttl_ms() -> u64 {
    300_000
}
fn d_fail_ttl_ms() -> u64 {
    120_000
}
