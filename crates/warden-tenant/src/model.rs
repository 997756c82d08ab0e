//! Tenant limit data model

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Subscription tier, used to derive default limit sets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TenantTier {
    Free,
    Pro,
    Enterprise,
}

/// Per-call safety rule ceilings. Immutable per override entry; a global
/// default always exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyLimits {
    /// Token ceiling for a single language-model call
    pub max_tokens_per_call: u64,
    /// Language-model calls allowed per minute
    pub max_calls_per_minute: u64,
    /// Language-model spend allowed per hour
    pub max_cost_per_hour: f64,
    /// Execution-time ceiling for a single tool call (ms)
    pub max_tool_exec_ms: u64,
    /// Retries allowed per tool call (a count equal to the ceiling is
    /// still permitted)
    pub max_tool_retries: u32,
    /// Tools that may never run for this tenant
    #[serde(default)]
    pub disallowed_tools: HashSet<String>,
}

impl SafetyLimits {
    /// Default limit set for a subscription tier.
    pub fn for_tier(tier: TenantTier) -> Self {
        match tier {
            TenantTier::Free => Self {
                max_tokens_per_call: 2_048,
                max_calls_per_minute: 10,
                max_cost_per_hour: 1.0,
                max_tool_exec_ms: 10_000,
                max_tool_retries: 1,
                disallowed_tools: HashSet::new(),
            },
            TenantTier::Pro => Self::default(),
            TenantTier::Enterprise => Self {
                max_tokens_per_call: 32_768,
                max_calls_per_minute: 600,
                max_cost_per_hour: 100.0,
                max_tool_exec_ms: 120_000,
                max_tool_retries: 5,
                disallowed_tools: HashSet::new(),
            },
        }
    }
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            max_tokens_per_call: 8_192,
            max_calls_per_minute: 60,
            max_cost_per_hour: 10.0,
            max_tool_exec_ms: 30_000,
            max_tool_retries: 3,
            disallowed_tools: HashSet::new(),
        }
    }
}

/// Aggregate consumption ceilings, one record per tenant (or the synthetic
/// `"default"` tenant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaLimits {
    /// Language-model tokens per day
    pub llm_tokens_per_day: u64,
    /// Language-model requests per minute
    pub llm_requests_per_minute: u64,
    /// Language-model spend per day
    pub llm_cost_per_day: f64,
    /// Vector-store queries per minute
    pub vector_queries_per_minute: u64,
    /// Vector-store writes per minute
    pub vector_writes_per_minute: u64,
    /// Total vector storage (MB, signed deltas shrink on delete)
    pub vector_storage_mb: f64,
    /// Tool calls per minute
    pub tool_calls_per_minute: u64,
    /// Tool execution milliseconds per minute
    pub tool_exec_ms_per_minute: u64,
}

impl QuotaLimits {
    /// Default quota set for a subscription tier.
    pub fn for_tier(tier: TenantTier) -> Self {
        match tier {
            TenantTier::Free => Self {
                llm_tokens_per_day: 50_000,
                llm_requests_per_minute: 10,
                llm_cost_per_day: 5.0,
                vector_queries_per_minute: 30,
                vector_writes_per_minute: 10,
                vector_storage_mb: 100.0,
                tool_calls_per_minute: 10,
                tool_exec_ms_per_minute: 10_000,
            },
            TenantTier::Pro => Self::default(),
            TenantTier::Enterprise => Self {
                llm_tokens_per_day: 10_000_000,
                llm_requests_per_minute: 600,
                llm_cost_per_day: 500.0,
                vector_queries_per_minute: 1_200,
                vector_writes_per_minute: 600,
                vector_storage_mb: 10_240.0,
                tool_calls_per_minute: 600,
                tool_exec_ms_per_minute: 600_000,
            },
        }
    }
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            llm_tokens_per_day: 1_000_000,
            llm_requests_per_minute: 60,
            llm_cost_per_day: 50.0,
            vector_queries_per_minute: 120,
            vector_writes_per_minute: 60,
            vector_storage_mb: 1_024.0,
            tool_calls_per_minute: 60,
            tool_exec_ms_per_minute: 60_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_ordered_by_generosity() {
        let free = QuotaLimits::for_tier(TenantTier::Free);
        let pro = QuotaLimits::for_tier(TenantTier::Pro);
        let ent = QuotaLimits::for_tier(TenantTier::Enterprise);
        assert!(free.llm_tokens_per_day < pro.llm_tokens_per_day);
        assert!(pro.llm_tokens_per_day < ent.llm_tokens_per_day);
    }

    #[test]
    fn limits_deserialize_without_disallowed_tools() {
        let json = r#"{
            "max_tokens_per_call": 100,
            "max_calls_per_minute": 5,
            "max_cost_per_hour": 1.5,
            "max_tool_exec_ms": 1000,
            "max_tool_retries": 2
        }"#;
        let limits: SafetyLimits = serde_json::from_str(json).unwrap();
        assert!(limits.disallowed_tools.is_empty());
    }
}
