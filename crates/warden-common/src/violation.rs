//! Violation taxonomy
//!
//! A violation is a typed value signaling that a safety rule or a
//! consumption quota blocked an operation. Enforcers return them through
//! `Result<(), Violation>`; callers decide whether to retry, degrade, or
//! open an incident.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Per-call safety rule identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    /// Single-call token ceiling
    LlmTokens,
    /// Calls-per-minute ceiling
    LlmRate,
    /// Cost-per-hour ceiling
    LlmCost,
    /// Tool on the disallow list
    ToolDisallowed,
    /// Estimated execution time over the per-call ceiling
    ToolTime,
    /// Retry count over the ceiling
    ToolRetries,
}

impl RuleType {
    /// Canonical snake_case label, as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::LlmTokens => "llm_tokens",
            RuleType::LlmRate => "llm_rate",
            RuleType::LlmCost => "llm_cost",
            RuleType::ToolDisallowed => "tool_disallowed",
            RuleType::ToolTime => "tool_time",
            RuleType::ToolRetries => "tool_retries",
        }
    }
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate consumption quota identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaKind {
    /// Tokens per day
    LlmTokens,
    /// Requests per minute
    LlmRequests,
    /// Cost per day
    LlmCost,
    /// Vector queries per minute
    VectorQueries,
    /// Vector writes per minute
    VectorWrites,
    /// Total vector storage in MB
    VectorStorage,
    /// Tool calls per minute
    ToolCalls,
    /// Tool execution milliseconds per minute
    ToolExecTime,
}

impl QuotaKind {
    /// Canonical snake_case label, as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaKind::LlmTokens => "llm_tokens",
            QuotaKind::LlmRequests => "llm_requests",
            QuotaKind::LlmCost => "llm_cost",
            QuotaKind::VectorQueries => "vector_queries",
            QuotaKind::VectorWrites => "vector_writes",
            QuotaKind::VectorStorage => "vector_storage",
            QuotaKind::ToolCalls => "tool_calls",
            QuotaKind::ToolExecTime => "tool_exec_time",
        }
    }
}

impl std::fmt::Display for QuotaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A safety rule or quota breach. Immutable; carries enough context to
/// render a human-readable incident without recomputation.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// A per-call safety rule blocked the operation
    #[error("safety rule {rule} violated for tenant {tenant_id}: {message}")]
    Safety {
        /// Generated violation id
        violation_id: String,
        /// Which rule fired
        rule: RuleType,
        /// Tenant the rule fired for
        tenant_id: String,
        /// Human-readable explanation
        message: String,
        /// Free-form context (tool name, estimates, ...)
        #[serde(default)]
        details: Map<String, Value>,
    },

    /// An aggregate quota blocked the operation
    #[error("quota {quota} exceeded for tenant {tenant_id}: {current_usage} > {limit}")]
    QuotaExceeded {
        /// Generated violation id
        violation_id: String,
        /// Which quota was exceeded
        quota: QuotaKind,
        /// Tenant the quota was exceeded for
        tenant_id: String,
        /// Projected usage including the pending operation
        current_usage: f64,
        /// Configured ceiling
        limit: f64,
        /// Free-form context
        #[serde(default)]
        details: Map<String, Value>,
    },
}

impl Violation {
    /// Build a safety violation with a fresh id.
    pub fn safety(rule: RuleType, tenant_id: impl Into<String>, message: impl Into<String>) -> Self {
        Violation::Safety {
            violation_id: Uuid::new_v4().to_string(),
            rule,
            tenant_id: tenant_id.into(),
            message: message.into(),
            details: Map::new(),
        }
    }

    /// Build a quota violation with a fresh id. `current_usage` is the
    /// projected usage including the pending operation.
    pub fn quota(
        quota: QuotaKind,
        tenant_id: impl Into<String>,
        current_usage: f64,
        limit: f64,
    ) -> Self {
        Violation::QuotaExceeded {
            violation_id: Uuid::new_v4().to_string(),
            quota,
            tenant_id: tenant_id.into(),
            current_usage,
            limit,
            details: Map::new(),
        }
    }

    /// Attach a context detail.
    pub fn with_detail(mut self, key: &str, value: Value) -> Self {
        match &mut self {
            Violation::Safety { details, .. } | Violation::QuotaExceeded { details, .. } => {
                details.insert(key.to_string(), value);
            }
        }
        self
    }

    /// Generated violation id.
    pub fn violation_id(&self) -> &str {
        match self {
            Violation::Safety { violation_id, .. }
            | Violation::QuotaExceeded { violation_id, .. } => violation_id,
        }
    }

    /// Tenant the violation is scoped to.
    pub fn tenant_id(&self) -> &str {
        match self {
            Violation::Safety { tenant_id, .. } | Violation::QuotaExceeded { tenant_id, .. } => {
                tenant_id
            }
        }
    }

    /// Snake_case type label (`llm_tokens`, `vector_writes`, ...), used as
    /// the incident `violation_type` and the audit event payload tag.
    pub fn violation_type(&self) -> &'static str {
        match self {
            Violation::Safety { rule, .. } => rule.as_str(),
            Violation::QuotaExceeded { quota, .. } => quota.as_str(),
        }
    }

    /// Audit event type: `safety_violation` or `quota_exceeded`.
    pub fn event_type(&self) -> &'static str {
        match self {
            Violation::Safety { .. } => "safety_violation",
            Violation::QuotaExceeded { .. } => "quota_exceeded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_snake_case() {
        assert_eq!(RuleType::ToolDisallowed.as_str(), "tool_disallowed");
        assert_eq!(QuotaKind::ToolExecTime.as_str(), "tool_exec_time");
        let json = serde_json::to_value(RuleType::LlmRate).unwrap();
        assert_eq!(json, serde_json::json!("llm_rate"));
    }

    #[test]
    fn quota_violation_carries_projection() {
        let v = Violation::quota(QuotaKind::ToolCalls, "t1", 3.0, 2.0);
        match &v {
            Violation::QuotaExceeded {
                current_usage,
                limit,
                ..
            } => {
                assert_eq!(*current_usage, 3.0);
                assert_eq!(*limit, 2.0);
            }
            _ => panic!("expected quota violation"),
        }
        assert_eq!(v.violation_type(), "tool_calls");
        assert!(v.to_string().contains("3 > 2"));
    }

    #[test]
    fn violations_round_trip_as_json() {
        let v = Violation::safety(RuleType::ToolDisallowed, "t1", "tool drop_table is disallowed")
            .with_detail("tool", serde_json::json!("drop_table"));
        let line = serde_json::to_string(&v).unwrap();
        let back: Violation = serde_json::from_str(&line).unwrap();
        assert_eq!(back.violation_id(), v.violation_id());
        assert_eq!(back.violation_type(), "tool_disallowed");
    }
}
