//! Safety rule enforcer
//!
//! Pre-flight, per-call admission checks for language-model and tool
//! calls. Checks are synchronous and fast; the external operation runs
//! between `check_*` and `record_*`, outside any lock.

use std::sync::Arc;
use std::time::Instant;

use serde_json::json;

use crate::limits::LimitResolver;
use crate::usage::UsageRegistry;
use warden_common::audit::forward_violation;
use warden_common::{AuditSink, RuleType, Violation};

/// Enforces per-call safety rules using the resolver and the shared usage
/// registry. Violations are returned to the caller and forwarded to the
/// optional audit sink; sink failures never mask the violation.
pub struct SafetyEnforcer {
    limits: Arc<LimitResolver>,
    usage: Arc<UsageRegistry>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl SafetyEnforcer {
    pub fn new(limits: Arc<LimitResolver>, usage: Arc<UsageRegistry>) -> Self {
        Self {
            limits,
            usage,
            audit: None,
        }
    }

    /// Attach an audit sink for fire-and-forget violation forwarding.
    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Admission check for one language-model call. Rules run in order
    /// (token ceiling, call rate, cost ceiling); the first failure
    /// short-circuits.
    pub fn check_llm_call(
        &self,
        tenant_id: &str,
        tokens: u64,
        estimated_cost: f64,
    ) -> Result<(), Violation> {
        self.check_llm_call_at(tenant_id, tokens, estimated_cost, Instant::now())
    }

    /// Clock-injectable variant of [`SafetyEnforcer::check_llm_call`].
    pub fn check_llm_call_at(
        &self,
        tenant_id: &str,
        tokens: u64,
        estimated_cost: f64,
        now: Instant,
    ) -> Result<(), Violation> {
        let limits = self.limits.resolve_safety(tenant_id);
        let result = self.usage.with_at(tenant_id, now, |usage, now| {
            if tokens > limits.max_tokens_per_call {
                return Err(Violation::safety(
                    RuleType::LlmTokens,
                    tenant_id,
                    format!(
                        "{} tokens exceeds per-call ceiling {}",
                        tokens, limits.max_tokens_per_call
                    ),
                )
                .with_detail("tokens", json!(tokens))
                .with_detail("limit", json!(limits.max_tokens_per_call)));
            }
            if usage.llm_calls_minute.value(now) >= limits.max_calls_per_minute as f64 {
                return Err(Violation::safety(
                    RuleType::LlmRate,
                    tenant_id,
                    format!("call rate ceiling {} reached", limits.max_calls_per_minute),
                )
                .with_detail("limit", json!(limits.max_calls_per_minute)));
            }
            let projected_cost = usage.llm_cost_hour.value(now) + estimated_cost;
            if projected_cost > limits.max_cost_per_hour {
                return Err(Violation::safety(
                    RuleType::LlmCost,
                    tenant_id,
                    format!(
                        "projected hourly cost {:.4} exceeds ceiling {:.4}",
                        projected_cost, limits.max_cost_per_hour
                    ),
                )
                .with_detail("projected_cost", json!(projected_cost))
                .with_detail("limit", json!(limits.max_cost_per_hour)));
            }
            Ok(())
        });
        if let Err(v) = &result {
            forward_violation(self.audit.as_deref(), v);
        }
        result
    }

    /// Record a completed language-model call. Never fails.
    pub fn record_llm_usage(&self, tenant_id: &str, tokens: u64, actual_cost: f64) {
        self.record_llm_usage_at(tenant_id, tokens, actual_cost, Instant::now());
    }

    /// Clock-injectable variant of [`SafetyEnforcer::record_llm_usage`].
    pub fn record_llm_usage_at(&self, tenant_id: &str, tokens: u64, actual_cost: f64, now: Instant) {
        self.usage.with_at(tenant_id, now, |usage, now| {
            usage.llm_calls_minute.add(1.0, now);
            usage.llm_cost_hour.add(actual_cost, now);
            usage.total_llm_calls += 1;
            usage.total_llm_tokens += tokens;
            usage.total_llm_cost += actual_cost;
        });
    }

    /// Admission check for one tool call. The disallow list is consulted
    /// unconditionally, even for a zero execution-time estimate.
    pub fn check_tool_call(
        &self,
        tenant_id: &str,
        tool_name: &str,
        estimated_time_ms: u64,
    ) -> Result<(), Violation> {
        let limits = self.limits.resolve_safety(tenant_id);
        let result = if limits.disallowed_tools.contains(tool_name) {
            Err(Violation::safety(
                RuleType::ToolDisallowed,
                tenant_id,
                format!("tool {} is disallowed", tool_name),
            )
            .with_detail("tool", json!(tool_name)))
        } else if estimated_time_ms > limits.max_tool_exec_ms {
            Err(Violation::safety(
                RuleType::ToolTime,
                tenant_id,
                format!(
                    "estimated {} ms exceeds execution ceiling {} ms",
                    estimated_time_ms, limits.max_tool_exec_ms
                ),
            )
            .with_detail("tool", json!(tool_name))
            .with_detail("estimated_ms", json!(estimated_time_ms))
            .with_detail("limit_ms", json!(limits.max_tool_exec_ms)))
        } else {
            Ok(())
        };
        if let Err(v) = &result {
            forward_violation(self.audit.as_deref(), v);
        }
        result
    }

    /// Record a completed tool call: lifetime totals plus a running
    /// maximum of observed execution time. Logs (does not fail) when the
    /// observed time exceeds the ceiling post-hoc.
    pub fn record_tool_usage(
        &self,
        tenant_id: &str,
        tool_name: &str,
        exec_time_ms: u64,
        retry_count: u32,
    ) {
        let limits = self.limits.resolve_safety(tenant_id);
        if exec_time_ms > limits.max_tool_exec_ms {
            tracing::warn!(
                "tool {} for tenant {} ran {} ms, over the {} ms ceiling",
                tool_name,
                tenant_id,
                exec_time_ms,
                limits.max_tool_exec_ms
            );
        }
        self.usage.with(tenant_id, |usage, _| {
            usage.total_tool_calls += 1;
            usage.total_tool_exec_ms += exec_time_ms;
            usage.total_tool_retries += retry_count as u64;
            usage.max_tool_exec_ms = usage.max_tool_exec_ms.max(exec_time_ms);
        });
    }

    /// Retry ceiling check. A retry count equal to the ceiling is still
    /// permitted; only strictly greater fails.
    pub fn check_tool_retries(
        &self,
        tenant_id: &str,
        tool_name: &str,
        current_retry_count: u32,
    ) -> Result<(), Violation> {
        let limits = self.limits.resolve_safety(tenant_id);
        let result = if current_retry_count > limits.max_tool_retries {
            Err(Violation::safety(
                RuleType::ToolRetries,
                tenant_id,
                format!(
                    "retry {} of tool {} exceeds ceiling {}",
                    current_retry_count, tool_name, limits.max_tool_retries
                ),
            )
            .with_detail("tool", json!(tool_name))
            .with_detail("retries", json!(current_retry_count))
            .with_detail("limit", json!(limits.max_tool_retries)))
        } else {
            Ok(())
        };
        if let Err(v) = &result {
            forward_violation(self.audit.as_deref(), v);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SafetyLimits;
    use crate::usage::MINUTE;
    use parking_lot::Mutex;
    use std::collections::HashSet;

    fn enforcer() -> SafetyEnforcer {
        SafetyEnforcer::new(
            Arc::new(LimitResolver::default()),
            Arc::new(UsageRegistry::new()),
        )
    }

    fn expect_rule(result: Result<(), Violation>, expected: RuleType) {
        match result {
            Err(Violation::Safety { rule, .. }) => assert_eq!(rule, expected),
            other => panic!("expected {:?} violation, got {:?}", expected, other),
        }
    }

    #[test]
    fn token_ceiling_is_inclusive() {
        let limits = Arc::new(LimitResolver::default());
        limits.set_safety_limits(
            "t1",
            SafetyLimits {
                max_tokens_per_call: 100,
                ..SafetyLimits::default()
            },
        );
        let enforcer = SafetyEnforcer::new(limits, Arc::new(UsageRegistry::new()));

        assert!(enforcer.check_llm_call("t1", 100, 0.0).is_ok());
        expect_rule(enforcer.check_llm_call("t1", 101, 0.0), RuleType::LlmTokens);
    }

    #[test]
    fn call_rate_blocks_at_ceiling() {
        let limits = Arc::new(LimitResolver::default());
        limits.set_safety_limits(
            "t1",
            SafetyLimits {
                max_calls_per_minute: 2,
                ..SafetyLimits::default()
            },
        );
        let usage = Arc::new(UsageRegistry::new());
        let enforcer = SafetyEnforcer::new(limits, usage.clone());

        for _ in 0..2 {
            assert!(enforcer.check_llm_call("t1", 10, 0.0).is_ok());
            enforcer.record_llm_usage("t1", 10, 0.0);
        }
        expect_rule(enforcer.check_llm_call("t1", 10, 0.0), RuleType::LlmRate);

        // A fresh minute admits calls again.
        usage.with("t1", |u, _| u.llm_calls_minute.backdate(MINUTE));
        assert!(enforcer.check_llm_call("t1", 10, 0.0).is_ok());
    }

    #[test]
    fn cost_ceiling_projects_pending_call() {
        let limits = Arc::new(LimitResolver::default());
        limits.set_safety_limits(
            "t1",
            SafetyLimits {
                max_cost_per_hour: 1.0,
                ..SafetyLimits::default()
            },
        );
        let enforcer = SafetyEnforcer::new(limits, Arc::new(UsageRegistry::new()));

        assert!(enforcer.check_llm_call("t1", 10, 0.6).is_ok());
        enforcer.record_llm_usage("t1", 10, 0.6);
        expect_rule(enforcer.check_llm_call("t1", 10, 0.6), RuleType::LlmCost);
    }

    #[test]
    fn disallowed_tool_blocks_even_with_zero_estimate() {
        let limits = Arc::new(LimitResolver::default());
        let mut disallowed = HashSet::new();
        disallowed.insert("drop_table".to_string());
        limits.set_safety_limits(
            "t1",
            SafetyLimits {
                disallowed_tools: disallowed,
                ..SafetyLimits::default()
            },
        );
        let enforcer = SafetyEnforcer::new(limits, Arc::new(UsageRegistry::new()));

        expect_rule(
            enforcer.check_tool_call("t1", "drop_table", 0),
            RuleType::ToolDisallowed,
        );
        assert!(enforcer.check_tool_call("t1", "list_tables", 0).is_ok());
    }

    #[test]
    fn tool_time_estimate_over_ceiling_blocks() {
        let enforcer = enforcer();
        let ceiling = SafetyLimits::default().max_tool_exec_ms;
        assert!(enforcer.check_tool_call("t1", "slow_tool", ceiling).is_ok());
        expect_rule(
            enforcer.check_tool_call("t1", "slow_tool", ceiling + 1),
            RuleType::ToolTime,
        );
    }

    #[test]
    fn retry_ceiling_is_strictly_greater() {
        let enforcer = enforcer();
        let max = SafetyLimits::default().max_tool_retries;
        assert!(enforcer.check_tool_retries("t1", "flaky", max).is_ok());
        expect_rule(
            enforcer.check_tool_retries("t1", "flaky", max + 1),
            RuleType::ToolRetries,
        );
    }

    #[test]
    fn record_tool_usage_tracks_running_max() {
        let enforcer = enforcer();
        enforcer.record_tool_usage("t1", "a", 120, 0);
        enforcer.record_tool_usage("t1", "b", 80, 2);
        let (max, total, retries) = enforcer
            .usage
            .with("t1", |u, _| (u.max_tool_exec_ms, u.total_tool_exec_ms, u.total_tool_retries));
        assert_eq!(max, 120);
        assert_eq!(total, 200);
        assert_eq!(retries, 2);
    }

    struct CountingSink(Mutex<Vec<String>>);

    impl AuditSink for CountingSink {
        fn record(&self, event_type: &str, _data: serde_json::Value, _tenant_id: &str) {
            self.0.lock().push(event_type.to_string());
        }
    }

    #[test]
    fn violations_reach_the_audit_sink() {
        let sink = Arc::new(CountingSink(Mutex::new(Vec::new())));
        let limits = Arc::new(LimitResolver::default());
        limits.set_safety_limits(
            "t1",
            SafetyLimits {
                max_tokens_per_call: 1,
                ..SafetyLimits::default()
            },
        );
        let enforcer = SafetyEnforcer::new(limits, Arc::new(UsageRegistry::new()))
            .with_audit(sink.clone());
        assert!(enforcer.check_llm_call("t1", 2, 0.0).is_err());
        assert_eq!(sink.0.lock().as_slice(), &["safety_violation".to_string()]);
    }
}
