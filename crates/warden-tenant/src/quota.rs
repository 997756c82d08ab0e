//! Quota enforcer
//!
//! Aggregate consumption ceilings across the three resource families:
//! language-model (tokens/day, requests/minute, cost/day), vector store
//! (queries/minute, writes/minute, total storage MB), and tools
//! (calls/minute, execution-ms/minute). Also the usage-summary dashboard
//! hook and best-effort JSONL usage snapshots.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::limits::LimitResolver;
use crate::usage::UsageRegistry;
use warden_common::audit::forward_violation;
use warden_common::{jsonl, AuditSink, QuotaKind, Violation};

/// Enforces aggregate consumption quotas. Every `check_*` computes the
/// projected usage including the pending operation and fails when the
/// projection exceeds the ceiling, so the returned violation can render
/// "X > Y" without recomputation.
pub struct QuotaEnforcer {
    limits: Arc<LimitResolver>,
    usage: Arc<UsageRegistry>,
    audit: Option<Arc<dyn AuditSink>>,
    snapshot_dir: Option<PathBuf>,
    max_inflight_overshoot: u32,
}

impl QuotaEnforcer {
    pub fn new(limits: Arc<LimitResolver>, usage: Arc<UsageRegistry>) -> Self {
        Self {
            limits,
            usage,
            audit: None,
            snapshot_dir: None,
            max_inflight_overshoot: 1,
        }
    }

    /// Attach an audit sink for fire-and-forget violation forwarding.
    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Directory for per-tenant `{tenant}_usage.jsonl` snapshot files.
    /// Without one, snapshot calls are no-ops.
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    /// Advisory bound on transient over-admission. The check→record pair
    /// is not atomic, so up to this many in-flight requests may pass a
    /// check before any of them records; the bound is reported in the
    /// usage summary for operators, not enforced.
    pub fn with_inflight_overshoot(mut self, bound: u32) -> Self {
        self.max_inflight_overshoot = bound;
        self
    }

    /// Quota check for one pending language-model request.
    pub fn check_llm_quota(
        &self,
        tenant_id: &str,
        tokens: u64,
        estimated_cost: f64,
    ) -> Result<(), Violation> {
        self.check_llm_quota_at(tenant_id, tokens, estimated_cost, Instant::now())
    }

    /// Clock-injectable variant of [`QuotaEnforcer::check_llm_quota`].
    pub fn check_llm_quota_at(
        &self,
        tenant_id: &str,
        tokens: u64,
        estimated_cost: f64,
        now: Instant,
    ) -> Result<(), Violation> {
        let limits = self.limits.resolve_quotas(tenant_id);
        let result = self.usage.with_at(tenant_id, now, |usage, now| {
            let projected = usage.llm_tokens_day.value(now) + tokens as f64;
            if projected > limits.llm_tokens_per_day as f64 {
                return Err(Violation::quota(
                    QuotaKind::LlmTokens,
                    tenant_id,
                    projected,
                    limits.llm_tokens_per_day as f64,
                ));
            }
            let projected = usage.llm_requests_minute.value(now) + 1.0;
            if projected > limits.llm_requests_per_minute as f64 {
                return Err(Violation::quota(
                    QuotaKind::LlmRequests,
                    tenant_id,
                    projected,
                    limits.llm_requests_per_minute as f64,
                ));
            }
            let projected = usage.llm_cost_day.value(now) + estimated_cost;
            if projected > limits.llm_cost_per_day {
                return Err(Violation::quota(
                    QuotaKind::LlmCost,
                    tenant_id,
                    projected,
                    limits.llm_cost_per_day,
                ));
            }
            Ok(())
        });
        if let Err(v) = &result {
            forward_violation(self.audit.as_deref(), v);
        }
        result
    }

    /// Record a completed language-model request against the daily and
    /// per-minute windows. Never fails.
    pub fn record_llm_usage(&self, tenant_id: &str, tokens: u64, cost: f64) {
        self.record_llm_usage_at(tenant_id, tokens, cost, Instant::now());
    }

    /// Clock-injectable variant of [`QuotaEnforcer::record_llm_usage`].
    pub fn record_llm_usage_at(&self, tenant_id: &str, tokens: u64, cost: f64, now: Instant) {
        self.usage.with_at(tenant_id, now, |usage, now| {
            usage.llm_tokens_day.add(tokens as f64, now);
            usage.llm_requests_minute.add(1.0, now);
            usage.llm_cost_day.add(cost, now);
        });
    }

    /// Quota check for a pending vector-store operation. Only the
    /// families with a positive pending amount are checked; a negative
    /// storage delta (deletion) is never blocked.
    pub fn check_vector_quota(
        &self,
        tenant_id: &str,
        queries: u64,
        writes: u64,
        storage_mb_delta: f64,
    ) -> Result<(), Violation> {
        self.check_vector_quota_at(tenant_id, queries, writes, storage_mb_delta, Instant::now())
    }

    /// Clock-injectable variant of [`QuotaEnforcer::check_vector_quota`].
    pub fn check_vector_quota_at(
        &self,
        tenant_id: &str,
        queries: u64,
        writes: u64,
        storage_mb_delta: f64,
        now: Instant,
    ) -> Result<(), Violation> {
        let limits = self.limits.resolve_quotas(tenant_id);
        let result = self.usage.with_at(tenant_id, now, |usage, now| {
            if queries > 0 {
                let projected = usage.vector_queries_minute.value(now) + queries as f64;
                if projected > limits.vector_queries_per_minute as f64 {
                    return Err(Violation::quota(
                        QuotaKind::VectorQueries,
                        tenant_id,
                        projected,
                        limits.vector_queries_per_minute as f64,
                    ));
                }
            }
            if writes > 0 {
                let projected = usage.vector_writes_minute.value(now) + writes as f64;
                if projected > limits.vector_writes_per_minute as f64 {
                    return Err(Violation::quota(
                        QuotaKind::VectorWrites,
                        tenant_id,
                        projected,
                        limits.vector_writes_per_minute as f64,
                    ));
                }
            }
            if storage_mb_delta > 0.0 {
                let projected = usage.vector_storage_mb + storage_mb_delta;
                if projected > limits.vector_storage_mb {
                    return Err(Violation::quota(
                        QuotaKind::VectorStorage,
                        tenant_id,
                        projected,
                        limits.vector_storage_mb,
                    ));
                }
            }
            Ok(())
        });
        if let Err(v) = &result {
            forward_violation(self.audit.as_deref(), v);
        }
        result
    }

    /// Record completed vector-store operations. The storage delta is
    /// signed so deletions shrink usage; the total floors at zero.
    pub fn record_vector_usage(
        &self,
        tenant_id: &str,
        queries: u64,
        writes: u64,
        storage_mb_delta: f64,
    ) {
        self.usage.with(tenant_id, |usage, now| {
            if queries > 0 {
                usage.vector_queries_minute.add(queries as f64, now);
            }
            if writes > 0 {
                usage.vector_writes_minute.add(writes as f64, now);
            }
            usage.apply_storage_delta(storage_mb_delta);
        });
    }

    /// Quota check for pending tool execution.
    pub fn check_tool_quota(
        &self,
        tenant_id: &str,
        calls: u64,
        exec_time_ms: u64,
    ) -> Result<(), Violation> {
        self.check_tool_quota_at(tenant_id, calls, exec_time_ms, Instant::now())
    }

    /// Clock-injectable variant of [`QuotaEnforcer::check_tool_quota`].
    pub fn check_tool_quota_at(
        &self,
        tenant_id: &str,
        calls: u64,
        exec_time_ms: u64,
        now: Instant,
    ) -> Result<(), Violation> {
        let limits = self.limits.resolve_quotas(tenant_id);
        let result = self.usage.with_at(tenant_id, now, |usage, now| {
            if calls > 0 {
                let projected = usage.tool_calls_minute.value(now) + calls as f64;
                if projected > limits.tool_calls_per_minute as f64 {
                    return Err(Violation::quota(
                        QuotaKind::ToolCalls,
                        tenant_id,
                        projected,
                        limits.tool_calls_per_minute as f64,
                    ));
                }
            }
            if exec_time_ms > 0 {
                let projected = usage.tool_exec_ms_minute.value(now) + exec_time_ms as f64;
                if projected > limits.tool_exec_ms_per_minute as f64 {
                    return Err(Violation::quota(
                        QuotaKind::ToolExecTime,
                        tenant_id,
                        projected,
                        limits.tool_exec_ms_per_minute as f64,
                    ));
                }
            }
            Ok(())
        });
        if let Err(v) = &result {
            forward_violation(self.audit.as_deref(), v);
        }
        result
    }

    /// Record completed tool execution against the per-minute windows.
    pub fn record_tool_usage(&self, tenant_id: &str, calls: u64, exec_time_ms: u64) {
        self.usage.with(tenant_id, |usage, now| {
            if calls > 0 {
                usage.tool_calls_minute.add(calls as f64, now);
            }
            if exec_time_ms > 0 {
                usage.tool_exec_ms_minute.add(exec_time_ms as f64, now);
            }
        });
    }

    /// Read-only snapshot of all quota counters with limits and remaining
    /// headroom, after lazy window resets. The primary observability hook
    /// for dashboards.
    pub fn usage_summary(&self, tenant_id: &str) -> UsageSummary {
        self.usage_summary_at(tenant_id, Instant::now())
    }

    /// Clock-injectable variant of [`QuotaEnforcer::usage_summary`].
    pub fn usage_summary_at(&self, tenant_id: &str, now: Instant) -> UsageSummary {
        let limits = self.limits.resolve_quotas(tenant_id);
        self.usage.with_at(tenant_id, now, |usage, now| {
            usage.reset_expired(now);
            let quotas = vec![
                QuotaUsage::new(
                    QuotaKind::LlmTokens,
                    usage.llm_tokens_day.value(now),
                    limits.llm_tokens_per_day as f64,
                ),
                QuotaUsage::new(
                    QuotaKind::LlmRequests,
                    usage.llm_requests_minute.value(now),
                    limits.llm_requests_per_minute as f64,
                ),
                QuotaUsage::new(
                    QuotaKind::LlmCost,
                    usage.llm_cost_day.value(now),
                    limits.llm_cost_per_day,
                ),
                QuotaUsage::new(
                    QuotaKind::VectorQueries,
                    usage.vector_queries_minute.value(now),
                    limits.vector_queries_per_minute as f64,
                ),
                QuotaUsage::new(
                    QuotaKind::VectorWrites,
                    usage.vector_writes_minute.value(now),
                    limits.vector_writes_per_minute as f64,
                ),
                QuotaUsage::new(
                    QuotaKind::VectorStorage,
                    usage.vector_storage_mb,
                    limits.vector_storage_mb,
                ),
                QuotaUsage::new(
                    QuotaKind::ToolCalls,
                    usage.tool_calls_minute.value(now),
                    limits.tool_calls_per_minute as f64,
                ),
                QuotaUsage::new(
                    QuotaKind::ToolExecTime,
                    usage.tool_exec_ms_minute.value(now),
                    limits.tool_exec_ms_per_minute as f64,
                ),
            ];
            UsageSummary {
                tenant_id: tenant_id.to_string(),
                captured_at: Utc::now(),
                quotas,
                total_llm_tokens: usage.total_llm_tokens,
                total_llm_cost: usage.total_llm_cost,
                total_llm_calls: usage.total_llm_calls,
                total_tool_calls: usage.total_tool_calls,
                total_tool_exec_ms: usage.total_tool_exec_ms,
                max_tool_exec_ms: usage.max_tool_exec_ms,
                max_inflight_overshoot: self.max_inflight_overshoot,
            }
        })
    }

    /// Append one usage snapshot line to `{tenant}_usage.jsonl`.
    /// Best-effort: failures are logged, never raised. The snapshot is
    /// built under the tenant lock and written outside it.
    pub fn persist_usage_snapshot(&self, tenant_id: &str) {
        let Some(dir) = &self.snapshot_dir else {
            return;
        };
        let summary = self.usage_summary(tenant_id);
        let path = dir.join(format!("{}_usage.jsonl", tenant_id));
        if let Err(e) = jsonl::append_line(&path, &summary) {
            tracing::warn!(
                "failed to persist usage snapshot for tenant {}: {}",
                tenant_id,
                e
            );
        }
    }

    /// Snapshot every tenant with recorded usage.
    pub fn persist_all_usage_snapshots(&self) {
        for tenant_id in self.usage.tenants() {
            self.persist_usage_snapshot(&tenant_id);
        }
    }
}

/// One quota counter with its ceiling and remaining headroom.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaUsage {
    pub quota: QuotaKind,
    pub used: f64,
    pub limit: f64,
    pub remaining: f64,
}

impl QuotaUsage {
    fn new(quota: QuotaKind, used: f64, limit: f64) -> Self {
        Self {
            quota,
            used,
            limit,
            remaining: (limit - used).max(0.0),
        }
    }
}

/// Self-describing snapshot of a tenant's consumption, serialized verbatim
/// into `{tenant}_usage.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSummary {
    pub tenant_id: String,
    /// ISO-8601 capture timestamp
    pub captured_at: DateTime<Utc>,
    pub quotas: Vec<QuotaUsage>,
    pub total_llm_tokens: u64,
    pub total_llm_cost: f64,
    pub total_llm_calls: u64,
    pub total_tool_calls: u64,
    pub total_tool_exec_ms: u64,
    pub max_tool_exec_ms: u64,
    /// Advisory bound on transient check→record over-admission
    pub max_inflight_overshoot: u32,
}

impl UsageSummary {
    /// Entry for one quota kind.
    pub fn quota(&self, kind: QuotaKind) -> Option<&QuotaUsage> {
        self.quotas.iter().find(|q| q.quota == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuotaLimits;
    use crate::usage::MINUTE;

    fn enforcer_with(tenant: &str, limits: QuotaLimits) -> (QuotaEnforcer, Arc<UsageRegistry>) {
        let resolver = Arc::new(LimitResolver::default());
        resolver.set_quota_limits(tenant, limits);
        let usage = Arc::new(UsageRegistry::new());
        (QuotaEnforcer::new(resolver, usage.clone()), usage)
    }

    fn expect_quota(result: Result<(), Violation>, expected: QuotaKind) -> (f64, f64) {
        match result {
            Err(Violation::QuotaExceeded {
                quota,
                current_usage,
                limit,
                ..
            }) => {
                assert_eq!(quota, expected);
                (current_usage, limit)
            }
            other => panic!("expected {:?} violation, got {:?}", expected, other),
        }
    }

    #[test]
    fn request_rate_blocks_after_k_records_and_recovers() {
        let k = 3;
        let (enforcer, usage) = enforcer_with(
            "t1",
            QuotaLimits {
                llm_requests_per_minute: k,
                ..QuotaLimits::default()
            },
        );

        for _ in 0..k {
            assert!(enforcer.check_llm_quota("t1", 10, 0.01).is_ok());
            enforcer.record_llm_usage("t1", 10, 0.01);
        }
        let (current, limit) = expect_quota(
            enforcer.check_llm_quota("t1", 10, 0.01),
            QuotaKind::LlmRequests,
        );
        assert_eq!(current, k as f64 + 1.0);
        assert_eq!(limit, k as f64);

        // Simulated window expiry admits requests again.
        usage.with("t1", |u, _| u.llm_requests_minute.backdate(MINUTE));
        assert!(enforcer.check_llm_quota("t1", 10, 0.01).is_ok());
    }

    #[test]
    fn daily_token_ceiling_uses_projection() {
        let (enforcer, _) = enforcer_with(
            "t1",
            QuotaLimits {
                llm_tokens_per_day: 100,
                ..QuotaLimits::default()
            },
        );
        enforcer.record_llm_usage("t1", 90, 0.0);
        assert!(enforcer.check_llm_quota("t1", 10, 0.0).is_ok());
        let (current, limit) =
            expect_quota(enforcer.check_llm_quota("t1", 11, 0.0), QuotaKind::LlmTokens);
        assert_eq!(current, 101.0);
        assert_eq!(limit, 100.0);
    }

    #[test]
    fn tool_call_quota_end_to_end() {
        let (enforcer, _) = enforcer_with(
            "t1",
            QuotaLimits {
                tool_calls_per_minute: 2,
                ..QuotaLimits::default()
            },
        );
        enforcer.record_tool_usage("t1", 1, 50);
        enforcer.record_tool_usage("t1", 1, 50);
        let (current, limit) =
            expect_quota(enforcer.check_tool_quota("t1", 1, 0), QuotaKind::ToolCalls);
        assert_eq!(current, 3.0);
        assert_eq!(limit, 2.0);
    }

    #[test]
    fn storage_delta_is_signed_and_deletions_never_block() {
        let (enforcer, usage) = enforcer_with(
            "t1",
            QuotaLimits {
                vector_storage_mb: 10.0,
                ..QuotaLimits::default()
            },
        );
        enforcer.record_vector_usage("t1", 0, 0, 10.0);
        let (current, limit) = expect_quota(
            enforcer.check_vector_quota("t1", 0, 0, 1.0),
            QuotaKind::VectorStorage,
        );
        assert_eq!(current, 11.0);
        assert_eq!(limit, 10.0);

        // Deletions are admitted even at the ceiling, and shrink usage.
        assert!(enforcer.check_vector_quota("t1", 0, 0, -5.0).is_ok());
        enforcer.record_vector_usage("t1", 0, 0, -5.0);
        assert_eq!(usage.with("t1", |u, _| u.vector_storage_mb), 5.0);
        assert!(enforcer.check_vector_quota("t1", 0, 0, 5.0).is_ok());
    }

    #[test]
    fn check_then_record_gap_allows_bounded_over_admission() {
        // Two in-flight requests both pass the check before either
        // records; the overshoot equals the in-flight count. Tumbling
        // windows plus the unlocked external operation make this the
        // documented behavior, not a bug.
        let (enforcer, _) = enforcer_with(
            "t1",
            QuotaLimits {
                llm_requests_per_minute: 1,
                ..QuotaLimits::default()
            },
        );
        assert!(enforcer.check_llm_quota("t1", 1, 0.0).is_ok());
        assert!(enforcer.check_llm_quota("t1", 1, 0.0).is_ok());
        enforcer.record_llm_usage("t1", 1, 0.0);
        enforcer.record_llm_usage("t1", 1, 0.0);
        expect_quota(enforcer.check_llm_quota("t1", 1, 0.0), QuotaKind::LlmRequests);
    }

    #[test]
    fn summary_reports_remaining_headroom() {
        let (enforcer, _) = enforcer_with(
            "t1",
            QuotaLimits {
                llm_requests_per_minute: 10,
                ..QuotaLimits::default()
            },
        );
        for _ in 0..4 {
            enforcer.record_llm_usage("t1", 100, 0.1);
        }
        let summary = enforcer.usage_summary("t1");
        let requests = summary.quota(QuotaKind::LlmRequests).unwrap();
        assert_eq!(requests.used, 4.0);
        assert_eq!(requests.remaining, 6.0);
        let tokens = summary.quota(QuotaKind::LlmTokens).unwrap();
        assert_eq!(tokens.used, 400.0);
    }

    #[test]
    fn snapshots_append_one_line_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = Arc::new(LimitResolver::default());
        let usage = Arc::new(UsageRegistry::new());
        let enforcer =
            QuotaEnforcer::new(resolver, usage).with_snapshot_dir(dir.path());

        enforcer.record_llm_usage("t1", 10, 0.01);
        enforcer.persist_usage_snapshot("t1");
        enforcer.persist_usage_snapshot("t1");

        let path = dir.path().join("t1_usage.jsonl");
        let snapshots: Vec<UsageSummary> = jsonl::read_lines(&path).unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[1].tenant_id, "t1");
        assert_eq!(snapshots[1].total_llm_tokens, 10);
    }

    #[test]
    fn persist_all_covers_every_known_tenant() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = Arc::new(LimitResolver::default());
        let usage = Arc::new(UsageRegistry::new());
        let enforcer =
            QuotaEnforcer::new(resolver, usage).with_snapshot_dir(dir.path());

        enforcer.record_llm_usage("t1", 1, 0.0);
        enforcer.record_tool_usage("t2", 1, 5);
        enforcer.persist_all_usage_snapshots();

        assert!(dir.path().join("t1_usage.jsonl").exists());
        assert!(dir.path().join("t2_usage.jsonl").exists());
    }

    #[test]
    fn missing_snapshot_dir_is_a_noop() {
        let (enforcer, _) = enforcer_with("t1", QuotaLimits::default());
        enforcer.record_llm_usage("t1", 1, 0.0);
        enforcer.persist_usage_snapshot("t1");
        enforcer.persist_all_usage_snapshots();
    }
}
