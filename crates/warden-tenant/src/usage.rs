//! Per-tenant usage counters with tumbling time windows
//!
//! Counters are only meaningful relative to their own window start: every
//! read first calls [`WindowedCounter::reset_if_expired`], which zeroes the
//! counter and advances the window the first time it is observed expired.
//! Windows tumble rather than slide, so a burst straddling a window
//! boundary can see up to twice the per-window limit. That is a deliberate
//! simplification carried over from the governance design, not a bug.

use dashmap::DashMap;
use std::time::{Duration, Instant};

use warden_common::TenantId;

/// Rate-style window length.
pub const MINUTE: Duration = Duration::from_secs(60);
/// Cost window length.
pub const HOUR: Duration = Duration::from_secs(3_600);
/// Daily ceiling window length.
pub const DAY: Duration = Duration::from_secs(86_400);

/// A counter scoped to a tumbling time window.
#[derive(Debug, Clone)]
pub struct WindowedCounter {
    value: f64,
    window: Duration,
    window_start: Instant,
}

impl WindowedCounter {
    pub fn new(window: Duration, now: Instant) -> Self {
        Self {
            value: 0.0,
            window,
            window_start: now,
        }
    }

    /// Zero the counter and advance the window start if the window has
    /// elapsed. Must run before any read or comparison.
    pub fn reset_if_expired(&mut self, now: Instant) {
        if now.duration_since(self.window_start) >= self.window {
            self.value = 0.0;
            self.window_start = now;
        }
    }

    /// Window-hygienic read.
    pub fn value(&mut self, now: Instant) -> f64 {
        self.reset_if_expired(now);
        self.value
    }

    /// Window-hygienic increment.
    pub fn add(&mut self, amount: f64, now: Instant) {
        self.reset_if_expired(now);
        self.value += amount;
    }

    /// Start of the current window.
    pub fn window_start(&self) -> Instant {
        self.window_start
    }

    /// Rewind the window start, used by tests and replay simulations to
    /// force expiry without waiting on the wall clock.
    pub fn backdate(&mut self, by: Duration) {
        self.window_start -= by;
    }
}

/// Mutable usage state for one tenant, created zeroed on first access.
///
/// Minute/hour/day windows are tracked independently per counter family.
/// The safety enforcer owns the per-call family (`llm_calls_minute`,
/// `llm_cost_hour`); the quota enforcer owns the aggregate family; both
/// share the lifetime totals.
#[derive(Debug, Clone)]
pub struct TenantUsage {
    // Aggregate quota counters
    pub llm_tokens_day: WindowedCounter,
    pub llm_requests_minute: WindowedCounter,
    pub llm_cost_day: WindowedCounter,
    pub vector_queries_minute: WindowedCounter,
    pub vector_writes_minute: WindowedCounter,
    pub tool_calls_minute: WindowedCounter,
    pub tool_exec_ms_minute: WindowedCounter,

    // Safety rule counters
    pub llm_calls_minute: WindowedCounter,
    pub llm_cost_hour: WindowedCounter,

    /// Total vector storage in MB. Unwindowed; signed deltas, floored at 0.
    pub vector_storage_mb: f64,

    // Lifetime totals
    pub total_llm_tokens: u64,
    pub total_llm_cost: f64,
    pub total_llm_calls: u64,
    pub total_tool_calls: u64,
    pub total_tool_exec_ms: u64,
    pub total_tool_retries: u64,
    /// Running maximum of observed tool execution time
    pub max_tool_exec_ms: u64,
}

impl TenantUsage {
    pub fn new(now: Instant) -> Self {
        Self {
            llm_tokens_day: WindowedCounter::new(DAY, now),
            llm_requests_minute: WindowedCounter::new(MINUTE, now),
            llm_cost_day: WindowedCounter::new(DAY, now),
            vector_queries_minute: WindowedCounter::new(MINUTE, now),
            vector_writes_minute: WindowedCounter::new(MINUTE, now),
            tool_calls_minute: WindowedCounter::new(MINUTE, now),
            tool_exec_ms_minute: WindowedCounter::new(MINUTE, now),
            llm_calls_minute: WindowedCounter::new(MINUTE, now),
            llm_cost_hour: WindowedCounter::new(HOUR, now),
            vector_storage_mb: 0.0,
            total_llm_tokens: 0,
            total_llm_cost: 0.0,
            total_llm_calls: 0,
            total_tool_calls: 0,
            total_tool_exec_ms: 0,
            total_tool_retries: 0,
            max_tool_exec_ms: 0,
        }
    }

    /// Run window hygiene on every windowed counter.
    pub fn reset_expired(&mut self, now: Instant) {
        self.llm_tokens_day.reset_if_expired(now);
        self.llm_requests_minute.reset_if_expired(now);
        self.llm_cost_day.reset_if_expired(now);
        self.vector_queries_minute.reset_if_expired(now);
        self.vector_writes_minute.reset_if_expired(now);
        self.tool_calls_minute.reset_if_expired(now);
        self.tool_exec_ms_minute.reset_if_expired(now);
        self.llm_calls_minute.reset_if_expired(now);
        self.llm_cost_hour.reset_if_expired(now);
    }

    /// Apply a signed storage delta, floored at zero.
    pub fn apply_storage_delta(&mut self, delta_mb: f64) {
        self.vector_storage_mb = (self.vector_storage_mb + delta_mb).max(0.0);
    }
}

/// Shared map of `tenant_id -> TenantUsage`, lazily populated.
///
/// All reads and writes go through [`UsageRegistry::with`], which holds the
/// per-tenant entry lock across the closure so a read-then-write of a
/// counter can never lose an update to a concurrent `record_*` call. The
/// closure must not touch the registry again (the entry lock is held) and
/// must not block on I/O.
///
/// The enforcers' `check_*` then `record_*` pair is deliberately NOT
/// atomic across the two calls: the external operation runs between them,
/// outside any lock, so concurrent requests can transiently over-admit by
/// the number of requests in flight at check time.
pub struct UsageRegistry {
    states: DashMap<TenantId, TenantUsage>,
}

impl UsageRegistry {
    pub fn new() -> Self {
        Self {
            states: DashMap::new(),
        }
    }

    /// Run `f` against the tenant's usage state under the entry lock,
    /// creating a zeroed state on first access.
    pub fn with<R>(&self, tenant_id: &str, f: impl FnOnce(&mut TenantUsage, Instant) -> R) -> R {
        self.with_at(tenant_id, Instant::now(), f)
    }

    /// Clock-injectable variant of [`UsageRegistry::with`], used by tests
    /// and replay simulations.
    pub fn with_at<R>(
        &self,
        tenant_id: &str,
        now: Instant,
        f: impl FnOnce(&mut TenantUsage, Instant) -> R,
    ) -> R {
        let mut entry = self
            .states
            .entry(tenant_id.to_string())
            .or_insert_with(|| TenantUsage::new(now));
        f(entry.value_mut(), now)
    }

    /// Tenants with recorded usage, in no particular order.
    pub fn tenants(&self) -> Vec<TenantId> {
        self.states.iter().map(|e| e.key().clone()).collect()
    }

    /// Drop all usage state. Test-time reset hook.
    pub fn reset(&self) {
        self.states.clear();
    }
}

impl Default for UsageRegistry {
    fn default() -> Self {
        Self::new()
    }
}
