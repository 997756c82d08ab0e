//! Limit configuration resolver
//!
//! Resolves the effective limit set for a tenant: exact match in the
//! override map, else the process-wide default. Resolution never fails
//! because a default always exists.

use dashmap::DashMap;

use crate::model::{QuotaLimits, SafetyLimits};
use warden_common::TenantId;

/// Layered limit configuration: per-tenant overrides in front of
/// process-wide defaults.
pub struct LimitResolver {
    default_safety: SafetyLimits,
    default_quotas: QuotaLimits,
    safety_overrides: DashMap<TenantId, SafetyLimits>,
    quota_overrides: DashMap<TenantId, QuotaLimits>,
}

impl LimitResolver {
    pub fn new(default_safety: SafetyLimits, default_quotas: QuotaLimits) -> Self {
        Self {
            default_safety,
            default_quotas,
            safety_overrides: DashMap::new(),
            quota_overrides: DashMap::new(),
        }
    }

    /// Install a tenant-specific safety override.
    pub fn set_safety_limits(&self, tenant_id: impl Into<TenantId>, limits: SafetyLimits) {
        self.safety_overrides.insert(tenant_id.into(), limits);
    }

    /// Install a tenant-specific quota override.
    pub fn set_quota_limits(&self, tenant_id: impl Into<TenantId>, limits: QuotaLimits) {
        self.quota_overrides.insert(tenant_id.into(), limits);
    }

    /// Effective safety limits for a tenant. Pure read.
    pub fn resolve_safety(&self, tenant_id: &str) -> SafetyLimits {
        self.safety_overrides
            .get(tenant_id)
            .map(|e| e.value().clone())
            .unwrap_or_else(|| self.default_safety.clone())
    }

    /// Effective quota limits for a tenant. Pure read.
    pub fn resolve_quotas(&self, tenant_id: &str) -> QuotaLimits {
        self.quota_overrides
            .get(tenant_id)
            .map(|e| e.value().clone())
            .unwrap_or_else(|| self.default_quotas.clone())
    }

    /// Drop every override. Test-time reset hook.
    pub fn clear_overrides(&self) {
        self.safety_overrides.clear();
        self.quota_overrides.clear();
    }
}

impl Default for LimitResolver {
    fn default() -> Self {
        Self::new(SafetyLimits::default(), QuotaLimits::default())
    }
}
