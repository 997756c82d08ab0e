//! Governance context
//!
//! Explicitly constructed bundle of resolver, usage registry, and both
//! enforcers, shared through `Arc` handles. There are no process-wide
//! singletons; callers build one context at startup (normally from a
//! [`GovernanceConfig`]) and pass it down. Tests build a fresh context per
//! case, or use the `reset_usage`/`clear_overrides` hooks.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::limits::LimitResolver;
use crate::model::{QuotaLimits, SafetyLimits};
use crate::quota::QuotaEnforcer;
use crate::safety::SafetyEnforcer;
use crate::usage::UsageRegistry;
use warden_common::{AuditSink, WardenError, WardenResult};

fn default_overshoot() -> u32 {
    1
}

/// Declarative governance configuration, loadable from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Process-wide default safety limits
    #[serde(default)]
    pub default_safety: SafetyLimits,
    /// Process-wide default quota limits
    #[serde(default)]
    pub default_quotas: QuotaLimits,
    /// Per-tenant safety overrides
    #[serde(default)]
    pub safety_overrides: HashMap<String, SafetyLimits>,
    /// Per-tenant quota overrides
    #[serde(default)]
    pub quota_overrides: HashMap<String, QuotaLimits>,
    /// Directory for `{tenant}_usage.jsonl` snapshot files
    #[serde(default)]
    pub snapshot_dir: Option<PathBuf>,
    /// Advisory bound on transient check→record over-admission
    #[serde(default = "default_overshoot")]
    pub max_inflight_overshoot: u32,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            default_safety: SafetyLimits::default(),
            default_quotas: QuotaLimits::default(),
            safety_overrides: HashMap::new(),
            quota_overrides: HashMap::new(),
            snapshot_dir: None,
            max_inflight_overshoot: default_overshoot(),
        }
    }
}

impl GovernanceConfig {
    /// Load a config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> WardenResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| WardenError::Config(format!("{}: {}", path.display(), e)))?;
        let config = serde_json::from_str(&raw)
            .map_err(|e| WardenError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }
}

/// The tenant governance core, wired and ready to share.
pub struct GovernanceContext {
    pub limits: Arc<LimitResolver>,
    pub usage: Arc<UsageRegistry>,
    pub safety: SafetyEnforcer,
    pub quotas: QuotaEnforcer,
}

impl GovernanceContext {
    /// Build a context from a config, without an audit sink.
    pub fn new(config: GovernanceConfig) -> Self {
        Self::build(config, None)
    }

    /// Build a context with an audit sink attached to both enforcers.
    pub fn with_audit(config: GovernanceConfig, sink: Arc<dyn AuditSink>) -> Self {
        Self::build(config, Some(sink))
    }

    fn build(config: GovernanceConfig, sink: Option<Arc<dyn AuditSink>>) -> Self {
        let limits = Arc::new(LimitResolver::new(
            config.default_safety,
            config.default_quotas,
        ));
        for (tenant, override_limits) in config.safety_overrides {
            limits.set_safety_limits(tenant, override_limits);
        }
        for (tenant, override_limits) in config.quota_overrides {
            limits.set_quota_limits(tenant, override_limits);
        }
        let usage = Arc::new(UsageRegistry::new());

        let mut safety = SafetyEnforcer::new(limits.clone(), usage.clone());
        let mut quotas = QuotaEnforcer::new(limits.clone(), usage.clone())
            .with_inflight_overshoot(config.max_inflight_overshoot);
        if let Some(dir) = config.snapshot_dir {
            quotas = quotas.with_snapshot_dir(dir);
        }
        if let Some(sink) = sink {
            safety = safety.with_audit(sink.clone());
            quotas = quotas.with_audit(sink);
        }

        Self {
            limits,
            usage,
            safety,
            quotas,
        }
    }

    /// Drop all usage state. Test-time reset hook.
    pub fn reset_usage(&self) {
        self.usage.reset();
    }
}

impl Default for GovernanceContext {
    fn default() -> Self {
        Self::new(GovernanceConfig::default())
    }
}
