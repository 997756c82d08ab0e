//! OpenWarden shared governance types
//!
//! Common vocabulary for the tenant governance core:
//! - Violation taxonomy (safety rules and quota breaches)
//! - Severity scale shared with incident tracking
//! - Audit sink trait for fire-and-forget violation forwarding
//! - Error/result aliases for bookkeeping faults

#![warn(missing_docs)]

pub mod audit;
pub mod error;
pub mod jsonl;
pub mod violation;

use serde::{Deserialize, Serialize};

pub use audit::{AuditSink, TracingAuditSink};
pub use error::{WardenError, WardenResult};
pub use violation::{QuotaKind, RuleType, Violation};

/// Tenant identifier. The synthetic tenant `"default"` holds process-wide
/// fallback limits.
pub type TenantId = String;

/// Tenant id carrying the process-wide default limit set.
pub const DEFAULT_TENANT: &str = "default";

/// Severity scale shared by incidents and runbook suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Informational only
    Info = 0,
    /// Low impact
    Low = 1,
    /// Degraded but functional
    Medium = 2,
    /// Policy or tool violation
    High = 3,
    /// Tenant-wide outage risk
    Critical = 4,
}

impl Severity {
    /// Canonical uppercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Critical > Severity::High);
    }

    #[test]
    fn severity_serializes_uppercase() {
        let s = serde_json::to_string(&Severity::High).unwrap();
        assert_eq!(s, "\"HIGH\"");
    }
}
