//! Runbook suggestion collaborator
//!
//! The incident manager hands every new incident to a suggester so
//! remediation can be offered alongside the record. Suggestion is
//! best-effort: failures are logged by the manager and never propagate.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::incidents::Incident;
use warden_common::{Severity, WardenResult};

/// A remediation runbook reference. Content loading and step execution
/// live outside this core; only the identity travels here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Runbook {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// External collaborator that maps an incident to candidate runbooks.
pub trait RunbookSuggester: Send + Sync {
    /// Suggest runbooks for an incident. `component`, `error_code`, and
    /// `tags` narrow the search when the caller has them; the enforcement
    /// path passes none.
    fn suggest(
        &self,
        incident: &Incident,
        severity: Severity,
        tenant_id: &str,
        component: Option<&str>,
        error_code: Option<&str>,
        tags: &[String],
    ) -> WardenResult<Vec<Runbook>>;
}

/// Registry-backed suggester keyed by violation type. Useful as a default
/// and in tests; production deployments plug in a retrieval-backed one.
pub struct StaticRunbookSuggester {
    by_violation_type: HashMap<String, Vec<Runbook>>,
}

impl StaticRunbookSuggester {
    pub fn new() -> Self {
        Self {
            by_violation_type: HashMap::new(),
        }
    }

    /// Register a runbook for a violation type label (`llm_rate`,
    /// `vector_storage`, ...).
    pub fn register(&mut self, violation_type: impl Into<String>, runbook: Runbook) {
        self.by_violation_type
            .entry(violation_type.into())
            .or_default()
            .push(runbook);
    }
}

impl Default for StaticRunbookSuggester {
    fn default() -> Self {
        Self::new()
    }
}

impl RunbookSuggester for StaticRunbookSuggester {
    fn suggest(
        &self,
        incident: &Incident,
        _severity: Severity,
        _tenant_id: &str,
        _component: Option<&str>,
        _error_code: Option<&str>,
        tags: &[String],
    ) -> WardenResult<Vec<Runbook>> {
        let mut matches: Vec<Runbook> = self
            .by_violation_type
            .get(&incident.violation_type)
            .cloned()
            .unwrap_or_default();
        if !tags.is_empty() {
            matches.retain(|r| r.tags.iter().any(|t| tags.contains(t)));
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incidents::{Incident, IncidentStatus};
    use chrono::Utc;

    fn incident(violation_type: &str) -> Incident {
        Incident {
            id: "i1".to_string(),
            tenant_id: "t1".to_string(),
            violation_id: "v1".to_string(),
            violation_type: violation_type.to_string(),
            status: IncidentStatus::Open,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            resolved_at: None,
            resolution_summary: None,
            assigned_to: None,
        }
    }

    #[test]
    fn suggests_by_violation_type() {
        let mut suggester = StaticRunbookSuggester::new();
        suggester.register(
            "llm_rate",
            Runbook {
                id: "rb-1".to_string(),
                title: "Throttle agent loop".to_string(),
                description: String::new(),
                tags: vec![],
            },
        );

        let hits = suggester
            .suggest(&incident("llm_rate"), Severity::High, "t1", None, None, &[])
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "rb-1");

        let misses = suggester
            .suggest(&incident("tool_calls"), Severity::High, "t1", None, None, &[])
            .unwrap();
        assert!(misses.is_empty());
    }
}
