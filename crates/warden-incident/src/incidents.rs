//! Incident records and lifecycle
//!
//! Incidents are append-only: a record is never rewritten, and "updating"
//! one means appending a newer line with the same id to the tenant's
//! `{tenant}_incidents.jsonl`. Readers take the last matching line as
//! current state. Linear scans are acceptable at this incident volume; an
//! indexed store would keep the log as a write-ahead trail.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::runbooks::RunbookSuggester;
use warden_common::{jsonl, Severity, Violation};

/// Incident lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl IncidentStatus {
    /// Permitted transitions: the Open → InProgress → Resolved → Closed
    /// chain, plus Open → Closed directly.
    pub fn can_transition(self, to: IncidentStatus) -> bool {
        matches!(
            (self, to),
            (IncidentStatus::Open, IncidentStatus::InProgress)
                | (IncidentStatus::InProgress, IncidentStatus::Resolved)
                | (IncidentStatus::Resolved, IncidentStatus::Closed)
                | (IncidentStatus::Open, IncidentStatus::Closed)
        )
    }
}

/// A durable incident record created from a violation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub tenant_id: String,
    pub violation_id: String,
    /// Snake_case violation type label (`llm_tokens`, `tool_calls`, ...)
    pub violation_type: String,
    pub status: IncidentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_summary: Option<String>,
    pub assigned_to: Option<String>,
}

#[derive(Default)]
struct IncidentStats {
    total_opened: AtomicU64,
    total_closed: AtomicU64,
}

/// Owns the per-tenant incident logs and the remediation hand-off.
pub struct IncidentManager {
    dir: PathBuf,
    suggester: Option<Arc<dyn RunbookSuggester>>,
    stats: IncidentStats,
}

impl IncidentManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            suggester: None,
            stats: IncidentStats::default(),
        }
    }

    /// Attach a runbook-suggestion collaborator, invoked best-effort on
    /// every opened incident.
    pub fn with_suggester(mut self, suggester: Arc<dyn RunbookSuggester>) -> Self {
        self.suggester = Some(suggester);
        self
    }

    fn log_path(&self, tenant_id: &str) -> PathBuf {
        self.dir.join(format!("{}_incidents.jsonl", tenant_id))
    }

    /// Open an incident for a violation. The record is appended to the
    /// tenant's log and remediation is suggested; both are best-effort and
    /// never fail the intake.
    pub fn open_incident(
        &self,
        tenant_id: &str,
        violation_id: &str,
        violation_type: &str,
    ) -> Incident {
        let now = Utc::now();
        let incident = Incident {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            violation_id: violation_id.to_string(),
            violation_type: violation_type.to_string(),
            status: IncidentStatus::Open,
            created_at: now,
            updated_at: now,
            resolved_at: None,
            resolution_summary: None,
            assigned_to: None,
        };
        self.append(&incident);
        self.stats.total_opened.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            "opened incident {} for tenant {} ({})",
            incident.id,
            tenant_id,
            violation_type
        );

        // Policy and tool violations are triaged at HIGH severity.
        if let Some(suggester) = &self.suggester {
            match suggester.suggest(&incident, Severity::High, tenant_id, None, None, &[]) {
                Ok(runbooks) => {
                    if !runbooks.is_empty() {
                        tracing::info!(
                            "suggested {} runbooks for incident {}",
                            runbooks.len(),
                            incident.id
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!("runbook suggestion failed for incident {}: {}", incident.id, e);
                }
            }
        }
        incident
    }

    /// Open an incident straight from a violation value.
    pub fn open_for(&self, violation: &Violation) -> Incident {
        self.open_incident(
            violation.tenant_id(),
            violation.violation_id(),
            violation.violation_type(),
        )
    }

    /// Close an incident: append a newer record with status Closed,
    /// `resolved_at` stamped, and `created_at` untouched. Returns `None`
    /// when the incident does not exist or cannot transition (e.g. is
    /// already closed).
    pub fn close_incident(
        &self,
        incident_id: &str,
        resolution_summary: &str,
        tenant_id: Option<&str>,
    ) -> Option<Incident> {
        let current = self.get_incident(incident_id, tenant_id)?;
        if !current.status.can_transition(IncidentStatus::Closed) {
            tracing::warn!(
                "incident {} is {:?}; cannot close",
                incident_id,
                current.status
            );
            return None;
        }
        let now = Utc::now();
        let closed = Incident {
            status: IncidentStatus::Closed,
            updated_at: now,
            resolved_at: Some(now),
            resolution_summary: Some(resolution_summary.to_string()),
            ..current
        };
        self.append(&closed);
        self.stats.total_closed.fetch_add(1, Ordering::Relaxed);
        Some(closed)
    }

    /// Current state of an incident: the last matching line in the
    /// tenant's log, or in all logs when the tenant is unknown.
    pub fn get_incident(&self, incident_id: &str, tenant_id: Option<&str>) -> Option<Incident> {
        match tenant_id {
            Some(tenant) => Self::last_match(&self.log_path(tenant), incident_id),
            None => self
                .log_files()
                .into_iter()
                .find_map(|path| Self::last_match(&path, incident_id)),
        }
    }

    /// Current state of every incident in a tenant's log, oldest first.
    pub fn list_incidents(&self, tenant_id: &str) -> Vec<Incident> {
        let records: Vec<Incident> = match jsonl::read_lines(&self.log_path(tenant_id)) {
            Ok(records) => records,
            Err(_) => return Vec::new(),
        };
        let mut current: HashMap<String, Incident> = HashMap::new();
        for record in records {
            current.insert(record.id.clone(), record);
        }
        let mut incidents: Vec<Incident> = current.into_values().collect();
        incidents.sort_by_key(|i| i.created_at);
        incidents
    }

    /// Incidents opened since this manager was constructed.
    pub fn total_opened(&self) -> u64 {
        self.stats.total_opened.load(Ordering::Relaxed)
    }

    /// Incidents closed since this manager was constructed.
    pub fn total_closed(&self) -> u64 {
        self.stats.total_closed.load(Ordering::Relaxed)
    }

    fn append(&self, incident: &Incident) {
        let path = self.log_path(&incident.tenant_id);
        if let Err(e) = jsonl::append_line(&path, incident) {
            tracing::error!(
                "failed to append incident {} to {}: {}",
                incident.id,
                path.display(),
                e
            );
        }
    }

    fn last_match(path: &Path, incident_id: &str) -> Option<Incident> {
        let records: Vec<Incident> = jsonl::read_lines(path).ok()?;
        records.into_iter().rev().find(|r| r.id == incident_id)
    }

    fn log_files(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with("_incidents.jsonl"))
            })
            .collect()
    }
}
