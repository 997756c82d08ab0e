//! Violation & incident tracking
//!
//! Converts safety/quota violations into durable incident records with an
//! open/closed lifecycle, persisted to one append-only JSONL log per
//! tenant (`{tenant}_incidents.jsonl`). Updating a record means appending
//! a newer line with the same id; readers take the last matching line as
//! current state. On intake the manager invokes an external
//! runbook-suggestion collaborator, best-effort.

pub mod incidents;
pub mod runbooks;

pub use incidents::{Incident, IncidentManager, IncidentStatus};
pub use runbooks::{Runbook, RunbookSuggester, StaticRunbookSuggester};
