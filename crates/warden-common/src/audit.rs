//! Audit sink
//!
//! Enforcers forward every violation to an optional sink before returning
//! it to the caller. Forwarding is fire-and-forget: a sink failure must
//! never mask the violation, so the trait is infallible and sinks handle
//! (and log) their own delivery problems.

use serde_json::Value;

use crate::Violation;

/// Destination for governance audit events.
pub trait AuditSink: Send + Sync {
    /// Record one event. `event_type` is `safety_violation`,
    /// `quota_exceeded`, or a bookkeeping tag like `incident_opened`.
    fn record(&self, event_type: &str, data: Value, tenant_id: &str);
}

/// Forward a violation to a sink if one is configured.
pub fn forward_violation(sink: Option<&dyn AuditSink>, violation: &Violation) {
    let Some(sink) = sink else { return };
    match serde_json::to_value(violation) {
        Ok(data) => sink.record(violation.event_type(), data, violation.tenant_id()),
        Err(e) => tracing::warn!(
            "failed to encode violation {} for audit: {}",
            violation.violation_id(),
            e
        ),
    }
}

/// Default sink that emits audit events to the tracing subscriber.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event_type: &str, data: Value, tenant_id: &str) {
        tracing::info!("audit {} tenant={}: {}", event_type, tenant_id, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{QuotaKind, Violation};
    use parking_lot::Mutex;

    struct CapturingSink {
        events: Mutex<Vec<(String, String)>>,
    }

    impl AuditSink for CapturingSink {
        fn record(&self, event_type: &str, _data: Value, tenant_id: &str) {
            self.events
                .lock()
                .push((event_type.to_string(), tenant_id.to_string()));
        }
    }

    #[test]
    fn forwards_quota_violation() {
        let sink = CapturingSink {
            events: Mutex::new(Vec::new()),
        };
        let v = Violation::quota(QuotaKind::LlmRequests, "t1", 11.0, 10.0);
        forward_violation(Some(&sink), &v);
        let events = sink.events.lock();
        assert_eq!(events.as_slice(), &[("quota_exceeded".into(), "t1".into())]);
    }

    #[test]
    fn no_sink_is_a_noop() {
        let v = Violation::quota(QuotaKind::LlmCost, "t1", 2.0, 1.0);
        forward_violation(None, &v);
    }
}
