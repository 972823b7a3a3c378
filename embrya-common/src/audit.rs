//! Audit trail event model
//!
//! The audit log is append-only. Services only need the `record` capability;
//! durable storage lives behind an `AuditSink` implementation owned by the
//! deployment.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Audited action tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// Model-generated viability prediction
    AiPrediction,
    /// Embryologist override of a model prediction
    AiOverride,
    /// A stored prediction was opened for review (data access)
    PredictionViewed,
}

impl AuditAction {
    /// Wire tag, e.g. `AI_PREDICTION`
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::AiPrediction => "AI_PREDICTION",
            AuditAction::AiOverride => "AI_OVERRIDE",
            AuditAction::PredictionViewed => "PREDICTION_VIEWED",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single audit log entry
///
/// Patients are referenced only by opaque audit codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    /// Acting user; `None` for anonymous or system events
    pub actor: Option<String>,
    pub action: AuditAction,
    pub patient_audit_code: Option<String>,
    pub cycle_id: Option<String>,
    pub embryo_id: Option<String>,
    /// Free-form detail payload
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    /// New event stamped now, with no subject references
    pub fn new(action: AuditAction, actor: Option<String>, details: serde_json::Value) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            actor,
            action,
            patient_audit_code: None,
            cycle_id: None,
            embryo_id: None,
            details,
            timestamp: Utc::now(),
        }
    }

    /// Attach patient/cycle/embryo references
    pub fn with_subject(
        mut self,
        patient_audit_code: Option<String>,
        cycle_id: Option<String>,
        embryo_id: Option<String>,
    ) -> Self {
        self.patient_audit_code = patient_audit_code;
        self.cycle_id = cycle_id;
        self.embryo_id = embryo_id;
        self
    }
}

/// Write-only audit capability
///
/// Callers treat `record` as fire-and-forget: an error is logged by the caller
/// and never fails the operation being audited.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent) -> Result<()>;
}

/// Mirrors every event to the `audit` tracing target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) -> Result<()> {
        let details = serde_json::to_string(&event.details)?;
        info!(
            target: "audit",
            event_id = %event.event_id,
            action = %event.action,
            actor = event.actor.as_deref().unwrap_or("anonymous"),
            patient = event.patient_audit_code.as_deref().unwrap_or("-"),
            cycle = event.cycle_id.as_deref().unwrap_or("-"),
            embryo = event.embryo_id.as_deref().unwrap_or("-"),
            details = %details,
            "audit event"
        );
        Ok(())
    }
}

/// Append-only in-memory audit log
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events in insertion order
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Recorded events with the given action
    pub fn events_with_action(&self, action: AuditAction) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.action == action)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) -> Result<()> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| Error::Audit("audit log lock poisoned".to_string()))?;
        events.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_wire_tags() {
        assert_eq!(AuditAction::AiPrediction.as_str(), "AI_PREDICTION");
        assert_eq!(AuditAction::AiOverride.as_str(), "AI_OVERRIDE");
        let encoded = serde_json::to_string(&AuditAction::PredictionViewed).unwrap();
        assert_eq!(encoded, "\"PREDICTION_VIEWED\"");
    }

    #[test]
    fn test_memory_sink_preserves_order() {
        let sink = MemoryAuditSink::new();
        sink.record(AuditEvent::new(AuditAction::AiPrediction, None, json!({"n": 1})))
            .unwrap();
        sink.record(AuditEvent::new(
            AuditAction::AiOverride,
            Some("embryologist-7".to_string()),
            json!({"n": 2}),
        ))
        .unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, AuditAction::AiPrediction);
        assert!(events[0].actor.is_none());
        assert_eq!(events[1].actor.as_deref(), Some("embryologist-7"));
        assert_eq!(sink.events_with_action(AuditAction::AiOverride).len(), 1);
    }

    #[test]
    fn test_with_subject_sets_references() {
        let event = AuditEvent::new(AuditAction::PredictionViewed, None, json!({}))
            .with_subject(Some("PT-0042".into()), Some("C1".into()), None);
        assert_eq!(event.patient_audit_code.as_deref(), Some("PT-0042"));
        assert_eq!(event.cycle_id.as_deref(), Some("C1"));
        assert!(event.embryo_id.is_none());
    }

    #[test]
    fn test_tracing_sink_accepts_events() {
        let sink = TracingAuditSink;
        let result = sink.record(AuditEvent::new(AuditAction::AiPrediction, None, json!({})));
        assert!(result.is_ok());
    }
}
