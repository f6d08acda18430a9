//! Decision audit records.
//!
//! The engine hands one [`AuditEvent`] to its [`AuditSink`] per evaluation.
//! Sink failures never reach the caller: the engine logs and drops them.

use std::io::Write;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::AuditError;
use crate::policy::Policy;
use crate::types::{DecisionRequest, DecisionResponse};

/// Event name carried by every record.
pub const DECISION_EVENT: &str = "authorization.decision";

/// One authorization decision, as recorded for audit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub event: &'static str,
    pub timestamp: DateTime<Utc>,
    /// The subject identifier.
    pub user: String,
    pub action: String,
    pub resource_type: String,
    pub allow: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_description: Option<String>,
    pub reason: String,
}

impl AuditEvent {
    /// Build the record for a finished evaluation.
    pub fn decision(
        request: &DecisionRequest,
        response: &DecisionResponse,
        matched: Option<&Policy>,
    ) -> Self {
        AuditEvent {
            event: DECISION_EVENT,
            timestamp: Utc::now(),
            user: request.subject.sub.clone(),
            action: request.action.clone(),
            resource_type: request.resource.kind.clone(),
            allow: response.allow,
            policy_id: matched.map(|p| p.id.clone()),
            policy_description: matched.map(|p| p.description.clone()),
            reason: response.reason.clone(),
        }
    }
}

/// Destination for audit records.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

impl<S: AuditSink + ?Sized> AuditSink for std::sync::Arc<S> {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        (**self).record(event)
    }
}

impl<S: AuditSink + ?Sized> AuditSink for &S {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        (**self).record(event)
    }
}

/// Emits each record as a structured `tracing` event on `gatepdp::audit`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        tracing::info!(
            target: "gatepdp::audit",
            event = event.event,
            timestamp = %event.timestamp.to_rfc3339(),
            user = %event.user,
            action = %event.action,
            resource_type = %event.resource_type,
            allow = event.allow,
            policy_id = event.policy_id.as_deref(),
            policy_description = event.policy_description.as_deref(),
            reason = %event.reason,
            "authorization decision"
        );
        Ok(())
    }
}

/// Writes each record as one JSON object per line.
pub struct JsonLinesAuditSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesAuditSink<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesAuditSink {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> AuditSink for JsonLinesAuditSink<W> {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        let mut writer = self.writer.lock();
        writer.write_all(&line)?;
        writer.flush()?;
        Ok(())
    }
}

/// Keeps records in memory. Handy for enforcement points' own tests.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        MemoryAuditSink::default()
    }

    /// A copy of everything recorded so far.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}
