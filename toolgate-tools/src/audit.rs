//! Audit records emitted around every tool call.

use crate::error::ToolError;
use crate::traits::{AuditSink, ToolSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

/// Longest string kept verbatim in an argument snapshot.
const MAX_SNAPSHOT_STRING: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditPhase {
    Started,
    Completed,
    Failed,
}

/// One audit record. A call produces a `Started` record followed by exactly
/// one `Completed` or `Failed` record with the same `call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub call_id: String,
    pub timestamp: DateTime<Utc>,
    pub tool: String,
    pub phase: AuditPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ToolSource>,
    pub args: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl AuditEvent {
    pub fn started(call_id: &str, tool: &str, args: &Value) -> Self {
        Self {
            call_id: call_id.to_string(),
            timestamp: Utc::now(),
            tool: tool.to_string(),
            phase: AuditPhase::Started,
            source: None,
            args: snapshot_args(args),
            duration_ms: None,
            error: None,
            error_kind: None,
        }
    }

    /// The closing record for `started`.
    pub fn finished(
        started: &AuditEvent,
        source: Option<ToolSource>,
        result: &Result<Value, ToolError>,
        elapsed: Duration,
    ) -> Self {
        let (phase, error, error_kind) = match result {
            Ok(_) => (AuditPhase::Completed, None, None),
            Err(e) => (
                AuditPhase::Failed,
                Some(e.to_string()),
                Some(e.root_cause().kind().to_string()),
            ),
        };

        Self {
            call_id: started.call_id.clone(),
            timestamp: Utc::now(),
            tool: started.tool.clone(),
            phase,
            source,
            args: started.args.clone(),
            duration_ms: Some(elapsed.as_millis() as u64),
            error,
            error_kind,
        }
    }
}

/// Copy of `args` with oversized strings truncated.
pub fn snapshot_args(args: &Value) -> Value {
    match args {
        Value::String(s) if s.len() > MAX_SNAPSHOT_STRING => {
            let mut end = MAX_SNAPSHOT_STRING;
            while !s.is_char_boundary(end) {
                end -= 1;
            }
            Value::String(format!("{}...[{} bytes]", &s[..end], s.len()))
        }
        Value::Array(items) => Value::Array(items.iter().map(snapshot_args).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), snapshot_args(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Writes audit events into the `tracing` stream under the `audit` target.
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: &AuditEvent) {
        match event.phase {
            AuditPhase::Failed => warn!(
                target: "audit",
                call_id = %event.call_id,
                tool = %event.tool,
                duration_ms = event.duration_ms,
                error = event.error.as_deref().unwrap_or(""),
                "tool call failed"
            ),
            phase => info!(
                target: "audit",
                call_id = %event.call_id,
                tool = %event.tool,
                phase = ?phase,
                duration_ms = event.duration_ms,
                "tool call"
            ),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_truncates_long_strings() {
        let long = "x".repeat(MAX_SNAPSHOT_STRING + 10);
        let snap = snapshot_args(&json!({"path": "a.txt", "content": long}));
        assert_eq!(snap["path"], "a.txt");
        let content = snap["content"].as_str().unwrap();
        assert!(content.ends_with(&format!("...[{} bytes]", MAX_SNAPSHOT_STRING + 10)));
    }

    #[test]
    fn test_finished_carries_call_id_and_root_cause_kind() {
        let started = AuditEvent::started("call-1", "file.read", &json!({"path": "x"}));
        let err: Result<Value, ToolError> = Err(ToolError::ToolExecution {
            tool: "file.read".into(),
            duration_ms: 2,
            source: Box::new(ToolError::ContainmentViolation("x".into())),
        });
        let done = AuditEvent::finished(&started, Some(ToolSource::System), &err, Duration::from_millis(2));

        assert_eq!(done.call_id, "call-1");
        assert_eq!(done.phase, AuditPhase::Failed);
        assert_eq!(done.error_kind.as_deref(), Some("containment_violation"));
        assert_eq!(done.duration_ms, Some(2));
    }
}
