use crate::infra::audit_logger::AuditLogger;
use async_trait::async_trait;
use toolgate_tools::{AuditEvent, AuditSink};
use tracing::error;

#[async_trait]
impl AuditSink for AuditLogger {
    async fn record(&self, event: &AuditEvent) {
        // A failing audit write is reported but never fails the tool call.
        if let Err(e) = self.log(event) {
            error!(
                path = %self.path().display(),
                call_id = %event.call_id,
                error = %e,
                "Failed to write audit record"
            );
        }
    }
}
