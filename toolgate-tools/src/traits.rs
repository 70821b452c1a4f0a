use crate::audit::AuditEvent;
use crate::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Which of the three registry tables owns a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolSource {
    System,
    Dynamic,
    Integration,
}

impl fmt::Display for ToolSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ToolSource::System => "system",
            ToolSource::Dynamic => "dynamic",
            ToolSource::Integration => "integration",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub category: String,
    pub input_schema: Value,
    pub source: ToolSource,
    /// Provider id: `native`, `user_defined`, or the integration's id.
    pub provider: String,
}

/// Capability interface of an external tool provider.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    fn id(&self) -> &str;

    async fn initialize(&self) -> Result<(), ToolError>;

    async fn shutdown(&self);

    /// Descriptors in the provider's declared order.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError>;

    async fn call_tool(&self, name: &str, args: Value) -> Result<Value, ToolError>;
}

/// Append-only destination for audit events.
///
/// Recording never fails the call being audited; sinks log their own errors.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &AuditEvent);
}
