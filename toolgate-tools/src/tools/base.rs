use crate::error::ToolError;
use crate::execution_context::ExecutionContext;
use crate::traits::{ToolDescriptor, ToolSource};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub const NATIVE_PROVIDER: &str = "native";

/// A built-in tool living in the System table.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn category(&self) -> &'static str {
        "System"
    }
    fn schema(&self) -> Value;

    async fn execute(&self, ctx: ExecutionContext, input: Value) -> Result<Value, ToolError>;
}

pub fn describe(tool: &dyn Tool) -> ToolDescriptor {
    ToolDescriptor {
        name: tool.name().to_string(),
        description: tool.description().to_string(),
        category: tool.category().to_string(),
        input_schema: tool.schema(),
        source: ToolSource::System,
        provider: NATIVE_PROVIDER.to_string(),
    }
}

pub(crate) fn parse_input<T: DeserializeOwned>(input: Value) -> Result<T, ToolError> {
    serde_json::from_value(input).map_err(|e| ToolError::ValidationError(e.to_string()))
}

/// Fail with `PermissionDenied` unless a workspace switch is on.
pub(crate) fn require_setting(enabled: bool, setting: &str) -> Result<(), ToolError> {
    if enabled {
        Ok(())
    } else {
        Err(ToolError::PermissionDenied(format!(
            "{} is disabled for this workspace",
            setting
        )))
    }
}
