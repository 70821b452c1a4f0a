//! Tools that let a caller manage dynamic tools through the dispatcher.

use crate::dynamic::DEFAULT_CATEGORY;
use crate::error::ToolError;
use crate::execution_context::ExecutionContext;
use crate::registry::ToolRegistry;
use crate::tools::base::{parse_input, Tool};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, Weak};

#[derive(Deserialize)]
struct CreateInput {
    name: String,
    code: String,
    #[serde(default = "default_category")]
    category: String,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

#[derive(Deserialize)]
struct DeleteInput {
    name: String,
}

// The registry owns these tools, so they only keep a weak handle back to it.
fn upgrade(registry: &Weak<ToolRegistry>) -> Result<Arc<ToolRegistry>, ToolError> {
    registry
        .upgrade()
        .ok_or_else(|| ToolError::ExecutionFailed("Tool registry is no longer available".into()))
}

pub struct ToolCreateTool {
    registry: Weak<ToolRegistry>,
}

impl ToolCreateTool {
    pub fn new(registry: &Arc<ToolRegistry>) -> Self {
        Self {
            registry: Arc::downgrade(registry),
        }
    }
}

#[async_trait]
impl Tool for ToolCreateTool {
    fn name(&self) -> &'static str {
        "tool.create"
    }

    fn description(&self) -> &'static str {
        "Creates or updates a user defined tool"
    }

    fn category(&self) -> &'static str {
        "Meta"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "code": {"type": "string"},
                "category": {"type": "string", "default": DEFAULT_CATEGORY}
            },
            "required": ["name", "code"]
        })
    }

    async fn execute(&self, _ctx: ExecutionContext, input: Value) -> Result<Value, ToolError> {
        let input: CreateInput = parse_input(input)?;
        let registry = upgrade(&self.registry)?;
        let descriptor = registry
            .create_dynamic_tool(&input.name, &input.code, &input.category)
            .await?;

        serde_json::to_value(descriptor).map_err(|e| ToolError::ExecutionFailed(e.to_string()))
    }
}

pub struct ToolDeleteTool {
    registry: Weak<ToolRegistry>,
}

impl ToolDeleteTool {
    pub fn new(registry: &Arc<ToolRegistry>) -> Self {
        Self {
            registry: Arc::downgrade(registry),
        }
    }
}

#[async_trait]
impl Tool for ToolDeleteTool {
    fn name(&self) -> &'static str {
        "tool.delete"
    }

    fn description(&self) -> &'static str {
        "Deletes a user defined tool"
    }

    fn category(&self) -> &'static str {
        "Meta"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"}
            },
            "required": ["name"]
        })
    }

    async fn execute(&self, _ctx: ExecutionContext, input: Value) -> Result<Value, ToolError> {
        let input: DeleteInput = parse_input(input)?;
        let registry = upgrade(&self.registry)?;
        registry.delete_dynamic_tool(&input.name).await?;
        Ok(json!({ "deleted": input.name }))
    }
}
