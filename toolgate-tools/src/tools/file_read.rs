use crate::error::ToolError;
use crate::execution_context::ExecutionContext;
use crate::tools::base::{parse_input, Tool};
use crate::workspace::Workspace;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::fs;

#[derive(Deserialize)]
struct FileReadInput {
    path: String,
}

pub struct FileReadTool {
    workspace: Arc<Workspace>,
}

impl FileReadTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &'static str {
        "file.read"
    }

    fn description(&self) -> &'static str {
        "Reads file contents"
    }

    fn category(&self) -> &'static str {
        "Filesystem"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, _ctx: ExecutionContext, input: Value) -> Result<Value, ToolError> {
        let input: FileReadInput = parse_input(input)?;
        let path = self.workspace.files().resolve(&input.path)?;

        if !path.is_file() {
            return Err(ToolError::ValidationError(format!(
                "Not a file: {}",
                input.path
            )));
        }

        let bytes = fs::read(path.as_path()).await?;
        let content = String::from_utf8(bytes)
            .map_err(|_| ToolError::ValidationError("Invalid UTF-8".into()))?;

        Ok(json!({
            "path": path.relative().display().to_string(),
            "size": content.len(),
            "content": content,
        }))
    }
}
