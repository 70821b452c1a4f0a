use crate::error::ToolError;
use crate::execution_context::ExecutionContext;
use crate::sandbox::{write_bytes_atomic, BoxedPath};
use crate::tools::base::{parse_input, require_setting, Tool};
use crate::workspace::Workspace;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::fs;

#[derive(Deserialize)]
struct FileWriteInput {
    path: String,
    content: String,
}

fn write_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "path": {"type": "string"},
            "content": {"type": "string"}
        },
        "required": ["path", "content"]
    })
}

/// Resolve a write target and make sure its parent directory exists.
async fn prepare_target(workspace: &Workspace, raw: &str) -> Result<BoxedPath, ToolError> {
    require_setting(workspace.settings().allow_create_files, "allow_create_files")?;

    let path = workspace.files().resolve(raw)?;
    if path.is_root() || path.is_dir() {
        return Err(ToolError::ValidationError(format!(
            "Not a file path: {}",
            raw
        )));
    }

    // Missing components were appended as plain names, so the parent is inside the root.
    if let Some(parent) = path.as_path().parent() {
        fs::create_dir_all(parent).await?;
    }
    Ok(path)
}

pub struct FileWriteTool {
    workspace: Arc<Workspace>,
    max_bytes: u64,
}

impl FileWriteTool {
    pub fn new(workspace: Arc<Workspace>, max_bytes: u64) -> Self {
        Self {
            workspace,
            max_bytes,
        }
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &'static str {
        "file.write"
    }

    fn description(&self) -> &'static str {
        "Writes content to file, replacing it atomically"
    }

    fn category(&self) -> &'static str {
        "Filesystem"
    }

    fn schema(&self) -> Value {
        write_schema()
    }

    async fn execute(&self, _ctx: ExecutionContext, input: Value) -> Result<Value, ToolError> {
        let input: FileWriteInput = parse_input(input)?;
        let path = prepare_target(&self.workspace, &input.path).await?;

        let written = write_bytes_atomic(&path, input.content.as_bytes(), self.max_bytes).await?;

        Ok(json!({
            "path": path.relative().display().to_string(),
            "bytes_written": written,
        }))
    }
}

pub struct FileAppendTool {
    workspace: Arc<Workspace>,
    max_bytes: u64,
}

impl FileAppendTool {
    pub fn new(workspace: Arc<Workspace>, max_bytes: u64) -> Self {
        Self {
            workspace,
            max_bytes,
        }
    }
}

#[async_trait]
impl Tool for FileAppendTool {
    fn name(&self) -> &'static str {
        "file.append"
    }

    fn description(&self) -> &'static str {
        "Appends content to file"
    }

    fn category(&self) -> &'static str {
        "Filesystem"
    }

    fn schema(&self) -> Value {
        write_schema()
    }

    async fn execute(&self, _ctx: ExecutionContext, input: Value) -> Result<Value, ToolError> {
        let input: FileWriteInput = parse_input(input)?;
        let path = prepare_target(&self.workspace, &input.path).await?;

        let mut content = if path.is_file() {
            fs::read(path.as_path()).await?
        } else {
            Vec::new()
        };
        content.extend_from_slice(input.content.as_bytes());

        // The quota applies to the whole rewritten file.
        let written = write_bytes_atomic(&path, &content, self.max_bytes).await?;

        Ok(json!({
            "path": path.relative().display().to_string(),
            "bytes_written": written,
        }))
    }
}
