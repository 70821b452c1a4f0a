use crate::error::ToolError;
use crate::execution_context::ExecutionContext;
use crate::tools::base::{parse_input, Tool};
use crate::workspace::Workspace;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::fs;

const MAX_ENTRIES: usize = 1000;

#[derive(Deserialize)]
struct FileListInput {
    #[serde(default = "default_path")]
    path: String,
}

fn default_path() -> String {
    ".".to_string()
}

pub struct FileListTool {
    workspace: Arc<Workspace>,
}

impl FileListTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for FileListTool {
    fn name(&self) -> &'static str {
        "file.list"
    }

    fn description(&self) -> &'static str {
        "Lists directory contents"
    }

    fn category(&self) -> &'static str {
        "Filesystem"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "default": "."}
            }
        })
    }

    async fn execute(&self, _ctx: ExecutionContext, input: Value) -> Result<Value, ToolError> {
        let input: FileListInput = parse_input(input)?;
        let path = self.workspace.files().resolve(&input.path)?;

        if !path.is_dir() {
            return Err(ToolError::ValidationError(format!(
                "Not a directory: {}",
                input.path
            )));
        }

        let mut entries = Vec::new();
        let mut dir = fs::read_dir(path.as_path()).await?;

        while let Some(entry) = dir.next_entry().await? {
            if entries.len() >= MAX_ENTRIES {
                break;
            }

            let name = entry.file_name().to_string_lossy().to_string();
            // Hidden entries include in-flight atomic write temp files.
            if name.starts_with('.') {
                continue;
            }

            let file_type = entry.file_type().await?;
            let kind = if file_type.is_symlink() {
                "symlink"
            } else if file_type.is_dir() {
                "dir"
            } else {
                "file"
            };
            let size = if file_type.is_file() {
                entry.metadata().await?.len()
            } else {
                0
            };

            entries.push(json!({"name": name, "type": kind, "size": size}));
        }

        entries.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
        Ok(json!({ "entries": entries }))
    }
}
