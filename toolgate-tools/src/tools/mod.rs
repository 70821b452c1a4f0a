pub mod base;
pub mod code_exec;
pub mod echo;
pub mod file_list;
pub mod file_ops;
pub mod file_read;
pub mod file_write;
pub mod meta;
pub mod time;

pub use base::{describe, Tool, NATIVE_PROVIDER};
pub use code_exec::CodeExecTool;
pub use echo::EchoTool;
pub use file_list::FileListTool;
pub use file_ops::{
    FileChmodTool, FileCopyTool, FileDeleteTool, FileMkdirTool, FileMoveTool, FileSearchTool,
    SAFE_MODES,
};
pub use file_read::FileReadTool;
pub use file_write::{FileAppendTool, FileWriteTool};
pub use meta::{ToolCreateTool, ToolDeleteTool};
pub use time::TimeNowTool;

use crate::error::ToolError;
use crate::registry::ToolRegistry;
use crate::sandbox::ResourceLimits;
use std::sync::Arc;

/// Knobs for the built-in tool set.
#[derive(Debug, Clone)]
pub struct BuiltinOptions {
    pub max_write_bytes: u64,
    pub interpreter: Vec<String>,
    pub limits: ResourceLimits,
}

impl Default for BuiltinOptions {
    fn default() -> Self {
        Self {
            max_write_bytes: crate::sandbox::DEFAULT_MAX_BYTES,
            interpreter: vec!["python3".to_string(), "-".to_string()],
            limits: ResourceLimits::default(),
        }
    }
}

/// Register every built-in tool into the System table.
pub fn register_builtin_tools(
    registry: &Arc<ToolRegistry>,
    options: &BuiltinOptions,
) -> Result<(), ToolError> {
    let workspace = registry.workspace().clone();
    let max_bytes = options.max_write_bytes;

    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(EchoTool),
        Arc::new(TimeNowTool),
        Arc::new(FileReadTool::new(workspace.clone())),
        Arc::new(FileListTool::new(workspace.clone())),
        Arc::new(FileWriteTool::new(workspace.clone(), max_bytes)),
        Arc::new(FileAppendTool::new(workspace.clone(), max_bytes)),
        Arc::new(FileDeleteTool::new(workspace.clone())),
        Arc::new(FileMkdirTool::new(workspace.clone())),
        Arc::new(FileCopyTool::new(workspace.clone(), max_bytes)),
        Arc::new(FileMoveTool::new(workspace.clone())),
        Arc::new(FileChmodTool::new(workspace.clone())),
        Arc::new(FileSearchTool::new(workspace.clone())),
        Arc::new(CodeExecTool::new(
            workspace,
            options.interpreter.clone(),
            options.limits,
        )?),
        Arc::new(ToolCreateTool::new(registry)),
        Arc::new(ToolDeleteTool::new(registry)),
    ];

    for tool in tools {
        registry.register_system_tool(tool)?;
    }
    Ok(())
}
