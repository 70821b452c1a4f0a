//! On-disk layout of a tool workspace.
//!
//! ```text
//! <root>/config.json   workspace settings
//! <root>/files/        sandbox root for file tools
//! <root>/tools/        dynamic tool scripts
//! ```

use crate::dynamic::{validate_tool_name, SCRIPT_EXTENSION};
use crate::error::ToolError;
use crate::sandbox::{BoxedPath, SandboxRoot};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const FILES_DIR: &str = "files";
pub const TOOLS_DIR: &str = "tools";
pub const SETTINGS_FILE: &str = "config.json";

/// Feature switches stored in `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSettings {
    pub allow_create_files: bool,
    pub allow_delete_files: bool,
    pub allow_execute_code: bool,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            allow_create_files: true,
            allow_delete_files: false,
            allow_execute_code: false,
        }
    }
}

#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    files: SandboxRoot,
    tools: SandboxRoot,
    settings: WorkspaceSettings,
}

impl Workspace {
    /// Create the layout if needed and load the settings.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, ToolError> {
        let root = root.as_ref();
        fs::create_dir_all(root.join(FILES_DIR))?;
        fs::create_dir_all(root.join(TOOLS_DIR))?;
        let root = fs::canonicalize(root)?;

        let settings_path = root.join(SETTINGS_FILE);
        let settings = if settings_path.exists() {
            let content = fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content).map_err(|e| {
                ToolError::ValidationError(format!("Invalid workspace settings: {}", e))
            })?
        } else {
            let settings = WorkspaceSettings::default();
            let content = serde_json::to_string_pretty(&settings)
                .map_err(|e| ToolError::ValidationError(e.to_string()))?;
            fs::write(&settings_path, content)?;
            settings
        };

        let files = SandboxRoot::new(root.join(FILES_DIR))?;
        let tools = SandboxRoot::new(root.join(TOOLS_DIR))?;

        info!(root = %root.display(), ?settings, "Workspace opened");
        Ok(Self {
            root,
            files,
            tools,
            settings,
        })
    }

    /// Replace the loaded settings for this process only.
    pub fn with_settings(mut self, settings: WorkspaceSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &SandboxRoot {
        &self.files
    }

    pub fn tools(&self) -> &SandboxRoot {
        &self.tools
    }

    pub fn settings(&self) -> &WorkspaceSettings {
        &self.settings
    }

    pub fn tool_script_path(&self, name: &str) -> Result<BoxedPath, ToolError> {
        validate_tool_name(name)?;
        self.tools.resolve(&format!("{}.{}", name, SCRIPT_EXTENSION))
    }
}
