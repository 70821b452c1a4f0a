//! File management tools beyond plain read and write.

use crate::error::ToolError;
use crate::execution_context::ExecutionContext;
use crate::sandbox::{write_atomic, BoxedPath};
use crate::tools::base::{parse_input, require_setting, Tool};
use crate::workspace::Workspace;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::info;

const MAX_SEARCH_RESULTS: usize = 100;

/// chmod modes accepted by `file.chmod`; none carry setuid, setgid or sticky bits.
pub const SAFE_MODES: [u32; 12] = [
    0o400, 0o440, 0o444, 0o600, 0o640, 0o644, 0o700, 0o750, 0o755, 0o770, 0o775, 0o777,
];

#[derive(Deserialize)]
struct PathInput {
    path: String,
}

#[derive(Deserialize)]
struct MkdirInput {
    path: String,
    #[serde(default)]
    parents: bool,
}

#[derive(Deserialize)]
struct TransferInput {
    src: String,
    dest: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ModeInput {
    Number(u32),
    Octal(String),
}

#[derive(Deserialize)]
struct ChmodInput {
    path: String,
    mode: ModeInput,
}

#[derive(Deserialize)]
struct SearchInput {
    query: String,
    #[serde(default = "default_search_path")]
    path: String,
}

fn default_search_path() -> String {
    ".".to_string()
}

fn relative_display(path: &BoxedPath) -> String {
    path.relative().display().to_string()
}

fn path_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "path": {"type": "string"}
        },
        "required": ["path"]
    })
}

fn transfer_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "src": {"type": "string"},
            "dest": {"type": "string"}
        },
        "required": ["src", "dest"]
    })
}

pub struct FileDeleteTool {
    workspace: Arc<Workspace>,
}

impl FileDeleteTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for FileDeleteTool {
    fn name(&self) -> &'static str {
        "file.delete"
    }

    fn description(&self) -> &'static str {
        "Deletes a file"
    }

    fn category(&self) -> &'static str {
        "Filesystem"
    }

    fn schema(&self) -> Value {
        path_schema()
    }

    async fn execute(&self, _ctx: ExecutionContext, input: Value) -> Result<Value, ToolError> {
        require_setting(self.workspace.settings().allow_delete_files, "allow_delete_files")?;
        let input: PathInput = parse_input(input)?;
        let path = self.workspace.files().resolve(&input.path)?;

        if path.is_root() {
            return Err(ToolError::PermissionDenied(
                "Cannot delete the sandbox root".into(),
            ));
        }
        if !path.is_file() {
            return Err(ToolError::ValidationError(format!(
                "Not a file: {}",
                input.path
            )));
        }

        fs::remove_file(path.as_path()).await?;
        info!(path = %relative_display(&path), "File deleted");
        Ok(json!({ "deleted": relative_display(&path) }))
    }
}

pub struct FileMkdirTool {
    workspace: Arc<Workspace>,
}

impl FileMkdirTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for FileMkdirTool {
    fn name(&self) -> &'static str {
        "file.mkdir"
    }

    fn description(&self) -> &'static str {
        "Creates a directory"
    }

    fn category(&self) -> &'static str {
        "Filesystem"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "parents": {"type": "boolean", "default": false}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, _ctx: ExecutionContext, input: Value) -> Result<Value, ToolError> {
        require_setting(self.workspace.settings().allow_create_files, "allow_create_files")?;
        let input: MkdirInput = parse_input(input)?;
        let path = self.workspace.files().resolve(&input.path)?;

        if path.exists() && !path.is_dir() {
            return Err(ToolError::ValidationError(format!(
                "Path exists and is not a directory: {}",
                input.path
            )));
        }

        path.create_dir(input.parents).await?;
        Ok(json!({ "created": relative_display(&path) }))
    }
}

pub struct FileCopyTool {
    workspace: Arc<Workspace>,
    max_bytes: u64,
}

impl FileCopyTool {
    pub fn new(workspace: Arc<Workspace>, max_bytes: u64) -> Self {
        Self {
            workspace,
            max_bytes,
        }
    }
}

#[async_trait]
impl Tool for FileCopyTool {
    fn name(&self) -> &'static str {
        "file.copy"
    }

    fn description(&self) -> &'static str {
        "Copies a file"
    }

    fn category(&self) -> &'static str {
        "Filesystem"
    }

    fn schema(&self) -> Value {
        transfer_schema()
    }

    async fn execute(&self, _ctx: ExecutionContext, input: Value) -> Result<Value, ToolError> {
        require_setting(self.workspace.settings().allow_create_files, "allow_create_files")?;
        let input: TransferInput = parse_input(input)?;
        let files = self.workspace.files();

        let src = files.resolve(&input.src)?;
        if !src.is_file() {
            return Err(ToolError::ValidationError(format!(
                "Source is not a file: {}",
                input.src
            )));
        }

        let mut dest = files.resolve(&input.dest)?;
        if dest.is_dir() {
            // Copying into a directory keeps the source file name.
            if let Some(name) = src.as_path().file_name() {
                let nested = Path::new(&input.dest).join(name);
                dest = files.resolve(&nested.to_string_lossy())?;
            }
        }

        let reader = fs::File::open(src.as_path()).await?;
        let written = write_atomic(&dest, reader, self.max_bytes).await?;

        Ok(json!({
            "src": relative_display(&src),
            "dest": relative_display(&dest),
            "bytes_written": written,
        }))
    }
}

pub struct FileMoveTool {
    workspace: Arc<Workspace>,
}

impl FileMoveTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for FileMoveTool {
    fn name(&self) -> &'static str {
        "file.move"
    }

    fn description(&self) -> &'static str {
        "Moves or renames a file or directory"
    }

    fn category(&self) -> &'static str {
        "Filesystem"
    }

    fn schema(&self) -> Value {
        transfer_schema()
    }

    async fn execute(&self, _ctx: ExecutionContext, input: Value) -> Result<Value, ToolError> {
        require_setting(self.workspace.settings().allow_create_files, "allow_create_files")?;
        let input: TransferInput = parse_input(input)?;
        let files = self.workspace.files();

        let src = files.resolve(&input.src)?;
        let dest = files.resolve(&input.dest)?;

        if src.is_root() || dest.is_root() {
            return Err(ToolError::PermissionDenied(
                "Cannot move the sandbox root".into(),
            ));
        }
        if !src.exists() {
            return Err(ToolError::ValidationError(format!(
                "Source does not exist: {}",
                input.src
            )));
        }

        fs::rename(src.as_path(), dest.as_path()).await?;
        Ok(json!({ "src": relative_display(&src), "dest": relative_display(&dest) }))
    }
}

pub struct FileChmodTool {
    workspace: Arc<Workspace>,
}

impl FileChmodTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

fn parse_mode(mode: ModeInput) -> Result<u32, ToolError> {
    let mode = match mode {
        ModeInput::Number(n) => n,
        ModeInput::Octal(s) => {
            let digits = s.trim_start_matches("0o");
            u32::from_str_radix(digits, 8)
                .map_err(|_| ToolError::ValidationError(format!("Invalid mode: {}", s)))?
        }
    };

    if !SAFE_MODES.contains(&mode) {
        return Err(ToolError::PermissionDenied(format!(
            "Mode {:o} is not allowed",
            mode
        )));
    }
    Ok(mode)
}

#[async_trait]
impl Tool for FileChmodTool {
    fn name(&self) -> &'static str {
        "file.chmod"
    }

    fn description(&self) -> &'static str {
        "Changes file permissions"
    }

    fn category(&self) -> &'static str {
        "Filesystem"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "mode": {"type": ["integer", "string"]}
            },
            "required": ["path", "mode"]
        })
    }

    async fn execute(&self, _ctx: ExecutionContext, input: Value) -> Result<Value, ToolError> {
        let input: ChmodInput = parse_input(input)?;
        let mode = parse_mode(input.mode)?;
        let path = self.workspace.files().resolve(&input.path)?;

        if !path.exists() {
            return Err(ToolError::ValidationError(format!(
                "Path does not exist: {}",
                input.path
            )));
        }

        set_mode(path.as_path(), mode).await?;
        Ok(json!({ "path": relative_display(&path), "mode": format!("{:o}", mode) }))
    }
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Result<(), ToolError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> Result<(), ToolError> {
    Err(ToolError::ExecutionFailed(
        "chmod is only supported on unix".into(),
    ))
}

pub struct FileSearchTool {
    workspace: Arc<Workspace>,
}

impl FileSearchTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for FileSearchTool {
    fn name(&self) -> &'static str {
        "file.search"
    }

    fn description(&self) -> &'static str {
        "Finds files whose name matches a wildcard pattern"
    }

    fn category(&self) -> &'static str {
        "Filesystem"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "path": {"type": "string", "default": "."}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, _ctx: ExecutionContext, input: Value) -> Result<Value, ToolError> {
        let input: SearchInput = parse_input(input)?;
        let base = self.workspace.files().resolve(&input.path)?;

        if !base.is_dir() {
            return Err(ToolError::ValidationError(format!(
                "Search path is not a directory: {}",
                input.path
            )));
        }

        let mut matches = Vec::new();
        let mut pending: Vec<PathBuf> = vec![base.as_path().to_path_buf()];

        // Symlinks are never descended into, so the walk stays inside the root.
        'walk: while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let name = entry.file_name().to_string_lossy().to_string();

                if wildcard_match(&input.query, &name) {
                    let path = entry.path();
                    let relative = path.strip_prefix(base.root()).unwrap_or(&path);
                    matches.push(relative.display().to_string());
                    if matches.len() >= MAX_SEARCH_RESULTS {
                        break 'walk;
                    }
                }
                if file_type.is_dir() {
                    pending.push(entry.path());
                }
            }
        }

        matches.sort();
        Ok(json!({ "matches": matches }))
    }
}

/// Shell-style name match supporting `*` and `?`.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();

    let (mut p, mut n) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while n < name.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == name[n]) {
            p += 1;
            n += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, n));
            p += 1;
        } else if let Some((sp, sn)) = star {
            p = sp + 1;
            n = sn + 1;
            star = Some((sp, sn + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("*.txt", "notes.txt"));
        assert!(wildcard_match("note?.txt", "notes.txt"));
        assert!(wildcard_match("*", ""));
        assert!(wildcard_match("a*b*c", "axxbyyc"));
        assert!(!wildcard_match("*.txt", "notes.md"));
        assert!(!wildcard_match("a?c", "ac"));
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode(ModeInput::Number(0o644)).ok(), Some(0o644));
        assert_eq!(parse_mode(ModeInput::Octal("755".into())).ok(), Some(0o755));
        assert_eq!(parse_mode(ModeInput::Octal("0o600".into())).ok(), Some(0o600));
        assert!(matches!(
            parse_mode(ModeInput::Number(0o4755)),
            Err(ToolError::PermissionDenied(_))
        ));
        assert!(matches!(
            parse_mode(ModeInput::Octal("9z".into())),
            Err(ToolError::ValidationError(_))
        ));
    }
}
