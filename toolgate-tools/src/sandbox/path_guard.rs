use crate::error::ToolError;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Upper bound on symlink hops followed while resolving a single path.
const MAX_SYMLINK_DEPTH: u32 = 40;

/// Canonical directory that every resolved path must stay inside.
///
/// The root is canonicalized once at construction and never changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxRoot {
    root: PathBuf,
}

impl SandboxRoot {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, ToolError> {
        let root = fs::canonicalize(root.as_ref())
            .map_err(|e| ToolError::ValidationError(format!("Invalid sandbox root: {}", e)))?;

        if !root.is_dir() {
            return Err(ToolError::ValidationError(
                "Sandbox root is not a directory".into(),
            ));
        }

        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve a caller-supplied path to a canonical location inside the root.
    ///
    /// Absolute inputs are re-rooted: `/etc/passwd` means `<root>/etc/passwd`.
    /// Symlinks are followed for every existing component; components that do
    /// not exist yet are appended as plain names so write targets resolve too.
    pub fn resolve(&self, raw: &str) -> Result<BoxedPath, ToolError> {
        let relative: PathBuf = Path::new(raw)
            .components()
            .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
            .collect();

        let joined = self.root.join(&relative);
        let canonical = resolve_lenient(&joined, MAX_SYMLINK_DEPTH)?;

        if !canonical.starts_with(&self.root) {
            warn!(
                raw = %raw,
                resolved = %canonical.display(),
                "Path escapes sandbox"
            );
            return Err(ToolError::ContainmentViolation(raw.to_string()));
        }

        debug!(raw = %raw, "Resolved sandbox path");
        Ok(BoxedPath {
            raw: raw.to_string(),
            root: self.root.clone(),
            canonical,
        })
    }
}

/// Like `fs::canonicalize`, but tolerates a non-existent tail.
fn resolve_lenient(path: &Path, depth: u32) -> io::Result<PathBuf> {
    match fs::canonicalize(path) {
        Ok(canonical) => return Ok(canonical),
        Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
        Err(_) => {}
    }

    let mut resolved = PathBuf::new();
    let mut components = path.components();

    while let Some(component) = components.next() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            // Every component pushed so far is a real directory or a missing
            // name, so popping lexically yields the real parent.
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(name) => {
                let candidate = resolved.join(name);
                match fs::symlink_metadata(&candidate) {
                    Ok(meta) if meta.file_type().is_symlink() => {
                        if depth == 0 {
                            return Err(io::Error::new(
                                io::ErrorKind::Other,
                                "too many levels of symbolic links",
                            ));
                        }
                        let target = fs::read_link(&candidate)?;
                        let next = resolved.join(target).join(components.as_path());
                        return resolve_lenient(&next, depth - 1);
                    }
                    Ok(_) => resolved = candidate,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => resolved = candidate,
                    Err(e) => return Err(e),
                }
            }
        }
    }

    Ok(resolved)
}

/// A path proven to live inside its sandbox root at construction time.
///
/// Short-lived: resolve, use, drop. Do not cache across operations.
#[derive(Debug, Clone)]
pub struct BoxedPath {
    raw: String,
    root: PathBuf,
    canonical: PathBuf,
}

impl BoxedPath {
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn as_path(&self) -> &Path {
        &self.canonical
    }

    /// Path relative to the sandbox root; empty for the root itself.
    pub fn relative(&self) -> &Path {
        self.canonical
            .strip_prefix(&self.root)
            .unwrap_or_else(|_| Path::new(""))
    }

    pub fn is_root(&self) -> bool {
        self.canonical == self.root
    }

    pub fn exists(&self) -> bool {
        self.canonical.exists()
    }

    pub fn is_file(&self) -> bool {
        self.canonical.is_file()
    }

    pub fn is_dir(&self) -> bool {
        self.canonical.is_dir()
    }

    pub async fn create_dir(&self, parents: bool) -> Result<(), ToolError> {
        if parents {
            tokio::fs::create_dir_all(&self.canonical).await?;
        } else if !self.canonical.is_dir() {
            tokio::fs::create_dir(&self.canonical).await?;
        }
        Ok(())
    }
}

impl AsRef<Path> for BoxedPath {
    fn as_ref(&self) -> &Path {
        &self.canonical
    }
}
