use crate::error::ToolError;
use crate::sandbox::path_guard::BoxedPath;
use std::io;
use std::path::PathBuf;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024; // 10MB
const CHUNK_SIZE: usize = 8 * 1024;

/// Quota-bounded write that lands on the target only via rename.
///
/// Bytes go to a hidden temp file next to the target, so the final rename
/// never crosses a filesystem boundary. Readers observe the old file or the
/// complete new one. A writer dropped without `commit` removes its temp file.
pub struct AtomicWriter {
    target: PathBuf,
    temp_path: PathBuf,
    file: Option<File>,
    written: u64,
    max_bytes: u64,
    finished: bool,
}

impl AtomicWriter {
    pub async fn create(path: &BoxedPath, max_bytes: u64) -> Result<Self, ToolError> {
        if path.is_dir() {
            return Err(ToolError::ValidationError(format!(
                "'{}' is a directory",
                path.raw()
            )));
        }

        let target = path.as_path().to_path_buf();
        let (parent, file_name) = match (target.parent(), target.file_name()) {
            (Some(parent), Some(name)) if !path.is_root() => {
                (parent.to_path_buf(), name.to_string_lossy().into_owned())
            }
            _ => {
                return Err(ToolError::ValidationError(
                    "Cannot write to the sandbox root".into(),
                ))
            }
        };

        if !parent.is_dir() {
            return Err(ToolError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "parent directory does not exist",
            )));
        }

        let temp_path = parent.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()));
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await?;

        debug!(target = %path.raw(), max_bytes, "Opened atomic writer");
        Ok(Self {
            target,
            temp_path,
            file: Some(file),
            written: 0,
            max_bytes,
            finished: false,
        })
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Append a chunk, refusing it whole if it would cross the quota.
    pub async fn write(&mut self, chunk: &[u8]) -> Result<(), ToolError> {
        let attempted = self.written + chunk.len() as u64;
        if attempted > self.max_bytes {
            return Err(ToolError::QuotaExceeded {
                attempted,
                limit: self.max_bytes,
            });
        }

        let file = self.file.as_mut().ok_or(ToolError::Internal)?;
        file.write_all(chunk).await?;
        self.written = attempted;
        Ok(())
    }

    /// Flush, fsync and rename onto the target. Returns the byte count.
    pub async fn commit(mut self) -> Result<u64, ToolError> {
        let mut file = self.file.take().ok_or(ToolError::Internal)?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&self.temp_path, &self.target).await?;
        self.finished = true;

        info!(bytes = self.written, "Atomic write committed");
        Ok(self.written)
    }

    pub async fn abort(mut self) {
        self.file.take();
        if let Err(e) = fs::remove_file(&self.temp_path).await {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove temp file: {}", e);
            }
        }
        self.finished = true;
    }
}

impl Drop for AtomicWriter {
    fn drop(&mut self) {
        if !self.finished {
            self.file.take();
            let _ = std::fs::remove_file(&self.temp_path);
        }
    }
}

/// Stream `reader` into `path` atomically, bounded by `max_bytes`.
pub async fn write_atomic<R>(path: &BoxedPath, mut reader: R, max_bytes: u64) -> Result<u64, ToolError>
where
    R: AsyncRead + Unpin,
{
    let mut writer = AtomicWriter::create(path, max_bytes).await?;
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                writer.abort().await;
                return Err(e.into());
            }
        };
        if n == 0 {
            break;
        }
        if let Err(e) = writer.write(&buf[..n]).await {
            writer.abort().await;
            return Err(e);
        }
    }

    writer.commit().await
}

pub async fn write_bytes_atomic(path: &BoxedPath, content: &[u8], max_bytes: u64) -> Result<u64, ToolError> {
    write_atomic(path, content, max_bytes).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::sandbox::SandboxRoot;
    use tempfile::TempDir;

    fn temp_files(dir: &std::path::Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tmp"))
            .collect()
    }

    #[tokio::test]
    async fn test_dropped_writer_cleans_up() {
        let temp = TempDir::new().unwrap();
        let root = SandboxRoot::new(temp.path()).unwrap();
        let boxed = root.resolve("dropped.txt").unwrap();

        {
            let mut writer = AtomicWriter::create(&boxed, 64).await.unwrap();
            writer.write(b"half").await.unwrap();
            assert_eq!(temp_files(root.path()).len(), 1);
        }

        assert!(temp_files(root.path()).is_empty());
        assert!(!boxed.exists());
    }

    #[tokio::test]
    async fn test_quota_boundary_is_inclusive() {
        let temp = TempDir::new().unwrap();
        let root = SandboxRoot::new(temp.path()).unwrap();
        let boxed = root.resolve("exact.txt").unwrap();

        let written = write_bytes_atomic(&boxed, b"12345", 5).await.unwrap();
        assert_eq!(written, 5);

        let err = write_bytes_atomic(&boxed, b"123456", 5).await.unwrap_err();
        assert!(matches!(err, ToolError::QuotaExceeded { attempted: 6, limit: 5 }));
        assert_eq!(std::fs::read_to_string(boxed.as_path()).unwrap(), "12345");
    }

    #[tokio::test]
    async fn test_root_is_not_a_write_target() {
        let temp = TempDir::new().unwrap();
        let root = SandboxRoot::new(temp.path()).unwrap();
        let boxed = root.resolve("").unwrap();
        assert!(matches!(
            AtomicWriter::create(&boxed, 10).await,
            Err(ToolError::ValidationError(_))
        ));
    }
}
