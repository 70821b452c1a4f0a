use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use toolgate_tools::AuditEvent;

#[derive(Error, Debug)]
pub enum AuditLoggerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Append-only JSON Lines audit log, synced to disk after every record.
pub struct AuditLogger {
    log_path: PathBuf,
    file: Mutex<File>,
}

impl AuditLogger {
    pub fn new<P: AsRef<Path>>(log_path: P) -> Result<Self, AuditLoggerError> {
        let log_path = log_path.as_ref().to_path_buf();

        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        Ok(Self {
            log_path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Append one record as a single write, then fsync.
    pub fn log(&self, event: &AuditEvent) -> Result<(), AuditLoggerError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut file = self.file.lock();
        file.write_all(&line)?;
        file.sync_all()?;
        Ok(())
    }
}
