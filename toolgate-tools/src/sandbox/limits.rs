use rlimit::{getrlimit, setrlimit, Resource};

const MEMORY_LIMIT: u64 = 512 * 1024 * 1024; // 512MB
const CPU_LIMIT: u64 = 60; // 60 seconds
const FILE_SIZE_LIMIT: u64 = 100 * 1024 * 1024; // 100MB
const NPROC_LIMIT: u64 = 64;
const NOFILE_LIMIT: u64 = 100;

/// Kernel resource limits for child processes spawned by tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    pub memory_bytes: u64,
    pub cpu_secs: u64,
    pub file_size_bytes: u64,
    pub max_processes: u64,
    pub max_open_files: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_bytes: MEMORY_LIMIT,
            cpu_secs: CPU_LIMIT,
            file_size_bytes: FILE_SIZE_LIMIT,
            max_processes: NPROC_LIMIT,
            max_open_files: NOFILE_LIMIT,
        }
    }
}

impl ResourceLimits {
    /// Applies to the calling process; run it inside a child's `pre_exec`.
    pub fn apply(&self) -> std::io::Result<()> {
        lower(Resource::AS, self.memory_bytes)?;
        lower(Resource::CPU, self.cpu_secs)?;
        lower(Resource::FSIZE, self.file_size_bytes)?;
        lower(Resource::NPROC, self.max_processes)?;
        lower(Resource::NOFILE, self.max_open_files)?;
        Ok(())
    }
}

/// Never raises past the current hard limit, which would need privileges.
fn lower(resource: Resource, limit: u64) -> std::io::Result<()> {
    let (_, hard) = getrlimit(resource)?;
    let limit = limit.min(hard);
    setrlimit(resource, limit, limit)
}
