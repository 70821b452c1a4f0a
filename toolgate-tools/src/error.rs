use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Carries the caller-supplied path, never the resolved one.
    #[error("Access denied: path '{0}' is outside the sandbox")]
    ContainmentViolation(String),

    #[error("Write quota exceeded: {attempted} > {limit} bytes")]
    QuotaExceeded { attempted: u64, limit: u64 },

    #[error("Tool name conflict: '{0}' is already registered")]
    NameConflict(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool '{tool}' failed after {duration_ms}ms: {source}")]
    ToolExecution {
        tool: String,
        duration_ms: u64,
        #[source]
        source: Box<ToolError>,
    },

    #[error("Tool '{tool}' timed out after {timeout_ms}ms")]
    Timeout { tool: String, timeout_ms: u64 },

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Rate limit exceeded for {0}")]
    RateLimited(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error")]
    Internal,
}

impl ToolError {
    /// Innermost error beneath any `ToolExecution` wrappers.
    pub fn root_cause(&self) -> &ToolError {
        let mut current = self;
        while let ToolError::ToolExecution { source, .. } = current {
            current = source.as_ref();
        }
        current
    }

    /// Short machine-readable label used in audit records and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::ValidationError(_) => "validation",
            ToolError::PermissionDenied(_) => "permission_denied",
            ToolError::ContainmentViolation(_) => "containment_violation",
            ToolError::QuotaExceeded { .. } => "quota_exceeded",
            ToolError::NameConflict(_) => "name_conflict",
            ToolError::ToolNotFound(_) => "tool_not_found",
            ToolError::ToolExecution { .. } => "tool_execution",
            ToolError::Timeout { .. } => "timeout",
            ToolError::ExecutionFailed(_) => "execution_failed",
            ToolError::RateLimited(_) => "rate_limited",
            ToolError::Io(_) => "io",
            ToolError::Internal => "internal",
        }
    }
}
