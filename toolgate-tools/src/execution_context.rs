use serde::{Deserialize, Serialize};

/// Per-call information handed to a System tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub call_id: String,
    pub tool_name: String,
    pub timeout_ms: u64,
}

impl ExecutionContext {
    pub fn new(tool_name: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            call_id: uuid::Uuid::new_v4().to_string(),
            tool_name: tool_name.into(),
            timeout_ms,
        }
    }

    pub fn with_call_id(mut self, call_id: impl Into<String>) -> Self {
        self.call_id = call_id.into();
        self
    }
}
