//! Hooks composed around the dispatcher's invoke step.
//!
//! `before` hooks run in registration order and may reject the call;
//! `after` hooks run in reverse order for every hook whose `before` passed.

use crate::error::ToolError;
use crate::traits::ToolSource;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct CallInfo {
    pub call_id: String,
    pub tool: String,
    pub source: ToolSource,
    pub args: Value,
}

#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;

    async fn before(&self, _call: &CallInfo) -> Result<(), ToolError> {
        Ok(())
    }

    async fn after(&self, _call: &CallInfo, _outcome: &Result<Value, ToolError>, _elapsed: Duration) {}
}

/// Logs start, success and failure of every call with its timing.
pub struct LoggingMiddleware;

#[async_trait]
impl Middleware for LoggingMiddleware {
    fn name(&self) -> &'static str {
        "logging"
    }

    async fn before(&self, call: &CallInfo) -> Result<(), ToolError> {
        info!(tool = %call.tool, source = %call.source, call_id = %call.call_id, "Tool request");
        Ok(())
    }

    async fn after(&self, call: &CallInfo, outcome: &Result<Value, ToolError>, elapsed: Duration) {
        let duration_ms = elapsed.as_millis() as u64;
        match outcome {
            Ok(_) => info!(tool = %call.tool, duration_ms, "Tool success"),
            Err(e) => error!(tool = %call.tool, duration_ms, error = %e, "Tool error"),
        }
    }
}
