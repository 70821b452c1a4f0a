use crate::audit::AuditEvent;
use crate::error::ToolError;
use crate::execution_context::ExecutionContext;
use crate::metrics;
use crate::middleware::{CallInfo, Middleware};
use crate::registry::{ToolHandle, ToolRegistry};
use crate::traits::{AuditSink, ToolDescriptor, ToolSource};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{error, info, warn};

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    audit: Arc<dyn AuditSink>,
    middleware: Vec<Arc<dyn Middleware>>,
    config: DispatcherConfig,
}

impl ToolDispatcher {
    pub fn new(
        registry: Arc<ToolRegistry>,
        audit: Arc<dyn AuditSink>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            registry,
            audit,
            middleware: Vec::new(),
            config,
        }
    }

    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.registry.list_tools()
    }

    /// Resolve `name`, run it under the timeout and audit both ends.
    ///
    /// Provider failures come back wrapped in `ToolError::ToolExecution`;
    /// lookup misses, middleware rejections and timeouts are returned as is.
    pub async fn call_tool(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let call_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();

        let start_event = AuditEvent::started(&call_id, name, &args);
        self.audit.record(&start_event).await;

        let (source, result) = self.run(&call_id, name, args, started).await;

        let elapsed = started.elapsed();
        metrics::record_call(name, source, &result, elapsed);
        self.audit
            .record(&AuditEvent::finished(&start_event, source, &result, elapsed))
            .await;

        result
    }

    async fn run(
        &self,
        call_id: &str,
        name: &str,
        args: Value,
        started: Instant,
    ) -> (Option<ToolSource>, Result<Value, ToolError>) {
        let Some((source, handle)) = self.registry.resolve(name) else {
            warn!(tool = %name, "Tool not found");
            return (None, Err(ToolError::ToolNotFound(name.to_string())));
        };

        info!(tool = %name, %source, call_id = %call_id, "Dispatching tool");
        let call = CallInfo {
            call_id: call_id.to_string(),
            tool: name.to_string(),
            source,
            args,
        };

        let mut entered = 0;
        let mut rejection = None;
        for middleware in &self.middleware {
            if let Err(e) = middleware.before(&call).await {
                warn!(tool = %name, middleware = middleware.name(), error = %e, "Call rejected");
                rejection = Some(e);
                break;
            }
            entered += 1;
        }

        let result = match rejection {
            Some(e) => Err(e),
            None => self.invoke(&call, handle, started).await,
        };

        for middleware in self.middleware[..entered].iter().rev() {
            middleware.after(&call, &result, started.elapsed()).await;
        }

        (Some(source), result)
    }

    async fn invoke(
        &self,
        call: &CallInfo,
        handle: ToolHandle,
        started: Instant,
    ) -> Result<Value, ToolError> {
        let timeout_ms = self.config.timeout.as_millis() as u64;
        let tool_name = call.tool.clone();
        let args = call.args.clone();
        let ctx = ExecutionContext::new(tool_name.clone(), timeout_ms).with_call_id(call.call_id.clone());

        let exec_future = async move {
            match handle {
                ToolHandle::System(tool) => tool.execute(ctx, args).await,
                ToolHandle::Dynamic(tool) => Err(ToolError::ExecutionFailed(format!(
                    "Dynamic tool '{}' requires an external executor",
                    tool.name
                ))),
                ToolHandle::Integration(provider) => provider.call_tool(&tool_name, args).await,
            }
        };

        // Spawned so a panicking tool cannot take the dispatcher down.
        let mut handle = tokio::spawn(exec_future);

        let outcome = match timeout(self.config.timeout, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => {
                if join_err.is_panic() {
                    error!(tool = %call.tool, "Tool execution panicked");
                } else {
                    error!(tool = %call.tool, "Tool execution cancelled");
                }
                Err(ToolError::Internal)
            }
            Err(_) => {
                // Dropping the task drops its child processes and connections.
                handle.abort();
                let _ = handle.await;
                warn!(tool = %call.tool, timeout_ms, "Tool execution timed out");
                return Err(ToolError::Timeout {
                    tool: call.tool.clone(),
                    timeout_ms,
                });
            }
        };

        outcome.map_err(|source| ToolError::ToolExecution {
            tool: call.tool.clone(),
            duration_ms: started.elapsed().as_millis() as u64,
            source: Box::new(source),
        })
    }
}
