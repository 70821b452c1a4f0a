//! Sandboxed tool execution: path containment, atomic writes, a three-table
//! tool registry and an audited dispatcher.

pub mod audit;
pub mod dispatcher;
pub mod dynamic;
pub mod error;
pub mod execution_context;
pub mod integration;
pub mod metrics;
pub mod middleware;
pub mod registry;
pub mod sandbox;
pub mod tools;
pub mod traits;
pub mod workspace;

pub use audit::{AuditEvent, AuditPhase, TracingAuditSink};
pub use dispatcher::{DispatcherConfig, ToolDispatcher};
pub use dynamic::DynamicTool;
pub use error::ToolError;
pub use execution_context::ExecutionContext;
pub use integration::{IntegrationSpec, StdioIntegration};
pub use middleware::{CallInfo, LoggingMiddleware, Middleware};
pub use registry::{ToolHandle, ToolRegistry};
pub use sandbox::{AtomicWriter, BoxedPath, SandboxRoot};
pub use tools::{register_builtin_tools, BuiltinOptions, Tool};
pub use traits::{AuditSink, ToolDescriptor, ToolProvider, ToolSource};
pub use workspace::{Workspace, WorkspaceSettings};
