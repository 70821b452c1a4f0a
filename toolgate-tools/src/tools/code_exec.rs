use crate::error::ToolError;
use crate::execution_context::ExecutionContext;
use crate::sandbox::ResourceLimits;
use crate::tools::base::{parse_input, require_setting, Tool};
use crate::workspace::Workspace;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

const SANDBOX_PATH: &str = "/usr/local/bin:/usr/bin:/bin";
const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

#[derive(Deserialize)]
struct CodeExecInput {
    code: String,
}

/// Runs code through an interpreter inside the workspace files directory.
pub struct CodeExecTool {
    workspace: Arc<Workspace>,
    interpreter: Vec<String>,
    limits: ResourceLimits,
}

impl CodeExecTool {
    pub fn new(
        workspace: Arc<Workspace>,
        interpreter: Vec<String>,
        limits: ResourceLimits,
    ) -> Result<Self, ToolError> {
        if interpreter.is_empty() {
            return Err(ToolError::ValidationError("Empty interpreter command".into()));
        }
        Ok(Self {
            workspace,
            interpreter,
            limits,
        })
    }
}

/// Kills the runner's whole process group when dropped.
///
/// The runner leads its own session, so its pid is the group id. Dropping
/// on a dispatcher timeout also takes down background grandchildren that
/// `kill_on_drop` alone would leave running.
struct ProcessGroupGuard {
    pgid: Option<u32>,
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            if let Some(pgid) = self.pgid.and_then(|id| libc::pid_t::try_from(id).ok()) {
                // ESRCH just means the group is already gone.
                unsafe {
                    libc::kill(-pgid, libc::SIGKILL);
                }
            }
        }
    }
}

fn truncate_output(bytes: &[u8]) -> String {
    let end = bytes.len().min(MAX_OUTPUT_BYTES);
    String::from_utf8_lossy(&bytes[..end]).to_string()
}

#[async_trait]
impl Tool for CodeExecTool {
    fn name(&self) -> &'static str {
        "code.execute"
    }

    fn description(&self) -> &'static str {
        "Executes code with the configured interpreter"
    }

    fn category(&self) -> &'static str {
        "Code"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "code": {"type": "string"}
            },
            "required": ["code"]
        })
    }

    async fn execute(&self, ctx: ExecutionContext, input: Value) -> Result<Value, ToolError> {
        require_setting(self.workspace.settings().allow_execute_code, "allow_execute_code")?;
        let input: CodeExecInput = parse_input(input)?;

        let files_dir = self.workspace.files().path();
        let program = &self.interpreter[0];
        let args = &self.interpreter[1..];

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(files_dir)
            .env_clear()
            .env("PATH", SANDBOX_PATH)
            .env("WORKSPACE_DIR", files_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        {
            let limits = self.limits;
            unsafe {
                cmd.pre_exec(move || {
                    // New session: the runner leads a process group we can kill as a whole.
                    libc::setsid();
                    limits.apply()
                });
            }
        }

        info!(call_id = %ctx.call_id, interpreter = %program, "Spawning code runner");
        let mut child = cmd
            .spawn()
            .map_err(|e| ToolError::ExecutionFailed(format!("Failed to start interpreter: {}", e)))?;
        let _group = ProcessGroupGuard { pgid: child.id() };

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.code.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        // Dropping this future (timeout) drops the child and the group guard.
        let output = child.wait_with_output().await?;
        debug!(call_id = %ctx.call_id, status = ?output.status, "Code runner exited");

        Ok(json!({
            "stdout": truncate_output(&output.stdout),
            "stderr": truncate_output(&output.stderr),
            "exit_code": output.status.code(),
        }))
    }
}
