//! Tool server spoken to over newline-delimited JSON-RPC 2.0.

use super::IntegrationSpec;
use crate::error::ToolError;
use crate::traits::{ToolDescriptor, ToolProvider, ToolSource};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct RemoteTool {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "inputSchema", default = "empty_schema")]
    input_schema: Value,
}

fn empty_schema() -> Value {
    json!({"type": "object"})
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

/// Removes an in-flight request when its caller goes away first.
struct PendingGuard<'a> {
    pending: &'a PendingMap,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

/// Request/response plumbing over any byte stream pair.
struct Transport {
    name: String,
    writer: tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    pending: PendingMap,
    alive: Arc<AtomicBool>,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
}

impl Transport {
    fn new<R, W>(name: &str, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));

        let reader = tokio::spawn(read_loop(
            name.to_string(),
            reader,
            Arc::clone(&pending),
            Arc::clone(&alive),
        ));

        Self {
            name: name.to_string(),
            writer: tokio::sync::Mutex::new(Box::new(writer)),
            pending,
            alive,
            next_id: AtomicU64::new(1),
            reader,
        }
    }

    fn not_running(&self) -> ToolError {
        ToolError::ExecutionFailed(format!("integration '{}' is not running", self.name))
    }

    async fn send(&self, message: &JsonRpcRequest<'_>) -> Result<(), ToolError> {
        let mut payload =
            serde_json::to_string(message).map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        payload.push('\n');

        let mut writer = self.writer.lock().await;
        let written = async {
            writer.write_all(payload.as_bytes()).await?;
            writer.flush().await
        }
        .await;
        written.map_err(|e| {
            debug!(integration = %self.name, error = %e, "Write to integration failed");
            self.not_running()
        })
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, ToolError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };

        // Checked after inserting: the reader clears the map only after flipping the flag.
        if !self.alive.load(Ordering::SeqCst) {
            return Err(self.not_running());
        }

        trace!(integration = %self.name, method, id, "client -> integration");
        self.send(&JsonRpcRequest {
            jsonrpc: "2.0",
            id: Some(id),
            method,
            params,
        })
        .await?;

        let response = match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(self.not_running()),
            Err(_) => {
                return Err(ToolError::ExecutionFailed(format!(
                    "integration '{}' did not answer '{}'",
                    self.name, method
                )))
            }
        };

        if let Some(err) = response.error {
            return Err(ToolError::ExecutionFailed(format!(
                "integration '{}' error {}: {}",
                self.name, err.code, err.message
            )));
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), ToolError> {
        self.send(&JsonRpcRequest {
            jsonrpc: "2.0",
            id: None,
            method,
            params,
        })
        .await
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop<R>(name: String, reader: R, pending: PendingMap, alive: Arc<AtomicBool>)
where
    R: AsyncRead + Send + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                trace!(integration = %name, raw = %line, "integration -> client");

                let response = match serde_json::from_str::<JsonRpcResponse>(line) {
                    Ok(response) => response,
                    Err(e) => {
                        warn!(integration = %name, error = %e, "Malformed message from integration");
                        continue;
                    }
                };

                // Notifications carry no id and are ignored.
                let Some(id) = response.id else {
                    continue;
                };
                let waiter = pending.lock().remove(&id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    None => warn!(integration = %name, id, "Response for unknown request id"),
                }
            }
            Ok(None) => {
                debug!(integration = %name, "Integration output closed");
                break;
            }
            Err(e) => {
                warn!(integration = %name, error = %e, "Error reading from integration");
                break;
            }
        }
    }

    alive.store(false, Ordering::SeqCst);
    // Dropping the senders wakes every waiting request.
    pending.lock().clear();
}

/// An external tool server reached over stdin/stdout.
pub struct StdioIntegration {
    spec: IntegrationSpec,
    transport: RwLock<Option<Arc<Transport>>>,
    child: tokio::sync::Mutex<Option<Child>>,
}

impl StdioIntegration {
    pub fn new(spec: IntegrationSpec) -> Self {
        Self {
            spec,
            transport: RwLock::new(None),
            child: tokio::sync::Mutex::new(None),
        }
    }

    /// Use an already connected stream pair instead of spawning `command`.
    pub fn with_io<R, W>(spec: IntegrationSpec, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let transport = Transport::new(&spec.name, reader, writer);
        Self {
            spec,
            transport: RwLock::new(Some(Arc::new(transport))),
            child: tokio::sync::Mutex::new(None),
        }
    }

    pub fn spec(&self) -> &IntegrationSpec {
        &self.spec
    }

    fn transport(&self) -> Result<Arc<Transport>, ToolError> {
        self.transport.read().clone().ok_or_else(|| {
            ToolError::ExecutionFailed(format!("integration '{}' is not running", self.spec.name))
        })
    }

    async fn spawn(&self) -> Result<(), ToolError> {
        let mut cmd = Command::new(&self.spec.command);
        cmd.args(&self.spec.args)
            .envs(&self.spec.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            ToolError::ExecutionFailed(format!(
                "failed to start integration '{}': {}",
                self.spec.name, e
            ))
        })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(ToolError::ExecutionFailed(format!(
                "integration '{}' has no stdio pipes",
                self.spec.name
            )));
        };

        let transport = Transport::new(&self.spec.name, stdout, stdin);
        *self.transport.write() = Some(Arc::new(transport));
        *self.child.lock().await = Some(child);
        Ok(())
    }
}

#[async_trait]
impl ToolProvider for StdioIntegration {
    fn id(&self) -> &str {
        &self.spec.name
    }

    async fn initialize(&self) -> Result<(), ToolError> {
        if self.transport.read().is_none() {
            self.spawn().await?;
        }

        let transport = self.transport()?;
        transport
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {"name": "toolgate", "version": env!("CARGO_PKG_VERSION")}
                })),
            )
            .await?;
        transport.notify("notifications/initialized", None).await?;

        info!(integration = %self.spec.name, "Integration initialized");
        Ok(())
    }

    async fn shutdown(&self) {
        // Dropping the last transport handle stops the reader task.
        let transport = self.transport.write().take();
        drop(transport);

        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(e) = child.kill().await {
                debug!(integration = %self.spec.name, error = %e, "Integration already exited");
            }
        }
        info!(integration = %self.spec.name, "Integration shut down");
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        let result = self.transport()?.request("tools/list", None).await?;
        let tools: Vec<RemoteTool> = serde_json::from_value(result["tools"].clone()).map_err(|e| {
            ToolError::ExecutionFailed(format!(
                "integration '{}' sent an invalid tool list: {}",
                self.spec.name, e
            ))
        })?;

        let category = self.spec.namespace.as_deref().unwrap_or(&self.spec.name);
        Ok(tools
            .into_iter()
            .map(|tool| ToolDescriptor {
                name: self.spec.exposed_name(&tool.name),
                description: tool.description,
                category: category.to_string(),
                input_schema: tool.input_schema,
                source: ToolSource::Integration,
                provider: self.spec.name.clone(),
            })
            .collect())
    }

    async fn call_tool(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let remote = self.spec.remote_name(name);
        let result = self
            .transport()?
            .request("tools/call", Some(json!({"name": remote, "arguments": args})))
            .await?;

        if result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
            let message = result["content"]
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| item["text"].as_str())
                        .collect::<Vec<_>>()
                        .join("\n")
                })
                .unwrap_or_default();
            return Err(ToolError::ExecutionFailed(message));
        }
        Ok(result)
    }
}
