use crate::bootstrap::Toolgate;
use anyhow::Result;
use serde_json::Value;

pub async fn run(gate: &Toolgate, name: &str, args: Value) -> Result<String> {
    let result = gate.dispatcher.call_tool(name, args).await?;
    Ok(serde_json::to_string_pretty(&result)?)
}
