use crate::bootstrap::Toolgate;
use anyhow::Result;

pub fn run(gate: &Toolgate) -> Result<String> {
    let tools = gate.dispatcher.list_tools();
    Ok(serde_json::to_string_pretty(&tools)?)
}
