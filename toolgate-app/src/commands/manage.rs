use crate::bootstrap::Toolgate;
use anyhow::{Context, Result};
use serde_json::json;
use std::path::Path;

pub use toolgate_tools::dynamic::DEFAULT_CATEGORY;

pub async fn create_tool(gate: &Toolgate, name: &str, file: &Path, category: &str) -> Result<String> {
    let code = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let descriptor = gate
        .registry
        .create_dynamic_tool(name, &code, category)
        .await?;
    Ok(serde_json::to_string_pretty(&descriptor)?)
}

pub async fn delete_tool(gate: &Toolgate, name: &str) -> Result<String> {
    gate.registry.delete_dynamic_tool(name).await?;
    Ok(serde_json::to_string_pretty(&json!({ "deleted": name }))?)
}
