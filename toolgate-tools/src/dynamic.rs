//! User-authored tools persisted as scripts in the workspace.

use crate::error::ToolError;
use crate::traits::{ToolDescriptor, ToolSource};
use serde_json::json;

pub const SCRIPT_EXTENSION: &str = "tool";
pub const CATEGORY_HEADER: &str = "# Category:";
pub const DEFAULT_CATEGORY: &str = "User Defined";
pub const DYNAMIC_PROVIDER: &str = "user_defined";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicTool {
    pub name: String,
    pub category: String,
    /// Full script text, including the category header line.
    pub code: String,
}

impl DynamicTool {
    pub fn new(name: &str, code: &str, category: &str) -> Self {
        Self {
            name: name.to_string(),
            category: category.to_string(),
            code: format!("{} {}\n{}", CATEGORY_HEADER, category, code),
        }
    }

    /// Rebuild from a stored script; the category comes from the header line.
    pub fn parse(name: &str, contents: String) -> Self {
        let category = contents
            .lines()
            .next()
            .and_then(|line| line.strip_prefix(CATEGORY_HEADER))
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

        Self {
            name: name.to_string(),
            category,
            code: contents,
        }
    }

    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: "User defined tool".to_string(),
            category: self.category.clone(),
            input_schema: json!({"type": "object"}),
            source: ToolSource::Dynamic,
            provider: DYNAMIC_PROVIDER.to_string(),
        }
    }
}

/// Names double as file stems, so only `[A-Za-z0-9._-]` is accepted.
pub fn validate_tool_name(name: &str) -> Result<(), ToolError> {
    if name.is_empty() {
        return Err(ToolError::ValidationError("Tool name is empty".into()));
    }
    if name.starts_with('.') {
        return Err(ToolError::ValidationError(format!(
            "Tool name '{}' must not start with '.'",
            name
        )));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(ToolError::ValidationError(format!(
            "Tool name '{}' contains invalid character {:?}",
            name, bad
        )));
    }
    Ok(())
}

/// The category is stored on the script's header line.
pub fn validate_category(category: &str) -> Result<(), ToolError> {
    if category.trim().is_empty() {
        return Err(ToolError::ValidationError("Tool category is empty".into()));
    }
    if category.chars().any(char::is_control) {
        return Err(ToolError::ValidationError(
            "Tool category must not contain control characters".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_prepends_category_header() {
        let tool = DynamicTool::new("greet", "print('hi')", "Fun");
        assert_eq!(tool.code, "# Category: Fun\nprint('hi')");
        assert_eq!(DynamicTool::parse("greet", tool.code.clone()), tool);
    }

    #[test]
    fn test_parse_without_header_uses_default_category() {
        let tool = DynamicTool::parse("plain", "echo hi".to_string());
        assert_eq!(tool.category, DEFAULT_CATEGORY);
        assert_eq!(tool.descriptor().source, ToolSource::Dynamic);
    }

    #[test]
    fn test_category_must_fit_header_line() {
        assert!(validate_category("Fun").is_ok());
        assert!(validate_category("Data Tools").is_ok());
        for bad in ["", "  ", "Fun\nprint('pwned')", "a\rb", "tab\there"] {
            assert!(
                matches!(validate_category(bad), Err(ToolError::ValidationError(_))),
                "{:?}",
                bad
            );
        }
    }

    #[test]
    fn test_tool_names() {
        assert!(validate_tool_name("my-tool_v1.2").is_ok());
        assert!(validate_tool_name("").is_err());
        assert!(validate_tool_name(".hidden").is_err());
        assert!(validate_tool_name("../escape").is_err());
        assert!(validate_tool_name("a/b").is_err());
        assert!(validate_tool_name("spa ce").is_err());
    }
}
