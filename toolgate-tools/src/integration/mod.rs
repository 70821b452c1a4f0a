//! External tool servers exposed through the Integration table.

pub mod stdio;

pub use stdio::StdioIntegration;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How to launch one external tool server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationSpec {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Prefix for exposed tool names (`<namespace>.<tool>`).
    #[serde(default)]
    pub namespace: Option<String>,
}

impl IntegrationSpec {
    pub fn exposed_name(&self, remote: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{}.{}", ns, remote),
            None => remote.to_string(),
        }
    }

    /// Map an exposed name back to the server's own name.
    pub fn remote_name<'a>(&self, exposed: &'a str) -> &'a str {
        match &self.namespace {
            Some(ns) => exposed
                .strip_prefix(ns.as_str())
                .and_then(|rest| rest.strip_prefix('.'))
                .unwrap_or(exposed),
            None => exposed,
        }
    }
}
