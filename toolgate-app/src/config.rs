use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use toolgate_tools::sandbox::DEFAULT_MAX_BYTES;
use toolgate_tools::IntegrationSpec;

pub const DEFAULT_CONFIG_PATH: &str = "toolgate.yaml";
pub const WORKSPACE_ENV: &str = "TOOLGATE_WORKSPACE_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub workspace_dir: PathBuf,
    /// Defaults to `<workspace_dir>/audit.jsonl`.
    pub audit_log: Option<PathBuf>,
    pub log_level: String,
    pub json_logs: bool,
    pub execution_timeout_secs: u64,
    pub max_write_bytes: u64,
    pub rate_limit: RateLimitSettings,
    pub interpreter: Vec<String>,
    pub integrations: Vec<IntegrationConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::from("./workspace"),
            audit_log: None,
            log_level: "info".to_string(),
            json_logs: false,
            execution_timeout_secs: 30,
            max_write_bytes: DEFAULT_MAX_BYTES,
            rate_limit: RateLimitSettings::default(),
            interpreter: vec!["python3".to_string(), "-".to_string()],
            integrations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Calls allowed per tool within one window.
    pub max_calls: usize,
    pub window_secs: u64,
    /// Calls allowed across all tools within one window.
    pub global_max_calls: usize,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_calls: 60,
            window_secs: 60,
            global_max_calls: 600,
        }
    }
}

impl RateLimitSettings {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationConfig {
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

fn enabled_by_default() -> bool {
    true
}

impl IntegrationConfig {
    pub fn spec(&self) -> IntegrationSpec {
        IntegrationSpec {
            name: self.name.clone(),
            command: self.command.clone(),
            args: self.args.clone(),
            env: self.env.clone(),
            namespace: self.namespace.clone(),
        }
    }
}

impl Config {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Self::from_yaml(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            Self::default()
        };

        if let Ok(dir) = std::env::var(WORKSPACE_ENV) {
            if !dir.trim().is_empty() {
                config.workspace_dir = PathBuf::from(dir);
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty document parses as unit, not as a mapping.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.execution_timeout_secs == 0 {
            bail!("execution_timeout_secs must be greater than zero");
        }
        if self.max_write_bytes == 0 {
            bail!("max_write_bytes must be greater than zero");
        }
        if self.rate_limit.max_calls == 0 || self.rate_limit.global_max_calls == 0 {
            bail!("rate_limit call counts must be greater than zero");
        }
        if self.rate_limit.window_secs == 0 {
            bail!("rate_limit.window_secs must be greater than zero");
        }
        if self.interpreter.first().map_or(true, |p| p.trim().is_empty()) {
            bail!("interpreter must name a program");
        }

        let mut seen = HashSet::new();
        for integration in &self.integrations {
            if integration.name.trim().is_empty() {
                bail!("integration name cannot be empty");
            }
            if integration.command.trim().is_empty() {
                bail!("integration '{}' has no command", integration.name);
            }
            if !seen.insert(integration.name.as_str()) {
                bail!("duplicate integration '{}'", integration.name);
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.audit_log
            .clone()
            .unwrap_or_else(|| self.workspace_dir.join("audit.jsonl"))
    }
}
