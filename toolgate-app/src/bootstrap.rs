use crate::config::Config;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use toolgate_infra::{AuditLogger, RateLimitConfig, RateLimitMiddleware, RateLimiter};
use toolgate_tools::{
    register_builtin_tools, AuditEvent, AuditSink, BuiltinOptions, DispatcherConfig,
    LoggingMiddleware, StdioIntegration, ToolDispatcher, ToolRegistry, TracingAuditSink,
    Workspace,
};
use tracing::{info, warn};

/// A wired-up gateway: registry plus the dispatcher in front of it.
pub struct Toolgate {
    pub registry: Arc<ToolRegistry>,
    pub dispatcher: ToolDispatcher,
}

impl Toolgate {
    pub async fn shutdown(&self) {
        self.registry.shutdown().await;
    }
}

/// Sends each audit record to every inner sink in order.
pub struct FanoutAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl AuditSink for FanoutAuditSink {
    async fn record(&self, event: &AuditEvent) {
        for sink in &self.sinks {
            sink.record(event).await;
        }
    }
}

pub async fn build(config: &Config) -> Result<Toolgate> {
    let workspace = Workspace::open(&config.workspace_dir).with_context(|| {
        format!("Failed to open workspace {}", config.workspace_dir.display())
    })?;
    let registry = Arc::new(ToolRegistry::new(Arc::new(workspace)));

    let options = BuiltinOptions {
        max_write_bytes: config.max_write_bytes,
        interpreter: config.interpreter.clone(),
        ..BuiltinOptions::default()
    };
    register_builtin_tools(&registry, &options).context("Failed to register built-in tools")?;

    let dynamic = registry
        .load_dynamic_tools()
        .await
        .context("Failed to load dynamic tools")?;

    // A broken integration is reported and skipped; the rest of the gateway still starts.
    for integration in config.integrations.iter().filter(|i| i.enabled) {
        let provider = Arc::new(StdioIntegration::new(integration.spec()));
        match registry.load_integration(provider).await {
            Ok(count) => info!(integration = %integration.name, tools = count, "Loaded integration"),
            Err(e) => warn!(integration = %integration.name, error = %e, "Skipping integration"),
        }
    }

    let audit_path = config.audit_log_path();
    let logger = AuditLogger::new(&audit_path)
        .with_context(|| format!("Failed to open audit log {}", audit_path.display()))?;
    let sinks: Vec<Arc<dyn AuditSink>> = vec![Arc::new(logger), Arc::new(TracingAuditSink)];
    let audit = Arc::new(FanoutAuditSink::new(sinks));

    let window = config.rate_limit.window();
    let limiter = Arc::new(RateLimiter::new(
        RateLimitConfig::new(config.rate_limit.max_calls, window),
        RateLimitConfig::new(config.rate_limit.global_max_calls, window),
    ));

    let dispatcher = ToolDispatcher::new(
        registry.clone(),
        audit,
        DispatcherConfig {
            timeout: config.timeout(),
        },
    )
    .with_middleware(Arc::new(LoggingMiddleware))
    .with_middleware(Arc::new(RateLimitMiddleware::new(limiter)));

    info!(
        workspace = %config.workspace_dir.display(),
        tools = registry.count(),
        dynamic,
        "Toolgate ready"
    );

    Ok(Toolgate {
        registry,
        dispatcher,
    })
}
