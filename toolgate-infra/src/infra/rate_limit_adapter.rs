use crate::infra::rate_limiter::{RateLimitError, RateLimiter};
use async_trait::async_trait;
use std::sync::Arc;
use toolgate_tools::{CallInfo, Middleware, ToolError};
use tracing::warn;

/// Rejects calls over the limit before they reach the tool.
pub struct RateLimitMiddleware {
    limiter: Arc<RateLimiter>,
}

impl RateLimitMiddleware {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

#[async_trait]
impl Middleware for RateLimitMiddleware {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn before(&self, call: &CallInfo) -> Result<(), ToolError> {
        self.limiter.check_all(&call.tool).map_err(|e| {
            let RateLimitError::Exceeded(scope) = e;
            warn!(tool = %call.tool, call_id = %call.call_id, %scope, "Rate limit exceeded");
            ToolError::RateLimited(scope)
        })
    }
}
