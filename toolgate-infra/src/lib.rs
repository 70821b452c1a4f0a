pub mod infra;

pub use infra::audit_logger::{AuditLogger, AuditLoggerError};
pub use infra::rate_limiter::{RateLimitConfig, RateLimitError, RateLimiter};
pub use infra::rate_limit_adapter::RateLimitMiddleware;
