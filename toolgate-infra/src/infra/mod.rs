pub mod audit_adapter;
pub mod audit_logger;
pub mod rate_limit_adapter;
pub mod rate_limiter;
