//! Metrics instrumentation for tool calls.

use crate::error::ToolError;
use crate::traits::ToolSource;
use serde_json::Value;
use std::time::Duration;

/// Count one finished call and record its latency.
pub fn record_call(
    tool: &str,
    source: Option<ToolSource>,
    result: &Result<Value, ToolError>,
    elapsed: Duration,
) {
    let outcome = match result {
        Ok(_) => "success",
        Err(e) => e.root_cause().kind(),
    };
    let source = source.map_or_else(|| "unknown".to_string(), |s| s.to_string());

    metrics::counter!(
        "tool_calls_total",
        1,
        "tool" => tool.to_string(),
        "source" => source,
        "outcome" => outcome
    );
    metrics::histogram!(
        "tool_call_duration_ms",
        elapsed.as_secs_f64() * 1000.0,
        "tool" => tool.to_string()
    );
}
