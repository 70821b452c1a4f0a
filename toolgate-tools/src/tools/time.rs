use crate::error::ToolError;
use crate::execution_context::ExecutionContext;
use crate::tools::base::{parse_input, Tool};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Local, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TimeFormat {
    Short,
    Long,
    Time,
}

#[derive(Deserialize)]
struct TimeInput {
    #[serde(default = "default_format")]
    format: TimeFormat,
    #[serde(default = "default_timezone")]
    timezone: String,
}

fn default_format() -> TimeFormat {
    TimeFormat::Long
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn render<Tz>(now: DateTime<Tz>, format: TimeFormat) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match format {
        TimeFormat::Short => now.format("%Y-%m-%d").to_string(),
        TimeFormat::Time => now.format("%H:%M:%S").to_string(),
        TimeFormat::Long => now.format("%Y-%m-%d %H:%M:%S %Z").to_string(),
    }
}

/// Parse `+HH:MM` / `-HH:MM` offsets.
fn parse_offset(tz: &str) -> Option<FixedOffset> {
    let (sign, rest) = match tz.as_bytes().first()? {
        b'+' => (1, &tz[1..]),
        b'-' => (-1, &tz[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn current_time(format: TimeFormat, timezone: &str) -> Result<String, ToolError> {
    match timezone {
        "UTC" | "utc" => Ok(render(Utc::now(), format)),
        "local" | "LOCAL" => Ok(render(Local::now(), format)),
        other => parse_offset(other)
            .map(|offset| render(Utc::now().with_timezone(&offset), format))
            .ok_or_else(|| ToolError::ValidationError(format!("Invalid timezone '{}'", other))),
    }
}

pub struct TimeNowTool;

#[async_trait]
impl Tool for TimeNowTool {
    fn name(&self) -> &'static str {
        "time.now"
    }

    fn description(&self) -> &'static str {
        "Gets the current time in a given format and timezone"
    }

    fn category(&self) -> &'static str {
        "Utility"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "format": {"type": "string", "enum": ["short", "long", "time"], "default": "long"},
                "timezone": {"type": "string", "default": "UTC"}
            }
        })
    }

    async fn execute(&self, _ctx: ExecutionContext, input: Value) -> Result<Value, ToolError> {
        let input: TimeInput = parse_input(input)?;
        let time = current_time(input.format, &input.timezone)?;
        Ok(json!({ "time": time, "timezone": input.timezone }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_offset() {
        assert_eq!(parse_offset("+05:30"), FixedOffset::east_opt(5 * 3600 + 30 * 60));
        assert_eq!(parse_offset("-08"), FixedOffset::east_opt(-8 * 3600));
        assert_eq!(parse_offset("+25:00"), None);
        assert_eq!(parse_offset("Mars/Olympus"), None);
    }

    #[test]
    fn test_short_format_shape() {
        let short = current_time(TimeFormat::Short, "UTC").unwrap_or_default();
        assert_eq!(short.len(), 10);
        assert_eq!(short.matches('-').count(), 2);
        assert!(current_time(TimeFormat::Long, "Nowhere").is_err());
    }
}
