use crate::error::ToolError;
use crate::execution_context::ExecutionContext;
use crate::tools::base::{parse_input, Tool};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
struct EchoInput {
    message: String,
}

pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn description(&self) -> &'static str {
        "Echoes input back"
    }

    fn category(&self) -> &'static str {
        "Utility"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": {"type": "string"}
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, _ctx: ExecutionContext, input: Value) -> Result<Value, ToolError> {
        let input: EchoInput = parse_input(input)?;
        Ok(json!({ "message": input.message }))
    }
}
