pub mod call;
pub mod list;
pub mod manage;

use crate::bootstrap::Toolgate;
use crate::config::DEFAULT_CONFIG_PATH;
use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::PathBuf;

pub const USAGE: &str = "Usage: toolgate [--config <path>] <command>

Commands:
  list                                   List every registered tool as JSON
  call <name> [json-args]                Call a tool through the dispatcher
  create-tool <name> <file> [category]   Register a dynamic tool from a script file
  delete-tool <name>                     Remove a dynamic tool";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    List,
    Call { name: String, args: Value },
    CreateTool {
        name: String,
        file: PathBuf,
        category: String,
    },
    DeleteTool { name: String },
}

/// Parsed command line: config location plus the command to run.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub config_path: PathBuf,
    pub command: Command,
}

/// Parse arguments without the program name.
pub fn parse_args(args: &[String]) -> Result<Invocation> {
    let mut config_path = PathBuf::from(DEFAULT_CONFIG_PATH);
    let mut rest: Vec<&str> = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let path = iter.next().context("--config needs a path")?;
            config_path = PathBuf::from(path);
        } else {
            rest.push(arg.as_str());
        }
    }

    let command = match rest.as_slice() {
        ["list"] => Command::List,
        ["call", name] => Command::Call {
            name: name.to_string(),
            args: Value::Object(Default::default()),
        },
        ["call", name, json] => Command::Call {
            name: name.to_string(),
            args: serde_json::from_str(json).context("Tool arguments must be valid JSON")?,
        },
        ["create-tool", name, file] => Command::CreateTool {
            name: name.to_string(),
            file: PathBuf::from(file),
            category: manage::DEFAULT_CATEGORY.to_string(),
        },
        ["create-tool", name, file, category] => Command::CreateTool {
            name: name.to_string(),
            file: PathBuf::from(file),
            category: category.to_string(),
        },
        ["delete-tool", name] => Command::DeleteTool {
            name: name.to_string(),
        },
        [] => bail!("No command given\n\n{}", USAGE),
        other => bail!("Unknown command: {}\n\n{}", other.join(" "), USAGE),
    };

    Ok(Invocation {
        config_path,
        command,
    })
}

/// Run `command` against a built gateway and return its JSON output.
pub async fn execute(gate: &Toolgate, command: &Command) -> Result<String> {
    match command {
        Command::List => list::run(gate),
        Command::Call { name, args } => call::run(gate, name, args.clone()).await,
        Command::CreateTool {
            name,
            file,
            category,
        } => manage::create_tool(gate, name, file, category).await,
        Command::DeleteTool { name } => manage::delete_tool(gate, name).await,
    }
}
