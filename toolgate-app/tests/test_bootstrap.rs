use serde_json::{json, Value};
use std::io::{BufRead, BufReader};
use tempfile::TempDir;
use toolgate_app::commands::{self, Command};
use toolgate_app::config::{Config, IntegrationConfig};
use toolgate_tools::{ToolError, ToolSource};

fn config(temp: &TempDir) -> Config {
    Config {
        workspace_dir: temp.path().join("ws"),
        ..Config::default()
    }
}

fn audit_records(config: &Config) -> Vec<Value> {
    let file = std::fs::File::open(config.audit_log_path()).unwrap();
    BufReader::new(file)
        .lines()
        .map(|l| serde_json::from_str(&l.unwrap()).unwrap())
        .collect()
}

#[tokio::test]
async fn test_build_registers_builtins_and_audits_calls() {
    let temp = TempDir::new().unwrap();
    let config = config(&temp);
    let gate = toolgate_app::build(&config).await.unwrap();

    assert!(matches!(
        gate.registry.resolve("file.read"),
        Some((ToolSource::System, _))
    ));

    let result = gate
        .dispatcher
        .call_tool("echo", json!({"message": "hello"}))
        .await
        .unwrap();
    assert_eq!(result["message"], "hello");

    let records = audit_records(&config);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["phase"], "started");
    assert_eq!(records[1]["phase"], "completed");
    assert_eq!(records[0]["call_id"], records[1]["call_id"]);

    gate.shutdown().await;
}

#[tokio::test]
async fn test_broken_integration_is_skipped() {
    let temp = TempDir::new().unwrap();
    let config = Config {
        integrations: vec![
            IntegrationConfig {
                name: "ghost".into(),
                enabled: true,
                command: "/nonexistent/toolgate-test-server".into(),
                args: vec![],
                env: Default::default(),
                namespace: None,
            },
            IntegrationConfig {
                name: "off".into(),
                enabled: false,
                command: "/nonexistent/other".into(),
                args: vec![],
                env: Default::default(),
                namespace: None,
            },
        ],
        ..config(&temp)
    };

    let gate = toolgate_app::build(&config).await.unwrap();
    assert!(gate.registry.integration_ids().is_empty());
    assert!(gate.registry.resolve("echo").is_some());
    gate.shutdown().await;
}

#[tokio::test]
async fn test_rate_limit_applies_per_tool() {
    let temp = TempDir::new().unwrap();
    let mut config = config(&temp);
    config.rate_limit.max_calls = 1;
    let gate = toolgate_app::build(&config).await.unwrap();

    gate.dispatcher
        .call_tool("echo", json!({"message": "1"}))
        .await
        .unwrap();
    let err = gate
        .dispatcher
        .call_tool("echo", json!({"message": "2"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::RateLimited(_)));

    // Another tool has its own window.
    gate.dispatcher
        .call_tool("time.now", json!({}))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_commands_manage_dynamic_tools() {
    let temp = TempDir::new().unwrap();
    let config = config(&temp);
    let script = temp.path().join("greet.py");
    std::fs::write(&script, "print('hi')\n").unwrap();

    let gate = toolgate_app::build(&config).await.unwrap();

    let created = commands::execute(
        &gate,
        &Command::CreateTool {
            name: "greet".into(),
            file: script.clone(),
            category: "Fun".into(),
        },
    )
    .await
    .unwrap();
    let descriptor: Value = serde_json::from_str(&created).unwrap();
    assert_eq!(descriptor["name"], "greet");
    assert_eq!(descriptor["category"], "Fun");

    let listed: Value = serde_json::from_str(&commands::execute(&gate, &Command::List).await.unwrap())
        .unwrap();
    assert!(listed
        .as_array()
        .unwrap()
        .iter()
        .any(|t| t["name"] == "greet"));

    commands::execute(&gate, &Command::DeleteTool { name: "greet".into() })
        .await
        .unwrap();
    assert!(gate.registry.resolve("greet").is_none());

    let err = commands::execute(&gate, &Command::DeleteTool { name: "file.read".into() })
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ToolError>(),
        Some(ToolError::PermissionDenied(_))
    ));
}

#[tokio::test]
async fn test_dynamic_tools_survive_restart() {
    let temp = TempDir::new().unwrap();
    let config = config(&temp);

    let gate = toolgate_app::build(&config).await.unwrap();
    gate.registry
        .create_dynamic_tool("persisted", "print(1)", "Keep")
        .await
        .unwrap();
    gate.shutdown().await;
    drop(gate);

    let gate = toolgate_app::build(&config).await.unwrap();
    assert!(matches!(
        gate.registry.resolve("persisted"),
        Some((ToolSource::Dynamic, _))
    ));
    assert_eq!(
        gate.registry.get_dynamic_source("persisted").as_deref(),
        Some("# Category: Keep\nprint(1)")
    );
}

#[tokio::test]
async fn test_call_command_outputs_json() {
    let temp = TempDir::new().unwrap();
    let gate = toolgate_app::build(&config(&temp)).await.unwrap();

    let out = commands::execute(
        &gate,
        &Command::Call {
            name: "echo".into(),
            args: json!({"message": "cli"}),
        },
    )
    .await
    .unwrap();
    assert_eq!(serde_json::from_str::<Value>(&out).unwrap(), json!({"message": "cli"}));

    let err = commands::execute(
        &gate,
        &Command::Call {
            name: "nope".into(),
            args: json!({}),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ToolError>(),
        Some(ToolError::ToolNotFound(_))
    ));
}
