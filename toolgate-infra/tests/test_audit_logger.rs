use serde_json::json;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use toolgate_infra::AuditLogger;
use toolgate_tools::{AuditEvent, AuditPhase, AuditSink, ToolError, ToolSource};

fn read_lines(path: &std::path::Path) -> Vec<String> {
    let file = File::open(path).unwrap();
    BufReader::new(file).lines().map(|l| l.unwrap()).collect()
}

#[test]
fn test_log_single_event() {
    let temp = TempDir::new().unwrap();
    let log_path = temp.path().join("audit.jsonl");
    let logger = AuditLogger::new(&log_path).unwrap();

    logger
        .log(&AuditEvent::started("c1", "echo", &json!({"message": "hi"})))
        .unwrap();

    assert_eq!(read_lines(&log_path).len(), 1);
}

#[test]
fn test_creates_parent_directories() {
    let temp = TempDir::new().unwrap();
    let log_path = temp.path().join("nested/logs/audit.jsonl");
    let logger = AuditLogger::new(&log_path).unwrap();
    assert_eq!(logger.path(), log_path.as_path());
    assert!(log_path.exists());
}

#[test]
fn test_append_only() {
    let temp = TempDir::new().unwrap();
    let log_path = temp.path().join("audit.jsonl");

    {
        let logger = AuditLogger::new(&log_path).unwrap();
        logger.log(&AuditEvent::started("c1", "a", &json!({}))).unwrap();
    }

    {
        let logger = AuditLogger::new(&log_path).unwrap();
        logger.log(&AuditEvent::started("c2", "b", &json!({}))).unwrap();
    }

    let lines = read_lines(&log_path);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("\"c1\""));
    assert!(lines[1].contains("\"c2\""));
}

#[test]
fn test_concurrent_logging() {
    let temp = TempDir::new().unwrap();
    let log_path = temp.path().join("audit.jsonl");
    let logger = Arc::new(AuditLogger::new(&log_path).unwrap());

    let mut handles = vec![];

    for i in 0..10 {
        let logger_clone = Arc::clone(&logger);
        let handle = thread::spawn(move || {
            let event = AuditEvent::started(&format!("call{}", i), "tool", &json!({}));
            logger_clone.log(&event).unwrap();
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let lines = read_lines(&log_path);
    assert_eq!(lines.len(), 10);
    for line in lines {
        serde_json::from_str::<AuditEvent>(&line).unwrap();
    }
}

#[test]
fn test_json_format_of_failure_record() {
    let temp = TempDir::new().unwrap();
    let log_path = temp.path().join("audit.jsonl");
    let logger = AuditLogger::new(&log_path).unwrap();

    let started = AuditEvent::started("c9", "file.read", &json!({"path": "../x"}));
    let result = Err(ToolError::ContainmentViolation("../x".into()));
    let finished = AuditEvent::finished(
        &started,
        Some(ToolSource::System),
        &result,
        Duration::from_millis(7),
    );
    logger.log(&finished).unwrap();

    let line = read_lines(&log_path).remove(0);
    let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(parsed["call_id"], "c9");
    assert_eq!(parsed["phase"], "failed");
    assert_eq!(parsed["source"], "system");
    assert_eq!(parsed["duration_ms"], 7);
    assert_eq!(parsed["error_kind"], "containment_violation");
    assert_eq!(parsed["args"]["path"], "../x");
}

#[tokio::test]
async fn test_sink_records_events() {
    let temp = TempDir::new().unwrap();
    let log_path = temp.path().join("audit.jsonl");
    let logger = AuditLogger::new(&log_path).unwrap();

    let started = AuditEvent::started("c1", "echo", &json!({}));
    let done = AuditEvent::finished(&started, None, &Ok(json!(1)), Duration::from_millis(1));
    logger.record(&started).await;
    logger.record(&done).await;

    let events: Vec<AuditEvent> = read_lines(&log_path)
        .iter()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(events[0].phase, AuditPhase::Started);
    assert_eq!(events[1].phase, AuditPhase::Completed);
    assert_eq!(events[0].call_id, events[1].call_id);
}
