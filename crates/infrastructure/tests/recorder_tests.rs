use anyhow::Result;
use report_core::TaskResult;
use report_infrastructure::{CallbackEvent, EventRecorder, FindOptions};
use serde_json::json;
use tracing_test::traced_test;

mod database_test_utils;
use database_test_utils::{alice, SqliteTestDatabase};

#[tokio::test]
#[traced_test]
async fn test_recorder_playbook_flow() -> Result<()> {
    let db = SqliteTestDatabase::new()?;
    let manager = db.manager(alice()).await?;
    let recorder = EventRecorder::new(&manager);

    let lines = [
        r#"{"event": "playbook_start", "path": "/nonexistent/site.yml", "connection": "ssh"}"#,
        r#"{"event": "task_ok", "host": "web1", "result": {"changed": true, "invocation": {"module_name": "copy", "module_args": "src=a dest=b"}}}"#,
        r#"{"event": "task_failed", "host": "web1", "result": {"rc": 2, "invocation": {"module_name": "command"}}}"#,
        r#"{"event": "task_unreachable", "host": "db1", "result": "ssh: connect to host db1 port 22: timed out"}"#,
        r#"{"event": "playbook_end"}"#,
    ];
    for line in lines {
        let event: CallbackEvent = serde_json::from_str(line)?;
        recorder.dispatch(event).await?;
    }
    assert!(recorder.current_playbook().await.is_none());

    let playbooks = manager.find_playbooks(None, FindOptions::default()).await?;
    assert_eq!(playbooks.len(), 1);
    let playbook = &playbooks[0];
    assert_eq!(playbook.connection, "ssh");
    assert_eq!(playbook.checksum, "NA");
    assert!(playbook.is_finished());

    let tasks = manager.tasks_for_playbook(playbook).await?;
    assert_eq!(tasks.len(), 3);
    assert_eq!(tasks[0].module.as_deref(), Some("copy"));
    assert!(tasks[0].changed);
    assert_eq!(tasks[1].result, TaskResult::Failed);
    assert_eq!(tasks[2].module, None);
    assert_eq!(
        tasks[2].data.as_ref().and_then(|d| d.as_value()).cloned(),
        Some(json!({"msg": "ssh: connect to host db1 port 22: timed out"}))
    );

    let stats = manager.playbook_stats(playbook).await?;
    assert_eq!(stats["web1"]["changed"], 1);
    assert_eq!(stats["db1"]["unreachable"], 1);
    Ok(())
}

#[tokio::test]
async fn test_tasks_outside_playbook_and_stray_end() -> Result<()> {
    let db = SqliteTestDatabase::new()?;
    let manager = db.manager(alice()).await?;
    let recorder = EventRecorder::new(&manager);

    assert!(recorder.on_playbook_end().await?.is_none());

    let task = recorder
        .on_task_skipped("web1", json!({"skip_reason": "Conditional result was False"}))
        .await?;
    assert_eq!(task.result, TaskResult::Skipped);
    assert_eq!(task.playbook_id, None);

    let failed = recorder.on_async_failed("web2", json!(null)).await?;
    assert_eq!(failed.result, TaskResult::AsyncFailed);
    Ok(())
}
