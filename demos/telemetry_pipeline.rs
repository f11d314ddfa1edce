//! # Example: Telemetry Pipeline
//!
//! Records a burst of telemetry, runs a task through its lifecycle, and shuts
//! down cleanly, with runtime events rendered by `LogWriter`.
//!
//! ```bash
//! RUST_LOG=flowtrail=debug cargo run --example telemetry_pipeline
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use flowtrail::logging::{LogConfig, init_logging};
use flowtrail::storage::tables;
use flowtrail::{
    BuildEvent, Config, MemoryStorage, MessageEvent, Pipeline, Subscribe, TaskCreate, TaskUpdate,
    TransactionEvent,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(&LogConfig::default())?;

    let cfg = Config::from_toml_str(
        r#"
        [queue]
        capacity = 1000
        batch_size = 25
        flush_interval_ms = 250

        [retention]
        purge_interval = "2h"
        "#,
    )?;

    let storage = Arc::new(MemoryStorage::initialized());
    #[cfg(feature = "logging")]
    let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(flowtrail::LogWriter::new())];
    #[cfg(not(feature = "logging"))]
    let subscribers: Vec<Arc<dyn Subscribe>> = Vec::new();

    let pipeline = Pipeline::builder(cfg)
        .with_storage(storage.clone())
        .with_subscribers(subscribers)
        .build();
    pipeline.start();
    // let the startup sweep finish before recording
    tokio::time::sleep(Duration::from_millis(50)).await;

    let flow = Uuid::new_v4();
    for step in 0..60 {
        let vertex = format!("Vertex-{step}");
        pipeline.telemetry().record(
            BuildEvent::new(flow, &vertex, true).with_result(json!({ "step": step }), json!([])),
        );
        pipeline.telemetry().record(
            TransactionEvent::new(flow, &vertex, "success").with_target(format!("Vertex-{}", step + 1)),
        );
    }
    pipeline
        .telemetry()
        .record(MessageEvent::new("Machine", "AI", "all steps built", "demo-session").with_flow(flow));

    let reviewer = Uuid::new_v4();
    pipeline
        .tasks()
        .subscribe_flow(reviewer, "TaskCreated", Some("review"), None)
        .await?;
    let task = pipeline
        .tasks()
        .create_task(TaskCreate {
            title: "check build output".into(),
            flow_id: flow,
            author_id: flow,
            assignee_id: Uuid::new_v4(),
            category: "review".into(),
            state: "open".into(),
            ..TaskCreate::default()
        })
        .await?;
    pipeline
        .tasks()
        .update_task(
            task.id,
            TaskUpdate {
                status: Some("done".into()),
                ..TaskUpdate::default()
            },
        )
        .await?;

    for n in pipeline.tasks().get_notifications().await? {
        println!("notify {} <- {} ({}, {})", n.flow_id, n.event_type, n.category, n.status);
    }

    tokio::time::sleep(Duration::from_millis(500)).await;
    pipeline.stop().await?;

    let stats = pipeline.telemetry().stats();
    println!(
        "builds={} transactions={} messages={} dropped={}",
        storage.rows(tables::VERTEX_BUILD).len(),
        storage.rows(tables::TRANSACTION).len(),
        storage.rows(tables::MESSAGE).len(),
        stats.total_dropped(),
    );
    Ok(())
}
