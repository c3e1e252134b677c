mod support;

use std::sync::Arc;
use std::time::Duration;

use pipeline::worker::IngestionWorker;
use support::{TestPipelineBuilder, VecSource, transaction, wait_for_processed};

#[tokio::test]
async fn worker_drains_the_source_and_stops_cleanly() {
    let pipeline = TestPipelineBuilder::new().build();
    let source = Arc::new(VecSource::new(
        (0..20)
            .map(|i| transaction(&format!("tx-w{i}"), 15.99, "US"))
            .collect(),
    ));

    let worker = IngestionWorker::new(
        Arc::clone(&pipeline.orchestrator),
        Arc::clone(&source) as Arc<dyn pipeline::worker::TransactionSource>,
        Duration::from_millis(5),
    );
    let handle = worker.start();

    wait_for_processed(&pipeline.metrics, 20).await;
    assert_eq!(source.remaining(), 0);

    handle.stop().await;
    assert_eq!(pipeline.metrics.total_processed(), 20);
}

#[tokio::test]
async fn stop_prevents_new_admissions_and_drains_in_flight() {
    let pipeline = TestPipelineBuilder::new().build();
    let source = Arc::new(VecSource::with_delay(
        (0..200)
            .map(|i| transaction(&format!("tx-s{i}"), 15.99, "US"))
            .collect(),
        Duration::from_millis(5),
    ));

    let worker = IngestionWorker::new(
        Arc::clone(&pipeline.orchestrator),
        Arc::clone(&source) as Arc<dyn pipeline::worker::TransactionSource>,
        Duration::from_millis(5),
    );
    let handle = worker.start();

    // Let it make some progress, then stop mid-stream.
    wait_for_processed(&pipeline.metrics, 1).await;
    handle.stop().await;

    // After stop returns every spawned run has finished; give the metrics
    // channel a moment to settle, then confirm the count is frozen.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let settled = pipeline.metrics.total_processed();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(pipeline.metrics.total_processed(), settled);
    assert!(
        source.remaining() > 0,
        "stop should land before the 200-item source is drained"
    );
}

#[tokio::test]
async fn worker_idles_on_an_empty_source_without_error() {
    let pipeline = TestPipelineBuilder::new().build();
    let source = Arc::new(VecSource::new(Vec::new()));

    let worker = IngestionWorker::new(
        Arc::clone(&pipeline.orchestrator),
        Arc::clone(&source) as Arc<dyn pipeline::worker::TransactionSource>,
        Duration::from_millis(2),
    );
    let handle = worker.start();

    tokio::time::sleep(Duration::from_millis(30)).await;
    handle.stop().await;

    assert_eq!(pipeline.metrics.total_processed(), 0);
}
