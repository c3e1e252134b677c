use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::model::{GenericError, Transaction};
use crate::orchestrator::PipelineOrchestrator;

/// Upstream feed for continuous mode. `Ok(None)` means the feed is
/// currently empty, not exhausted.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    async fn fetch_next(&self) -> Result<Option<Transaction>, GenericError>;
}

/// Continuous ingestion loop: pulls transactions from a source and spawns
/// one pipeline run per item. Real concurrency is bounded by the
/// orchestrator's admission controller, not by this loop.
pub struct IngestionWorker {
    orchestrator: Arc<PipelineOrchestrator>,
    source: Arc<dyn TransactionSource>,
    idle_sleep: Duration,
}

/// Handle to a running worker. Dropping it without calling `stop` leaves
/// the worker running detached.
pub struct WorkerHandle {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl WorkerHandle {
    /// Cooperative stop: no new transactions are admitted after this is
    /// called; returns once every in-flight run has finished.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.handle.await {
            warn!("Ingestion worker task failed during shutdown: {}", e);
        }
    }
}

impl IngestionWorker {
    pub fn new(
        orchestrator: Arc<PipelineOrchestrator>,
        source: Arc<dyn TransactionSource>,
        idle_sleep: Duration,
    ) -> Self {
        Self {
            orchestrator,
            source,
            idle_sleep,
        }
    }

    pub fn start(self) -> WorkerHandle {
        let (stop_tx, mut stop_signal) = watch::channel(false);
        let handle = tokio::spawn(async move {
            info!("Ingestion worker started");
            let mut in_flight = JoinSet::new();

            loop {
                if *stop_signal.borrow() {
                    break;
                }
                tokio::select! {
                    _ = stop_signal.changed() => break,
                    fetched = self.source.fetch_next() => match fetched {
                        Ok(Some(transaction)) => {
                            let orchestrator = Arc::clone(&self.orchestrator);
                            in_flight.spawn(async move {
                                if let Err(e) = orchestrator.process(transaction).await {
                                    warn!("Pipeline run failed: {}", e);
                                }
                            });
                        }
                        Ok(None) => tokio::time::sleep(self.idle_sleep).await,
                        Err(e) => {
                            warn!("Transaction source error: {}", e);
                            tokio::time::sleep(self.idle_sleep).await;
                        }
                    }
                }
                // Reap finished runs so the set does not grow unbounded.
                while in_flight.try_join_next().is_some() {}
            }

            debug!("Stop signal received, draining {} in-flight runs", in_flight.len());
            while in_flight.join_next().await.is_some() {}
            info!("Ingestion worker stopped");
        });

        WorkerHandle {
            stop: stop_tx,
            handle,
        }
    }
}
