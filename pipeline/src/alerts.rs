use async_trait::async_trait;
use tracing::warn;

use crate::model::ProcessedTransaction;

/// Downstream alert sink, notified for review/blocked dispositions.
/// Fire-and-forget: implementations log their own failures instead of
/// propagating them; nothing here can fail a pipeline run.
#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    async fn notify(&self, processed: &ProcessedTransaction);
}

/// Default sink: one structured warn-level entry per alert. Card
/// references are masked at the model level, so no PAN reaches the log.
pub struct LogAlertDispatcher;

#[async_trait]
impl AlertDispatcher for LogAlertDispatcher {
    async fn notify(&self, processed: &ProcessedTransaction) {
        warn!(
            transaction_id = %processed.transaction.transaction_id,
            status = %processed.status,
            risk_score = processed.risk_score,
            triggered_rules = processed.rules_result.triggered_rules.len(),
            degraded = processed.degraded,
            "Transaction flagged for attention"
        );
    }
}
