use chrono::Utc;
use common::config::PipelineConfig;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinError;
#[cfg(not(test))]
use tracing::{debug, info, trace, warn};
#[cfg(test)]
use {println as debug, println as info, println as trace, println as warn};

use crate::{
    admission::AdmissionController,
    alerts::AlertDispatcher,
    decision::{DecisionThresholds, decide},
    metrics::MetricsRecorder,
    model::{
        AmlCheckResult, GenericError, ProcessedTransaction, Transaction, TransactionStatus,
        clamp_risk_score,
    },
    providers::{AmlChecker, BinLookup, Geocoder, RiskScorer},
    rules::RulesEngine,
};

/// Substituted when the risk-score provider fails: mid-range, so the
/// decision engine neither blocks nor silently approves on a missing
/// signal.
pub const FALLBACK_RISK_SCORE: f64 = 0.5;

/// Drives one transaction through admission, normalization, the parallel
/// signal fan-out, rules evaluation and the final decision. Constructed
/// once at process start and shared behind an `Arc`.
pub struct PipelineOrchestrator {
    admission: AdmissionController,
    risk_scorer: Arc<dyn RiskScorer>,
    bin_lookup: Arc<dyn BinLookup>,
    geocoder: Arc<dyn Geocoder>,
    aml_checker: Arc<dyn AmlChecker>,
    rules: Arc<RulesEngine>,
    thresholds: DecisionThresholds,
    alerts: Arc<dyn AlertDispatcher>,
    metrics: MetricsRecorder,
    provider_timeout: Option<Duration>,
}

impl PipelineOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &PipelineConfig,
        risk_scorer: Arc<dyn RiskScorer>,
        bin_lookup: Arc<dyn BinLookup>,
        geocoder: Arc<dyn Geocoder>,
        aml_checker: Arc<dyn AmlChecker>,
        rules: RulesEngine,
        alerts: Arc<dyn AlertDispatcher>,
        metrics: MetricsRecorder,
    ) -> Self {
        info!(
            "Initializing pipeline orchestrator, concurrency bound {}",
            config.max_concurrent_tasks
        );
        Self {
            admission: AdmissionController::new(config.max_concurrent_tasks),
            risk_scorer,
            bin_lookup,
            geocoder,
            aml_checker,
            rules: Arc::new(rules),
            thresholds: DecisionThresholds::from_config(config),
            alerts,
            metrics,
            provider_timeout: config.provider_timeout_ms.map(Duration::from_millis),
        }
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    /// Processes one transaction to a terminal disposition. Business-logic
    /// conditions never surface as `Err`: provider faults are substituted
    /// with safe defaults and the run is biased toward review instead.
    pub async fn process(
        &self,
        transaction: Transaction,
    ) -> Result<ProcessedTransaction, GenericError> {
        let _permit = self.admission.acquire().await?;
        let started = Instant::now();
        let transaction = normalize(transaction);
        trace!("Admitted transaction {}", transaction.transaction_id);

        // Fan out the four signal providers, each on its own task so a
        // panicking provider cannot take the run down with it.
        let timeout = self.provider_timeout;

        let risk_task = {
            let scorer = Arc::clone(&self.risk_scorer);
            let tx = transaction.clone();
            tokio::spawn(async move { with_timeout(timeout, scorer.score(&tx)).await })
        };
        let bin_task = {
            let lookup = Arc::clone(&self.bin_lookup);
            let bin = transaction.bin();
            tokio::spawn(async move { with_timeout(timeout, lookup.lookup(&bin)).await })
        };
        let geo_task = {
            let geocoder = Arc::clone(&self.geocoder);
            let address = transaction.billing_address.clone();
            tokio::spawn(async move {
                match address {
                    Some(address) => with_timeout(timeout, geocoder.geocode(&address)).await,
                    None => Ok(None),
                }
            })
        };
        let aml_task = {
            let checker = Arc::clone(&self.aml_checker);
            let identifier = transaction.card_ref.clone();
            tokio::spawn(async move { with_timeout(timeout, checker.check(&identifier)).await })
        };

        // Fan in all four before rules evaluation. A failed, timed-out or
        // panicked provider degrades to its safe default, never aborts.
        let (risk_result, bin_result, geo_result, aml_result) =
            tokio::join!(risk_task, bin_task, geo_task, aml_task);

        let mut degraded = false;
        let risk_score = match flatten(risk_result) {
            Ok(score) => clamp_risk_score(score),
            Err(e) => {
                warn!(
                    "Risk scorer failed for {}: {}",
                    transaction.transaction_id, e
                );
                degraded = true;
                FALLBACK_RISK_SCORE
            }
        };
        let bin_info = match flatten(bin_result) {
            Ok(info) => info,
            Err(e) => {
                warn!(
                    "BIN lookup failed for {}: {}",
                    transaction.transaction_id, e
                );
                None
            }
        };
        let address_info = match flatten(geo_result) {
            Ok(info) => info,
            Err(e) => {
                warn!("Geocoding failed for {}: {}", transaction.transaction_id, e);
                None
            }
        };
        let aml_result = match flatten(aml_result) {
            Ok(result) => result,
            Err(e) => {
                warn!("AML check failed for {}: {}", transaction.transaction_id, e);
                degraded = true;
                AmlCheckResult::clean(transaction.card_ref.clone())
            }
        };

        // Rules see the resolved risk score, so they run after provider
        // fan-in rather than in parallel with it.
        let rules_result = self.rules.evaluate(&transaction, risk_score);

        let mut status = decide(risk_score, &rules_result, &aml_result, &self.thresholds);
        if degraded {
            // Missing scoring signal biases toward manual review, never
            // toward silent approval.
            status = status.escalate_to(TransactionStatus::Review);
        }

        let processed = ProcessedTransaction {
            transaction,
            risk_score,
            status,
            processing_time: started.elapsed(),
            bin_info,
            address_info,
            aml_result,
            rules_result,
            degraded,
        };

        if matches!(
            processed.status,
            TransactionStatus::Review | TransactionStatus::Blocked
        ) {
            // Best effort on a detached task: alerting never blocks or
            // fails the pipeline return.
            let alerts = Arc::clone(&self.alerts);
            let alerted = processed.clone();
            tokio::spawn(async move { alerts.notify(&alerted).await });
        }

        self.metrics
            .record(processed.processing_time, !processed.degraded);
        info!(
            "Transaction {} dispositioned as {} in {:?}",
            processed.transaction.transaction_id, processed.status, processed.processing_time
        );

        Ok(processed)
    }

    /// Fans out one pipeline run per transaction and waits for every member
    /// to finish; no partial-results short path. Completion order across
    /// runs is unspecified.
    pub async fn process_batch(
        &self,
        transactions: Vec<Transaction>,
    ) -> Result<Vec<ProcessedTransaction>, GenericError> {
        debug!("Processing batch of {} transactions", transactions.len());
        let results = futures::future::join_all(
            transactions
                .into_iter()
                .map(|transaction| self.process(transaction)),
        )
        .await;

        let mut processed = Vec::with_capacity(results.len());
        for result in results {
            processed.push(result?);
        }

        Ok(processed)
    }
}

/// Normalizes caller input before the fan-out stage. Applying it to an
/// already-normalized transaction changes nothing.
pub fn normalize(mut transaction: Transaction) -> Transaction {
    transaction.card_ref.retain(|c| !c.is_whitespace());
    // Amounts are held at the currency's minor unit (two decimals);
    // negative amounts are clamped rather than rejected.
    transaction.amount = (transaction.amount.max(0.0) * 100.0).round() / 100.0;
    let now = Utc::now();
    if transaction.created_at > now {
        // Clock-skew defense.
        transaction.created_at = now;
    }

    transaction
}

async fn with_timeout<T>(
    limit: Option<Duration>,
    fut: impl Future<Output = Result<T, GenericError>>,
) -> Result<T, GenericError> {
    match limit {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(format!("provider call exceeded {limit:?}").into()),
        },
        None => fut.await,
    }
}

fn flatten<T>(joined: Result<Result<T, GenericError>, JoinError>) -> Result<T, GenericError> {
    joined.unwrap_or_else(|e| Err(Box::new(e)))
}
