#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::config::PipelineConfig;
use pipeline::{
    alerts::AlertDispatcher,
    metrics::MetricsAggregator,
    model::{GenericError, ProcessedTransaction, Transaction, TransactionStatus},
    orchestrator::PipelineOrchestrator,
    providers::{
        AmlChecker, BinLookup, Geocoder, HeuristicRiskScorer, InMemoryAmlList, OfflineGeocoder,
        RiskScorer, StaticBinDirectory,
    },
    rules::{Rule, RulesEngine},
    worker::TransactionSource,
};

pub fn transaction(id: &str, amount: f64, country: &str) -> Transaction {
    Transaction {
        transaction_id: id.to_string(),
        amount,
        currency: "USD".to_string(),
        card_ref: "411111******1111".to_string(),
        country: country.to_string(),
        city: None,
        ip_address: Some("203.0.113.7".to_string()),
        user_agent: Some("integration-test".to_string()),
        created_at: Utc::now(),
        merchant_id: None,
        user_id: None,
        session_id: None,
        device_id: None,
        billing_address: None,
        metadata: HashMap::new(),
    }
}

// Provider doubles

pub struct FixedRiskScorer(pub f64);

#[async_trait]
impl RiskScorer for FixedRiskScorer {
    async fn score(&self, _transaction: &Transaction) -> Result<f64, GenericError> {
        Ok(self.0)
    }
}

pub struct FailingRiskScorer;

#[async_trait]
impl RiskScorer for FailingRiskScorer {
    async fn score(&self, _transaction: &Transaction) -> Result<f64, GenericError> {
        Err("risk backend unavailable".into())
    }
}

pub struct PanickingRiskScorer;

#[async_trait]
impl RiskScorer for PanickingRiskScorer {
    async fn score(&self, _transaction: &Transaction) -> Result<f64, GenericError> {
        panic!("risk backend crashed");
    }
}

pub struct SlowRiskScorer {
    pub score: f64,
    pub delay: Duration,
}

#[async_trait]
impl RiskScorer for SlowRiskScorer {
    async fn score(&self, _transaction: &Transaction) -> Result<f64, GenericError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.score)
    }
}

pub struct FailingAmlChecker;

#[async_trait]
impl AmlChecker for FailingAmlChecker {
    async fn check(
        &self,
        _identifier: &str,
    ) -> Result<pipeline::model::AmlCheckResult, GenericError> {
        Err("watchlist service unavailable".into())
    }
}

/// Records every alert it receives; tests poll `count` because dispatch
/// happens on a detached task.
#[derive(Default)]
pub struct CountingAlertSink {
    count: AtomicUsize,
    statuses: Mutex<Vec<TransactionStatus>>,
}

impl CountingAlertSink {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn statuses(&self) -> Vec<TransactionStatus> {
        self.statuses.lock().expect("alert sink lock").clone()
    }
}

#[async_trait]
impl AlertDispatcher for CountingAlertSink {
    async fn notify(&self, processed: &ProcessedTransaction) {
        self.statuses
            .lock()
            .expect("alert sink lock")
            .push(processed.status);
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Drains a fixed set of transactions, then reports empty. An optional
/// per-fetch delay simulates a slow upstream feed.
pub struct VecSource {
    queue: Mutex<VecDeque<Transaction>>,
    fetch_delay: Option<Duration>,
}

impl VecSource {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self {
            queue: Mutex::new(transactions.into()),
            fetch_delay: None,
        }
    }

    pub fn with_delay(transactions: Vec<Transaction>, fetch_delay: Duration) -> Self {
        Self {
            queue: Mutex::new(transactions.into()),
            fetch_delay: Some(fetch_delay),
        }
    }

    pub fn remaining(&self) -> usize {
        self.queue.lock().expect("source lock").len()
    }
}

#[async_trait]
impl TransactionSource for VecSource {
    async fn fetch_next(&self) -> Result<Option<Transaction>, GenericError> {
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.queue.lock().expect("source lock").pop_front())
    }
}

// Orchestrator assembly

pub struct TestPipeline {
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub metrics: Arc<MetricsAggregator>,
    pub alerts: Arc<CountingAlertSink>,
}

pub struct TestPipelineBuilder {
    config: PipelineConfig,
    scorer: Arc<dyn RiskScorer>,
    bin_lookup: Arc<dyn BinLookup>,
    geocoder: Arc<dyn Geocoder>,
    aml_checker: Arc<dyn AmlChecker>,
    rules: Vec<Rule>,
}

impl TestPipelineBuilder {
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            scorer: Arc::new(HeuristicRiskScorer::default()),
            bin_lookup: Arc::new(StaticBinDirectory::default()),
            geocoder: Arc::new(OfflineGeocoder),
            aml_checker: Arc::new(InMemoryAmlList::default()),
            rules: Vec::new(),
        }
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn scorer(mut self, scorer: Arc<dyn RiskScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn bin_lookup(mut self, bin_lookup: Arc<dyn BinLookup>) -> Self {
        self.bin_lookup = bin_lookup;
        self
    }

    pub fn aml_checker(mut self, aml_checker: Arc<dyn AmlChecker>) -> Self {
        self.aml_checker = aml_checker;
        self
    }

    pub fn rules(mut self, rules: Vec<Rule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn build(self) -> TestPipeline {
        let metrics = Arc::new(MetricsAggregator::new(self.config.metrics_window_size));
        let alerts = Arc::new(CountingAlertSink::default());
        let orchestrator = Arc::new(PipelineOrchestrator::new(
            &self.config,
            self.scorer,
            self.bin_lookup,
            self.geocoder,
            self.aml_checker,
            RulesEngine::new(self.rules),
            Arc::clone(&alerts) as Arc<dyn AlertDispatcher>,
            metrics.recorder(),
        ));

        TestPipeline {
            orchestrator,
            metrics,
            alerts,
        }
    }
}

/// Polls until the aggregator has consumed `expected` events; recording is
/// asynchronous, so tests cannot assert on counters immediately.
pub async fn wait_for_processed(metrics: &MetricsAggregator, expected: u64) {
    for _ in 0..2000 {
        if metrics.total_processed() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!(
        "metrics aggregator did not reach {} processed events (got {})",
        expected,
        metrics.total_processed()
    );
}
