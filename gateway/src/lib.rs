use axum::{
    Router,
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use common::config::Config;
use pipeline::{
    alerts::LogAlertDispatcher,
    metrics::MetricsAggregator,
    model::Transaction,
    orchestrator::PipelineOrchestrator,
    providers::{HeuristicRiskScorer, InMemoryAmlList, OfflineGeocoder, StaticBinDirectory},
    rules::{Rule, RulesEngine},
};

/// Composition root: every component is constructed exactly once here and
/// passed by handle; nothing is reached through ambient global state.
pub fn build_pipeline(
    config: &Config,
    rules: Vec<Rule>,
) -> (Arc<PipelineOrchestrator>, Arc<MetricsAggregator>) {
    let metrics = Arc::new(MetricsAggregator::new(config.pipeline.metrics_window_size));
    let orchestrator = Arc::new(PipelineOrchestrator::new(
        &config.pipeline,
        Arc::new(HeuristicRiskScorer::default()),
        Arc::new(StaticBinDirectory::default()),
        Arc::new(OfflineGeocoder),
        Arc::new(InMemoryAmlList::default()),
        RulesEngine::new(rules),
        Arc::new(LogAlertDispatcher),
        metrics.recorder(),
    ));

    (orchestrator, metrics)
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub metrics: Arc<MetricsAggregator>,
    pub prometheus: Option<PrometheusHandle>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/transactions/process", post(process_transaction))
        .route("/api/transactions/batch", post(process_batch))
        .route("/api/metrics", get(metrics_snapshot))
        .route("/metrics", get(prometheus_metrics))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn process_transaction(
    State(state): State<AppState>,
    Json(transaction): Json<Transaction>,
) -> impl IntoResponse {
    match state.orchestrator.process(transaction).await {
        Ok(processed) => (StatusCode::OK, Json(processed)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to process transaction");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

pub async fn process_batch(
    State(state): State<AppState>,
    Json(transactions): Json<Vec<Transaction>>,
) -> impl IntoResponse {
    match state.orchestrator.process_batch(transactions).await {
        Ok(processed) => (StatusCode::OK, Json(processed)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to process transaction batch");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

pub async fn metrics_snapshot(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.prometheus {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "prometheus exporter not installed").into_response(),
    }
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK").into_response()
}
