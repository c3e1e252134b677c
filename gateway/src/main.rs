use clap::Parser;

use common::config::Config;
use gateway::{AppState, build_pipeline, build_router};
use metrics_exporter_prometheus::PrometheusBuilder;
use pipeline::{model::GenericError, rules::load_rules};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config file
    #[arg(short, long, default_value = "config/gateway.yaml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), GenericError> {
    let args = Args::parse();
    println!("Loading config from: {}", args.config);
    let config = Config::load(&args.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let prometheus = PrometheusBuilder::new().install_recorder()?;

    let rules = match &config.gateway.rules_path {
        Some(path) => load_rules(path)?,
        None => Vec::new(),
    };
    tracing::info!("Loaded {} rules", rules.len());

    let (orchestrator, metrics) = build_pipeline(&config, rules);
    let state = AppState {
        orchestrator,
        metrics,
        prometheus: Some(prometheus),
    };

    let app = build_router(state);
    tracing::info!(
        "Starting {} gateway at {}",
        config.common.project_name,
        config.gateway.server_address
    );
    let listener = tokio::net::TcpListener::bind(&config.gateway.server_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
