use serde::Deserialize;
use std::fs;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CommonConfig {
    pub project_name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Upper bound on concurrently executing pipeline runs.
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
    /// Number of latency samples kept in the metrics ring buffer.
    #[serde(default = "default_metrics_window_size")]
    pub metrics_window_size: usize,
    #[serde(default = "default_block_threshold")]
    pub block_threshold: f64,
    #[serde(default = "default_review_threshold")]
    pub review_threshold: f64,
    #[serde(default = "default_pending_threshold")]
    pub pending_threshold: f64,
    /// Optional per-provider-call timeout. Absent means no timeout is
    /// enforced by the pipeline; providers are then trusted to apply their
    /// own.
    #[serde(default)]
    pub provider_timeout_ms: Option<u64>,
    /// Idle backoff of the continuous ingestion worker.
    #[serde(default = "default_worker_sleep_ms")]
    pub worker_sleep_ms: u64,
}

fn default_max_concurrent_tasks() -> usize {
    50
}

fn default_metrics_window_size() -> usize {
    1000
}

fn default_block_threshold() -> f64 {
    0.8
}

fn default_review_threshold() -> f64 {
    0.6
}

fn default_pending_threshold() -> f64 {
    0.4
}

fn default_worker_sleep_ms() -> u64 {
    200
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent_tasks(),
            metrics_window_size: default_metrics_window_size(),
            block_threshold: default_block_threshold(),
            review_threshold: default_review_threshold(),
            pending_threshold: default_pending_threshold(),
            provider_timeout_ms: None,
            worker_sleep_ms: default_worker_sleep_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GatewayConfig {
    pub server_address: String,
    pub log_level: String,
    /// Optional path to a YAML rule catalog loaded at startup.
    #[serde(default)]
    pub rules_path: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    pub common: CommonConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub gateway: GatewayConfig,
}

impl Config {
    pub fn load(config_path: &str) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(config_path)?;
        let config: Config = serde_yml::from_str(&contents)?;
        config.validate()?;

        Ok(config)
    }

    /// Startup-time validation. A bad configuration is the only fatal error
    /// in the system; everything past startup degrades instead of failing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pipeline;
        if p.max_concurrent_tasks == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_tasks must be at least 1".to_string(),
            ));
        }
        if p.metrics_window_size == 0 {
            return Err(ConfigError::Invalid(
                "metrics_window_size must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("block_threshold", p.block_threshold),
            ("review_threshold", p.review_threshold),
            ("pending_threshold", p.pending_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be within [0.0, 1.0], got {value}"
                )));
            }
        }
        if p.block_threshold <= p.review_threshold || p.review_threshold <= p.pending_threshold {
            return Err(ConfigError::Invalid(format!(
                "thresholds must be strictly ordered block > review > pending, got {} / {} / {}",
                p.block_threshold, p.review_threshold, p.pending_threshold
            )));
        }

        Ok(())
    }
}
