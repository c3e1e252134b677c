pub mod config;

/// Shared configuration for the transaction risk pipeline.
///
/// This crate holds the YAML-backed configuration surface consumed by the
/// `pipeline` and `gateway` crates. It carries no business logic; everything
/// tunable (concurrency bound, metrics window, decision thresholds, provider
/// timeout) lives here so the core never hard-codes a literal.
pub use config::{Config, ConfigError};
