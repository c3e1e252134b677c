pub mod stubs;

pub use stubs::{HeuristicRiskScorer, InMemoryAmlList, OfflineGeocoder, StaticBinDirectory};

use async_trait::async_trait;

use crate::model::{AddressInfo, AmlCheckResult, BinInfo, GenericError, Transaction};

/// ML risk inference for one transaction. Returns a score in [0.0, 1.0]
/// (clamped at the pipeline boundary). Implementations must not block
/// indefinitely; they are expected to apply their own timeout policy. Any
/// shared state must be safe for concurrent reads from many pipeline runs.
#[async_trait]
pub trait RiskScorer: Send + Sync {
    async fn score(&self, transaction: &Transaction) -> Result<f64, GenericError>;
}

/// Issuer metadata lookup keyed by the first six card digits.
#[async_trait]
pub trait BinLookup: Send + Sync {
    async fn lookup(&self, bin: &str) -> Result<Option<BinInfo>, GenericError>;
}

/// Free-text address resolution for the billing address.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Option<AddressInfo>, GenericError>;
}

/// Blacklist/watchlist verdict for an identifier such as a masked card
/// reference or wallet fingerprint.
#[async_trait]
pub trait AmlChecker: Send + Sync {
    async fn check(&self, identifier: &str) -> Result<AmlCheckResult, GenericError>;
}
