//! Deterministic in-process providers. They keep the pipeline runnable and
//! testable without the external scoring and enrichment services, and they
//! double as the reference implementations of the provider contracts.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

use crate::model::{AddressInfo, AmlCheckResult, BinInfo, GenericError, RiskTier, Transaction};
use crate::providers::{AmlChecker, BinLookup, Geocoder, RiskScorer};

/// Additive heuristic scorer: a small base plus penalties for a large
/// amount and a high-risk issuing country, capped at 1.0.
pub struct HeuristicRiskScorer {
    high_risk_countries: HashSet<String>,
    high_amount_cutoff: f64,
}

impl HeuristicRiskScorer {
    pub const BASE_SCORE: f64 = 0.05;
    pub const HIGH_AMOUNT_PENALTY: f64 = 0.5;
    pub const HIGH_RISK_COUNTRY_PENALTY: f64 = 0.4;

    pub fn new(high_risk_countries: HashSet<String>, high_amount_cutoff: f64) -> Self {
        Self {
            high_risk_countries,
            high_amount_cutoff,
        }
    }
}

impl Default for HeuristicRiskScorer {
    fn default() -> Self {
        Self::new(
            ["RU", "NG", "IR", "KP"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            10_000.0,
        )
    }
}

#[async_trait]
impl RiskScorer for HeuristicRiskScorer {
    async fn score(&self, transaction: &Transaction) -> Result<f64, GenericError> {
        let mut score = Self::BASE_SCORE;
        if transaction.amount > self.high_amount_cutoff {
            score += Self::HIGH_AMOUNT_PENALTY;
        }
        if self.high_risk_countries.contains(&transaction.country) {
            score += Self::HIGH_RISK_COUNTRY_PENALTY;
        }

        Ok(score.min(1.0))
    }
}

/// Fixed BIN table; unknown BINs resolve to `None`, not an error.
pub struct StaticBinDirectory {
    entries: HashMap<String, BinInfo>,
}

impl StaticBinDirectory {
    pub fn new(entries: Vec<BinInfo>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|info| (info.bin.clone(), info))
                .collect(),
        }
    }
}

impl Default for StaticBinDirectory {
    fn default() -> Self {
        Self::new(vec![
            BinInfo {
                bin: "411111".to_string(),
                brand: "Visa".to_string(),
                issuer: "Test Bank".to_string(),
                country: "US".to_string(),
            },
            BinInfo {
                bin: "555555".to_string(),
                brand: "Mastercard".to_string(),
                issuer: "Test Bank".to_string(),
                country: "US".to_string(),
            },
            BinInfo {
                bin: "378282".to_string(),
                brand: "American Express".to_string(),
                issuer: "Amex".to_string(),
                country: "US".to_string(),
            },
        ])
    }
}

#[async_trait]
impl BinLookup for StaticBinDirectory {
    async fn lookup(&self, bin: &str) -> Result<Option<BinInfo>, GenericError> {
        Ok(self.entries.get(bin).cloned())
    }
}

/// Country-centroid geocoder: resolves an address to the centroid of the
/// first known country token it contains.
#[derive(Default)]
pub struct OfflineGeocoder;

const COUNTRY_CENTROIDS: &[(&str, f64, f64)] = &[
    ("US", 39.8, -98.6),
    ("GB", 54.0, -2.0),
    ("DE", 51.2, 10.4),
    ("FR", 46.6, 2.4),
    ("RU", 61.5, 105.3),
    ("BR", -14.2, -51.9),
];

#[async_trait]
impl Geocoder for OfflineGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<AddressInfo>, GenericError> {
        let hit = COUNTRY_CENTROIDS.iter().find(|(code, _, _)| {
            address
                .split(|c: char| !c.is_ascii_alphanumeric())
                .any(|token| token.eq_ignore_ascii_case(code))
        });

        Ok(hit.map(|(code, latitude, longitude)| AddressInfo {
            query: address.to_string(),
            latitude: *latitude,
            longitude: *longitude,
            country: (*code).to_string(),
            confidence: 0.5,
        }))
    }
}

/// Watchlist lookup over an in-memory identifier set.
#[derive(Default)]
pub struct InMemoryAmlList {
    blacklist: HashSet<String>,
}

impl InMemoryAmlList {
    pub fn new(blacklist: HashSet<String>) -> Self {
        Self { blacklist }
    }
}

#[async_trait]
impl AmlChecker for InMemoryAmlList {
    async fn check(&self, identifier: &str) -> Result<AmlCheckResult, GenericError> {
        let hit = self.blacklist.contains(identifier);

        Ok(AmlCheckResult {
            identifier: identifier.to_string(),
            is_blacklisted: hit,
            risk_tier: if hit { RiskTier::Critical } else { RiskTier::Low },
            source: hit.then(|| "in_memory_watchlist".to_string()),
            confidence: if hit { 1.0 } else { 0.95 },
        })
    }
}
