use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::time::Duration;
use strum_macros::Display as EnumDisplay;

use crate::rules::RulesExecutionResult;

pub type GenericError = Box<dyn Error + Send + Sync>;

/// A transaction as submitted by the caller. Immutable once admitted to the
/// pipeline; `card_ref` carries only the BIN and the last four digits, a full
/// PAN never enters the system or its logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub amount: f64,
    pub currency: String,
    /// Masked card reference, e.g. "411111******1111".
    pub card_ref: String,
    pub country: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub merchant_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub billing_address: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Transaction {
    /// First six digits of the card reference (the BIN).
    pub fn bin(&self) -> String {
        self.card_ref
            .chars()
            .filter(|c| c.is_ascii_digit())
            .take(6)
            .collect()
    }

    /// Named field lookup used by rule conditions. Unset optional fields
    /// resolve to `None`, as do names absent from `metadata`.
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "transaction_id" => Some(self.transaction_id.clone()),
            "amount" => Some(self.amount.to_string()),
            "currency" => Some(self.currency.clone()),
            "card_ref" => Some(self.card_ref.clone()),
            "bin" => Some(self.bin()),
            "country" => Some(self.country.clone()),
            "city" => self.city.clone(),
            "ip_address" => self.ip_address.clone(),
            "user_agent" => self.user_agent.clone(),
            "merchant_id" => self.merchant_id.clone(),
            "user_id" => self.user_id.clone(),
            "session_id" => self.session_id.clone(),
            "device_id" => self.device_id.clone(),
            "billing_address" => self.billing_address.clone(),
            _ => self.metadata.get(name).cloned(),
        }
    }
}

/// Terminal disposition of one pipeline run. A re-submission of the same
/// logical transaction is a new run producing a new artifact, never a
/// mutation of a prior one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumDisplay)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Review,
    Blocked,
}

impl TransactionStatus {
    fn severity(self) -> u8 {
        match self {
            TransactionStatus::Approved => 0,
            TransactionStatus::Pending => 1,
            TransactionStatus::Review => 2,
            TransactionStatus::Blocked => 3,
        }
    }

    /// The more severe of the two dispositions; never downgrades.
    pub fn escalate_to(self, other: Self) -> Self {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }
}

/// Clamps a provider-reported risk score into the [0.0, 1.0] contract.
pub fn clamp_risk_score(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumDisplay)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmlCheckResult {
    pub identifier: String,
    pub is_blacklisted: bool,
    pub risk_tier: RiskTier,
    #[serde(default)]
    pub source: Option<String>,
    pub confidence: f64,
}

impl AmlCheckResult {
    /// Safe default substituted when the AML provider fails: not
    /// blacklisted, low tier, zero confidence.
    pub fn clean(identifier: String) -> Self {
        Self {
            identifier,
            is_blacklisted: false,
            risk_tier: RiskTier::Low,
            source: None,
            confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinInfo {
    pub bin: String,
    pub brand: String,
    pub issuer: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressInfo {
    pub query: String,
    pub latitude: f64,
    pub longitude: f64,
    pub country: String,
    pub confidence: f64,
}

/// The pipeline's terminal artifact, created exactly once per run and owned
/// by the caller once emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedTransaction {
    pub transaction: Transaction,
    pub risk_score: f64,
    pub status: TransactionStatus,
    pub processing_time: Duration,
    pub bin_info: Option<BinInfo>,
    pub address_info: Option<AddressInfo>,
    pub aml_result: AmlCheckResult,
    pub rules_result: RulesExecutionResult,
    /// True when a scoring-critical signal (risk score or AML verdict) had
    /// to be substituted with its safe default.
    pub degraded: bool,
}
