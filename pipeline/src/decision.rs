use common::config::PipelineConfig;
use serde::{Deserialize, Serialize};

use crate::model::{AmlCheckResult, TransactionStatus};
use crate::rules::{RuleAction, RulesExecutionResult};

/// Score bands for the decision function. Always sourced from
/// configuration; validated at startup to satisfy block > review > pending.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionThresholds {
    pub block: f64,
    pub review: f64,
    pub pending: f64,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self {
            block: 0.8,
            review: 0.6,
            pending: 0.4,
        }
    }
}

impl DecisionThresholds {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            block: config.block_threshold,
            review: config.review_threshold,
            pending: config.pending_threshold,
        }
    }
}

/// Maps the merged signals to a final disposition. Pure and total; no I/O.
///
/// Precedence is top-to-bottom and the first matching branch wins: AML and
/// rules can escalate a low ML score to blocked, but nothing can downgrade
/// a high ML score below review. Boundary values belong to the lower branch
/// (strict `>`).
pub fn decide(
    risk_score: f64,
    rules_result: &RulesExecutionResult,
    aml_result: &AmlCheckResult,
    thresholds: &DecisionThresholds,
) -> TransactionStatus {
    if risk_score > thresholds.block {
        TransactionStatus::Blocked
    } else if aml_result.is_blacklisted {
        TransactionStatus::Blocked
    } else if rules_result.action == RuleAction::Block {
        TransactionStatus::Blocked
    } else if rules_result.action == RuleAction::Review || risk_score > thresholds.review {
        TransactionStatus::Review
    } else if risk_score > thresholds.pending {
        TransactionStatus::Pending
    } else {
        TransactionStatus::Approved
    }
}
