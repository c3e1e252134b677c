pub mod engine;

pub use engine::RulesEngine;

use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use strum_macros::Display as EnumDisplay;

use crate::model::GenericError;

/// Confidence contributed by each triggered rule; the aggregate saturates
/// at 1.0.
pub const CONFIDENCE_PER_TRIGGERED_RULE: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumDisplay)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    Amount,
    Velocity,
    Geographic,
    Bin,
    Behavioral,
    Time,
    Custom,
}

/// `Flag` and `Log` are informational: they never escalate the aggregate
/// action beyond `Approve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumDisplay)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Approve,
    Review,
    Block,
    Flag,
    Log,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumDisplay)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Contains,
    NotContains,
    InList,
    NotInList,
    Regex,
    IsEmpty,
    IsNotEmpty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumDisplay)]
#[serde(rename_all = "snake_case")]
pub enum ConditionValueType {
    Number,
    Text,
    Boolean,
}

fn default_value_type() -> ConditionValueType {
    ConditionValueType::Text
}

/// One comparison inside a rule. Evaluation is type-aware and fails closed:
/// an unparseable operand or an absent field makes the condition false, it
/// never raises an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCondition {
    pub field: String,
    pub operator: ConditionOperator,
    /// Comparison literal; for `in_list`/`not_in_list` a comma-separated
    /// list of items.
    #[serde(default)]
    pub value: String,
    #[serde(default = "default_value_type")]
    pub value_type: ConditionValueType,
}

fn default_active() -> bool {
    true
}

/// A declarative rule: all conditions must hold (logical AND) for the rule
/// to trigger. A rule with zero conditions is vacuously triggered.
/// Composite OR logic is expressed as multiple rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub category: RuleCategory,
    /// Lower evaluates first; used only for deterministic ordering and
    /// tie-breaking, never for short-circuiting.
    pub priority: i32,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    pub action: RuleAction,
    /// Informational per-rule contribution reported when the rule triggers.
    #[serde(default)]
    pub score: f64,
}

/// Outcome of evaluating one rule against one transaction. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleExecutionResult {
    pub rule_id: String,
    pub transaction_id: String,
    pub triggered: bool,
    pub score: f64,
    pub reason: String,
    pub duration: Duration,
}

/// Reduction of the per-rule results into one action. `triggered_rules`
/// carries the full rule objects for audit, not just ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesExecutionResult {
    pub action: RuleAction,
    pub triggered_rules: Vec<Rule>,
    pub total_duration: Duration,
    pub confidence: f64,
}

impl RulesExecutionResult {
    /// Aggregate of an empty rule set: approve with zero confidence.
    pub fn empty() -> Self {
        Self {
            action: RuleAction::Approve,
            triggered_rules: Vec::new(),
            total_duration: Duration::ZERO,
            confidence: 0.0,
        }
    }
}

/// Loads a rule catalog from a YAML file.
pub fn load_rules(path: &str) -> Result<Vec<Rule>, GenericError> {
    let contents = fs::read_to_string(path)?;
    let rules: Vec<Rule> = serde_yml::from_str(&contents)?;

    Ok(rules)
}
