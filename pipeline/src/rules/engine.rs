use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, warn};

use crate::model::Transaction;
use crate::rules::{
    CONFIDENCE_PER_TRIGGERED_RULE, ConditionOperator, ConditionValueType, Rule, RuleAction,
    RuleCondition, RuleExecutionResult, RulesExecutionResult,
};

// Compiled patterns are shared across all pipeline runs; an invalid pattern
// is cached as a permanent miss so it is reported once, not per transaction.
static REGEX_CACHE: Lazy<Mutex<HashMap<String, Option<Regex>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn cached_regex(pattern: &str) -> Option<Regex> {
    match REGEX_CACHE.lock() {
        Ok(mut cache) => cache
            .entry(pattern.to_string())
            .or_insert_with(|| match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("Invalid rule regex '{}': {}", pattern, e);
                    None
                }
            })
            .clone(),
        Err(_) => Regex::new(pattern).ok(),
    }
}

/// Evaluates the active rule catalog against one transaction. Rules are
/// independent of each other; none can suppress or short-circuit another.
pub struct RulesEngine {
    rules: Vec<Rule>,
}

impl RulesEngine {
    pub fn new(mut rules: Vec<Rule>) -> Self {
        // Ascending priority, then id: deterministic evaluation and
        // tie-break order regardless of catalog input order.
        rules.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        debug!("Rules engine initialized with {} rules", rules.len());
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Evaluates every active rule, each individually timed. The returned
    /// list is ordered by `(priority, id)`.
    pub fn execute(&self, transaction: &Transaction, risk_score: f64) -> Vec<RuleExecutionResult> {
        self.rules
            .iter()
            .filter(|rule| rule.active)
            .map(|rule| execute_rule(rule, transaction, risk_score))
            .collect()
    }

    /// Reduces per-rule results to one action: block beats review beats
    /// approve; flag/log never escalate. Confidence saturates at 1.0.
    pub fn aggregate(&self, results: &[RuleExecutionResult]) -> RulesExecutionResult {
        let triggered_rules: Vec<Rule> = results
            .iter()
            .filter(|result| result.triggered)
            .filter_map(|result| self.rules.iter().find(|rule| rule.id == result.rule_id))
            .cloned()
            .collect();

        let mut action = RuleAction::Approve;
        for rule in &triggered_rules {
            match rule.action {
                RuleAction::Block => {
                    action = RuleAction::Block;
                    break;
                }
                RuleAction::Review => action = RuleAction::Review,
                RuleAction::Approve | RuleAction::Flag | RuleAction::Log => {}
            }
        }

        let confidence =
            (CONFIDENCE_PER_TRIGGERED_RULE * triggered_rules.len() as f64).min(1.0);
        let total_duration = results.iter().map(|result| result.duration).sum();

        RulesExecutionResult {
            action,
            triggered_rules,
            total_duration,
            confidence,
        }
    }

    pub fn evaluate(&self, transaction: &Transaction, risk_score: f64) -> RulesExecutionResult {
        let results = self.execute(transaction, risk_score);
        self.aggregate(&results)
    }
}

fn execute_rule(rule: &Rule, transaction: &Transaction, risk_score: f64) -> RuleExecutionResult {
    let started = Instant::now();

    // Logical AND over all conditions; zero conditions triggers vacuously.
    let triggered = rule
        .conditions
        .iter()
        .all(|condition| evaluate_condition(condition, transaction, risk_score));

    let reason = if triggered {
        format!(
            "rule '{}' matched all {} condition(s)",
            rule.name,
            rule.conditions.len()
        )
    } else {
        format!("rule '{}' did not match", rule.name)
    };

    RuleExecutionResult {
        rule_id: rule.id.clone(),
        transaction_id: transaction.transaction_id.clone(),
        triggered,
        score: if triggered { rule.score } else { 0.0 },
        reason,
        duration: started.elapsed(),
    }
}

fn resolve_field(transaction: &Transaction, risk_score: f64, name: &str) -> Option<String> {
    // The resolved risk score is visible to rules as a virtual field.
    if name == "risk_score" {
        return Some(risk_score.to_string());
    }
    transaction.field(name)
}

pub(crate) fn evaluate_condition(
    condition: &RuleCondition,
    transaction: &Transaction,
    risk_score: f64,
) -> bool {
    let actual = resolve_field(transaction, risk_score, &condition.field);

    match condition.operator {
        // Emptiness operators are the only ones meaningful on absent fields.
        ConditionOperator::IsEmpty => actual.as_deref().is_none_or(|v| v.is_empty()),
        ConditionOperator::IsNotEmpty => actual.as_deref().is_some_and(|v| !v.is_empty()),
        _ => {
            // An absent field fails the condition, never errors.
            let Some(actual) = actual else {
                return false;
            };
            match condition.operator {
                ConditionOperator::Equals => values_equal(&actual, condition),
                ConditionOperator::NotEquals => !values_equal(&actual, condition),
                ConditionOperator::GreaterThan => numeric_compare(&actual, condition, |a, b| a > b),
                ConditionOperator::GreaterThanOrEqual => {
                    numeric_compare(&actual, condition, |a, b| a >= b)
                }
                ConditionOperator::LessThan => numeric_compare(&actual, condition, |a, b| a < b),
                ConditionOperator::LessThanOrEqual => {
                    numeric_compare(&actual, condition, |a, b| a <= b)
                }
                ConditionOperator::Contains => actual.contains(&condition.value),
                ConditionOperator::NotContains => !actual.contains(&condition.value),
                ConditionOperator::InList => in_list(&actual, condition),
                ConditionOperator::NotInList => !in_list(&actual, condition),
                ConditionOperator::Regex => {
                    cached_regex(&condition.value).is_some_and(|re| re.is_match(&actual))
                }
                ConditionOperator::IsEmpty | ConditionOperator::IsNotEmpty => unreachable!(),
            }
        }
    }
}

fn values_equal(actual: &str, condition: &RuleCondition) -> bool {
    match condition.value_type {
        ConditionValueType::Number => match (actual.parse::<f64>(), condition.value.parse::<f64>())
        {
            (Ok(a), Ok(b)) => a == b,
            // Parse failure fails closed.
            _ => false,
        },
        ConditionValueType::Boolean => {
            match (actual.parse::<bool>(), condition.value.parse::<bool>()) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            }
        }
        // String comparison is case-sensitive.
        ConditionValueType::Text => actual == condition.value,
    }
}

fn numeric_compare(actual: &str, condition: &RuleCondition, cmp: fn(f64, f64) -> bool) -> bool {
    match (actual.parse::<f64>(), condition.value.parse::<f64>()) {
        (Ok(a), Ok(b)) => cmp(a, b),
        _ => false,
    }
}

fn in_list(actual: &str, condition: &RuleCondition) -> bool {
    condition
        .value
        .split(',')
        .map(str::trim)
        .any(|item| match condition.value_type {
            ConditionValueType::Number => {
                match (actual.parse::<f64>(), item.parse::<f64>()) {
                    (Ok(a), Ok(b)) => a == b,
                    _ => false,
                }
            }
            _ => item == actual,
        })
}
