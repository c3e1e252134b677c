use pipeline::decision::{DecisionThresholds, decide};
use pipeline::model::{AmlCheckResult, RiskTier, TransactionStatus};
use pipeline::rules::{RuleAction, RulesExecutionResult};
use std::time::Duration;

fn clean_aml() -> AmlCheckResult {
    AmlCheckResult::clean("411111******1111".to_string())
}

fn blacklisted_aml() -> AmlCheckResult {
    AmlCheckResult {
        identifier: "411111******1111".to_string(),
        is_blacklisted: true,
        risk_tier: RiskTier::Critical,
        source: Some("test_watchlist".to_string()),
        confidence: 1.0,
    }
}

fn rules_with_action(action: RuleAction) -> RulesExecutionResult {
    RulesExecutionResult {
        action,
        triggered_rules: Vec::new(),
        total_duration: Duration::ZERO,
        confidence: 0.0,
    }
}

#[test]
fn score_bands_have_strict_boundaries() {
    let thresholds = DecisionThresholds::default();
    let rules = rules_with_action(RuleAction::Approve);
    let aml = clean_aml();

    // Boundary values belong to the lower branch.
    let cases = [
        (0.0, TransactionStatus::Approved),
        (0.39, TransactionStatus::Approved),
        (0.4, TransactionStatus::Approved),
        (0.41, TransactionStatus::Pending),
        (0.6, TransactionStatus::Pending),
        (0.61, TransactionStatus::Review),
        (0.8, TransactionStatus::Review),
        (0.81, TransactionStatus::Blocked),
        (1.0, TransactionStatus::Blocked),
    ];
    for (score, expected) in cases {
        assert_eq!(
            decide(score, &rules, &aml, &thresholds),
            expected,
            "score {score}"
        );
    }
}

#[test]
fn aml_blacklist_forces_blocked_regardless_of_score() {
    let thresholds = DecisionThresholds::default();
    let rules = rules_with_action(RuleAction::Approve);

    assert_eq!(
        decide(0.01, &rules, &blacklisted_aml(), &thresholds),
        TransactionStatus::Blocked
    );
}

#[test]
fn rules_block_forces_blocked_with_clean_signals() {
    let thresholds = DecisionThresholds::default();

    assert_eq!(
        decide(
            0.0,
            &rules_with_action(RuleAction::Block),
            &clean_aml(),
            &thresholds
        ),
        TransactionStatus::Blocked
    );
}

#[test]
fn rules_review_forces_review_at_low_score() {
    let thresholds = DecisionThresholds::default();

    assert_eq!(
        decide(
            0.1,
            &rules_with_action(RuleAction::Review),
            &clean_aml(),
            &thresholds
        ),
        TransactionStatus::Review
    );
}

#[test]
fn high_ml_score_cannot_be_downgraded() {
    let thresholds = DecisionThresholds::default();

    // An approving rules outcome and a clean AML verdict do not soften a
    // score above the block threshold.
    assert_eq!(
        decide(
            0.95,
            &rules_with_action(RuleAction::Approve),
            &clean_aml(),
            &thresholds
        ),
        TransactionStatus::Blocked
    );
}

#[test]
fn custom_thresholds_shift_the_bands() {
    let thresholds = DecisionThresholds {
        block: 0.9,
        review: 0.5,
        pending: 0.2,
    };
    let rules = rules_with_action(RuleAction::Approve);
    let aml = clean_aml();

    assert_eq!(
        decide(0.85, &rules, &aml, &thresholds),
        TransactionStatus::Review
    );
    assert_eq!(
        decide(0.3, &rules, &aml, &thresholds),
        TransactionStatus::Pending
    );
}

#[test]
fn status_escalation_never_downgrades() {
    assert_eq!(
        TransactionStatus::Approved.escalate_to(TransactionStatus::Review),
        TransactionStatus::Review
    );
    assert_eq!(
        TransactionStatus::Blocked.escalate_to(TransactionStatus::Review),
        TransactionStatus::Blocked
    );
    assert_eq!(
        TransactionStatus::Pending.escalate_to(TransactionStatus::Review),
        TransactionStatus::Review
    );
}
