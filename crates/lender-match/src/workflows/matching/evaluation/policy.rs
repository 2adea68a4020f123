use crate::workflows::catalogue::{PolicyRule, RuleType};
use crate::workflows::matching::domain::EvaluationRecord;

/// Combined outcome of a policy's evaluations before it becomes a fit score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct PolicyTally {
    pub(crate) eligible: bool,
    pub(crate) score: u64,
    pub(crate) max_score: u64,
}

/// Folds evaluations (paired with their rules in policy order) into a tally.
/// Eligibility holds vacuously when the policy has no eligibility rules.
pub(crate) fn tally(rules: &[PolicyRule], evaluations: &[EvaluationRecord]) -> PolicyTally {
    let mut tally = PolicyTally {
        eligible: true,
        score: 0,
        max_score: 0,
    };

    for (rule, evaluation) in rules.iter().zip(evaluations) {
        match rule.rule_type {
            RuleType::Eligibility => tally.eligible &= evaluation.passed,
            RuleType::Scoring => {
                let weight = u64::from(rule.weight);
                tally.max_score += weight;
                if evaluation.passed {
                    tally.score += weight;
                }
            }
        }
    }

    tally
}

/// Integer fit score in `0..=100`, truncating.
pub fn fit_score(eligible: bool, score: u64, max_score: u64) -> u8 {
    if max_score == 0 {
        return if eligible { 100 } else { 0 };
    }
    let percent = (score.min(max_score) * 100) / max_score;
    u8::try_from(percent).unwrap_or(100)
}

impl PolicyTally {
    pub(crate) fn fit_score(&self) -> u8 {
        fit_score(self.eligible, self.score, self.max_score)
    }
}
