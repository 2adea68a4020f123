mod policy;
mod rules;

pub use policy::fit_score;

use chrono::{DateTime, Utc};

use crate::schema::{FormData, ParameterLabels};
use crate::workflows::catalogue::{Policy, PolicyRule};

use super::domain::{EvaluationRecord, LoanApplication, MatchResult};

/// Stateless evaluator pairing applications with lender policies.
///
/// Labels are captured once per run so every record of a batch renders
/// against the same registry state.
#[derive(Debug, Clone, Default)]
pub struct MatchEngine {
    labels: ParameterLabels,
}

impl MatchEngine {
    pub fn new(labels: ParameterLabels) -> Self {
        Self { labels }
    }

    pub fn evaluate(&self, rule: &PolicyRule, form_data: &FormData) -> EvaluationRecord {
        rules::evaluate_rule(rule, form_data, &self.labels)
    }

    pub fn match_policy(
        &self,
        application: &LoanApplication,
        policy: &Policy,
        matched_at: DateTime<Utc>,
    ) -> MatchResult {
        let evaluations: Vec<EvaluationRecord> = policy
            .rules
            .iter()
            .map(|rule| self.evaluate(rule, &application.form_data))
            .collect();
        let tally = policy::tally(&policy.rules, &evaluations);

        MatchResult {
            application_id: application.id,
            policy_id: policy.id,
            eligible: tally.eligible,
            fit_score: tally.fit_score(),
            evaluations,
            matched_at,
        }
    }

    /// One result per policy, in the order the policies were given.
    pub fn match_application(
        &self,
        application: &LoanApplication,
        policies: &[Policy],
        matched_at: DateTime<Utc>,
    ) -> Vec<MatchResult> {
        policies
            .iter()
            .map(|policy| self.match_policy(application, policy, matched_at))
            .collect()
    }
}
