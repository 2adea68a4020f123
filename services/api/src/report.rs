use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::Args;
use lender_match::error::AppError;
use lender_match::schema::{
    default_parameters, validate_form_data, ParameterDefinition, ParameterRegistry,
};
use lender_match::workflows::catalogue::{Lender, Policy, PolicyDraft};
use lender_match::workflows::matching::{
    ApplicationSubmission, EvaluationRecord, LoanApplication, MatchEngine,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Args, Debug)]
pub(crate) struct MatchArgs {
    /// JSON array of policies, each with a `lender` name plus `name`, `min_fit_score` and `rules`
    #[arg(long)]
    pub(crate) policies: PathBuf,
    /// JSON object with `applicant_name` and `form_data`
    #[arg(long)]
    pub(crate) application: PathBuf,
    /// Optional JSON array of parameter definitions (defaults to the built-in catalogue)
    #[arg(long)]
    pub(crate) parameters: Option<PathBuf>,
}

/// One program of the offline policy file.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PolicyFixture {
    pub(crate) lender: String,
    #[serde(flatten)]
    pub(crate) policy: PolicyDraft,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ReportEntry {
    pub(crate) lender_name: String,
    pub(crate) program_name: String,
    pub(crate) min_fit_score: u8,
    pub(crate) eligible: bool,
    pub(crate) fit_score: u8,
    pub(crate) evaluations: Vec<EvaluationRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MatchReport {
    pub(crate) applicant_name: String,
    pub(crate) entries: Vec<ReportEntry>,
}

pub(crate) fn print_parameters() {
    println!("Default parameter catalogue");
    for definition in default_parameters() {
        let options = if definition.options.is_empty() {
            String::new()
        } else {
            format!(" [{}]", definition.options.join(", "))
        };
        println!(
            "- {} ({}): {}{}",
            definition.key,
            definition.data_type.label(),
            definition.label,
            options
        );
    }
}

pub(crate) fn run_match_report(args: MatchArgs) -> Result<(), AppError> {
    let MatchArgs {
        policies,
        application,
        parameters,
    } = args;

    let definitions = match parameters {
        Some(path) => read_json::<Vec<ParameterDefinition>>(&path)?,
        None => default_parameters(),
    };
    let fixtures: Vec<PolicyFixture> = read_json(&policies)?;
    let submission: ApplicationSubmission = read_json(&application)?;

    let report = build_report(definitions, fixtures, submission)?;
    render_report(&report);
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Validates the application and ranks every program by fit score.
pub(crate) fn build_report(
    definitions: Vec<ParameterDefinition>,
    fixtures: Vec<PolicyFixture>,
    submission: ApplicationSubmission,
) -> Result<MatchReport, AppError> {
    let registry = ParameterRegistry::with_definitions(definitions);
    let form_data = validate_form_data(submission.form_data, &registry)?;
    let application = LoanApplication::new(submission.applicant_name, form_data);

    let mut lenders: Vec<Lender> = Vec::new();
    let mut policies = Vec::with_capacity(fixtures.len());
    for fixture in fixtures {
        let lender_id = match lenders.iter().find(|lender| lender.name == fixture.lender) {
            Some(lender) => lender.id,
            None => {
                let lender = Lender::new(fixture.lender, None);
                let id = lender.id;
                lenders.push(lender);
                id
            }
        };
        let PolicyDraft {
            name,
            min_fit_score,
            rules,
        } = fixture.policy;
        policies.push(Policy::new(lender_id, name, min_fit_score, rules));
    }

    let engine = MatchEngine::new(registry.labels());
    let results = engine.match_application(&application, &policies, Utc::now());

    let mut entries: Vec<ReportEntry> = policies
        .into_iter()
        .zip(results)
        .map(|(policy, result)| ReportEntry {
            lender_name: lenders
                .iter()
                .find(|lender| lender.id == policy.lender_id)
                .map(|lender| lender.name.clone())
                .unwrap_or_default(),
            program_name: policy.name,
            min_fit_score: policy.min_fit_score,
            eligible: result.eligible,
            fit_score: result.fit_score,
            evaluations: result.evaluations,
        })
        .collect();
    entries.sort_by(|left, right| {
        right
            .eligible
            .cmp(&left.eligible)
            .then(right.fit_score.cmp(&left.fit_score))
    });

    Ok(MatchReport {
        applicant_name: application.applicant_name,
        entries,
    })
}

fn render_report(report: &MatchReport) {
    println!("Lender match report for {}", report.applicant_name);
    if report.entries.is_empty() {
        println!("No programs supplied.");
        return;
    }

    for (rank, entry) in report.entries.iter().enumerate() {
        let verdict = if entry.eligible {
            "eligible"
        } else {
            "not eligible"
        };
        println!(
            "{}. {} / {}: {} | fit {} (program minimum {})",
            rank + 1,
            entry.lender_name,
            entry.program_name,
            verdict,
            entry.fit_score,
            entry.min_fit_score
        );
        for evaluation in &entry.evaluations {
            let marker = if evaluation.passed { "pass" } else { "fail" };
            match &evaluation.failure_reason {
                Some(reason) => println!("   - [{marker}] {reason}"),
                None => println!(
                    "   - [{marker}] {} {} {}",
                    evaluation.parameter_label, evaluation.operator, evaluation.threshold_value
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixtures() -> Vec<PolicyFixture> {
        serde_json::from_value(json!([
            {
                "lender": "Harbor Bank",
                "name": "Prime",
                "min_fit_score": 80,
                "rules": [
                    {"parameter_key": "fico_score", "operator": "gte", "value_comparison": 750, "rule_type": "eligibility"}
                ]
            },
            {
                "lender": "Summit Capital",
                "name": "Tier A",
                "min_fit_score": 70,
                "rules": [
                    {"parameter_key": "fico_score", "operator": "gte", "value_comparison": 650, "rule_type": "eligibility"},
                    {"parameter_key": "years_in_business", "operator": "gte", "value_comparison": 2, "rule_type": "scoring", "weight": 10},
                    {"parameter_key": "annual_revenue", "operator": "gte", "value_comparison": 500000, "rule_type": "scoring", "weight": 5}
                ]
            }
        ]))
        .expect("fixture parses")
    }

    fn submission(form_data: serde_json::Value) -> ApplicationSubmission {
        serde_json::from_value(json!({
            "applicant_name": "Acme Freight LLC",
            "form_data": form_data,
        }))
        .expect("submission parses")
    }

    #[test]
    fn report_ranks_eligible_programs_first() {
        let report = build_report(
            default_parameters(),
            fixtures(),
            submission(json!({
                "fico_score": 700,
                "years_in_business": 3,
                "annual_revenue": 250000
            })),
        )
        .expect("report builds");

        assert_eq!(report.applicant_name, "Acme Freight LLC");
        assert_eq!(report.entries[0].lender_name, "Summit Capital");
        assert!(report.entries[0].eligible);
        assert_eq!(report.entries[0].fit_score, 66);
        assert_eq!(report.entries[1].program_name, "Prime");
        assert!(!report.entries[1].eligible);
    }

    #[test]
    fn report_rejects_invalid_applications() {
        let error = build_report(
            default_parameters(),
            fixtures(),
            submission(json!({"business_type": "Farming"})),
        )
        .expect_err("not an option");
        assert!(matches!(error, AppError::Validation(_)));
    }
}
