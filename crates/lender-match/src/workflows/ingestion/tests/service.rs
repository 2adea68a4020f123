use std::sync::Arc;
use std::time::Duration;

use super::common::*;
use crate::schema::{default_parameters, ParameterRegistry};
use crate::workflows::catalogue::{CatalogueRepository, Lender, LenderId, RuleType};
use crate::workflows::dispatch::WorkflowDispatcher;
use crate::workflows::ingestion::{
    ExtractionError, GuidelineDocument, IngestionError, IngestionRepository, IngestionService,
    IngestionStatus,
};
use crate::workflows::repository::RepositoryError;

#[tokio::test]
async fn successful_run_grows_the_registry_and_creates_a_policy() {
    let extractor = Arc::new(ScriptedExtractor::new(trucking_payload()));
    let harness = harness(extractor.clone());

    let task = harness
        .service
        .submit(harness.lender.id, pdf("trucking.pdf"))
        .expect("queued");
    assert_eq!(task.status, IngestionStatus::Processing);

    let finished = harness.service.run(&task.id).await.expect("ingested");
    assert_eq!(finished.status, IngestionStatus::Completed);
    assert!(finished.finished_at.is_some());
    assert_eq!(finished.summary.rules_bound, 2);
    assert_eq!(finished.summary.rules_dropped, 1);
    assert_eq!(finished.summary.definitions_created, 1);
    assert_eq!(finished.dropped.len(), 1);
    assert!(finished.dropped[0].contains("between"));

    let definition = harness
        .registry
        .lookup("truck_age_years")
        .expect("materialized");
    assert_eq!(definition.label, "Age of Truck");

    let policy_id = finished.policy_id.expect("policy linked");
    let policy = harness
        .catalogue
        .policy(&policy_id)
        .expect("available")
        .expect("stored");
    assert_eq!(policy.name, "Policy from trucking.pdf");
    assert_eq!(policy.lender_id, harness.lender.id);
    assert_eq!(policy.min_fit_score, 0);
    assert_eq!(policy.rules[0].parameter_key, "fico_score");
    assert_eq!(
        policy.rules[0].failure_reason.as_deref(),
        Some("FICO must be 680 or higher")
    );
    assert_eq!(policy.rules[1].rule_type, RuleType::Scoring);
    assert_eq!(policy.rules[1].weight, 5);

    let seen = extractor.seen_schema.lock().expect("schema mutex poisoned");
    assert!(seen.contains(&"fico_score".to_string()));
    assert!(!seen.contains(&"truck_age_years".to_string()));
}

#[tokio::test]
async fn failed_extraction_leaves_registry_and_catalogue_untouched() {
    let harness = harness(Arc::new(FailingExtractor(ExtractionError::Provider {
        status: 503,
        body: "overloaded".to_string(),
    })));
    let before = harness.registry.snapshot();

    let task = harness
        .service
        .submit(harness.lender.id, pdf("trucking.pdf"))
        .expect("queued");
    let error = harness.service.run(&task.id).await.expect_err("provider down");
    assert!(matches!(
        error,
        IngestionError::Extraction(ExtractionError::Provider { status: 503, .. })
    ));

    let stored = harness.service.get(&task.id).expect("task stored");
    assert_eq!(stored.status, IngestionStatus::Failed);
    assert!(stored
        .error
        .as_deref()
        .is_some_and(|reason| reason.contains("overloaded")));
    assert_eq!(harness.registry.snapshot(), before);
    assert!(harness.catalogue.policies().expect("list").is_empty());
}

#[tokio::test]
async fn unparsable_output_fails_the_task() {
    let harness = harness(Arc::new(ScriptedExtractor::new(serde_json::Value::String(
        "I could not read this document".to_string(),
    ))));
    let task = harness
        .service
        .submit(harness.lender.id, pdf("scan.pdf"))
        .expect("queued");

    let error = harness.service.run(&task.id).await.expect_err("not json");
    assert!(matches!(
        error,
        IngestionError::Extraction(ExtractionError::UnparsableOutput(_))
    ));
    assert_eq!(
        harness.service.get(&task.id).expect("stored").status,
        IngestionStatus::Failed
    );
}

#[tokio::test]
async fn slow_extraction_times_out() {
    let harness = harness_with_timeout(Arc::new(StalledExtractor), Duration::from_millis(20));
    let task = harness
        .service
        .submit(harness.lender.id, pdf("slow.pdf"))
        .expect("queued");

    let error = harness.service.run(&task.id).await.expect_err("deadline");
    assert!(matches!(
        error,
        IngestionError::Extraction(ExtractionError::Timeout(_))
    ));
    assert_eq!(
        harness.service.get(&task.id).expect("stored").status,
        IngestionStatus::Failed
    );
}

#[tokio::test]
async fn concurrent_ingestions_share_one_new_definition() {
    let extractor = Arc::new(ScriptedExtractor::new(trucking_payload()));
    let harness = harness(extractor);

    let first = harness
        .service
        .submit(harness.lender.id, pdf("first.pdf"))
        .expect("queued");
    let second = harness
        .service
        .submit(harness.lender.id, pdf("second.pdf"))
        .expect("queued");

    let (left, right) = tokio::join!(
        harness.service.run(&first.id),
        harness.service.run(&second.id)
    );
    let left = left.expect("first ingested");
    let right = right.expect("second ingested");

    assert_eq!(
        left.summary.definitions_created + right.summary.definitions_created,
        1
    );
    assert_eq!(
        harness
            .registry
            .all()
            .iter()
            .filter(|definition| definition.key == "truck_age_years")
            .count(),
        1
    );
    for task in [left, right] {
        let policy = harness
            .catalogue
            .policy(&task.policy_id.expect("policy linked"))
            .expect("available")
            .expect("stored");
        assert!(policy.references_parameter("truck_age_years"));
    }
}

#[tokio::test]
async fn scheduled_runs_complete_on_the_dispatcher() {
    let harness = harness(Arc::new(ScriptedExtractor::new(trucking_payload())));
    let task = harness
        .service
        .submit(harness.lender.id, pdf("trucking.pdf"))
        .expect("queued");

    harness.service.schedule(task.id).await.expect("worker joins");
    assert_eq!(
        harness.service.get(&task.id).expect("stored").status,
        IngestionStatus::Completed
    );
}

#[test]
fn submit_rejects_non_pdf_and_empty_documents() {
    let harness = harness(Arc::new(ScriptedExtractor::new(trucking_payload())));

    let error = harness
        .service
        .submit(harness.lender.id, GuidelineDocument::new("rates.xlsx", b"PK".to_vec()))
        .expect_err("not a pdf");
    assert!(matches!(error, IngestionError::InvalidDocument(_)));

    let error = harness
        .service
        .submit(harness.lender.id, GuidelineDocument::new("empty.pdf", Vec::new()))
        .expect_err("empty");
    assert!(matches!(error, IngestionError::InvalidDocument(_)));
}

#[test]
fn submit_requires_a_known_lender() {
    let harness = harness(Arc::new(ScriptedExtractor::new(trucking_payload())));
    let error = harness
        .service
        .submit(LenderId::new(), pdf("trucking.pdf"))
        .expect_err("unknown lender");
    assert!(matches!(
        error,
        IngestionError::Repository(RepositoryError::NotFound)
    ));
}

#[tokio::test]
async fn lost_completion_write_is_not_reported_as_a_failed_extraction() {
    let registry = Arc::new(ParameterRegistry::with_definitions(default_parameters()));
    let catalogue = MemoryCatalogue::default();
    let lender = catalogue
        .insert_lender(Lender::new("Summit Capital", None))
        .expect("lender stored");
    let tasks = CompletionLostTasks::default();
    let service = IngestionService::new(
        Arc::clone(&registry),
        Arc::new(tasks.clone()),
        Arc::new(catalogue.clone()),
        Arc::new(ScriptedExtractor::new(trucking_payload())),
        WorkflowDispatcher::new(1),
        Duration::from_secs(5),
    );

    let task = service.submit(lender.id, pdf("trucking.pdf")).expect("queued");
    let error = service.run(&task.id).await.expect_err("status write lost");

    let policy_id = match error {
        IngestionError::StatusNotRecorded { policy_id, .. } => policy_id,
        other => panic!("unexpected error: {other}"),
    };
    let policy = catalogue
        .policy(&policy_id)
        .expect("catalogue available")
        .expect("policy committed");
    assert_eq!(policy.name, "Policy from trucking.pdf");
    assert!(registry.contains("truck_age_years"));

    let stored = tasks
        .inner
        .fetch(&task.id)
        .expect("tasks available")
        .expect("task stored");
    assert_eq!(stored.task.status, IngestionStatus::Processing);
    assert!(stored.task.error.is_none());
}
