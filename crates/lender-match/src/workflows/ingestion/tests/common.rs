use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::schema::{default_parameters, ParameterDefinition, ParameterRegistry};
use crate::workflows::catalogue::{CatalogueRepository, Lender, PolicyId};
use crate::workflows::dispatch::WorkflowDispatcher;
use crate::workflows::ingestion::{
    parse_extraction_payload, ExtractionAdapter, ExtractionError, ExtractionResult,
    GuidelineDocument, IngestionRecord, IngestionRepository, IngestionService, IngestionSummary,
    IngestionTask, TaskId,
};
use crate::workflows::repository::RepositoryError;

pub(super) use crate::workflows::testing::{MemoryCatalogue, MemoryTasks};

pub(super) type MemoryService = IngestionService<MemoryTasks, MemoryCatalogue>;

/// Adapter replaying a canned model response and recording the schema it was shown.
pub(super) struct ScriptedExtractor {
    payload: String,
    pub(super) seen_schema: Mutex<Vec<String>>,
}

impl ScriptedExtractor {
    pub(super) fn new(payload: Value) -> Self {
        Self {
            payload: payload.to_string(),
            seen_schema: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ExtractionAdapter for ScriptedExtractor {
    async fn extract(
        &self,
        _document: &GuidelineDocument,
        schema: &[ParameterDefinition],
    ) -> Result<ExtractionResult, ExtractionError> {
        *self.seen_schema.lock().expect("schema mutex poisoned") =
            schema.iter().map(|definition| definition.key.clone()).collect();
        tokio::task::yield_now().await;
        parse_extraction_payload(&self.payload)
    }
}

pub(super) struct FailingExtractor(pub(super) ExtractionError);

#[async_trait]
impl ExtractionAdapter for FailingExtractor {
    async fn extract(
        &self,
        _document: &GuidelineDocument,
        _schema: &[ParameterDefinition],
    ) -> Result<ExtractionResult, ExtractionError> {
        Err(self.0.clone())
    }
}

pub(super) struct StalledExtractor;

#[async_trait]
impl ExtractionAdapter for StalledExtractor {
    async fn extract(
        &self,
        _document: &GuidelineDocument,
        _schema: &[ParameterDefinition],
    ) -> Result<ExtractionResult, ExtractionError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(ExtractionResult::default())
    }
}

/// Task store that loses the completion write.
#[derive(Default, Clone)]
pub(super) struct CompletionLostTasks {
    pub(super) inner: MemoryTasks,
}

impl IngestionRepository for CompletionLostTasks {
    fn insert(&self, record: IngestionRecord) -> Result<IngestionTask, RepositoryError> {
        self.inner.insert(record)
    }

    fn fetch(&self, id: &TaskId) -> Result<Option<IngestionRecord>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn pending(&self, limit: usize) -> Result<Vec<IngestionRecord>, RepositoryError> {
        self.inner.pending(limit)
    }

    fn complete(
        &self,
        _id: &TaskId,
        _policy_id: PolicyId,
        _summary: IngestionSummary,
        _dropped: Vec<String>,
    ) -> Result<IngestionTask, RepositoryError> {
        Err(RepositoryError::Unavailable("write timed out".to_string()))
    }

    fn fail(&self, id: &TaskId, reason: String) -> Result<IngestionTask, RepositoryError> {
        self.inner.fail(id, reason)
    }
}

pub(super) struct Harness {
    pub(super) service: Arc<MemoryService>,
    pub(super) registry: Arc<ParameterRegistry>,
    pub(super) catalogue: MemoryCatalogue,
    pub(super) lender: Lender,
}

pub(super) fn harness(extractor: Arc<dyn ExtractionAdapter>) -> Harness {
    harness_with_timeout(extractor, Duration::from_secs(5))
}

pub(super) fn harness_with_timeout(
    extractor: Arc<dyn ExtractionAdapter>,
    timeout: Duration,
) -> Harness {
    let registry = Arc::new(ParameterRegistry::with_definitions(default_parameters()));
    let catalogue = MemoryCatalogue::default();
    let lender = catalogue
        .insert_lender(Lender::new("Summit Capital", None))
        .expect("lender stored");
    let service = Arc::new(IngestionService::new(
        Arc::clone(&registry),
        Arc::new(MemoryTasks::default()),
        Arc::new(catalogue.clone()),
        extractor,
        WorkflowDispatcher::new(2),
        timeout,
    ));
    Harness {
        service,
        registry,
        catalogue,
        lender,
    }
}

pub(super) fn pdf(file_name: &str) -> GuidelineDocument {
    GuidelineDocument::new(file_name, b"%PDF-1.4 guideline".to_vec())
}

/// Response shaped like the model output for a trucking program.
pub(super) fn trucking_payload() -> Value {
    json!({
        "rules": [
            {
                "parameter": "fico_score",
                "operator": "gte",
                "value": 680,
                "type": "eligibility",
                "reason": "FICO must be 680 or higher"
            },
            {
                "parameter": "truck_age_years",
                "operator": "lte",
                "value": 10,
                "type": "scoring",
                "weight": 5,
                "new_parameter_def": {
                    "key_name": "truck_age_years",
                    "display_label": "Age of Truck",
                    "data_type": "number"
                }
            },
            {
                "parameter": "fico_score",
                "operator": "between",
                "value": [600, 700]
            }
        ]
    })
}
