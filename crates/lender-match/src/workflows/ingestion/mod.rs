//! Lender guideline ingestion.
//!
//! A document is handed to an [`ExtractionAdapter`], the candidate rules are
//! reconciled against the parameter registry, and the resulting definitions
//! and policy are committed together. Extraction output is treated as
//! untrusted input throughout.

pub mod domain;
pub mod extraction;
pub mod gemini;
pub mod reconcile;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{GuidelineDocument, IngestionStatus, IngestionSummary, IngestionTask, TaskId};
pub use extraction::{
    parse_extraction_payload, DisabledExtractor, ExtractedParameter, ExtractedRule,
    ExtractionAdapter, ExtractionError, ExtractionResult,
};
pub use gemini::GeminiExtractionAdapter;
pub use reconcile::{reconcile, DropReason, DroppedRule, Reconciliation};
pub use repository::{IngestionRecord, IngestionRepository};
pub use router::ingestion_router;
pub use service::{IngestionError, IngestionService};
