//! Matching of loan applications against lender credit policies.
//!
//! The [`schema`] module owns the runtime parameter registry that defines which
//! application fields exist. [`workflows`] holds the lender catalogue, the
//! matching engine, and guideline ingestion, each with its own HTTP router.

pub mod config;
pub mod error;
pub mod schema;
pub mod telemetry;
pub mod workflows;

pub use error::AppError;
