pub mod catalogue;
pub mod dispatch;
mod ids;
pub mod ingestion;
pub mod matching;
pub mod repository;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatch::WorkflowDispatcher;
pub use repository::RepositoryError;
