//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{QuestionError, SessionError};
use storage::repository::StorageError;

/// Errors emitted by the quiz session workflow.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizError {
    #[error("failed to load questions: {0}")]
    Load(#[source] StorageError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Errors emitted by `QuestionAdminService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AdminError {
    #[error(transparent)]
    Invalid(#[from] QuestionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CatalogService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("question set {0} has no questions")]
    EmptySet(u32),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}
