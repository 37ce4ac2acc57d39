#![forbid(unsafe_code)]

pub mod admin_service;
pub mod catalog_service;
pub mod error;
pub mod progress_service;
pub mod sessions;

pub use quiz_core::Clock;
pub use sessions as session;

pub use admin_service::{QuestionAdminService, add_option, blank_draft, edit_draft};
pub use catalog_service::{CatalogService, SetPreview};
pub use error::{AdminError, CatalogError, ProgressError, QuizError};
pub use progress_service::{ProgressService, SetScore, UserProgress};

pub use sessions::{
    QuestionView, QuizLoopService, QuizOutcome, QuizRun, Replication, Selection, SessionProgress,
};
