mod progress;
mod service;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::QuizError;
pub use progress::SessionProgress;
pub use service::{QuizOutcome, QuizRun};
pub use view::{
    AnswerStatus, Feedback, NavigationState, OptionState, OptionView, PREVIEW_CHARS,
    QuestionListItem, QuestionView, preview, question_list,
};
pub use workflow::{QuizLoopService, Replication, Selection};
