mod answer;
mod attempt;
mod ids;
mod question;
mod session;

pub use ids::{AttemptId, ParseIdError, QuestionId, SetNumber, UserId};

pub use answer::{AnswerLedger, AnswerRecord, Score, percent};
pub use attempt::{AnswerAck, AttemptAnswer, AttemptRecord, AttemptStatus, Participant};
pub use question::{
    DEFAULT_CATEGORY, Difficulty, OptionDraft, OptionKey, Question, QuestionDraft, QuestionEntry,
    QuestionError, QuestionOption, ValidatedQuestion, next_option_key, parse_key_list,
};
pub use session::{QuitSummary, QuizResult, QuizSession, SessionError, SessionStatus, Step};
