use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::answer::percent;
use crate::model::ids::{AttemptId, QuestionId, SetNumber, UserId};
use crate::model::question::OptionKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Completed,
}

/// Who an attempt is recorded for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub user_id: UserId,
    pub name: String,
}

impl Participant {
    #[must_use]
    pub fn new(user_id: UserId, name: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
        }
    }
}

/// One answer as the backend stores it.
///
/// Unlike the session ledger, the backend replaces an earlier answer to the
/// same question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptAnswer {
    pub question_id: QuestionId,
    pub selected: Vec<OptionKey>,
    pub is_correct: bool,
    pub answered_at: Option<DateTime<Utc>>,
}

/// A backend-tracked run of one user through one question set.
///
/// `id` is absent in progress listings, which omit it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub id: Option<AttemptId>,
    pub user_id: UserId,
    pub user_name: String,
    pub set_number: SetNumber,
    pub answers: Vec<AttemptAnswer>,
    pub score: u32,
    pub total_questions: u32,
    pub status: AttemptStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl AttemptRecord {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == AttemptStatus::Completed
    }

    #[must_use]
    pub fn score_percent(&self) -> u32 {
        percent(self.score as usize, self.total_questions as usize)
    }

    /// Recompute `score` and `total_questions` from the stored answers.
    pub fn recount(&mut self) {
        let correct = self.answers.iter().filter(|a| a.is_correct).count();
        self.score = u32::try_from(correct).unwrap_or(u32::MAX);
        self.total_questions = u32::try_from(self.answers.len()).unwrap_or(u32::MAX);
    }

    /// Store `answer`, replacing an earlier answer to the same question.
    pub fn upsert_answer(&mut self, answer: AttemptAnswer) {
        match self
            .answers
            .iter_mut()
            .find(|existing| existing.question_id == answer.question_id)
        {
            Some(existing) => *existing = answer,
            None => self.answers.push(answer),
        }
        self.recount();
    }
}

/// Backend acknowledgement of a persisted answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerAck {
    pub is_correct: bool,
    pub correct_answers: Vec<OptionKey>,
    pub current_score: u32,
    pub total_answered: u32,
}
