use std::collections::BTreeMap;
use std::sync::Arc;

use quiz_core::model::{AttemptRecord, SetNumber, UserId};
use storage::repository::AttemptRepository;

use crate::error::ProgressError;

/// Latest completed attempt of one set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetScore {
    pub set_number: SetNumber,
    pub score: u32,
    pub total: u32,
    pub percent: u32,
}

/// Landing-screen statistics for a user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserProgress {
    /// All attempts, completed or not.
    pub total_attempts: usize,
    /// Best percentage over completed attempts; 0 without any.
    pub best_score_percent: u32,
    /// Ordered by set number.
    pub latest_by_set: Vec<SetScore>,
}

impl UserProgress {
    /// Summarize attempts listed newest first.
    #[must_use]
    pub fn from_attempts(attempts: &[AttemptRecord]) -> Self {
        let completed = attempts.iter().filter(|a| a.is_completed());

        let best_score_percent = completed
            .clone()
            .map(AttemptRecord::score_percent)
            .max()
            .unwrap_or(0);

        let mut latest: BTreeMap<SetNumber, SetScore> = BTreeMap::new();
        for attempt in completed {
            latest.entry(attempt.set_number).or_insert(SetScore {
                set_number: attempt.set_number,
                score: attempt.score,
                total: attempt.total_questions,
                percent: attempt.score_percent(),
            });
        }

        Self {
            total_attempts: attempts.len(),
            best_score_percent,
            latest_by_set: latest.into_values().collect(),
        }
    }

    #[must_use]
    pub fn latest_for(&self, set: SetNumber) -> Option<&SetScore> {
        self.latest_by_set.iter().find(|s| s.set_number == set)
    }
}

#[derive(Clone)]
pub struct ProgressService {
    attempts: Arc<dyn AttemptRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(attempts: Arc<dyn AttemptRepository>) -> Self {
        Self { attempts }
    }

    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if repository access fails.
    pub async fn user_progress(&self, user: &UserId) -> Result<UserProgress, ProgressError> {
        let attempts = self.attempts.list_attempts(user).await?;
        Ok(UserProgress::from_attempts(&attempts))
    }
}
