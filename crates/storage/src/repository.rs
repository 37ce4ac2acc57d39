use async_trait::async_trait;
use quiz_core::Clock;
use quiz_core::model::{
    AnswerAck, AttemptAnswer, AttemptId, AttemptRecord, AttemptStatus, OptionKey, Participant,
    Question, QuestionEntry, QuestionError, QuestionId, SetNumber, UserId, ValidatedQuestion,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("backend responded with status {0}")]
    Status(u16),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid record: {0}")]
    InvalidRecord(#[from] QuestionError),
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// A question set and how many questions it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionSetInfo {
    pub set_number: SetNumber,
    pub question_count: u32,
}

/// 1-based page request for the admin listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 50;

    /// Page and limit are clamped to at least 1.
    #[must_use]
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    #[must_use]
    pub fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    #[must_use]
    pub fn skip(&self) -> usize {
        (self.page as usize - 1).saturating_mul(self.limit as usize)
    }

    #[must_use]
    pub fn total_pages(&self, total: u32) -> u32 {
        total.div_ceil(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_LIMIT)
    }
}

/// One page of the admin question listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionPage {
    pub questions: Vec<QuestionEntry>,
    pub current_page: u32,
    pub total_pages: u32,
    pub total_questions: u32,
}

/// Request to open a new attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttempt {
    pub participant: Participant,
    pub set_number: SetNumber,
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Repository contract for question sets and admin management.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// List question sets ordered by set number.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be reached.
    async fn list_sets(&self) -> Result<Vec<QuestionSetInfo>, StorageError>;

    /// Fetch the ordered questions of a set.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidRecord` for malformed questions, or
    /// other storage errors.
    async fn questions_for_set(&self, set: SetNumber) -> Result<Vec<Question>, StorageError>;

    /// Fetch a page of all questions, ordered by set number.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_page(&self, page: PageRequest) -> Result<QuestionPage, StorageError>;

    /// Fetch a question with its admin metadata.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_question(&self, id: &QuestionId) -> Result<QuestionEntry, StorageError>;

    /// Store a new question and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn create_question(&self, question: &ValidatedQuestion)
    -> Result<QuestionId, StorageError>;

    /// Replace an existing question's content.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn update_question(
        &self,
        id: &QuestionId,
        question: &ValidatedQuestion,
    ) -> Result<(), StorageError>;

    /// Remove a question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn delete_question(&self, id: &QuestionId) -> Result<(), StorageError>;
}

/// Repository contract for backend-tracked attempts.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Open an attempt and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be created.
    async fn start_attempt(&self, attempt: &NewAttempt) -> Result<AttemptId, StorageError>;

    /// Persist an answer; an earlier answer to the same question is replaced.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown attempt or question.
    async fn record_answer(
        &self,
        attempt: &AttemptId,
        question: &QuestionId,
        selected: &[OptionKey],
    ) -> Result<AnswerAck, StorageError>;

    /// Mark an attempt completed and return its final state.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown attempt.
    async fn complete_attempt(&self, attempt: &AttemptId) -> Result<AttemptRecord, StorageError>;

    /// Attempts of a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_attempts(&self, user: &UserId) -> Result<Vec<AttemptRecord>, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

/// In-memory backend for tests, offline play and prototyping.
///
/// Questions keep insertion order; attempts follow the same replace-on-answer
/// rules as the HTTP backend.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    clock: Clock,
    questions: Arc<Mutex<Vec<QuestionEntry>>>,
    attempts: Arc<Mutex<Vec<AttemptRecord>>>,
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Seed a question with a known id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id is taken.
    pub fn insert_entry(&self, entry: QuestionEntry) -> Result<(), StorageError> {
        let mut guard = self.questions.lock().map_err(poisoned)?;
        if guard.iter().any(|e| e.question.id() == entry.question.id()) {
            return Err(StorageError::Conflict);
        }
        guard.push(entry);
        Ok(())
    }

    /// Seed several questions.
    ///
    /// # Errors
    ///
    /// Stops at the first id conflict.
    pub fn insert_entries(
        &self,
        entries: impl IntoIterator<Item = QuestionEntry>,
    ) -> Result<(), StorageError> {
        entries.into_iter().try_for_each(|entry| self.insert_entry(entry))
    }

    /// Look up an attempt by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    pub fn attempt(&self, id: &AttemptId) -> Result<AttemptRecord, StorageError> {
        let guard = self.attempts.lock().map_err(poisoned)?;
        guard
            .iter()
            .find(|a| a.id.as_ref() == Some(id))
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn list_sets(&self) -> Result<Vec<QuestionSetInfo>, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        let mut counts: BTreeMap<SetNumber, u32> = BTreeMap::new();
        for entry in guard.iter() {
            *counts.entry(entry.set_number).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(set_number, question_count)| QuestionSetInfo {
                set_number,
                question_count,
            })
            .collect())
    }

    async fn questions_for_set(&self, set: SetNumber) -> Result<Vec<Question>, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        Ok(guard
            .iter()
            .filter(|entry| entry.set_number == set)
            .map(|entry| entry.question.clone())
            .collect())
    }

    async fn list_page(&self, page: PageRequest) -> Result<QuestionPage, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        let mut ordered: Vec<&QuestionEntry> = guard.iter().collect();
        ordered.sort_by_key(|entry| entry.set_number);

        let total_questions = u32::try_from(ordered.len()).unwrap_or(u32::MAX);
        let questions = ordered
            .into_iter()
            .skip(page.skip())
            .take(page.limit() as usize)
            .cloned()
            .collect();

        Ok(QuestionPage {
            questions,
            current_page: page.page(),
            total_pages: page.total_pages(total_questions),
            total_questions,
        })
    }

    async fn get_question(&self, id: &QuestionId) -> Result<QuestionEntry, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        guard
            .iter()
            .find(|entry| entry.question.id() == id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn create_question(
        &self,
        question: &ValidatedQuestion,
    ) -> Result<QuestionId, StorageError> {
        let id = QuestionId::new(uuid::Uuid::new_v4().simple().to_string());
        let entry = question.clone().assign_id(id.clone(), self.clock.now())?;
        self.insert_entry(entry)?;
        Ok(id)
    }

    async fn update_question(
        &self,
        id: &QuestionId,
        question: &ValidatedQuestion,
    ) -> Result<(), StorageError> {
        let mut guard = self.questions.lock().map_err(poisoned)?;
        let slot = guard
            .iter_mut()
            .find(|entry| entry.question.id() == id)
            .ok_or(StorageError::NotFound)?;

        let created_at = slot.created_at;
        let mut updated = question.clone().assign_id(id.clone(), self.clock.now())?;
        updated.created_at = created_at;
        updated.updated_at = Some(self.clock.now());
        *slot = updated;
        Ok(())
    }

    async fn delete_question(&self, id: &QuestionId) -> Result<(), StorageError> {
        let mut guard = self.questions.lock().map_err(poisoned)?;
        let before = guard.len();
        guard.retain(|entry| entry.question.id() != id);
        if guard.len() == before {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn start_attempt(&self, attempt: &NewAttempt) -> Result<AttemptId, StorageError> {
        let id = AttemptId::new(uuid::Uuid::new_v4().simple().to_string());
        let now = self.clock.now();
        let record = AttemptRecord {
            id: Some(id.clone()),
            user_id: attempt.participant.user_id.clone(),
            user_name: attempt.participant.name.clone(),
            set_number: attempt.set_number,
            answers: Vec::new(),
            score: 0,
            total_questions: 0,
            status: AttemptStatus::InProgress,
            created_at: Some(now),
            completed_at: None,
        };
        self.attempts.lock().map_err(poisoned)?.push(record);
        Ok(id)
    }

    async fn record_answer(
        &self,
        attempt: &AttemptId,
        question: &QuestionId,
        selected: &[OptionKey],
    ) -> Result<AnswerAck, StorageError> {
        let correct: BTreeSet<OptionKey> = {
            let guard = self.questions.lock().map_err(poisoned)?;
            guard
                .iter()
                .find(|entry| entry.question.id() == question)
                .map(|entry| entry.question.correct_answers().clone())
                .ok_or(StorageError::NotFound)?
        };
        let chosen: BTreeSet<OptionKey> = selected.iter().copied().collect();
        let is_correct = chosen == correct;

        let mut guard = self.attempts.lock().map_err(poisoned)?;
        let record = guard
            .iter_mut()
            .find(|a| a.id.as_ref() == Some(attempt))
            .ok_or(StorageError::NotFound)?;
        record.upsert_answer(AttemptAnswer {
            question_id: question.clone(),
            selected: selected.to_vec(),
            is_correct,
            answered_at: Some(self.clock.now()),
        });

        Ok(AnswerAck {
            is_correct,
            correct_answers: correct.into_iter().collect(),
            current_score: record.score,
            total_answered: record.total_questions,
        })
    }

    async fn complete_attempt(&self, attempt: &AttemptId) -> Result<AttemptRecord, StorageError> {
        let mut guard = self.attempts.lock().map_err(poisoned)?;
        let record = guard
            .iter_mut()
            .find(|a| a.id.as_ref() == Some(attempt))
            .ok_or(StorageError::NotFound)?;
        record.status = AttemptStatus::Completed;
        record.completed_at = Some(self.clock.now());
        Ok(record.clone())
    }

    async fn list_attempts(&self, user: &UserId) -> Result<Vec<AttemptRecord>, StorageError> {
        let guard = self.attempts.lock().map_err(poisoned)?;
        let mut attempts: Vec<AttemptRecord> = guard
            .iter()
            .filter(|a| &a.user_id == user)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps; reverse for newest first.
        attempts.reverse();
        attempts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(attempts)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory(repo: InMemoryRepository) -> Self {
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let attempts: Arc<dyn AttemptRepository> = Arc::new(repo);
        Self {
            questions,
            attempts,
        }
    }
}
