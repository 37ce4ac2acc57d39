use std::collections::BTreeSet;
use std::sync::Arc;

use quiz_core::model::{
    AnswerRecord, AttemptId, AttemptRecord, OptionKey, Participant, QuestionId, QuizSession,
    SetNumber,
};
use storage::repository::{AttemptRepository, NewAttempt, QuestionRepository, Storage};
use tracing::{debug, info, warn};

use super::service::{QuizOutcome, QuizRun};
use crate::error::QuizError;

/// How answers are copied to the backend after the local commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Replication {
    /// Spawn the write and return immediately.
    #[default]
    Background,
    /// Await the write before returning.
    Inline,
}

/// Outcome of picking an option on the current question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Multi-select: the pending selection after the toggle.
    Pending(BTreeSet<OptionKey>),
    /// Single answer: the key was submitted at once.
    Answered(AnswerRecord),
}

/// Orchestrates quiz runs: loading, answering with best-effort backend
/// replication, and finishing.
#[derive(Clone)]
pub struct QuizLoopService {
    questions: Arc<dyn QuestionRepository>,
    attempts: Arc<dyn AttemptRepository>,
    participant: Option<Participant>,
    replication: Replication,
}

impl QuizLoopService {
    #[must_use]
    pub fn new(
        questions: Arc<dyn QuestionRepository>,
        attempts: Arc<dyn AttemptRepository>,
    ) -> Self {
        Self {
            questions,
            attempts,
            participant: None,
            replication: Replication::default(),
        }
    }

    #[must_use]
    pub fn from_storage(storage: &Storage) -> Self {
        Self::new(Arc::clone(&storage.questions), Arc::clone(&storage.attempts))
    }

    /// Record attempts on the backend for `participant`. Without one, runs
    /// stay local.
    #[must_use]
    pub fn with_participant(mut self, participant: Participant) -> Self {
        self.participant = Some(participant);
        self
    }

    #[must_use]
    pub fn with_replication(mut self, replication: Replication) -> Self {
        self.replication = replication;
        self
    }

    /// Load a question set and start a run on it.
    ///
    /// Opening the backend attempt is best-effort; on failure the run is
    /// local only.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Load` if the questions cannot be fetched and
    /// `QuizError::Session` for an empty or inconsistent set.
    pub async fn start_session(&self, set: SetNumber) -> Result<QuizRun, QuizError> {
        let questions = self
            .questions
            .questions_for_set(set)
            .await
            .map_err(QuizError::Load)?;
        let session = QuizSession::start(questions)?;
        let attempt_id = self.open_attempt(set).await;
        info!(set = %set, total = session.total(), attempt = ?attempt_id, "quiz started");
        Ok(QuizRun::new(set, session, attempt_id))
    }

    /// Start over on the same questions with a new backend attempt.
    pub async fn restart(&self, run: &mut QuizRun) {
        let attempt_id = self.open_attempt(run.set_number()).await;
        run.reset(attempt_id);
        info!(set = %run.set_number(), "quiz restarted");
    }

    /// Pick `key` on the current question.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Session` if the question is answered or does not
    /// offer `key`.
    pub async fn select_option(
        &self,
        run: &mut QuizRun,
        key: OptionKey,
    ) -> Result<Selection, QuizError> {
        if run.session().current_question().allows_multiple() {
            let pending = run.toggle_pending(key)?.clone();
            return Ok(Selection::Pending(pending));
        }
        let id = run.session().current_question().id().clone();
        let record = self.submit(run, &id, [key].into_iter().collect()).await?;
        run.take_pending();
        Ok(Selection::Answered(record))
    }

    /// Submit the pending selection for the current question.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Session` (for example `EmptySelection`); the
    /// pending selection is kept on error.
    pub async fn submit_pending(&self, run: &mut QuizRun) -> Result<AnswerRecord, QuizError> {
        let id = run.session().current_question().id().clone();
        let pending = run.take_pending();
        match self.submit(run, &id, pending.clone()).await {
            Ok(record) => Ok(record),
            Err(err) => {
                run.restore_pending(pending);
                Err(err)
            }
        }
    }

    /// Commit an answer locally, then replicate it to the backend.
    ///
    /// Replication failures are logged and never undo the local record.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Session` when the session rejects the answer.
    pub async fn submit(
        &self,
        run: &mut QuizRun,
        question_id: &QuestionId,
        selected: BTreeSet<OptionKey>,
    ) -> Result<AnswerRecord, QuizError> {
        let record = run
            .session_mut()
            .submit_answer(question_id, selected)?
            .clone();
        debug!(question = %question_id, correct = record.is_correct(), "answer recorded");

        if let Some(attempt_id) = run.attempt_id().cloned() {
            let attempts = Arc::clone(&self.attempts);
            let question_id = question_id.clone();
            let selected: Vec<OptionKey> = record.selected().iter().copied().collect();
            let write = async move {
                if let Err(err) = attempts
                    .record_answer(&attempt_id, &question_id, &selected)
                    .await
                {
                    warn!(
                        ?err,
                        attempt = %attempt_id,
                        question = %question_id,
                        "answer replication failed"
                    );
                }
            };
            match self.replication {
                Replication::Background => run.track(tokio::spawn(write)),
                Replication::Inline => write.await,
            }
        }

        Ok(record)
    }

    /// Finish the run.
    ///
    /// The local result is final once computed; a second call returns the
    /// first outcome. Pending replications are awaited before the backend
    /// attempt is completed, best-effort.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Session` (`IncompleteSession`) while questions
    /// are unanswered.
    pub async fn finish(&self, run: &mut QuizRun) -> Result<QuizOutcome, QuizError> {
        if let Some(outcome) = run.outcome() {
            return Ok(outcome.clone());
        }
        let result = run.session_mut().finish()?;

        for handle in run.drain_in_flight() {
            if let Err(err) = handle.await {
                warn!(?err, "answer replication task failed");
            }
        }
        let attempt = match run.attempt_id().cloned() {
            Some(id) => self.complete_attempt(&id).await,
            None => None,
        };

        info!(
            set = %run.set_number(),
            score = result.score,
            total = result.total,
            elapsed = result.elapsed_seconds,
            "quiz finished"
        );
        let outcome = QuizOutcome { result, attempt };
        run.set_outcome(outcome.clone());
        Ok(outcome)
    }

    async fn open_attempt(&self, set: SetNumber) -> Option<AttemptId> {
        let participant = self.participant.clone()?;
        let request = NewAttempt {
            participant,
            set_number: set,
        };
        match self.attempts.start_attempt(&request).await {
            Ok(id) => Some(id),
            Err(err) => {
                warn!(?err, set = %set, "could not start backend attempt; continuing offline");
                None
            }
        }
    }

    async fn complete_attempt(&self, id: &AttemptId) -> Option<AttemptRecord> {
        match self.attempts.complete_attempt(id).await {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(?err, attempt = %id, "could not complete backend attempt");
                None
            }
        }
    }
}
