use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use thiserror::Error;

use crate::model::answer::{AnswerLedger, AnswerRecord, Score, percent};
use crate::model::ids::QuestionId;
use crate::model::question::{OptionKey, Question};
use crate::timer::Timer;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("question set is empty")]
    EmptySet,

    #[error("question {0} appears more than once in the set")]
    DuplicateQuestion(QuestionId),

    #[error("question {0} is not part of this session")]
    UnknownQuestion(QuestionId),

    #[error("question {0} has already been answered")]
    AlreadyAnswered(QuestionId),

    #[error("no option selected")]
    EmptySelection,

    #[error("option {key} does not exist on question {question_id}")]
    UnknownKey {
        question_id: QuestionId,
        key: OptionKey,
    },

    #[error("question index {requested} is out of range (0..{total})")]
    OutOfBounds { requested: i64, total: usize },

    #[error("session incomplete: {answered} of {total} questions answered")]
    IncompleteSession { answered: usize, total: usize },
}

//
// ─── STATUS / NAVIGATION ───────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    InProgress,
    Completed,
}

/// One-step cursor move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Next,
    Previous,
}

impl Step {
    fn delta(self) -> i64 {
        match self {
            Step::Next => 1,
            Step::Previous => -1,
        }
    }
}

//
// ─── RESULTS ───────────────────────────────────────────────────────────────────
//

/// Final summary produced by `QuizSession::finish`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizResult {
    pub score: usize,
    pub total: usize,
    pub elapsed_seconds: u64,
}

impl QuizResult {
    #[must_use]
    pub fn percent(&self) -> u32 {
        percent(self.score, self.total)
    }
}

/// Progress snapshot for leaving a session without finishing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuitSummary {
    pub answered: usize,
    pub total: usize,
    pub correct: usize,
    pub elapsed_seconds: u64,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// In-memory quiz session over a fixed, ordered question set.
///
/// Owns the answer ledger, the cursor and the timer. Every transition is a
/// synchronous method on `&mut self`; rendering and persistence live
/// elsewhere.
#[derive(Debug, Clone)]
pub struct QuizSession {
    questions: Vec<Question>,
    index_by_id: HashMap<QuestionId, usize>,
    ledger: AnswerLedger,
    cursor: usize,
    timer: Timer,
    status: SessionStatus,
    result: Option<QuizResult>,
}

impl QuizSession {
    /// Start a session and its timer.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptySet` for an empty set and
    /// `SessionError::DuplicateQuestion` if two questions share an id.
    pub fn start(questions: Vec<Question>) -> Result<Self, SessionError> {
        Self::start_at(questions, Instant::now())
    }

    /// Like `start`, with an explicit timer origin.
    ///
    /// # Errors
    ///
    /// See `start`.
    pub fn start_at(questions: Vec<Question>, now: Instant) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::EmptySet);
        }

        let mut index_by_id = HashMap::with_capacity(questions.len());
        for (index, question) in questions.iter().enumerate() {
            if index_by_id.insert(question.id().clone(), index).is_some() {
                return Err(SessionError::DuplicateQuestion(question.id().clone()));
            }
        }

        Ok(Self {
            questions,
            index_by_id,
            ledger: AnswerLedger::new(),
            cursor: 0,
            timer: Timer::start_at(now),
            status: SessionStatus::InProgress,
            result: None,
        })
    }

    /// A fresh session over the same questions, with an empty ledger and a
    /// new timer.
    #[must_use]
    pub fn restart(&self) -> Self {
        self.restart_at(Instant::now())
    }

    #[must_use]
    pub fn restart_at(&self, now: Instant) -> Self {
        Self {
            questions: self.questions.clone(),
            index_by_id: self.index_by_id.clone(),
            ledger: AnswerLedger::new(),
            cursor: 0,
            timer: Timer::start_at(now),
            status: SessionStatus::InProgress,
            result: None,
        }
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn ledger(&self) -> &AnswerLedger {
        &self.ledger
    }

    #[must_use]
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    #[must_use]
    pub fn current_question(&self) -> &Question {
        &self.questions[self.cursor]
    }

    #[must_use]
    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.index_by_id.get(id).map(|&index| &self.questions[index])
    }

    #[must_use]
    pub fn index_of(&self, id: &QuestionId) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    #[must_use]
    pub fn answer_for(&self, id: &QuestionId) -> Option<&AnswerRecord> {
        self.ledger.get(id)
    }

    #[must_use]
    pub fn current_answer(&self) -> Option<&AnswerRecord> {
        self.ledger.get(self.current_question().id())
    }

    /// Correct / answered counts derived from the ledger.
    #[must_use]
    pub fn score(&self) -> Score {
        self.ledger.score()
    }

    #[must_use]
    pub fn elapsed_seconds(&self) -> u64 {
        self.timer.elapsed()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.ledger.len() == self.questions.len()
    }

    /// Record an answer for any question of the session, identified by id.
    ///
    /// All checks run before the ledger is touched, so a rejected call leaves
    /// the session unchanged.
    ///
    /// # Errors
    ///
    /// - `UnknownQuestion` if the id is not in this session
    /// - `AlreadyAnswered` if the question has a record
    /// - `EmptySelection` if nothing is selected
    /// - `UnknownKey` if a key is not one of the question's options
    pub fn submit_answer(
        &mut self,
        question_id: &QuestionId,
        selected: BTreeSet<OptionKey>,
    ) -> Result<&AnswerRecord, SessionError> {
        let index = self
            .index_of(question_id)
            .ok_or_else(|| SessionError::UnknownQuestion(question_id.clone()))?;
        if self.ledger.contains(question_id) {
            return Err(SessionError::AlreadyAnswered(question_id.clone()));
        }
        if selected.is_empty() {
            return Err(SessionError::EmptySelection);
        }

        let question = &self.questions[index];
        if let Some(key) = selected.iter().find(|key| !question.has_option(**key)) {
            return Err(SessionError::UnknownKey {
                question_id: question_id.clone(),
                key: *key,
            });
        }

        let record = AnswerRecord::grade(question, selected);
        self.ledger
            .insert_first(record)
            .ok_or_else(|| SessionError::AlreadyAnswered(question_id.clone()))
    }

    /// Answer the question under the cursor.
    ///
    /// # Errors
    ///
    /// Same as `submit_answer`.
    pub fn submit_current(
        &mut self,
        selected: BTreeSet<OptionKey>,
    ) -> Result<&AnswerRecord, SessionError> {
        let id = self.current_question().id().clone();
        self.submit_answer(&id, selected)
    }

    /// Move the cursor one step. Answering is not required to move.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if the step leaves the set; the cursor stays put.
    pub fn advance(&mut self, step: Step) -> Result<usize, SessionError> {
        let requested = i64::try_from(self.cursor).unwrap_or(i64::MAX) + step.delta();
        let total = self.questions.len();
        match usize::try_from(requested) {
            Ok(index) if index < total => {
                self.cursor = index;
                Ok(index)
            }
            _ => Err(SessionError::OutOfBounds { requested, total }),
        }
    }

    /// Jump straight to `index`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if `index >= total`; the cursor stays put.
    pub fn go_to(&mut self, index: usize) -> Result<usize, SessionError> {
        let total = self.questions.len();
        if index >= total {
            return Err(SessionError::OutOfBounds {
                requested: i64::try_from(index).unwrap_or(i64::MAX),
                total,
            });
        }
        self.cursor = index;
        Ok(index)
    }

    /// Finalize the session: stop the timer and produce the result.
    ///
    /// Calling it again returns the result of the first call.
    ///
    /// # Errors
    ///
    /// Returns `IncompleteSession` while any question is unanswered.
    pub fn finish(&mut self) -> Result<QuizResult, SessionError> {
        self.finish_at(Instant::now())
    }

    /// Like `finish`, with an explicit stop instant.
    ///
    /// # Errors
    ///
    /// See `finish`.
    pub fn finish_at(&mut self, now: Instant) -> Result<QuizResult, SessionError> {
        if let Some(result) = self.result {
            return Ok(result);
        }
        if !self.is_complete() {
            return Err(SessionError::IncompleteSession {
                answered: self.ledger.len(),
                total: self.questions.len(),
            });
        }

        let elapsed_seconds = self.timer.stop_at(now);
        let result = QuizResult {
            score: self.ledger.score().correct,
            total: self.questions.len(),
            elapsed_seconds,
        };
        self.status = SessionStatus::Completed;
        self.result = Some(result);
        Ok(result)
    }

    #[must_use]
    pub fn result(&self) -> Option<QuizResult> {
        self.result
    }

    /// Where the user stands if they leave now. Does not stop the timer.
    #[must_use]
    pub fn quit_summary(&self) -> QuitSummary {
        let score = self.score();
        QuitSummary {
            answered: score.answered,
            total: self.questions.len(),
            correct: score.correct,
            elapsed_seconds: self.timer.elapsed(),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::question::QuestionOption;
    use std::time::Duration;

    fn key(c: char) -> OptionKey {
        OptionKey::new(c).unwrap()
    }

    fn keys(cs: &[char]) -> BTreeSet<OptionKey> {
        cs.iter().map(|c| key(*c)).collect()
    }

    fn build_question(id: &str, option_keys: &[char], correct: &[char]) -> Question {
        let options = option_keys
            .iter()
            .map(|c| QuestionOption {
                key: key(*c),
                text: format!("{id}-{c}"),
            })
            .collect();
        Question::new(
            QuestionId::new(id),
            format!("Question {id}"),
            options,
            correct.iter().map(|c| key(*c)),
            correct.len() > 1,
        )
        .unwrap()
    }

    fn build_session(n: usize) -> QuizSession {
        let questions = (1..=n)
            .map(|i| build_question(&format!("q{i}"), &['A', 'B', 'C', 'D'], &['A']))
            .collect();
        QuizSession::start(questions).unwrap()
    }

    #[test]
    fn start_rejects_empty_set() {
        assert_eq!(QuizSession::start(Vec::new()).unwrap_err(), SessionError::EmptySet);
    }

    #[test]
    fn start_rejects_duplicate_ids() {
        let q = build_question("q1", &['A', 'B'], &['A']);
        let err = QuizSession::start(vec![q.clone(), q]).unwrap_err();
        assert_eq!(err, SessionError::DuplicateQuestion(QuestionId::new("q1")));
    }

    #[test]
    fn start_initializes_state() {
        let session = build_session(3);
        assert_eq!(session.cursor(), 0);
        assert_eq!(session.status(), SessionStatus::InProgress);
        assert!(session.ledger().is_empty());
        assert!(session.timer().is_running());
        assert_eq!(session.score(), Score::default());
    }

    #[test]
    fn second_submission_is_rejected_without_change() {
        let mut session = build_session(2);
        let id = QuestionId::new("q1");

        session.submit_answer(&id, keys(&['B'])).unwrap();
        let before = session.ledger().clone();

        let err = session.submit_answer(&id, keys(&['A'])).unwrap_err();
        assert_eq!(err, SessionError::AlreadyAnswered(id.clone()));
        assert_eq!(session.ledger(), &before);
        assert!(!session.answer_for(&id).unwrap().is_correct());
    }

    #[test]
    fn invalid_selections_leave_ledger_empty() {
        let mut session = build_session(1);
        let id = QuestionId::new("q1");

        assert_eq!(
            session.submit_answer(&id, BTreeSet::new()).unwrap_err(),
            SessionError::EmptySelection
        );
        assert_eq!(
            session.submit_answer(&id, keys(&['A', 'E'])).unwrap_err(),
            SessionError::UnknownKey {
                question_id: id.clone(),
                key: key('E'),
            }
        );
        assert_eq!(
            session
                .submit_answer(&QuestionId::new("nope"), keys(&['A']))
                .unwrap_err(),
            SessionError::UnknownQuestion(QuestionId::new("nope"))
        );
        assert!(session.ledger().is_empty());
    }

    #[test]
    fn multi_answer_requires_exact_match() {
        let question = build_question("multi", &['A', 'B', 'C'], &['A', 'C']);
        let outcomes: Vec<bool> = [keys(&['A']), keys(&['A', 'C']), keys(&['A', 'B', 'C'])]
            .into_iter()
            .map(|selected| {
                let mut session = QuizSession::start(vec![question.clone()]).unwrap();
                session
                    .submit_answer(question.id(), selected)
                    .unwrap()
                    .is_correct()
            })
            .collect();
        assert_eq!(outcomes, vec![false, true, false]);
    }

    #[test]
    fn answers_can_be_given_out_of_order() {
        let mut session = build_session(3);
        session.submit_answer(&QuestionId::new("q3"), keys(&['A'])).unwrap();
        assert_eq!(session.cursor(), 0);
        assert!(session.current_answer().is_none());
        assert_eq!(session.score(), Score { correct: 1, answered: 1 });
    }

    #[test]
    fn ledger_never_exceeds_question_count() {
        let mut session = build_session(3);
        for round in 0..3 {
            for i in 1..=3 {
                let _ = session.submit_answer(&QuestionId::new(format!("q{i}")), keys(&['B']));
                assert!(session.ledger().len() <= session.total(), "round {round}");
            }
        }
        assert_eq!(session.ledger().len(), 3);
    }

    #[test]
    fn advance_respects_bounds() {
        let mut session = build_session(2);

        let err = session.advance(Step::Previous).unwrap_err();
        assert_eq!(err, SessionError::OutOfBounds { requested: -1, total: 2 });
        assert_eq!(session.cursor(), 0);

        assert_eq!(session.advance(Step::Next).unwrap(), 1);
        assert!(session.advance(Step::Next).is_err());
        assert_eq!(session.cursor(), 1);

        assert_eq!(session.advance(Step::Previous).unwrap(), 0);
    }

    #[test]
    fn go_to_respects_bounds() {
        let mut session = build_session(3);
        assert_eq!(session.go_to(2).unwrap(), 2);
        assert_eq!(
            session.go_to(3).unwrap_err(),
            SessionError::OutOfBounds { requested: 3, total: 3 }
        );
        assert_eq!(session.cursor(), 2);
    }

    #[test]
    fn completion_flips_on_last_answer() {
        let mut session = build_session(3);
        for i in 1..=3 {
            assert!(!session.is_complete());
            session
                .submit_answer(&QuestionId::new(format!("q{i}")), keys(&['A']))
                .unwrap();
        }
        assert!(session.is_complete());
    }

    #[test]
    fn finish_requires_all_answers() {
        let mut session = build_session(5);
        for i in 1..=3 {
            session
                .submit_answer(&QuestionId::new(format!("q{i}")), keys(&['A']))
                .unwrap();
        }
        assert_eq!(
            session.finish().unwrap_err(),
            SessionError::IncompleteSession { answered: 3, total: 5 }
        );
        assert_eq!(session.status(), SessionStatus::InProgress);
        assert!(session.timer().is_running());

        for i in 4..=5 {
            session
                .submit_answer(&QuestionId::new(format!("q{i}")), keys(&['B']))
                .unwrap();
        }
        let result = session.finish().unwrap();
        assert_eq!(result.score, 3);
        assert_eq!(result.total, 5);
        assert_eq!(session.status(), SessionStatus::Completed);
    }

    #[test]
    fn finish_is_idempotent() {
        let start = Instant::now();
        let question = build_question("q1", &['A', 'B'], &['A']);
        let mut session = QuizSession::start_at(vec![question], start).unwrap();
        session.submit_current(keys(&['A'])).unwrap();

        let first = session.finish_at(start + Duration::from_secs(75)).unwrap();
        let second = session.finish_at(start + Duration::from_secs(300)).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.elapsed_seconds, 75);
        assert_eq!(session.elapsed_seconds(), 75);
        assert!(!session.timer().is_running());
        assert_eq!(session.result(), Some(first));
    }

    #[test]
    fn restart_discards_answers() {
        let mut session = build_session(2);
        session.submit_current(keys(&['A'])).unwrap();
        session.advance(Step::Next).unwrap();

        let fresh = session.restart();
        assert_eq!(fresh.cursor(), 0);
        assert!(fresh.ledger().is_empty());
        assert_eq!(fresh.total(), 2);
        assert_eq!(session.ledger().len(), 1);
    }

    #[test]
    fn quit_summary_reports_progress() {
        let mut session = build_session(4);
        session.submit_current(keys(&['A'])).unwrap();
        session.submit_answer(&QuestionId::new("q2"), keys(&['C'])).unwrap();

        let summary = session.quit_summary();
        assert_eq!(summary.answered, 2);
        assert_eq!(summary.correct, 1);
        assert_eq!(summary.total, 4);
        assert!(session.timer().is_running());
    }

    #[test]
    fn end_to_end_two_questions() {
        let q1 = build_question("1", &['A', 'B'], &['A']);
        let q2 = build_question("2", &['A', 'B', 'C'], &['A', 'C']);
        assert!(q2.allows_multiple());
        let mut session = QuizSession::start(vec![q1, q2]).unwrap();

        assert!(session.submit_answer(&QuestionId::new("1"), keys(&['A'])).unwrap().is_correct());
        assert_eq!(session.score(), Score { correct: 1, answered: 1 });

        session.advance(Step::Next).unwrap();
        assert!(session.submit_current(keys(&['A', 'C'])).unwrap().is_correct());
        assert_eq!(session.score(), Score { correct: 2, answered: 2 });

        assert!(session.is_complete());
        let result = session.finish().unwrap();
        assert_eq!((result.score, result.total), (2, 2));
        assert_eq!(result.percent(), 100);
    }
}
