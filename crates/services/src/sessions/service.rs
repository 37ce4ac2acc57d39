use std::collections::BTreeSet;

use quiz_core::model::{
    AttemptId, AttemptRecord, OptionKey, QuitSummary, QuizResult, QuizSession, SessionError,
    SetNumber, Step,
};
use tokio::task::JoinHandle;

use super::progress::SessionProgress;
use super::view::{QuestionListItem, QuestionView, question_list};

//
// ─── OUTCOME ───────────────────────────────────────────────────────────────────
//

/// Result of finishing a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizOutcome {
    /// Locally computed result; authoritative.
    pub result: QuizResult,
    /// Backend view of the attempt, when it could be completed remotely.
    pub attempt: Option<AttemptRecord>,
}

//
// ─── RUN ───────────────────────────────────────────────────────────────────────
//

/// One user's pass through a question set.
///
/// Wraps the core `QuizSession` with the pieces only an interactive client
/// needs: the pending multi-select selection, the backend attempt and the
/// in-flight answer replications.
#[derive(Debug)]
pub struct QuizRun {
    set_number: SetNumber,
    session: QuizSession,
    attempt_id: Option<AttemptId>,
    pending: BTreeSet<OptionKey>,
    in_flight: Vec<JoinHandle<()>>,
    outcome: Option<QuizOutcome>,
}

impl QuizRun {
    pub(crate) fn new(
        set_number: SetNumber,
        session: QuizSession,
        attempt_id: Option<AttemptId>,
    ) -> Self {
        Self {
            set_number,
            session,
            attempt_id,
            pending: BTreeSet::new(),
            in_flight: Vec::new(),
            outcome: None,
        }
    }

    #[must_use]
    pub fn set_number(&self) -> SetNumber {
        self.set_number
    }

    #[must_use]
    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    #[must_use]
    pub fn attempt_id(&self) -> Option<&AttemptId> {
        self.attempt_id.as_ref()
    }

    #[must_use]
    pub fn pending(&self) -> &BTreeSet<OptionKey> {
        &self.pending
    }

    #[must_use]
    pub fn outcome(&self) -> Option<&QuizOutcome> {
        self.outcome.as_ref()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let score = self.session.score();
        let total = self.session.total();
        SessionProgress {
            total,
            answered: score.answered,
            correct: score.correct,
            remaining: total.saturating_sub(score.answered),
            is_complete: self.session.is_complete(),
        }
    }

    #[must_use]
    pub fn view(&self) -> QuestionView {
        QuestionView::build(&self.session, &self.pending)
    }

    #[must_use]
    pub fn question_list(&self) -> Vec<QuestionListItem> {
        question_list(&self.session)
    }

    #[must_use]
    pub fn quit_summary(&self) -> QuitSummary {
        self.session.quit_summary()
    }

    /// Toggle `key` in the pending selection of the current question.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyAnswered` for an answered question and `UnknownKey`
    /// for a key the question does not offer.
    pub fn toggle_pending(&mut self, key: OptionKey) -> Result<&BTreeSet<OptionKey>, SessionError> {
        self.toggle_many([key])
    }

    /// Toggle several keys at once. Every key is checked before any toggle,
    /// so on error the pending selection is unchanged.
    ///
    /// # Errors
    ///
    /// Same as [`QuizRun::toggle_pending`].
    pub fn toggle_many(
        &mut self,
        keys: impl IntoIterator<Item = OptionKey>,
    ) -> Result<&BTreeSet<OptionKey>, SessionError> {
        let keys: Vec<OptionKey> = keys.into_iter().collect();
        let question = self.session.current_question();
        if self.session.current_answer().is_some() {
            return Err(SessionError::AlreadyAnswered(question.id().clone()));
        }
        if let Some(key) = keys.iter().copied().find(|key| !question.has_option(*key)) {
            return Err(SessionError::UnknownKey {
                question_id: question.id().clone(),
                key,
            });
        }
        for key in keys {
            if !self.pending.remove(&key) {
                self.pending.insert(key);
            }
        }
        Ok(&self.pending)
    }

    /// Move one step; the pending selection is dropped.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` at either end of the set.
    pub fn advance(&mut self, step: Step) -> Result<usize, SessionError> {
        let index = self.session.advance(step)?;
        self.pending.clear();
        Ok(index)
    }

    /// Jump to `index`; the pending selection is dropped.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` for an index past the end.
    pub fn go_to(&mut self, index: usize) -> Result<usize, SessionError> {
        let index = self.session.go_to(index)?;
        self.pending.clear();
        Ok(index)
    }

    pub(crate) fn session_mut(&mut self) -> &mut QuizSession {
        &mut self.session
    }

    pub(crate) fn take_pending(&mut self) -> BTreeSet<OptionKey> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn restore_pending(&mut self, pending: BTreeSet<OptionKey>) {
        self.pending = pending;
    }

    pub(crate) fn track(&mut self, handle: JoinHandle<()>) {
        self.in_flight.retain(|h| !h.is_finished());
        self.in_flight.push(handle);
    }

    pub(crate) fn drain_in_flight(&mut self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut self.in_flight)
    }

    pub(crate) fn set_outcome(&mut self, outcome: QuizOutcome) {
        self.outcome = Some(outcome);
    }

    /// Replace the session with a fresh one on the same questions.
    ///
    /// Replications still in flight are detached; their results are discarded.
    pub(crate) fn reset(&mut self, attempt_id: Option<AttemptId>) {
        self.session = self.session.restart();
        self.attempt_id = attempt_id;
        self.pending.clear();
        self.in_flight.clear();
        self.outcome = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{Question, QuestionId, QuestionOption};

    fn key(c: char) -> OptionKey {
        OptionKey::new(c).unwrap()
    }

    fn build_run() -> QuizRun {
        let question = |id: &str, correct: &[char]| {
            Question::new(
                QuestionId::new(id),
                format!("Question {id}"),
                ['A', 'B', 'C']
                    .iter()
                    .map(|c| QuestionOption {
                        key: key(*c),
                        text: c.to_string(),
                    })
                    .collect(),
                correct.iter().map(|c| key(*c)),
                false,
            )
            .unwrap()
        };
        let session =
            QuizSession::start(vec![question("q1", &['A', 'B']), question("q2", &['C'])])
                .unwrap();
        QuizRun::new(SetNumber::new(1), session, None)
    }

    #[test]
    fn toggle_adds_and_removes() {
        let mut run = build_run();
        run.toggle_pending(key('A')).unwrap();
        run.toggle_pending(key('B')).unwrap();
        let pending = run.toggle_pending(key('A')).unwrap();
        assert_eq!(pending.iter().copied().collect::<Vec<_>>(), vec![key('B')]);
    }

    #[test]
    fn toggle_rejects_unknown_key() {
        let mut run = build_run();
        let err = run.toggle_pending(key('Z')).unwrap_err();
        assert!(matches!(err, SessionError::UnknownKey { .. }));
        assert!(run.pending().is_empty());
    }

    #[test]
    fn toggle_many_is_all_or_nothing() {
        let mut run = build_run();
        run.toggle_pending(key('C')).unwrap();

        let err = run.toggle_many([key('A'), key('E')]).unwrap_err();
        assert!(matches!(err, SessionError::UnknownKey { key: k, .. } if k == key('E')));
        assert_eq!(run.pending().iter().copied().collect::<Vec<_>>(), vec![key('C')]);

        let pending = run.toggle_many([key('A'), key('C')]).unwrap();
        assert_eq!(pending.iter().copied().collect::<Vec<_>>(), vec![key('A')]);
    }

    #[test]
    fn moving_clears_pending() {
        let mut run = build_run();
        run.toggle_pending(key('A')).unwrap();
        run.advance(Step::Next).unwrap();
        assert!(run.pending().is_empty());

        run.toggle_pending(key('C')).unwrap();
        run.go_to(0).unwrap();
        assert!(run.pending().is_empty());
    }

    #[test]
    fn failed_move_keeps_pending() {
        let mut run = build_run();
        run.toggle_pending(key('A')).unwrap();
        assert!(run.advance(Step::Previous).is_err());
        assert_eq!(run.pending().len(), 1);
    }

    #[test]
    fn progress_counts_answers() {
        let mut run = build_run();
        run.session_mut()
            .submit_current([key('A'), key('B')].into_iter().collect())
            .unwrap();
        let progress = run.progress();
        assert_eq!(
            progress,
            SessionProgress {
                total: 2,
                answered: 1,
                correct: 1,
                remaining: 1,
                is_complete: false,
            }
        );
    }
}
