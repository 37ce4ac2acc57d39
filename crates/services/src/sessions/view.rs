use std::collections::BTreeSet;
use std::fmt;

use quiz_core::model::{OptionKey, QuestionId, QuizSession, Score};

/// Question previews in the sidebar are cut to this many characters.
pub const PREVIEW_CHARS: usize = 120;

/// Display state of one answer option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionState {
    Neutral,
    /// Part of the pending, not yet submitted, selection.
    Selected,
    /// A correct key of an answered question.
    Correct,
    /// A wrongly picked key of an answered question.
    Incorrect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionView {
    pub key: OptionKey,
    pub text: String,
    pub state: OptionState,
}

/// Outcome message for an answered question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    Correct,
    Incorrect { correct: Vec<OptionKey> },
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feedback::Correct => f.write_str("Correct!"),
            Feedback::Incorrect { correct } => {
                f.write_str("Incorrect. The correct answer(s): ")?;
                for (i, key) in correct.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}")?;
                }
                Ok(())
            }
        }
    }
}

/// Which navigation controls apply to the current question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationState {
    pub can_go_previous: bool,
    pub can_go_next: bool,
    /// Only on the last question, once every question is answered.
    pub can_finish: bool,
    /// A multi-select question with a non-empty pending selection.
    pub can_submit: bool,
}

/// Presentation-agnostic snapshot of the question under the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionView {
    /// 0-based position in the set.
    pub index: usize,
    pub total: usize,
    pub question_id: QuestionId,
    pub text: String,
    pub options: Vec<OptionView>,
    pub multi_select_hint: bool,
    pub feedback: Option<Feedback>,
    pub navigation: NavigationState,
    pub score: Score,
    pub elapsed_seconds: u64,
}

impl QuestionView {
    #[must_use]
    pub fn build(session: &QuizSession, pending: &BTreeSet<OptionKey>) -> Self {
        let question = session.current_question();
        let answer = session.current_answer();
        let index = session.cursor();
        let total = session.total();

        let options = question
            .options()
            .iter()
            .map(|option| {
                let state = match answer {
                    Some(record) if record.correct().contains(&option.key) => OptionState::Correct,
                    Some(record) if record.selected().contains(&option.key) => {
                        OptionState::Incorrect
                    }
                    Some(_) => OptionState::Neutral,
                    None if pending.contains(&option.key) => OptionState::Selected,
                    None => OptionState::Neutral,
                };
                OptionView {
                    key: option.key,
                    text: option.text.clone(),
                    state,
                }
            })
            .collect();

        let feedback = answer.map(|record| {
            if record.is_correct() {
                Feedback::Correct
            } else {
                Feedback::Incorrect {
                    correct: record.correct().iter().copied().collect(),
                }
            }
        });

        let multi_select_hint = question.allows_multiple() && answer.is_none();
        let is_last = index + 1 == total;

        Self {
            index,
            total,
            question_id: question.id().clone(),
            text: question.text().to_string(),
            options,
            multi_select_hint,
            feedback,
            navigation: NavigationState {
                can_go_previous: index > 0,
                can_go_next: !is_last,
                can_finish: is_last && session.is_complete(),
                can_submit: multi_select_hint && !pending.is_empty(),
            },
            score: session.score(),
            elapsed_seconds: session.elapsed_seconds(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerStatus {
    Unanswered,
    Correct,
    Incorrect,
}

/// One row of the question sidebar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionListItem {
    /// 1-based question number.
    pub number: usize,
    pub preview: String,
    pub status: AnswerStatus,
    pub active: bool,
}

/// Cut `text` to [`PREVIEW_CHARS`] characters, marking the cut with `...`.
#[must_use]
pub fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[must_use]
pub fn question_list(session: &QuizSession) -> Vec<QuestionListItem> {
    session
        .questions()
        .iter()
        .enumerate()
        .map(|(index, question)| {
            let status = match session.answer_for(question.id()) {
                None => AnswerStatus::Unanswered,
                Some(record) if record.is_correct() => AnswerStatus::Correct,
                Some(_) => AnswerStatus::Incorrect,
            };
            QuestionListItem {
                number: index + 1,
                preview: preview(question.text()),
                status,
                active: index == session.cursor(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{Question, QuestionOption};

    fn key(c: char) -> OptionKey {
        OptionKey::new(c).unwrap()
    }

    fn build_question(id: &str, text: &str, correct: &[char]) -> Question {
        let options = ['A', 'B', 'C']
            .iter()
            .map(|c| QuestionOption {
                key: key(*c),
                text: format!("option {c}"),
            })
            .collect();
        Question::new(
            QuestionId::new(id),
            text,
            options,
            correct.iter().map(|c| key(*c)),
            false,
        )
        .unwrap()
    }

    fn build_session() -> QuizSession {
        QuizSession::start(vec![
            build_question("q1", "Single", &['A']),
            build_question("q2", "Multi", &['A', 'C']),
        ])
        .unwrap()
    }

    #[test]
    fn fresh_question_is_neutral() {
        let session = build_session();
        let view = QuestionView::build(&session, &BTreeSet::new());

        assert_eq!(view.index, 0);
        assert!(view.options.iter().all(|o| o.state == OptionState::Neutral));
        assert!(view.feedback.is_none());
        assert!(!view.multi_select_hint);
        assert_eq!(
            view.navigation,
            NavigationState {
                can_go_previous: false,
                can_go_next: true,
                can_finish: false,
                can_submit: false,
            }
        );
    }

    #[test]
    fn pending_selection_is_highlighted() {
        let mut session = build_session();
        session.go_to(1).unwrap();
        let pending: BTreeSet<_> = [key('C')].into_iter().collect();
        let view = QuestionView::build(&session, &pending);

        assert!(view.multi_select_hint);
        assert!(view.navigation.can_submit);
        assert_eq!(view.options[2].state, OptionState::Selected);
        assert_eq!(view.options[0].state, OptionState::Neutral);
    }

    #[test]
    fn answered_question_shows_marks_and_feedback() {
        let mut session = build_session();
        session.go_to(1).unwrap();
        session
            .submit_current([key('A'), key('B')].into_iter().collect())
            .unwrap();
        let view = QuestionView::build(&session, &BTreeSet::new());

        let states: Vec<_> = view.options.iter().map(|o| o.state).collect();
        assert_eq!(
            states,
            vec![
                OptionState::Correct,
                OptionState::Incorrect,
                OptionState::Correct
            ]
        );
        let feedback = view.feedback.unwrap();
        assert_eq!(
            feedback.to_string(),
            "Incorrect. The correct answer(s): A, C"
        );
        assert!(!view.multi_select_hint);
        assert!(!view.navigation.can_finish);
        assert_eq!(view.score, Score { correct: 0, answered: 1 });
    }

    #[test]
    fn finish_offered_on_last_question_when_complete() {
        let mut session = build_session();
        session.submit_current([key('A')].into_iter().collect()).unwrap();
        let first = QuestionView::build(&session, &BTreeSet::new());
        assert_eq!(first.feedback, Some(Feedback::Correct));
        assert_eq!(Feedback::Correct.to_string(), "Correct!");

        session.go_to(1).unwrap();
        session
            .submit_current([key('A'), key('C')].into_iter().collect())
            .unwrap();
        let last = QuestionView::build(&session, &BTreeSet::new());
        assert!(last.navigation.can_finish);
        assert!(!last.navigation.can_go_next);
        assert!(last.navigation.can_go_previous);
    }

    #[test]
    fn sidebar_tracks_status_and_cursor() {
        let mut session = build_session();
        session.submit_current([key('B')].into_iter().collect()).unwrap();
        session.go_to(1).unwrap();

        let items = question_list(&session);
        assert_eq!(items[0].status, AnswerStatus::Incorrect);
        assert!(!items[0].active);
        assert_eq!(items[1].number, 2);
        assert_eq!(items[1].status, AnswerStatus::Unanswered);
        assert!(items[1].active);
    }

    #[test]
    fn preview_truncates_long_text() {
        let long = "é".repeat(PREVIEW_CHARS + 5);
        let cut = preview(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), PREVIEW_CHARS + 3);

        let exact = "x".repeat(PREVIEW_CHARS);
        assert_eq!(preview(&exact), exact);
    }
}
