use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::model::ids::QuestionId;
use crate::model::question::{OptionKey, Question};

//
// ─── ANSWER RECORD ─────────────────────────────────────────────────────────────
//

/// Outcome of answering one question. Never changes once recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    question_id: QuestionId,
    selected: BTreeSet<OptionKey>,
    correct: BTreeSet<OptionKey>,
    is_correct: bool,
}

impl AnswerRecord {
    /// Grade `selected` against the question's correct answers.
    ///
    /// Callers validate `selected` first; this only compares sets.
    #[must_use]
    pub fn grade(question: &Question, selected: BTreeSet<OptionKey>) -> Self {
        let is_correct = question.is_correct_selection(&selected);
        Self {
            question_id: question.id().clone(),
            selected,
            correct: question.correct_answers().clone(),
            is_correct,
        }
    }

    #[must_use]
    pub fn question_id(&self) -> &QuestionId {
        &self.question_id
    }

    #[must_use]
    pub fn selected(&self) -> &BTreeSet<OptionKey> {
        &self.selected
    }

    #[must_use]
    pub fn correct(&self) -> &BTreeSet<OptionKey> {
        &self.correct
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.is_correct
    }

    /// Selected keys that are not correct.
    pub fn wrong_picks(&self) -> impl Iterator<Item = OptionKey> + '_ {
        self.selected.difference(&self.correct).copied()
    }
}

//
// ─── LEDGER ────────────────────────────────────────────────────────────────────
//

/// Per-session map from question id to its recorded answer.
///
/// Entries are only ever added; an id that is present keeps its first record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerLedger {
    entries: HashMap<QuestionId, AnswerRecord>,
}

impl AnswerLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &QuestionId) -> bool {
        self.entries.contains_key(id)
    }

    #[must_use]
    pub fn get(&self, id: &QuestionId) -> Option<&AnswerRecord> {
        self.entries.get(id)
    }

    /// Insert a record unless its question already has one.
    ///
    /// Returns `None` when the id is taken; the existing entry is untouched.
    pub(crate) fn insert_first(&mut self, record: AnswerRecord) -> Option<&AnswerRecord> {
        use std::collections::hash_map::Entry;

        match self.entries.entry(record.question_id.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => Some(slot.insert(record)),
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &AnswerRecord> {
        self.entries.values()
    }

    /// Answered and correct counts, recomputed from the entries.
    #[must_use]
    pub fn score(&self) -> Score {
        Score {
            correct: self.entries.values().filter(|r| r.is_correct).count(),
            answered: self.entries.len(),
        }
    }
}

//
// ─── SCORE ─────────────────────────────────────────────────────────────────────
//

/// Running score: correct answers out of answered questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Score {
    pub correct: usize,
    pub answered: usize,
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.correct, self.answered)
    }
}

/// Rounded percentage of `part` in `whole`; zero when `whole` is zero.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as u32
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
