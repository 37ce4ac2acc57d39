use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{QuestionId, SetNumber};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("question must have at least one option")]
    NoOptions,

    #[error("option key must be a single uppercase letter, got {raw:?}")]
    InvalidOptionKey { raw: String },

    #[error("option {0} appears more than once")]
    DuplicateOptionKey(OptionKey),

    #[error("question must have at least one correct answer")]
    NoCorrectAnswers,

    #[error("correct answer {0} is not one of the options")]
    UnknownCorrectAnswer(OptionKey),

    #[error("unknown difficulty: {raw:?}")]
    UnknownDifficulty { raw: String },
}

//
// ─── OPTION KEY ────────────────────────────────────────────────────────────────
//

/// Label of an answer option: a single uppercase ASCII letter (`A`..=`Z`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OptionKey(char);

impl OptionKey {
    /// Option keys offered by a blank question form.
    pub const DEFAULTS: [OptionKey; 4] = [
        OptionKey('A'),
        OptionKey('B'),
        OptionKey('C'),
        OptionKey('D'),
    ];

    /// # Errors
    ///
    /// Returns `QuestionError::InvalidOptionKey` unless `c` is `A`..=`Z`.
    pub fn new(c: char) -> Result<Self, QuestionError> {
        if c.is_ascii_uppercase() {
            Ok(Self(c))
        } else {
            Err(QuestionError::InvalidOptionKey { raw: c.to_string() })
        }
    }

    #[must_use]
    pub fn as_char(self) -> char {
        self.0
    }

    /// The key following this one alphabetically, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        if self.0 == 'Z' {
            return None;
        }
        char::from_u32(self.0 as u32 + 1).map(Self)
    }
}

impl FromStr for OptionKey {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::new(c),
            _ => Err(QuestionError::InvalidOptionKey { raw: s.to_string() }),
        }
    }
}

impl TryFrom<String> for OptionKey {
    type Error = QuestionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OptionKey> for String {
    fn from(key: OptionKey) -> Self {
        key.0.to_string()
    }
}

impl fmt::Debug for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OptionKey({})", self.0)
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returns the key a newly added option row should use.
///
/// Starts at `A` for an empty form and continues after the last key.
/// Returns `None` once `Z` has been used.
#[must_use]
pub fn next_option_key(existing: &[OptionKey]) -> Option<OptionKey> {
    match existing.last() {
        None => Some(OptionKey('A')),
        Some(last) => last.next(),
    }
}

/// Parse a comma/space separated list of keys such as `"A, c"`.
///
/// Input is upper-cased before validation.
///
/// # Errors
///
/// Returns `QuestionError::InvalidOptionKey` for any malformed token.
pub fn parse_key_list(raw: &str) -> Result<BTreeSet<OptionKey>, QuestionError> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_ascii_uppercase().parse())
        .collect()
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionOption {
    pub key: OptionKey,
    pub text: String,
}

/// A multiple-choice question as presented during a session.
///
/// Options keep their insertion order, which is the display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    text: String,
    options: Vec<QuestionOption>,
    correct_answers: BTreeSet<OptionKey>,
    allows_multiple: bool,
}

impl Question {
    /// Build a question, checking option and answer consistency.
    ///
    /// `multiple_flag` marks a question as multi-select even when it has a
    /// single correct key; more than one correct key always implies it.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when there are no options, keys repeat,
    /// there are no correct answers, or a correct answer is not an option.
    pub fn new(
        id: QuestionId,
        text: impl Into<String>,
        options: Vec<QuestionOption>,
        correct_answers: impl IntoIterator<Item = OptionKey>,
        multiple_flag: bool,
    ) -> Result<Self, QuestionError> {
        if options.is_empty() {
            return Err(QuestionError::NoOptions);
        }
        let mut seen = BTreeSet::new();
        for option in &options {
            if !seen.insert(option.key) {
                return Err(QuestionError::DuplicateOptionKey(option.key));
            }
        }

        let correct_answers: BTreeSet<OptionKey> = correct_answers.into_iter().collect();
        if correct_answers.is_empty() {
            return Err(QuestionError::NoCorrectAnswers);
        }
        if let Some(unknown) = correct_answers.iter().find(|key| !seen.contains(*key)) {
            return Err(QuestionError::UnknownCorrectAnswer(*unknown));
        }

        let allows_multiple = multiple_flag || correct_answers.len() > 1;
        Ok(Self {
            id,
            text: text.into(),
            options,
            correct_answers,
            allows_multiple,
        })
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[QuestionOption] {
        &self.options
    }

    #[must_use]
    pub fn correct_answers(&self) -> &BTreeSet<OptionKey> {
        &self.correct_answers
    }

    #[must_use]
    pub fn allows_multiple(&self) -> bool {
        self.allows_multiple
    }

    #[must_use]
    pub fn has_option(&self, key: OptionKey) -> bool {
        self.options.iter().any(|option| option.key == key)
    }

    pub fn option_keys(&self) -> impl Iterator<Item = OptionKey> + '_ {
        self.options.iter().map(|option| option.key)
    }

    /// Exact set equality: every correct key selected and nothing else.
    #[must_use]
    pub fn is_correct_selection(&self, selected: &BTreeSet<OptionKey>) -> bool {
        *selected == self.correct_answers
    }
}

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(QuestionError::UnknownDifficulty { raw: s.to_string() }),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── MANAGED QUESTIONS ─────────────────────────────────────────────────────────
//

/// Category assigned when an author leaves it blank.
pub const DEFAULT_CATEGORY: &str = "AWS Data Engineering";

/// A question together with the metadata the admin surface manages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionEntry {
    pub question: Question,
    pub category: String,
    pub difficulty: Difficulty,
    pub set_number: SetNumber,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// One row of the question form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionDraft {
    pub key: OptionKey,
    pub text: String,
    pub correct: bool,
}

impl OptionDraft {
    #[must_use]
    pub fn new(key: OptionKey, text: impl Into<String>, correct: bool) -> Self {
        Self {
            key,
            text: text.into(),
            correct,
        }
    }
}

/// Unvalidated question as typed into the admin form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub text: String,
    pub options: Vec<OptionDraft>,
    pub category: Option<String>,
    pub difficulty: Difficulty,
    pub set_number: SetNumber,
}

impl QuestionDraft {
    /// Validate the form.
    ///
    /// Rows with blank text are dropped before checking, so a correct mark on
    /// an empty row does not count.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` for empty text, no remaining options, repeated
    /// keys or no correct answer among the remaining options.
    pub fn validate(self) -> Result<ValidatedQuestion, QuestionError> {
        let text = self.text.trim().to_string();
        if text.is_empty() {
            return Err(QuestionError::EmptyText);
        }

        let mut options = Vec::with_capacity(self.options.len());
        let mut correct_answers = BTreeSet::new();
        for draft in self.options {
            let option_text = draft.text.trim();
            if option_text.is_empty() {
                continue;
            }
            if options.iter().any(|o: &QuestionOption| o.key == draft.key) {
                return Err(QuestionError::DuplicateOptionKey(draft.key));
            }
            if draft.correct {
                correct_answers.insert(draft.key);
            }
            options.push(QuestionOption {
                key: draft.key,
                text: option_text.to_string(),
            });
        }

        if options.is_empty() {
            return Err(QuestionError::NoOptions);
        }
        if correct_answers.is_empty() {
            return Err(QuestionError::NoCorrectAnswers);
        }

        let category = self
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

        Ok(ValidatedQuestion {
            text,
            options,
            correct_answers,
            category,
            difficulty: self.difficulty,
            set_number: self.set_number,
        })
    }
}

/// A draft that passed validation and can be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuestion {
    pub text: String,
    pub options: Vec<QuestionOption>,
    pub correct_answers: BTreeSet<OptionKey>,
    pub category: String,
    pub difficulty: Difficulty,
    pub set_number: SetNumber,
}

impl ValidatedQuestion {
    /// Multi-select is derived from the number of correct answers.
    #[must_use]
    pub fn allows_multiple(&self) -> bool {
        self.correct_answers.len() > 1
    }

    /// # Errors
    ///
    /// Cannot fail for a validated draft; the `Result` comes from
    /// `Question::new`.
    pub fn assign_id(
        self,
        id: QuestionId,
        created_at: DateTime<Utc>,
    ) -> Result<QuestionEntry, QuestionError> {
        let question = Question::new(id, self.text, self.options, self.correct_answers, false)?;
        Ok(QuestionEntry {
            question,
            category: self.category,
            difficulty: self.difficulty,
            set_number: self.set_number,
            created_at: Some(created_at),
            updated_at: None,
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
