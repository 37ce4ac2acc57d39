//! JSON shapes exchanged with the quiz backend, plus the offline question file
//! format, and their mapping onto domain types.

use chrono::{DateTime, NaiveDateTime, Utc};
use quiz_core::model::{
    AnswerAck, AttemptAnswer, AttemptId, AttemptRecord, AttemptStatus, Difficulty, OptionKey,
    Question, QuestionEntry, QuestionId, QuestionOption, SetNumber, UserId, ValidatedQuestion,
    DEFAULT_CATEGORY,
};
use serde::{Deserialize, Serialize};

use crate::repository::{QuestionPage, QuestionSetInfo, StorageError};

/// Offline files without explicit sets are split into sets of this size.
pub const QUESTIONS_PER_SET: usize = 50;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Parse a backend timestamp.
///
/// Accepts RFC 3339, naive ISO 8601 (read as UTC) and RFC 2822 dates.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
        .or_else(|| {
            DateTime::parse_from_rfc2822(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        })
}

fn timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(parse_timestamp)
}

/// Set numbers arrive as numbers, or as numeric strings from form posts.
fn deserialize_set_number<'de, D: serde::Deserializer<'de>>(
    d: D,
) -> Result<Option<u32>, D::Error> {
    struct Vis;
    impl<'de> serde::de::Visitor<'de> for Vis {
        type Value = Option<u32>;
        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("set number or numeric string")
        }
        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
        fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
        fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
            u32::try_from(v).map(Some).map_err(E::custom)
        }
        fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
            u32::try_from(v).map(Some).map_err(E::custom)
        }
        fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
            v.trim().parse().map(Some).map_err(E::custom)
        }
    }
    d.deserialize_any(Vis)
}

/// `options` is a JSON object whose key order is the display order.
pub(crate) mod ordered_options {
    use quiz_core::model::{OptionKey, QuestionOption};
    use serde::de::{self, MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};
    use std::fmt;

    struct OptionsVisitor;

    impl<'de> Visitor<'de> for OptionsVisitor {
        type Value = Vec<QuestionOption>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of option keys to option text")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut options = Vec::with_capacity(map.size_hint().unwrap_or(4));
            while let Some((key, text)) = map.next_entry::<String, String>()? {
                let key = key.parse::<OptionKey>().map_err(de::Error::custom)?;
                options.push(QuestionOption { key, text });
            }
            Ok(options)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<QuestionOption>, D::Error> {
        d.deserialize_map(OptionsVisitor)
    }

    pub fn serialize<S: Serializer>(options: &[QuestionOption], s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(options.len()))?;
        for option in options {
            map.serialize_entry(&option.key, &option.text)?;
        }
        map.end()
    }
}

//
// ─── QUESTIONS ─────────────────────────────────────────────────────────────────
//

/// Either a single key or a list; the legacy file format used `correct_answer`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(OptionKey),
    Many(Vec<OptionKey>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<OptionKey> {
        match self {
            Self::One(key) => vec![key],
            Self::Many(keys) => keys,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuestionWire {
    #[serde(rename = "_id", default)]
    object_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    question_text: String,
    #[serde(with = "ordered_options")]
    options: Vec<QuestionOption>,
    #[serde(default)]
    correct_answers: Option<Vec<OptionKey>>,
    #[serde(default)]
    correct_answer: Option<OneOrMany>,
    #[serde(default)]
    has_multiple_answers: bool,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(default, deserialize_with = "deserialize_set_number")]
    question_set: Option<u32>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

impl QuestionWire {
    fn resolved_id(&self) -> Option<QuestionId> {
        self.id
            .as_deref()
            .or(self.object_id.as_deref())
            .map(QuestionId::new)
    }

    pub(crate) fn into_entry(
        self,
        fallback_id: Option<QuestionId>,
        fallback_set: SetNumber,
    ) -> Result<QuestionEntry, StorageError> {
        let id = self
            .resolved_id()
            .or(fallback_id)
            .ok_or_else(|| StorageError::Serialization("question without id".into()))?;
        let difficulty = match self.difficulty.as_deref() {
            Some(raw) => raw.parse::<Difficulty>()?,
            None => Difficulty::default(),
        };
        let correct = match (self.correct_answers, self.correct_answer) {
            (Some(keys), _) => keys,
            (None, Some(legacy)) => legacy.into_vec(),
            (None, None) => Vec::new(),
        };
        let question = Question::new(
            id,
            self.question_text,
            self.options,
            correct,
            self.has_multiple_answers,
        )?;

        Ok(QuestionEntry {
            question,
            category: self
                .category
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            difficulty,
            set_number: self.question_set.map_or(fallback_set, SetNumber::new),
            created_at: timestamp(self.created_at.as_deref()),
            updated_at: timestamp(self.updated_at.as_deref()),
        })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionBody<'a> {
    question_text: &'a str,
    #[serde(serialize_with = "ordered_options::serialize")]
    options: &'a [QuestionOption],
    correct_answers: Vec<OptionKey>,
    category: &'a str,
    difficulty: &'a str,
    question_set: u32,
}

impl<'a> From<&'a ValidatedQuestion> for QuestionBody<'a> {
    fn from(q: &'a ValidatedQuestion) -> Self {
        Self {
            question_text: &q.text,
            options: &q.options,
            correct_answers: q.correct_answers.iter().copied().collect(),
            category: &q.category,
            difficulty: q.difficulty.as_str(),
            question_set: q.set_number.value(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SetInfoWire {
    set_number: u32,
    question_count: u32,
}

impl From<SetInfoWire> for QuestionSetInfo {
    fn from(wire: SetInfoWire) -> Self {
        Self {
            set_number: SetNumber::new(wire.set_number),
            question_count: wire.question_count,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuestionPageWire {
    questions: Vec<QuestionWire>,
    current_page: u32,
    total_pages: u32,
    total_questions: u32,
}

impl QuestionPageWire {
    pub(crate) fn into_page(self) -> Result<QuestionPage, StorageError> {
        let questions = self
            .questions
            .into_iter()
            .map(|q| q.into_entry(None, SetNumber::new(0)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(QuestionPage {
            questions,
            current_page: self.current_page,
            total_pages: self.total_pages,
            total_questions: self.total_questions,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedWire {
    pub(crate) id: String,
}

/// Parse an offline question file.
///
/// Questions without an id get a positional one (`q1`, `q2`, ...); questions
/// without `question_set` are grouped into sets of [`QUESTIONS_PER_SET`].
///
/// # Errors
///
/// Returns `StorageError::Serialization` for malformed JSON and
/// `StorageError::InvalidRecord` for inconsistent questions.
pub fn parse_questions_json(raw: &str) -> Result<Vec<QuestionEntry>, StorageError> {
    let wires: Vec<QuestionWire> = serde_json::from_str(raw).map_err(ser)?;
    wires
        .into_iter()
        .enumerate()
        .map(|(index, wire)| {
            let set = u32::try_from(index / QUESTIONS_PER_SET + 1).map_err(ser)?;
            wire.into_entry(
                Some(QuestionId::new(format!("q{}", index + 1))),
                SetNumber::new(set),
            )
        })
        .collect()
}

//
// ─── ATTEMPTS ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StartAttemptBody<'a> {
    pub(crate) user_id: &'a str,
    pub(crate) user_name: &'a str,
    pub(crate) question_set_number: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnswerBody<'a> {
    pub(crate) question_id: &'a str,
    pub(crate) selected_answers: &'a [OptionKey],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnswerAckWire {
    is_correct: bool,
    #[serde(default)]
    correct_answers: Vec<OptionKey>,
    current_score: u32,
    total_answered: u32,
}

impl From<AnswerAckWire> for AnswerAck {
    fn from(wire: AnswerAckWire) -> Self {
        Self {
            is_correct: wire.is_correct,
            correct_answers: wire.correct_answers,
            current_score: wire.current_score,
            total_answered: wire.total_answered,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AttemptAnswerWire {
    question_id: String,
    #[serde(default)]
    selected_answers: Vec<OptionKey>,
    #[serde(default)]
    is_correct: bool,
    #[serde(default)]
    answered_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AttemptWire {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    user_name: String,
    #[serde(default, deserialize_with = "deserialize_set_number")]
    question_set_number: Option<u32>,
    #[serde(default)]
    answers: Vec<AttemptAnswerWire>,
    #[serde(default)]
    score: u32,
    #[serde(default)]
    total_questions: u32,
    #[serde(default)]
    status: Option<AttemptStatus>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    completed_at: Option<String>,
}

impl From<AttemptWire> for AttemptRecord {
    fn from(wire: AttemptWire) -> Self {
        Self {
            id: wire.id.map(AttemptId::new),
            user_id: UserId::new(wire.user_id),
            user_name: wire.user_name,
            set_number: SetNumber::new(wire.question_set_number.unwrap_or_default()),
            answers: wire
                .answers
                .into_iter()
                .map(|a| AttemptAnswer {
                    question_id: QuestionId::new(a.question_id),
                    selected: a.selected_answers,
                    is_correct: a.is_correct,
                    answered_at: timestamp(a.answered_at.as_deref()),
                })
                .collect(),
            score: wire.score,
            total_questions: wire.total_questions,
            status: wire.status.unwrap_or(AttemptStatus::InProgress),
            created_at: timestamp(wire.created_at.as_deref()),
            completed_at: timestamp(wire.completed_at.as_deref()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProgressWire {
    #[serde(default)]
    pub(crate) attempts: Vec<AttemptWire>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use quiz_core::model::QuestionError;

    fn key(c: char) -> OptionKey {
        OptionKey::new(c).unwrap()
    }

    #[test]
    fn timestamps_in_backend_formats() {
        let naive = parse_timestamp("2026-10-17T09:30:15.123456").unwrap();
        assert_eq!((naive.hour(), naive.minute(), naive.second()), (9, 30, 15));

        let rfc3339 = parse_timestamp("2026-10-17T09:30:15+02:00").unwrap();
        assert_eq!(rfc3339.hour(), 7);

        let http_date = parse_timestamp("Sat, 17 Oct 2026 09:30:15 GMT").unwrap();
        assert_eq!(http_date.day(), 17);

        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn question_keeps_option_order_and_prefers_id() {
        let raw = r#"{
            "_id": "abc", "id": "abc",
            "question_text": "Which?",
            "options": {"C": "third", "A": "first", "B": "second"},
            "correct_answers": ["A"],
            "has_multiple_answers": false,
            "question_set": 2,
            "created_at": "2026-10-17T09:30:15"
        }"#;
        let wire: QuestionWire = serde_json::from_str(raw).unwrap();
        let entry = wire.into_entry(None, SetNumber::new(0)).unwrap();

        let keys: Vec<char> = entry.question.option_keys().map(OptionKey::as_char).collect();
        assert_eq!(keys, vec!['C', 'A', 'B']);
        assert_eq!(entry.question.id(), &QuestionId::new("abc"));
        assert_eq!(entry.set_number, SetNumber::new(2));
        assert_eq!(entry.category, DEFAULT_CATEGORY);
        assert_eq!(entry.difficulty, Difficulty::Medium);
        assert!(entry.created_at.is_some());
    }

    #[test]
    fn question_without_correct_answers_is_rejected() {
        let raw = r#"{"_id": "x", "question_text": "Q", "options": {"A": "a"}}"#;
        let wire: QuestionWire = serde_json::from_str(raw).unwrap();
        let err = wire.into_entry(None, SetNumber::new(1)).unwrap_err();
        assert!(matches!(
            err,
            StorageError::InvalidRecord(QuestionError::NoCorrectAnswers)
        ));
    }

    #[test]
    fn bad_option_key_fails_to_decode() {
        let raw = r#"{"_id": "x", "question_text": "Q", "options": {"1": "a"}}"#;
        assert!(serde_json::from_str::<QuestionWire>(raw).is_err());
    }

    #[test]
    fn question_body_serializes_options_in_order() {
        let draft = ValidatedQuestion {
            text: "Pick".to_string(),
            options: vec![
                QuestionOption {
                    key: key('B'),
                    text: "bee".to_string(),
                },
                QuestionOption {
                    key: key('A'),
                    text: "ay".to_string(),
                },
            ],
            correct_answers: [key('A')].into_iter().collect(),
            category: "Streaming".to_string(),
            difficulty: Difficulty::Hard,
            set_number: SetNumber::new(4),
        };
        let json = serde_json::to_string(&QuestionBody::from(&draft)).unwrap();
        assert_eq!(
            json,
            r#"{"question_text":"Pick","options":{"B":"bee","A":"ay"},"correct_answers":["A"],"category":"Streaming","difficulty":"Hard","question_set":4}"#
        );
    }

    #[test]
    fn offline_file_assigns_ids_and_sets() {
        let one = r#"{"question_text": "Q", "options": {"A": "a", "B": "b"}, "correct_answer": "B"}"#;
        let multi = r#"{"question_text": "M", "options": {"A": "a", "B": "b"}, "correct_answer": ["A", "B"], "difficulty": "hard"}"#;
        let mut items = vec![one; QUESTIONS_PER_SET];
        items.push(multi);
        let raw = format!("[{}]", items.join(","));

        let entries = parse_questions_json(&raw).unwrap();
        assert_eq!(entries.len(), QUESTIONS_PER_SET + 1);
        assert_eq!(entries[0].question.id(), &QuestionId::new("q1"));
        assert_eq!(entries[0].set_number, SetNumber::new(1));

        let last = &entries[QUESTIONS_PER_SET];
        assert_eq!(last.set_number, SetNumber::new(2));
        assert!(last.question.allows_multiple());
        assert_eq!(last.difficulty, Difficulty::Hard);
    }

    #[test]
    fn attempt_from_progress_listing() {
        let raw = r#"{"attempts": [{
            "user_id": "u1", "user_name": "Ada", "question_set_number": 3,
            "answers": [{"question_id": "q1", "selected_answers": ["A"], "is_correct": true,
                         "answered_at": "Sat, 17 Oct 2026 09:30:15 GMT"}],
            "score": 1, "total_questions": 1, "status": "completed",
            "created_at": "2026-10-17T09:00:00", "completed_at": "2026-10-17T09:31:00"
        }]}"#;
        let progress: ProgressWire = serde_json::from_str(raw).unwrap();
        let attempt: AttemptRecord = progress.attempts.into_iter().next().unwrap().into();

        assert_eq!(attempt.id, None);
        assert!(attempt.is_completed());
        assert_eq!(attempt.set_number, SetNumber::new(3));
        assert_eq!(attempt.answers[0].selected, vec![key('A')]);
        assert!(attempt.answers[0].answered_at.is_some());
        assert_eq!(attempt.score_percent(), 100);
    }

    #[test]
    fn ack_and_request_bodies_use_camel_case() {
        let ack: AnswerAckWire = serde_json::from_str(
            r#"{"isCorrect": false, "correctAnswers": ["A", "C"], "currentScore": 0, "totalAnswered": 1}"#,
        )
        .unwrap();
        let ack = AnswerAck::from(ack);
        assert_eq!(ack.correct_answers, vec![key('A'), key('C')]);

        let body = AnswerBody {
            question_id: "q1",
            selected_answers: &[key('A')],
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"questionId":"q1","selectedAnswers":["A"]}"#
        );
    }
}
