use quiz_core::model::{OptionKey, Participant, QuestionId, SetNumber, UserId};
use storage::repository::{
    AttemptRepository, InMemoryRepository, NewAttempt, QuestionRepository, Storage,
};
use storage::wire::parse_questions_json;

const QNA: &str = r#"[
    {
        "question_text": "Which service ingests streaming data?",
        "options": {"A": "Kinesis Data Streams", "B": "S3 Glacier", "C": "Athena"},
        "correct_answer": "A",
        "category": "Ingestion"
    },
    {
        "question_text": "Which two services are serverless query engines?",
        "options": {"D": "Redshift Spectrum", "A": "Athena", "B": "EMR", "C": "EC2"},
        "correct_answer": ["A", "D"],
        "question_set": 2
    }
]"#;

fn key(c: char) -> OptionKey {
    OptionKey::new(c).unwrap()
}

#[tokio::test]
async fn offline_file_feeds_repositories() {
    let repo = InMemoryRepository::new();
    repo.insert_entries(parse_questions_json(QNA).unwrap())
        .unwrap();
    let storage = Storage::in_memory(repo.clone());

    let sets = storage.questions.list_sets().await.unwrap();
    let numbers: Vec<u32> = sets.iter().map(|s| s.set_number.value()).collect();
    assert_eq!(numbers, vec![1, 2]);

    let questions = storage
        .questions
        .questions_for_set(SetNumber::new(2))
        .await
        .unwrap();
    assert_eq!(questions.len(), 1);
    let multi = &questions[0];
    assert_eq!(multi.id(), &QuestionId::new("q2"));
    assert!(multi.allows_multiple());
    let order: Vec<char> = multi.option_keys().map(OptionKey::as_char).collect();
    assert_eq!(order, vec!['D', 'A', 'B', 'C']);

    let attempt = storage
        .attempts
        .start_attempt(&NewAttempt {
            participant: Participant::new(UserId::new("u1"), "Ada"),
            set_number: SetNumber::new(2),
        })
        .await
        .unwrap();
    let ack = storage
        .attempts
        .record_answer(&attempt, multi.id(), &[key('D'), key('A')])
        .await
        .unwrap();
    assert!(ack.is_correct);
    assert_eq!(ack.correct_answers, vec![key('A'), key('D')]);

    let done = storage.attempts.complete_attempt(&attempt).await.unwrap();
    assert_eq!(done.score_percent(), 100);
    assert_eq!(repo.attempt(&attempt).unwrap(), done);
}

#[test]
fn malformed_file_is_rejected() {
    assert!(parse_questions_json("{not json").is_err());
    assert!(parse_questions_json(r#"[{"question_text": "Q", "options": {"A": "a"}}]"#).is_err());
}
