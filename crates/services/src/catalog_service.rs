use std::sync::Arc;

use quiz_core::model::SetNumber;
use storage::repository::{QuestionRepository, QuestionSetInfo};

use crate::error::CatalogError;
use crate::sessions::preview;

/// Number of questions listed when a set is expanded on the landing screen.
pub const PREVIEW_QUESTIONS: usize = 10;

/// First questions of a set, as shown before starting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetPreview {
    pub set_number: SetNumber,
    /// Truncated question texts, in set order.
    pub questions: Vec<String>,
    /// Questions not listed.
    pub more: usize,
}

/// Read-only access to the available question sets.
#[derive(Clone)]
pub struct CatalogService {
    questions: Arc<dyn QuestionRepository>,
}

impl CatalogService {
    #[must_use]
    pub fn new(questions: Arc<dyn QuestionRepository>) -> Self {
        Self { questions }
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Storage` if repository access fails.
    pub async fn list_sets(&self) -> Result<Vec<QuestionSetInfo>, CatalogError> {
        let sets = self.questions.list_sets().await?;
        Ok(sets)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::EmptySet` for a set without questions and
    /// `CatalogError::Storage` if repository access fails.
    pub async fn preview(&self, set: SetNumber) -> Result<SetPreview, CatalogError> {
        let questions = self.questions.questions_for_set(set).await?;
        if questions.is_empty() {
            return Err(CatalogError::EmptySet(set.value()));
        }
        Ok(SetPreview {
            set_number: set,
            more: questions.len().saturating_sub(PREVIEW_QUESTIONS),
            questions: questions
                .iter()
                .take(PREVIEW_QUESTIONS)
                .map(|q| preview(q.text()))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use quiz_core::model::{
        Difficulty, OptionKey, Question, QuestionEntry, QuestionId, QuestionOption,
    };
    use storage::repository::InMemoryRepository;

    fn build_entry(n: usize, set: u32) -> QuestionEntry {
        let key = OptionKey::new('A').unwrap();
        let question = Question::new(
            QuestionId::new(format!("q{n}")),
            format!("Question {n}"),
            vec![QuestionOption {
                key,
                text: "only".to_string(),
            }],
            [key],
            false,
        )
        .unwrap();
        QuestionEntry {
            question,
            category: "Storage".to_string(),
            difficulty: Difficulty::Easy,
            set_number: SetNumber::new(set),
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn preview_lists_first_questions() {
        let repo = InMemoryRepository::new();
        repo.insert_entries((1..=12).map(|n| build_entry(n, 1))).unwrap();
        let service = CatalogService::new(Arc::new(repo));

        let preview = service.preview(SetNumber::new(1)).await.unwrap();
        assert_eq!(preview.questions.len(), PREVIEW_QUESTIONS);
        assert_eq!(preview.questions[0], "Question 1");
        assert_eq!(preview.more, 2);

        let sets = service.list_sets().await.unwrap();
        assert_eq!(sets[0].question_count, 12);
    }

    #[tokio::test]
    async fn preview_of_unknown_set_fails() {
        let service = CatalogService::new(Arc::new(InMemoryRepository::new()));
        let err = service.preview(SetNumber::new(9)).await.unwrap_err();
        assert!(matches!(err, CatalogError::EmptySet(9)));
    }
}
