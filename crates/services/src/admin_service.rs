use std::sync::Arc;

use quiz_core::model::{
    OptionDraft, OptionKey, QuestionDraft, QuestionEntry, QuestionId, SetNumber, next_option_key,
};
use storage::repository::{PageRequest, QuestionPage, QuestionRepository, StorageError};
use tracing::info;

use crate::error::AdminError;

/// Question management for administrators.
#[derive(Clone)]
pub struct QuestionAdminService {
    questions: Arc<dyn QuestionRepository>,
    page_size: u32,
}

impl QuestionAdminService {
    #[must_use]
    pub fn new(questions: Arc<dyn QuestionRepository>) -> Self {
        Self {
            questions,
            page_size: PageRequest::DEFAULT_LIMIT,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// List one page of questions; pages start at 1.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Storage` if repository access fails.
    pub async fn list_page(&self, page: u32) -> Result<QuestionPage, AdminError> {
        let page = self
            .questions
            .list_page(PageRequest::new(page, self.page_size))
            .await?;
        Ok(page)
    }

    /// Fetch a question by id.
    ///
    /// Returns `Ok(None)` when the question does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Storage` if repository access fails.
    pub async fn get_question(&self, id: &QuestionId) -> Result<Option<QuestionEntry>, AdminError> {
        match self.questions.get_question(id).await {
            Ok(entry) => Ok(Some(entry)),
            Err(StorageError::NotFound) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Validate and store a new question.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Invalid` for validation failures.
    /// Returns `AdminError::Storage` if persistence fails.
    pub async fn create_question(&self, draft: QuestionDraft) -> Result<QuestionId, AdminError> {
        let validated = draft.validate()?;
        let id = self.questions.create_question(&validated).await?;
        info!(question = %id, set = %validated.set_number, "question created");
        Ok(id)
    }

    /// Validate and replace an existing question.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Invalid` for validation failures.
    /// Returns `AdminError::Storage` if persistence fails.
    pub async fn update_question(
        &self,
        id: &QuestionId,
        draft: QuestionDraft,
    ) -> Result<(), AdminError> {
        let validated = draft.validate()?;
        self.questions.update_question(id, &validated).await?;
        info!(question = %id, "question updated");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `AdminError::Storage` if the question is missing or the
    /// repository fails.
    pub async fn delete_question(&self, id: &QuestionId) -> Result<(), AdminError> {
        self.questions.delete_question(id).await?;
        info!(question = %id, "question deleted");
        Ok(())
    }
}

/// An empty form for `set`, with the default `A`..`D` option rows.
#[must_use]
pub fn blank_draft(set: SetNumber) -> QuestionDraft {
    QuestionDraft {
        text: String::new(),
        options: OptionKey::DEFAULTS
            .iter()
            .map(|key| OptionDraft::new(*key, "", false))
            .collect(),
        category: None,
        difficulty: Default::default(),
        set_number: set,
    }
}

/// A form pre-filled from a stored question.
#[must_use]
pub fn edit_draft(entry: &QuestionEntry) -> QuestionDraft {
    let question = &entry.question;
    QuestionDraft {
        text: question.text().to_string(),
        options: question
            .options()
            .iter()
            .map(|option| {
                OptionDraft::new(
                    option.key,
                    option.text.clone(),
                    question.correct_answers().contains(&option.key),
                )
            })
            .collect(),
        category: Some(entry.category.clone()),
        difficulty: entry.difficulty,
        set_number: entry.set_number,
    }
}

/// Append an option row with the next free key. Returns `None` once `Z` is used.
pub fn add_option(draft: &mut QuestionDraft) -> Option<OptionKey> {
    let keys: Vec<OptionKey> = draft.options.iter().map(|o| o.key).collect();
    let key = next_option_key(&keys)?;
    draft.options.push(OptionDraft::new(key, "", false));
    Some(key)
}
