use quiz_core::model::{Question, QuestionEntry, QuestionId, SetNumber, ValidatedQuestion};

use super::HttpBackend;
use crate::repository::{
    PageRequest, QuestionPage, QuestionRepository, QuestionSetInfo, StorageError,
};
use crate::wire::{CreatedWire, QuestionBody, QuestionPageWire, QuestionWire, SetInfoWire};

#[async_trait::async_trait]
impl QuestionRepository for HttpBackend {
    async fn list_sets(&self) -> Result<Vec<QuestionSetInfo>, StorageError> {
        let sets: Vec<SetInfoWire> = Self::send_json(self.get("/api/questions/sets")).await?;
        Ok(sets.into_iter().map(QuestionSetInfo::from).collect())
    }

    async fn questions_for_set(&self, set: SetNumber) -> Result<Vec<Question>, StorageError> {
        let path = format!("/api/questions/set/{}", set.value());
        let wires: Vec<QuestionWire> = Self::send_json(self.get(&path)).await?;
        wires
            .into_iter()
            .map(|wire| wire.into_entry(None, set).map(|entry| entry.question))
            .collect()
    }

    async fn list_page(&self, page: PageRequest) -> Result<QuestionPage, StorageError> {
        let request = self
            .get("/api/questions")
            .query(&[("page", page.page()), ("limit", page.limit())]);
        let wire: QuestionPageWire = Self::send_json(request).await?;
        wire.into_page()
    }

    async fn get_question(&self, id: &QuestionId) -> Result<QuestionEntry, StorageError> {
        let path = format!("/api/questions/{}", id.as_str());
        let wire: QuestionWire = Self::send_json(self.get(&path)).await?;
        wire.into_entry(Some(id.clone()), SetNumber::new(0))
    }

    async fn create_question(
        &self,
        question: &ValidatedQuestion,
    ) -> Result<QuestionId, StorageError> {
        let request = self
            .post("/api/questions")
            .json(&QuestionBody::from(question));
        let created: CreatedWire = Self::send_json(request).await?;
        Ok(QuestionId::new(created.id))
    }

    async fn update_question(
        &self,
        id: &QuestionId,
        question: &ValidatedQuestion,
    ) -> Result<(), StorageError> {
        let path = format!("/api/questions/{}", id.as_str());
        Self::send(self.put(&path).json(&QuestionBody::from(question))).await?;
        Ok(())
    }

    async fn delete_question(&self, id: &QuestionId) -> Result<(), StorageError> {
        let path = format!("/api/questions/{}", id.as_str());
        Self::send(self.delete(&path)).await?;
        Ok(())
    }
}
