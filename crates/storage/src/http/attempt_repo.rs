use quiz_core::model::{AnswerAck, AttemptId, AttemptRecord, OptionKey, QuestionId, UserId};

use super::HttpBackend;
use crate::repository::{AttemptRepository, NewAttempt, StorageError};
use crate::wire::{
    AnswerAckWire, AnswerBody, AttemptWire, CreatedWire, ProgressWire, StartAttemptBody,
};

#[async_trait::async_trait]
impl AttemptRepository for HttpBackend {
    async fn start_attempt(&self, attempt: &NewAttempt) -> Result<AttemptId, StorageError> {
        let body = StartAttemptBody {
            user_id: attempt.participant.user_id.as_str(),
            user_name: &attempt.participant.name,
            question_set_number: attempt.set_number.value(),
        };
        let created: CreatedWire =
            Self::send_json(self.post("/api/attempts/start").json(&body)).await?;
        Ok(AttemptId::new(created.id))
    }

    async fn record_answer(
        &self,
        attempt: &AttemptId,
        question: &QuestionId,
        selected: &[OptionKey],
    ) -> Result<AnswerAck, StorageError> {
        let path = format!("/api/attempts/{}/answer", attempt.as_str());
        let body = AnswerBody {
            question_id: question.as_str(),
            selected_answers: selected,
        };
        let ack: AnswerAckWire = Self::send_json(self.post(&path).json(&body)).await?;
        Ok(ack.into())
    }

    async fn complete_attempt(&self, attempt: &AttemptId) -> Result<AttemptRecord, StorageError> {
        let path = format!("/api/attempts/{}/complete", attempt.as_str());
        let wire: AttemptWire = Self::send_json(self.post(&path)).await?;
        Ok(wire.into())
    }

    /// The backend answers for its signed-in user; records for other users
    /// are filtered out.
    async fn list_attempts(&self, user: &UserId) -> Result<Vec<AttemptRecord>, StorageError> {
        let progress: ProgressWire = Self::send_json(self.get("/api/users/progress")).await?;
        Ok(progress
            .attempts
            .into_iter()
            .map(AttemptRecord::from)
            .filter(|attempt| &attempt.user_id == user)
            .collect())
    }
}
