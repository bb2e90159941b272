use uuid::Uuid;

use crate::modules::message::model::NewMessage;
use crate::{api::error, modules::message::schema::Message};

#[async_trait::async_trait]
pub trait MessageRepository: Send + Sync {
    /// History of a conversation, oldest first.
    async fn find_by_conversation(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Vec<Message>, error::SystemError>;

    async fn create(&self, message: &NewMessage) -> Result<Message, error::SystemError>;
}
