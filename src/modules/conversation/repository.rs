use uuid::Uuid;

use crate::{
    api::error,
    modules::{
        conversation::{
            model::{ConversationSummary, CreateConversation},
            schema::ConversationEntity,
        },
        message::schema::Message,
    },
};

#[async_trait::async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Conversations the user participates in, most recent activity first.
    async fn find_by_user(
        &self,
        user_id: &Uuid,
    ) -> Result<Vec<ConversationSummary>, error::SystemError>;

    async fn find_participant_ids(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Vec<Uuid>, error::SystemError>;

    async fn find_direct_between_users(
        &self,
        user_a: &Uuid,
        user_b: &Uuid,
    ) -> Result<Option<ConversationEntity>, error::SystemError>;

    /// Insert the conversation and all participants in one transaction.
    async fn create(
        &self,
        conversation: &CreateConversation,
    ) -> Result<ConversationEntity, error::SystemError>;

    /// Last activity, last-message preview and unread counters after a new message.
    async fn record_message(&self, message: &Message) -> Result<(), error::SystemError>;

    async fn mark_read(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<(), error::SystemError>;
}
