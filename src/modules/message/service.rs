/// Message Service
///
/// Backend side of a send: persist the message, update the conversation's bookkeeping and
/// publish the insert on the realtime hub so every open channel sees it.
use actix::Addr;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::api::error;
use crate::modules::conversation::repository::ConversationRepository;
use crate::modules::message::model::NewMessage;
use crate::modules::message::repository::MessageRepository;
use crate::modules::message::schema::Message;
use crate::modules::realtime::events::{ChangeEvent, Publish};
use crate::modules::realtime::hub::RealtimeHub;

#[derive(Clone)]
pub struct MessageService {
    message_repo: Arc<dyn MessageRepository>,
    conversation_repo: Arc<dyn ConversationRepository>,
    realtime: Addr<RealtimeHub>,
}

impl MessageService {
    pub fn with_dependencies(
        message_repo: Arc<dyn MessageRepository>,
        conversation_repo: Arc<dyn ConversationRepository>,
        realtime: Addr<RealtimeHub>,
    ) -> Self {
        MessageService { message_repo, conversation_repo, realtime }
    }

    /// Full history of a conversation, oldest first.
    pub async fn history(&self, conversation_id: Uuid) -> Result<Vec<Message>, error::SystemError> {
        self.message_repo.find_by_conversation(&conversation_id).await
    }

    /// Flow:
    /// 1. Validate and check the sender belongs to the conversation
    /// 2. Insert the message
    /// 3. Bump last activity, preview and unread counts
    /// 4. Publish the insert
    pub async fn send(&self, message: NewMessage) -> Result<Message, error::SystemError> {
        message.validate()?;
        if !message.has_body() {
            return Err(error::SystemError::bad_request("Message has no text or attachment"));
        }

        let audience = self.conversation_repo.find_participant_ids(&message.conversation_id).await?;
        if audience.is_empty() {
            return Err(error::SystemError::not_found("Conversation not found"));
        }
        if !audience.contains(&message.sender_id) {
            return Err(error::SystemError::forbidden("Sender is not a participant"));
        }

        let created = self.message_repo.create(&message).await?;
        self.conversation_repo.record_message(&created).await?;

        tracing::debug!(
            "Message {} stored in conversation {} ({} recipients)",
            created.id,
            created.conversation_id,
            audience.len()
        );

        self.realtime.do_send(Publish {
            event: ChangeEvent::MessageInserted { message: created.clone(), audience },
        });

        Ok(created)
    }
}
