use actix::Addr;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::error,
    modules::{
        conversation::{
            model::{ConversationSummary, CreateConversation},
            repository::ConversationRepository,
            schema::{ConversationEntity, ConversationKind},
        },
        realtime::{
            events::{ChangeEvent, Publish},
            hub::RealtimeHub,
        },
    },
};

#[derive(Clone)]
pub struct ConversationService {
    conversation_repo: Arc<dyn ConversationRepository>,
    realtime: Addr<RealtimeHub>,
}

impl ConversationService {
    pub fn with_dependencies(
        conversation_repo: Arc<dyn ConversationRepository>,
        realtime: Addr<RealtimeHub>,
    ) -> Self {
        ConversationService { conversation_repo, realtime }
    }

    pub async fn list_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ConversationSummary>, error::SystemError> {
        self.conversation_repo.find_by_user(&user_id).await
    }

    /// Direct conversations are reused when the pair already has one.
    pub async fn create_conversation(
        &self,
        request: CreateConversation,
    ) -> Result<ConversationEntity, error::SystemError> {
        request.validate()?;

        let participants = request.participant_ids();
        let conversation = match request.kind {
            ConversationKind::Assistant => {
                return Err(error::SystemError::bad_request(
                    "Assistant conversations cannot be created",
                ));
            }
            ConversationKind::Direct => {
                let [_, peer] = participants.as_slice() else {
                    return Err(error::SystemError::bad_request(
                        "A direct conversation needs exactly one other member",
                    ));
                };

                match self.conversation_repo.find_direct_between_users(&request.created_by, peer).await? {
                    Some(existing) => return Ok(existing),
                    None => self.conversation_repo.create(&request).await?,
                }
            }
            ConversationKind::Group | ConversationKind::Community => {
                if request.name.is_none() {
                    return Err(error::SystemError::bad_request("Group conversations need a name"));
                }
                self.conversation_repo.create(&request).await?
            }
        };

        tracing::info!(
            "Conversation {} ({:?}) created by {} with {} participants",
            conversation.id,
            conversation.kind,
            conversation.created_by,
            participants.len()
        );

        self.realtime.do_send(Publish {
            event: ChangeEvent::ConversationChanged {
                conversation_id: conversation.id,
                audience: participants,
            },
        });

        Ok(conversation)
    }

    pub async fn mark_read(&self, conversation_id: Uuid, user_id: Uuid) -> Result<(), error::SystemError> {
        self.conversation_repo.mark_read(&conversation_id, &user_id).await
    }
}
