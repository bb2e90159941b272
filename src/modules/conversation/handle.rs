use actix_web::{delete, get, post, web};
use uuid::Uuid;

use crate::{
    api::{error, success},
    modules::conversation::{
        cache::ConversationCache,
        model::{ConversationListQuery, ConversationSummary, CreateConversation},
        schema::ConversationEntity,
        service::ConversationService,
    },
    utils::{ValidatedJson, ValidatedQuery},
};

#[get("/conversations")]
pub async fn get_conversations(
    conversation_svc: web::Data<ConversationService>,
    ValidatedQuery(query): ValidatedQuery<ConversationListQuery>,
) -> Result<success::Success<Vec<ConversationSummary>>, error::Error> {
    let conversations = conversation_svc.list_for_user(query.user_id).await?;

    Ok(success::Success::ok(Some(conversations)).message("Successfully retrieved conversations"))
}

#[post("/conversations")]
pub async fn create_conversation(
    conversation_svc: web::Data<ConversationService>,
    ValidatedJson(body): ValidatedJson<CreateConversation>,
) -> Result<success::Success<ConversationEntity>, error::Error> {
    let conversation = conversation_svc.create_conversation(body).await?;

    Ok(success::Success::created(Some(conversation)).message("Successfully created conversation"))
}

/// Drops the preload cache of a user, called on logout or account switch.
#[delete("/users/{user_id}/chat-cache")]
pub async fn clear_chat_cache(
    cache: web::Data<dyn ConversationCache>,
    user_id: web::Path<Uuid>,
) -> Result<success::Success<()>, error::Error> {
    cache.invalidate(&user_id).await?;

    Ok(success::Success::no_content())
}
