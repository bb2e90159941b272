use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    api::error,
    modules::message::{
        model::{MessageRow, NewMessage},
        repository::MessageRepository,
        schema::Message,
    },
};

const HISTORY_LIMIT: i64 = 500;

#[derive(Clone)]
pub struct MessageRepositoryPg {
    pool: sqlx::PgPool,
}

impl MessageRepositoryPg {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MessageRepository for MessageRepositoryPg {
    async fn find_by_conversation(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Vec<Message>, error::SystemError> {
        // newest page first, flipped so the caller gets ascending order
        let mut rows = sqlx::query_as::<_, MessageRow>(
            "SELECT id, conversation_id, sender_id, kind, content, payload, created_at FROM messages WHERE conversation_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(conversation_id)
        .bind(HISTORY_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        rows.reverse();
        Ok(rows.into_iter().map(Message::from).collect())
    }

    async fn create(&self, message: &NewMessage) -> Result<Message, error::SystemError> {
        let row = sqlx::query_as::<_, MessageRow>(
            "INSERT INTO messages (id, conversation_id, sender_id, kind, content, payload) VALUES ($1, $2, $3, $4, $5, $6) RETURNING id, conversation_id, sender_id, kind, content, payload, created_at",
        )
        .bind(message.id)
        .bind(message.conversation_id)
        .bind(message.sender_id)
        .bind(message.kind)
        .bind(&message.content)
        .bind(Json(&message.payload))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }
}
