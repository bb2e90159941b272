use uuid::Uuid;

use crate::{
    api::error,
    modules::{
        conversation::{
            model::{ConversationSummary, CreateConversation},
            repository::ConversationRepository,
            schema::{ConversationEntity, ConversationKind, ParticipantRole},
        },
        message::schema::Message,
    },
};

const PREVIEW_MAX_CHARS: usize = 120;

#[derive(Clone)]
pub struct ConversationPgRepository {
    pool: sqlx::PgPool,
}

impl ConversationPgRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

const FIND_DIRECT: &str = r#"
    SELECT c.id, c.kind, c.name, c.image_url, c.appointment_id, c.created_by,
           c.created_at, c.last_activity_at
    FROM conversations c
    WHERE c.kind = 'direct'
    AND EXISTS (
        SELECT 1 FROM participants p1
        WHERE p1.conversation_id = c.id AND p1.user_id = $1
    )
    AND EXISTS (
        SELECT 1 FROM participants p2
        WHERE p2.conversation_id = c.id AND p2.user_id = $2
    )
    LIMIT 1
"#;

/// Advisory lock key shared by both orderings of a pair.
fn direct_pair_key(a: &Uuid, b: &Uuid) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("direct:{}:{}", low, high)
}

fn truncate_preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_MAX_CHARS) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

#[async_trait::async_trait]
impl ConversationRepository for ConversationPgRepository {
    async fn find_by_user(
        &self,
        user_id: &Uuid,
    ) -> Result<Vec<ConversationSummary>, error::SystemError> {
        let rows = sqlx::query_as::<_, ConversationSummary>(
            r#"
            SELECT
                c.id,
                c.kind,
                COALESCE(c.name, peer.display_name)     AS name,
                COALESCE(c.image_url, peer.avatar_url)  AS image_url,
                c.appointment_id,
                c.last_activity_at,
                c.last_message_preview,
                c.last_sender_id,
                p.unread_count

            FROM conversations c

            JOIN participants p
                ON p.conversation_id = c.id
            AND p.user_id = $1

            LEFT JOIN LATERAL (
                SELECT u.display_name, u.avatar_url
                FROM participants op
                JOIN users u ON u.id = op.user_id
                WHERE op.conversation_id = c.id
                AND op.user_id <> $1
                AND c.kind = 'direct'
                LIMIT 1
            ) peer ON TRUE

            ORDER BY c.last_activity_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn find_participant_ids(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Vec<Uuid>, error::SystemError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM participants WHERE conversation_id = $1 ORDER BY joined_at",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn find_direct_between_users(
        &self,
        user_a: &Uuid,
        user_b: &Uuid,
    ) -> Result<Option<ConversationEntity>, error::SystemError> {
        let conversation = sqlx::query_as::<_, ConversationEntity>(FIND_DIRECT)
            .bind(user_a)
            .bind(user_b)
            .fetch_optional(&self.pool)
            .await?;

        Ok(conversation)
    }

    async fn create(
        &self,
        conversation: &CreateConversation,
    ) -> Result<ConversationEntity, error::SystemError> {
        if conversation.kind == ConversationKind::Assistant {
            return Err(error::SystemError::bad_request("Assistant conversations are not stored"));
        }

        let mut tx = self.pool.begin().await?;

        // serialise creates for the same pair, then look again under the lock
        if conversation.kind == ConversationKind::Direct {
            if let [a, b] = conversation.participant_ids().as_slice() {
                sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
                    .bind(direct_pair_key(a, b))
                    .execute(tx.as_mut())
                    .await?;

                let existing = sqlx::query_as::<_, ConversationEntity>(FIND_DIRECT)
                    .bind(a)
                    .bind(b)
                    .fetch_optional(tx.as_mut())
                    .await?;
                if let Some(existing) = existing {
                    tx.commit().await?;
                    return Ok(existing);
                }
            }
        }

        let entity = sqlx::query_as::<_, ConversationEntity>(
            r#"
            INSERT INTO conversations (id, kind, name, image_url, appointment_id, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, kind, name, image_url, appointment_id, created_by, created_at, last_activity_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(conversation.kind)
        .bind(&conversation.name)
        .bind(&conversation.image_url)
        .bind(conversation.appointment_id)
        .bind(conversation.created_by)
        .fetch_one(tx.as_mut())
        .await?;

        sqlx::query(
            r#"
            INSERT INTO participants (conversation_id, user_id, role)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(entity.id)
        .bind(conversation.created_by)
        .bind(ParticipantRole::Owner)
        .execute(tx.as_mut())
        .await?;

        let members: Vec<Uuid> =
            conversation.participant_ids().into_iter().filter(|id| *id != conversation.created_by).collect();

        sqlx::query(
            r#"
            INSERT INTO participants (conversation_id, user_id, role)
            SELECT $1, unnest($2::uuid[]), 'member'
            "#,
        )
        .bind(entity.id)
        .bind(&members)
        .execute(tx.as_mut())
        .await?;

        tx.commit().await?;

        Ok(entity)
    }

    async fn record_message(&self, message: &Message) -> Result<(), error::SystemError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE conversations
            SET last_message_preview = CASE WHEN $2 >= last_activity_at
                                            THEN $3 ELSE last_message_preview END,
                last_sender_id       = CASE WHEN $2 >= last_activity_at
                                            THEN $4 ELSE last_sender_id END,
                last_activity_at     = GREATEST(last_activity_at, $2)
            WHERE id = $1
            "#,
        )
        .bind(message.conversation_id)
        .bind(message.created_at)
        .bind(truncate_preview(&message.preview_text()))
        .bind(message.sender_id)
        .execute(tx.as_mut())
        .await?;

        sqlx::query(
            r#"
            UPDATE participants
            SET unread_count = unread_count + 1
            WHERE conversation_id = $1 AND user_id <> $2
            "#,
        )
        .bind(message.conversation_id)
        .bind(message.sender_id)
        .execute(tx.as_mut())
        .await?;

        tx.commit().await?;

        Ok(())
    }

    async fn mark_read(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<(), error::SystemError> {
        sqlx::query(
            r#"
            UPDATE participants
            SET unread_count = 0
            WHERE conversation_id = $1 AND user_id = $2
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_pair_key_ignores_order() {
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        assert_eq!(direct_pair_key(&a, &b), direct_pair_key(&b, &a));
        assert_ne!(direct_pair_key(&a, &b), direct_pair_key(&a, &Uuid::now_v7()));
    }

    #[test]
    fn test_truncate_preview_on_char_boundary() {
        assert_eq!(truncate_preview("short"), "short");

        let long = "é".repeat(PREVIEW_MAX_CHARS + 5);
        let preview = truncate_preview(&long);
        assert_eq!(preview.chars().count(), PREVIEW_MAX_CHARS + 1);
        assert!(preview.ends_with('…'));
    }
}
