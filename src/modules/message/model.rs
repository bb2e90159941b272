use serde::Deserialize;
use sqlx::{prelude::FromRow, types::Json};
use uuid::Uuid;
use validator::Validate;

use crate::modules::message::schema::{DeliveryStatus, Message, MessageKind, MessagePayload};

#[derive(Debug, Clone, FromRow)]
pub struct MessageRow {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub kind: MessageKind,
    pub content: Option<String>,
    pub payload: Json<MessagePayload>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            id: row.id,
            conversation_id: row.conversation_id,
            sender_id: row.sender_id,
            kind: row.kind,
            content: row.content,
            payload: row.payload.0,
            created_at: row.created_at,
            status: DeliveryStatus::Confirmed,
        }
    }
}

/// A message as handed to the backend. The identity is generated by the sender so the
/// optimistic entry and the authoritative row share it.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub kind: MessageKind,
    #[validate(length(max = 4000))]
    pub content: Option<String>,
    pub payload: MessagePayload,
}

impl NewMessage {
    pub fn has_body(&self) -> bool {
        let has_text = self.content.as_deref().is_some_and(|c| !c.trim().is_empty());
        let has_files =
            matches!(&self.payload, MessagePayload::Attachments { attachments } if !attachments.is_empty());
        has_text || has_files
    }

    /// The optimistic local copy of this message.
    pub fn to_local(&self, created_at: chrono::DateTime<chrono::Utc>) -> Message {
        Message {
            id: self.id,
            conversation_id: self.conversation_id,
            sender_id: self.sender_id,
            kind: self.kind,
            content: self.content.clone(),
            payload: self.payload.clone(),
            created_at,
            status: DeliveryStatus::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_message(content: Option<&str>) -> NewMessage {
        NewMessage {
            id: Uuid::now_v7(),
            conversation_id: Uuid::now_v7(),
            sender_id: Uuid::now_v7(),
            kind: MessageKind::Text,
            content: content.map(str::to_string),
            payload: MessagePayload::Text,
        }
    }

    #[test]
    fn test_blank_message_has_no_body() {
        assert!(!new_message(None).has_body());
        assert!(!new_message(Some("   ")).has_body());
        assert!(new_message(Some("hello")).has_body());
    }

    #[test]
    fn test_content_length_is_validated() {
        let long = "a".repeat(4001);
        assert!(new_message(Some(&long)).validate().is_err());
        assert!(new_message(Some("fine")).validate().is_ok());
    }

    #[test]
    fn test_local_copy_is_pending() {
        let message = new_message(Some("hi"));
        let local = message.to_local(chrono::Utc::now());
        assert_eq!(local.id, message.id);
        assert_eq!(local.status, DeliveryStatus::Pending);
    }
}
