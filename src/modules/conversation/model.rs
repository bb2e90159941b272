use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::modules::conversation::schema::ConversationKind;

pub const ASSISTANT_DISPLAY_NAME: &str = "Support Assistant";

/// One row of a user's conversation list, with the display name already resolved
/// (group name, or the other participant's name for direct chats).
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: Uuid,
    pub kind: ConversationKind,
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub appointment_id: Option<Uuid>,
    pub last_activity_at: chrono::DateTime<chrono::Utc>,
    pub last_message_preview: Option<String>,
    pub last_sender_id: Option<Uuid>,
    pub unread_count: i32,
}

impl ConversationSummary {
    pub fn assistant(id: Uuid, now: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            id,
            kind: ConversationKind::Assistant,
            name: Some(ASSISTANT_DISPLAY_NAME.to_string()),
            image_url: None,
            appointment_id: None,
            last_activity_at: now,
            last_message_preview: None,
            last_sender_id: None,
            unread_count: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversation {
    pub kind: ConversationKind,
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
    pub appointment_id: Option<Uuid>,
    pub created_by: Uuid,
    #[validate(length(min = 1, max = 500))]
    pub member_ids: Vec<Uuid>,
}

impl CreateConversation {
    /// Creator plus members, creator first, without repeats.
    pub fn participant_ids(&self) -> Vec<Uuid> {
        let mut ids = vec![self.created_by];
        for id in &self.member_ids {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        ids
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConversationListQuery {
    pub user_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_ids_dedupes_and_keeps_creator_first() {
        let creator = Uuid::now_v7();
        let member = Uuid::now_v7();
        let request = CreateConversation {
            kind: ConversationKind::Group,
            name: Some("Care team".to_string()),
            image_url: None,
            appointment_id: None,
            created_by: creator,
            member_ids: vec![member, creator, member],
        };
        assert_eq!(request.participant_ids(), vec![creator, member]);
    }

    #[test]
    fn test_create_request_validation() {
        let request: CreateConversation = serde_json::from_str(&format!(
            r#"{{"kind":"group","name":"","createdBy":"{}","memberIds":[]}}"#,
            Uuid::now_v7()
        ))
        .unwrap();
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
        assert!(errors.field_errors().contains_key("member_ids"));
    }
}
