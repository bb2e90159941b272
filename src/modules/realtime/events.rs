/// Realtime Hub Events
///
/// Messages exchanged between channel subscribers (chat window, chat sidebar) and the
/// hub actor, plus the change events the hub fans out.
use actix::prelude::*;
use uuid::Uuid;

use crate::modules::message::schema::Message as ChatMessage;

pub type ChannelId = Uuid;

/// What a channel listens to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelFilter {
    /// `insert` on messages of one conversation
    ConversationMessages { conversation_id: Uuid },
    /// conversation-level changes and message inserts for every conversation the user is in
    Inbox { user_id: Uuid },
}

#[derive(Debug, Clone)]
pub enum ChangeEvent {
    MessageInserted { message: ChatMessage, audience: Vec<Uuid> },
    ConversationChanged { conversation_id: Uuid, audience: Vec<Uuid> },
}

impl ChannelFilter {
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        match (self, event) {
            (
                ChannelFilter::ConversationMessages { conversation_id },
                ChangeEvent::MessageInserted { message, .. },
            ) => message.conversation_id == *conversation_id,
            (ChannelFilter::ConversationMessages { .. }, ChangeEvent::ConversationChanged { .. }) => {
                false
            }
            (ChannelFilter::Inbox { user_id }, ChangeEvent::MessageInserted { audience, .. })
            | (ChannelFilter::Inbox { user_id }, ChangeEvent::ConversationChanged { audience, .. }) => {
                audience.contains(user_id)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Subscribed,
    Error,
    Closed,
}

#[derive(Debug, Clone)]
pub enum ChannelPayload {
    Change(ChangeEvent),
    Status { status: ChannelStatus, reason: Option<String> },
}

/// Delivered to a subscriber, stamped with the channel it belongs to.
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct ChannelEvent {
    pub channel_id: ChannelId,
    pub payload: ChannelPayload,
}

/// Register a channel. The id is chosen by the subscriber so that closing and reopening
/// never waits on a reply.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Subscribe {
    pub channel_id: ChannelId,
    pub filter: ChannelFilter,
    pub recipient: Recipient<ChannelEvent>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Unsubscribe {
    pub channel_id: ChannelId,
}

/// Fan a change out to every matching channel.
#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct Publish {
    pub event: ChangeEvent,
}

/// Put every channel matching the filter into the error state and drop it.
#[derive(Message)]
#[rtype(result = "()")]
pub struct ChannelFault {
    pub filter: ChannelFilter,
    pub reason: String,
}

/// Number of open channels, optionally restricted to one filter.
#[derive(Message)]
#[rtype(result = "usize")]
pub struct CountChannels {
    pub filter: Option<ChannelFilter>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::message::schema::{DeliveryStatus, MessageKind, MessagePayload};

    fn inserted(conversation_id: Uuid, audience: Vec<Uuid>) -> ChangeEvent {
        ChangeEvent::MessageInserted {
            message: ChatMessage {
                id: Uuid::now_v7(),
                conversation_id,
                sender_id: Uuid::now_v7(),
                kind: MessageKind::Text,
                content: Some("hi".to_string()),
                payload: MessagePayload::Text,
                created_at: chrono::Utc::now(),
                status: DeliveryStatus::Confirmed,
            },
            audience,
        }
    }

    #[test]
    fn test_conversation_filter_matches_only_its_inserts() {
        let conv = Uuid::now_v7();
        let filter = ChannelFilter::ConversationMessages { conversation_id: conv };

        assert!(filter.matches(&inserted(conv, vec![])));
        assert!(!filter.matches(&inserted(Uuid::now_v7(), vec![])));
        assert!(!filter.matches(&ChangeEvent::ConversationChanged {
            conversation_id: conv,
            audience: vec![],
        }));
    }

    #[test]
    fn test_inbox_filter_matches_audience() {
        let user = Uuid::now_v7();
        let filter = ChannelFilter::Inbox { user_id: user };

        assert!(filter.matches(&inserted(Uuid::now_v7(), vec![user])));
        assert!(!filter.matches(&inserted(Uuid::now_v7(), vec![Uuid::now_v7()])));
        assert!(filter.matches(&ChangeEvent::ConversationChanged {
            conversation_id: Uuid::now_v7(),
            audience: vec![Uuid::now_v7(), user],
        }));
    }
}
