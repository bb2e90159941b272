#![allow(dead_code)]

//! In-memory doubles for the repository, cache, storage and fetcher seams, plus a
//! channel collector actor. Shared by the unit tests of every module.

use actix::prelude::*;
use actix_web::web::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use crate::api::error;
use crate::modules::conversation::{
    cache::ConversationCache,
    model::{ConversationSummary, CreateConversation},
    repository::ConversationRepository,
    schema::{ConversationEntity, ConversationKind},
};
use crate::modules::file_upload::storage::{validate_object_path, BlobStorage};
use crate::modules::link_preview::fetcher::LinkPreviewFetcher;
use crate::modules::message::{
    model::NewMessage,
    repository::MessageRepository,
    schema::{DeliveryStatus, LinkPreview, Message, MessageKind, MessagePayload},
};
use crate::modules::realtime::events::{ChangeEvent, ChannelEvent, ChannelId, ChannelPayload, ChannelStatus};

/// Let spawned actor work run to completion.
pub async fn settle() {
    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

pub fn text_message(conversation_id: Uuid, sender_id: Uuid, text: &str) -> Message {
    Message {
        id: Uuid::now_v7(),
        conversation_id,
        sender_id,
        kind: MessageKind::Text,
        content: Some(text.to_string()),
        payload: MessagePayload::Text,
        created_at: chrono::Utc::now(),
        status: DeliveryStatus::Confirmed,
    }
}

/// Records every channel event it receives.
#[derive(Clone, Default)]
pub struct Collector {
    events: Arc<Mutex<Vec<ChannelEvent>>>,
}

impl Collector {
    pub fn changes(&self) -> Vec<(ChannelId, ChangeEvent)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match &e.payload {
                ChannelPayload::Change(change) => Some((e.channel_id, change.clone())),
                ChannelPayload::Status { .. } => None,
            })
            .collect()
    }

    pub fn statuses(&self) -> Vec<(ChannelId, ChannelStatus)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match &e.payload {
                ChannelPayload::Status { status, .. } => Some((e.channel_id, *status)),
                ChannelPayload::Change(_) => None,
            })
            .collect()
    }
}

impl Actor for Collector {
    type Context = Context<Self>;
}

impl Handler<ChannelEvent> for Collector {
    type Result = ();

    fn handle(&mut self, msg: ChannelEvent, _: &mut Context<Self>) {
        self.events.lock().unwrap().push(msg);
    }
}

#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: Mutex<Vec<Message>>,
    fail_sends: AtomicBool,
    history_delays: Mutex<HashMap<Uuid, Duration>>,
}

impl InMemoryMessageRepository {
    pub fn stored(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Hold history reads of one conversation back by `delay`.
    pub fn delay_history(&self, conversation_id: Uuid, delay: Duration) {
        self.history_delays.lock().unwrap().insert(conversation_id, delay);
    }
}

#[async_trait::async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn find_by_conversation(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Vec<Message>, error::SystemError> {
        let delay = self.history_delays.lock().unwrap().get(conversation_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut history: Vec<Message> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.conversation_id == *conversation_id)
            .cloned()
            .collect();
        history.sort_by_key(|m| m.created_at);
        Ok(history)
    }

    async fn create(&self, message: &NewMessage) -> Result<Message, error::SystemError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(error::SystemError::internal("insert rejected"));
        }

        let mut messages = self.messages.lock().unwrap();
        if messages.iter().any(|m| m.id == message.id) {
            return Err(error::SystemError::Conflict(None));
        }

        let mut stored = message.to_local(chrono::Utc::now());
        stored.status = DeliveryStatus::Confirmed;
        messages.push(stored.clone());
        Ok(stored)
    }
}

struct StoredConversation {
    entity: ConversationEntity,
    /// (user, unread count)
    participants: Vec<(Uuid, i32)>,
    preview: Option<String>,
    last_sender: Option<Uuid>,
}

#[derive(Default)]
pub struct InMemoryConversationRepository {
    conversations: Mutex<Vec<StoredConversation>>,
}

impl InMemoryConversationRepository {
    fn insert(&self, kind: ConversationKind, name: Option<String>, created_by: Uuid, members: &[Uuid]) -> ConversationEntity {
        Self::push(&mut self.conversations.lock().unwrap(), kind, name, created_by, members)
    }

    fn push(
        conversations: &mut Vec<StoredConversation>,
        kind: ConversationKind,
        name: Option<String>,
        created_by: Uuid,
        members: &[Uuid],
    ) -> ConversationEntity {
        let now = chrono::Utc::now();
        let entity = ConversationEntity {
            id: Uuid::now_v7(),
            kind,
            name,
            image_url: None,
            appointment_id: None,
            created_by,
            created_at: now,
            last_activity_at: now,
        };
        conversations.push(StoredConversation {
            entity: entity.clone(),
            participants: members.iter().map(|id| (*id, 0)).collect(),
            preview: None,
            last_sender: None,
        });
        entity
    }

    pub fn add_direct(&self, a: Uuid, b: Uuid) -> Uuid {
        self.insert(ConversationKind::Direct, None, a, &[a, b]).id
    }

    pub fn add_group(&self, name: &str, members: &[Uuid]) -> Uuid {
        let owner = members.first().copied().unwrap_or_else(Uuid::now_v7);
        self.insert(ConversationKind::Group, Some(name.to_string()), owner, members).id
    }

    pub fn unread(&self, conversation_id: Uuid, user_id: Uuid) -> i32 {
        self.conversations
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.entity.id == conversation_id)
            .and_then(|c| c.participants.iter().find(|(id, _)| *id == user_id))
            .map(|(_, unread)| *unread)
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn find_by_user(
        &self,
        user_id: &Uuid,
    ) -> Result<Vec<ConversationSummary>, error::SystemError> {
        let mut summaries: Vec<ConversationSummary> = self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| {
                let (_, unread) = c.participants.iter().find(|(id, _)| id == user_id)?;
                Some(ConversationSummary {
                    id: c.entity.id,
                    kind: c.entity.kind,
                    name: c.entity.name.clone(),
                    image_url: c.entity.image_url.clone(),
                    appointment_id: c.entity.appointment_id,
                    last_activity_at: c.entity.last_activity_at,
                    last_message_preview: c.preview.clone(),
                    last_sender_id: c.last_sender,
                    unread_count: *unread,
                })
            })
            .collect();
        summaries.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
        Ok(summaries)
    }

    async fn find_participant_ids(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Vec<Uuid>, error::SystemError> {
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.entity.id == *conversation_id)
            .map(|c| c.participants.iter().map(|(id, _)| *id).collect())
            .unwrap_or_default())
    }

    async fn find_direct_between_users(
        &self,
        user_a: &Uuid,
        user_b: &Uuid,
    ) -> Result<Option<ConversationEntity>, error::SystemError> {
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .find(|c| {
                c.entity.kind == ConversationKind::Direct
                    && c.participants.len() == 2
                    && c.participants.iter().any(|(id, _)| id == user_a)
                    && c.participants.iter().any(|(id, _)| id == user_b)
            })
            .map(|c| c.entity.clone()))
    }

    async fn create(
        &self,
        conversation: &CreateConversation,
    ) -> Result<ConversationEntity, error::SystemError> {
        let members = conversation.participant_ids();
        let mut conversations = self.conversations.lock().unwrap();
        if conversation.kind == ConversationKind::Direct {
            let existing = conversations.iter().find(|c| {
                c.entity.kind == ConversationKind::Direct
                    && c.participants.len() == members.len()
                    && members.iter().all(|m| c.participants.iter().any(|(id, _)| id == m))
            });
            if let Some(existing) = existing {
                return Ok(existing.entity.clone());
            }
        }
        Ok(Self::push(
            &mut conversations,
            conversation.kind,
            conversation.name.clone(),
            conversation.created_by,
            &members,
        ))
    }

    async fn record_message(&self, message: &Message) -> Result<(), error::SystemError> {
        let mut conversations = self.conversations.lock().unwrap();
        let Some(conversation) = conversations.iter_mut().find(|c| c.entity.id == message.conversation_id)
        else {
            return Err(error::SystemError::not_found("Conversation not found"));
        };

        if message.created_at >= conversation.entity.last_activity_at {
            conversation.entity.last_activity_at = message.created_at;
            conversation.preview = Some(message.preview_text());
            conversation.last_sender = Some(message.sender_id);
        }
        for (user_id, unread) in conversation.participants.iter_mut() {
            if *user_id != message.sender_id {
                *unread += 1;
            }
        }
        Ok(())
    }

    async fn mark_read(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<(), error::SystemError> {
        let mut conversations = self.conversations.lock().unwrap();
        if let Some(conversation) = conversations.iter_mut().find(|c| c.entity.id == *conversation_id) {
            for (id, unread) in conversation.participants.iter_mut() {
                if id == user_id {
                    *unread = 0;
                }
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryConversationCache {
    entries: Mutex<HashMap<Uuid, Vec<ConversationSummary>>>,
}

impl InMemoryConversationCache {
    pub fn seed(&self, user_id: Uuid, conversations: Vec<ConversationSummary>) {
        self.entries.lock().unwrap().insert(user_id, conversations);
    }

    pub fn stored(&self, user_id: &Uuid) -> Option<Vec<ConversationSummary>> {
        self.entries.lock().unwrap().get(user_id).cloned()
    }
}

#[async_trait::async_trait]
impl ConversationCache for InMemoryConversationCache {
    async fn load(
        &self,
        user_id: &Uuid,
    ) -> Result<Option<Vec<ConversationSummary>>, error::SystemError> {
        Ok(self.stored(user_id))
    }

    async fn store(
        &self,
        user_id: &Uuid,
        conversations: &[ConversationSummary],
    ) -> Result<(), error::SystemError> {
        self.seed(*user_id, conversations.to_vec());
        Ok(())
    }

    async fn invalidate(&self, user_id: &Uuid) -> Result<(), error::SystemError> {
        self.entries.lock().unwrap().remove(user_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryBlobStorage {
    objects: Mutex<HashMap<String, Bytes>>,
    fail_uploads: AtomicBool,
    fail_signing: AtomicBool,
}

impl MemoryBlobStorage {
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_signing(&self, fail: bool) {
        self.fail_signing.store(fail, Ordering::SeqCst);
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl BlobStorage for MemoryBlobStorage {
    async fn upload(&self, path: &str, bytes: Bytes, _content_type: &str) -> Result<(), error::SystemError> {
        validate_object_path(path)?;
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(error::SystemError::internal("storage unavailable"));
        }
        self.objects.lock().unwrap().insert(path.to_string(), bytes);
        Ok(())
    }

    async fn create_signed_url(&self, path: &str, ttl: Duration) -> Result<String, error::SystemError> {
        if self.fail_signing.load(Ordering::SeqCst) {
            return Err(error::SystemError::internal("signing unavailable"));
        }
        Ok(format!("memory://{}?ttl={}", path, ttl.as_secs()))
    }

    async fn remove(&self, path: &str) -> Result<(), error::SystemError> {
        self.objects.lock().unwrap().remove(path);
        Ok(())
    }
}

/// Answers from a fixed table and records every lookup.
#[derive(Clone, Default)]
pub struct StaticPreviewFetcher {
    previews: Arc<Mutex<HashMap<String, LinkPreview>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl StaticPreviewFetcher {
    pub fn with(self, url: &str, title: &str) -> Self {
        self.previews.lock().unwrap().insert(
            url.to_string(),
            LinkPreview {
                url: url.to_string(),
                title: Some(title.to_string()),
                description: None,
                image: None,
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LinkPreviewFetcher for StaticPreviewFetcher {
    async fn fetch(&self, url: &str) -> Option<LinkPreview> {
        self.calls.lock().unwrap().push(url.to_string());
        self.previews.lock().unwrap().get(url).cloned()
    }
}
