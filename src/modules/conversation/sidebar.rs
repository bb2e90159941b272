/// Chat Sidebar Actor
///
/// Conversation list of one connected user. Shows the cached list first, replaces it
/// with the authoritative one, then keeps it current from the user's inbox channel.
use actix::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

use crate::modules::{
    chat::{
        events::Teardown,
        message::{ClientSink, ServerMessage},
        model::{Notice, NoticeKind},
    },
    conversation::{cache::ConversationCache, model::ConversationSummary, service::ConversationService},
    message::schema::Message as ChatMessage,
    realtime::{
        events::{ChangeEvent, ChannelEvent, ChannelFilter, ChannelPayload, ChannelStatus},
        hub::RealtimeHub,
        subscription::ChannelSlot,
    },
};

#[derive(Clone)]
pub struct SidebarDeps {
    pub conversations: ConversationService,
    pub cache: Arc<dyn ConversationCache>,
    pub realtime: Addr<RealtimeHub>,
    pub assistant_conversation_id: Uuid,
}

/// Conversation currently shown in the chat window, if any.
#[derive(Message)]
#[rtype(result = "()")]
pub struct SetActive {
    pub conversation_id: Option<Uuid>,
}

#[derive(Message)]
#[rtype(result = "Vec<ConversationSummary>")]
pub struct GetConversations;

/// Drop the cached list for this user and stop.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Logout;

pub struct ChatSidebar {
    user_id: Uuid,
    deps: SidebarDeps,
    sink: ClientSink,
    channel: ChannelSlot,
    items: Vec<ConversationSummary>,
    assistant: ConversationSummary,
    active: Option<Uuid>,
    /// Bumped per reload; fetch results tagged with an older value are dropped.
    generation: u64,
    loaded: bool,
}

impl ChatSidebar {
    pub fn new(user_id: Uuid, deps: SidebarDeps, sink: ClientSink) -> Self {
        let channel = ChannelSlot::new(deps.realtime.clone());
        let assistant =
            ConversationSummary::assistant(deps.assistant_conversation_id, chrono::Utc::now());
        Self {
            user_id,
            deps,
            sink,
            channel,
            items: Vec::new(),
            assistant,
            active: None,
            generation: 0,
            loaded: false,
        }
    }

    /// Assistant pinned on top, then by last activity.
    fn conversations(&self) -> Vec<ConversationSummary> {
        let mut all = Vec::with_capacity(self.items.len() + 1);
        all.push(self.assistant.clone());
        all.extend(self.items.iter().cloned());
        all
    }

    fn emit(&self) {
        self.sink.send(&ServerMessage::Conversations { conversations: self.conversations() });
    }

    fn set_items(&mut self, mut items: Vec<ConversationSummary>) {
        items.retain(|c| c.id != self.deps.assistant_conversation_id);
        items.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
        if let Some(active) = self.active {
            if let Some(item) = items.iter_mut().find(|c| c.id == active) {
                item.unread_count = 0;
            }
        }
        self.items = items;
    }

    fn reload(&mut self, ctx: &mut Context<Self>) {
        self.generation += 1;
        let generation = self.generation;
        let user_id = self.user_id;

        if self.loaded {
            self.fetch(generation, ctx);
            return;
        }

        let cache = self.deps.cache.clone();
        ctx.spawn(async move { cache.load(&user_id).await }.into_actor(self).map(
            move |res, act, ctx| {
                if act.generation != generation {
                    return;
                }
                match res {
                    Ok(Some(cached)) if !act.loaded => {
                        tracing::debug!("Preloaded {} conversations for {}", cached.len(), act.user_id);
                        act.set_items(cached);
                        act.emit();
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Conversation cache read failed for {}: {}", act.user_id, e),
                }
                act.fetch(generation, ctx);
            },
        ));
    }

    fn fetch(&mut self, generation: u64, ctx: &mut Context<Self>) {
        let service = self.deps.conversations.clone();
        let user_id = self.user_id;

        ctx.spawn(async move { service.list_for_user(user_id).await }.into_actor(self).map(
            move |res, act, _ctx| {
                if act.generation != generation {
                    tracing::debug!("Dropping stale conversation list for {}", act.user_id);
                    return;
                }
                match res {
                    Ok(items) => {
                        act.loaded = true;
                        act.set_items(items);
                        act.emit();
                        act.persist();
                    }
                    Err(e) => {
                        tracing::error!("Failed to load conversations for {}: {}", act.user_id, e);
                        act.sink.send(&ServerMessage::Notice {
                            notice: Notice::new(
                                NoticeKind::ConnectionError,
                                "Could not load your conversations",
                            ),
                        });
                    }
                }
            },
        ));
    }

    /// Write the current list to the preload cache in the background.
    fn persist(&self) {
        if !self.loaded {
            return;
        }
        let cache = self.deps.cache.clone();
        let user_id = self.user_id;
        let items = self.items.clone();
        actix::spawn(async move {
            if let Err(e) = cache.store(&user_id, &items).await {
                tracing::warn!("Conversation cache write failed for {}: {}", user_id, e);
            }
        });
    }

    fn apply_message(&mut self, message: &ChatMessage, ctx: &mut Context<Self>) {
        let Some(item) = self.items.iter_mut().find(|c| c.id == message.conversation_id) else {
            tracing::debug!("Message for unknown conversation {}, reloading", message.conversation_id);
            self.reload(ctx);
            return;
        };

        if message.created_at >= item.last_activity_at {
            item.last_activity_at = message.created_at;
            item.last_message_preview = Some(message.preview_text());
            item.last_sender_id = Some(message.sender_id);
        }
        let seen = self.active == Some(message.conversation_id);
        if message.sender_id != self.user_id && !seen {
            item.unread_count += 1;
        }

        self.items.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
        self.emit();

        // the stored counter was raised for every recipient, the open one included
        if message.sender_id != self.user_id && seen {
            self.mark_read(message.conversation_id, ctx);
        }
    }

    /// Zero the badge and the stored counter, whatever the local list believes.
    fn mark_read(&mut self, conversation_id: Uuid, ctx: &mut Context<Self>) {
        if let Some(item) = self.items.iter_mut().find(|c| c.id == conversation_id) {
            item.unread_count = 0;
        }
        if conversation_id == self.deps.assistant_conversation_id {
            return;
        }

        let service = self.deps.conversations.clone();
        let user_id = self.user_id;
        ctx.spawn(
            async move {
                if let Err(e) = service.mark_read(conversation_id, user_id).await {
                    tracing::warn!("Could not mark {} read for {}: {}", conversation_id, user_id, e);
                }
            }
            .into_actor(self),
        );
    }
}

impl Actor for ChatSidebar {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::debug!("Chat sidebar started for {}", self.user_id);
        self.channel.open(ChannelFilter::Inbox { user_id: self.user_id }, ctx.address().recipient());
        self.emit();
        self.reload(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.channel.close();
        tracing::debug!("Chat sidebar stopped for {}", self.user_id);
    }
}

impl Handler<ChannelEvent> for ChatSidebar {
    type Result = ();

    fn handle(&mut self, event: ChannelEvent, ctx: &mut Context<Self>) {
        if !self.channel.is_current(&event.channel_id) {
            return;
        }

        match event.payload {
            ChannelPayload::Change(ChangeEvent::MessageInserted { message, .. }) => {
                self.apply_message(&message, ctx);
            }
            ChannelPayload::Change(ChangeEvent::ConversationChanged { conversation_id, .. }) => {
                tracing::debug!("Conversation {} changed, reloading list", conversation_id);
                self.reload(ctx);
            }
            ChannelPayload::Status { status: ChannelStatus::Error, reason } => {
                let reason = reason.unwrap_or_else(|| "unknown error".to_string());
                tracing::warn!("Inbox channel for {} failed: {}", self.user_id, reason);
                self.channel.close();
                self.sink.send(&ServerMessage::Notice {
                    notice: Notice::new(
                        NoticeKind::ConnectionError,
                        format!("Live conversation updates stopped: {}", reason),
                    ),
                });
            }
            ChannelPayload::Status { status, .. } => {
                tracing::debug!("Inbox channel for {} is {:?}", self.user_id, status);
            }
        }
    }
}

impl Handler<SetActive> for ChatSidebar {
    type Result = ();

    fn handle(&mut self, msg: SetActive, ctx: &mut Context<Self>) {
        self.active = msg.conversation_id;
        if let Some(conversation_id) = msg.conversation_id {
            self.mark_read(conversation_id, ctx);
        }
        self.emit();
    }
}

impl Handler<GetConversations> for ChatSidebar {
    type Result = MessageResult<GetConversations>;

    fn handle(&mut self, _: GetConversations, _: &mut Context<Self>) -> Self::Result {
        MessageResult(self.conversations())
    }
}

impl Handler<Logout> for ChatSidebar {
    type Result = ();

    fn handle(&mut self, _: Logout, ctx: &mut Context<Self>) {
        // nothing may be written back after this point
        self.loaded = false;
        let cache = self.deps.cache.clone();
        let user_id = self.user_id;
        actix::spawn(async move {
            if let Err(e) = cache.invalidate(&user_id).await {
                tracing::warn!("Could not clear conversation cache for {}: {}", user_id, e);
            }
        });
        ctx.stop();
    }
}

impl Handler<Teardown> for ChatSidebar {
    type Result = ();

    fn handle(&mut self, _: Teardown, ctx: &mut Context<Self>) {
        self.persist();
        ctx.stop();
    }
}
