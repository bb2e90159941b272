/// Chat Window Actor
///
/// Session controller for the conversation a user has open. Holds the message store, the
/// draft (text, link preview, selected file) and the conversation's realtime channel.
/// Async work runs through `ctx.spawn()` + `into_actor()` and every result is tagged with
/// the generation it was started under; switching conversation bumps the generation, so
/// late results from the previous conversation are dropped instead of applied.
use actix::prelude::*;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::api::error;
use crate::constants::ASSISTANT_SENDER_ID;
use crate::modules::{
    chat::{
        assistant::{AssistantScript, AssistantSequencer, Beat},
        events::*,
        message::{ClientSink, ServerMessage},
        model::{ChatSnapshot, DraftView, Notice, NoticeKind, SessionState},
    },
    file_upload::{AttachmentUploader, SelectedFile},
    link_preview::{
        fetcher::LinkPreviewFetcher,
        resolver::{PreviewAction, PreviewResolver},
    },
    message::{
        model::NewMessage,
        schema::{DeliveryStatus, Message as ChatMessage, MessageKind, MessagePayload},
        service::MessageService,
        store::MessageStore,
    },
    realtime::{
        events::{ChangeEvent, ChannelEvent, ChannelFilter, ChannelPayload, ChannelStatus},
        hub::RealtimeHub,
        subscription::ChannelSlot,
    },
};

const MAX_NOTICES: usize = 5;

#[derive(Clone)]
pub struct ChatDeps {
    pub messages: MessageService,
    pub uploader: AttachmentUploader,
    pub previews: Arc<dyn LinkPreviewFetcher>,
    pub realtime: Addr<RealtimeHub>,
    pub assistant_conversation_id: Uuid,
    pub assistant_script: AssistantScript,
}

pub struct ChatWindow {
    user_id: Uuid,
    deps: ChatDeps,
    sink: ClientSink,

    conversation_id: Option<Uuid>,
    loading: bool,
    generation: u64,
    store: MessageStore,
    /// Deliveries that arrived while the history was still loading.
    early: Vec<ChatMessage>,
    channel: ChannelSlot,

    draft: String,
    preview: PreviewResolver,
    file: Option<SelectedFile>,
    uploading: bool,
    in_flight: usize,

    assistant: Option<AssistantSequencer>,
    timers: HashMap<u64, SpawnHandle>,
    next_timer: u64,

    notices: Vec<Notice>,
}

impl ChatWindow {
    pub fn new(user_id: Uuid, deps: ChatDeps, sink: ClientSink) -> Self {
        let channel = ChannelSlot::new(deps.realtime.clone());
        Self {
            user_id,
            deps,
            sink,
            conversation_id: None,
            loading: false,
            generation: 0,
            store: MessageStore::new(),
            early: Vec::new(),
            channel,
            draft: String::new(),
            preview: PreviewResolver::default(),
            file: None,
            uploading: false,
            in_flight: 0,
            assistant: None,
            timers: HashMap::new(),
            next_timer: 0,
            notices: Vec::new(),
        }
    }

    fn state(&self) -> SessionState {
        match self.conversation_id {
            None => SessionState::Idle,
            Some(_) if self.loading => SessionState::Loading,
            Some(_) if self.in_flight > 0 => SessionState::Sending,
            Some(_) => SessionState::Ready,
        }
    }

    fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            state: self.state(),
            conversation_id: self.conversation_id,
            messages: self.store.messages().to_vec(),
            draft: DraftView {
                text: self.draft.clone(),
                preview: self.preview.current().cloned(),
                file: self.file.as_ref().map(SelectedFile::summary),
                uploading: self.uploading,
            },
            assistant_typing: self.assistant.as_ref().is_some_and(AssistantSequencer::is_typing),
            notices: self.notices.clone(),
        }
    }

    fn emit(&self) {
        self.sink.send(&ServerMessage::Window { snapshot: self.snapshot() });
    }

    fn notify(&mut self, kind: NoticeKind, message: impl Into<String>) {
        let notice = Notice::new(kind, message);
        tracing::debug!("Notice for {}: {:?} {}", self.user_id, notice.kind, notice.message);
        self.notices.push(notice);
        if self.notices.len() > MAX_NOTICES {
            self.notices.remove(0);
        }
    }

    fn is_assistant(&self, conversation_id: Uuid) -> bool {
        conversation_id == self.deps.assistant_conversation_id
    }

    /// Close the channel, cancel timers and forget everything tied to the open conversation.
    fn leave(&mut self, ctx: &mut Context<Self>) {
        self.generation += 1;
        self.channel.close();
        for (_, handle) in self.timers.drain() {
            ctx.cancel_future(handle);
        }
        self.assistant = None;
        self.conversation_id = None;
        self.loading = false;
        self.store.clear();
        self.early.clear();
        self.draft.clear();
        self.preview.clear();
        self.file = None;
        self.uploading = false;
        self.in_flight = 0;
    }

    fn select(&mut self, conversation_id: Uuid, ctx: &mut Context<Self>) {
        if self.conversation_id == Some(conversation_id) {
            if self.channel.filter().is_none() && !self.is_assistant(conversation_id) && !self.loading {
                tracing::debug!("Resubscribing {} to conversation {}", self.user_id, conversation_id);
                self.subscribe(conversation_id, ctx);
            }
            self.emit();
            return;
        }

        self.leave(ctx);
        self.conversation_id = Some(conversation_id);
        tracing::debug!("User {} opened conversation {}", self.user_id, conversation_id);

        if self.is_assistant(conversation_id) {
            self.store.reset(conversation_id, Vec::new());
            let mut sequencer = AssistantSequencer::new(self.deps.assistant_script.clone());
            let schedule = sequencer.on_ready(!self.store.is_empty());
            self.assistant = Some(sequencer);
            if let Some((beat, delay)) = schedule {
                self.arm(beat, delay, ctx);
            }
            self.emit();
            return;
        }

        self.subscribe(conversation_id, ctx);
        self.emit();
    }

    /// Open the conversation channel, then load the history it does not replay.
    fn subscribe(&mut self, conversation_id: Uuid, ctx: &mut Context<Self>) {
        self.loading = true;
        self.channel.open(
            ChannelFilter::ConversationMessages { conversation_id },
            ctx.address().recipient(),
        );

        let generation = self.generation;
        let service = self.deps.messages.clone();
        ctx.spawn(async move { service.history(conversation_id).await }.into_actor(self).map(
            move |res, act, _ctx| {
                if act.generation != generation {
                    tracing::debug!("Dropping stale history of {}", conversation_id);
                    return;
                }
                act.history_loaded(conversation_id, res);
            },
        ));
    }

    fn history_loaded(
        &mut self,
        conversation_id: Uuid,
        res: Result<Vec<ChatMessage>, error::SystemError>,
    ) {
        self.loading = false;
        let history = match res {
            Ok(history) => history,
            Err(e) => {
                tracing::error!("Failed to load history of {}: {}", conversation_id, e);
                self.notify(NoticeKind::ConnectionError, "Could not load messages for this conversation");
                Vec::new()
            }
        };

        // local sends the backend has not confirmed survive a reload
        let unconfirmed: Vec<ChatMessage> = self
            .store
            .messages()
            .iter()
            .filter(|m| m.status != DeliveryStatus::Confirmed)
            .cloned()
            .collect();

        self.store.reset(conversation_id, history);
        for message in unconfirmed {
            let (id, failed) = (message.id, message.status == DeliveryStatus::Failed);
            self.store.insert_optimistic(message);
            if failed {
                self.store.mark_failed(&id);
            }
        }
        for message in std::mem::take(&mut self.early) {
            self.store.insert_confirmed(message);
        }
        self.emit();
    }

    fn update_draft(&mut self, text: String, ctx: &mut Context<Self>) {
        self.draft = text;
        match self.preview.text_changed(&self.draft) {
            PreviewAction::Fetch(url) => self.fetch_preview(url, ctx),
            PreviewAction::Clear | PreviewAction::None => {}
        }
        self.emit();
    }

    fn fetch_preview(&mut self, url: String, ctx: &mut Context<Self>) {
        let fetcher = self.deps.previews.clone();
        let generation = self.generation;
        let target = url.clone();

        ctx.spawn(async move { fetcher.fetch(&target).await }.into_actor(self).map(
            move |preview, act, _ctx| {
                if act.generation != generation {
                    return;
                }
                if act.preview.resolved(&act.draft, &url, preview) {
                    act.emit();
                }
            },
        ));
    }

    fn send(&mut self, ctx: &mut Context<Self>) {
        let Some(conversation_id) = self.conversation_id else {
            self.notify(NoticeKind::InvalidInput, "Open a conversation before sending");
            self.emit();
            return;
        };
        if self.loading {
            self.notify(NoticeKind::InvalidInput, "The conversation is still loading");
            self.emit();
            return;
        }

        let text = self.draft.trim();
        let content = (!text.is_empty()).then(|| text.to_string());

        let draft = NewMessage {
            id: Uuid::now_v7(),
            conversation_id,
            sender_id: self.user_id,
            kind: MessageKind::Text,
            content,
            payload: MessagePayload::Text,
        };
        if let Err(e) = draft.validate() {
            tracing::debug!("Rejected draft from {}: {}", self.user_id, e);
            self.notify(NoticeKind::InvalidInput, "Message is too long");
            self.emit();
            return;
        }

        if self.is_assistant(conversation_id) {
            self.send_to_assistant(draft, ctx);
            return;
        }

        if let Some(file) = self.file.clone() {
            if self.uploading {
                tracing::debug!("Upload already running for {}, ignoring send", self.user_id);
                return;
            }
            self.send_with_attachment(draft, file, ctx);
            return;
        }

        if draft.content.is_none() {
            return;
        }

        // attachments take precedence, so a preview only rides along on plain text
        let payload = match self.preview.current() {
            Some(preview) => MessagePayload::LinkPreview { preview: preview.clone() },
            None => MessagePayload::Text,
        };
        self.draft.clear();
        self.dispatch(NewMessage { payload, ..draft }, ctx);
    }

    /// Optimistic insert, then hand the message to the backend.
    fn dispatch(&mut self, message: NewMessage, ctx: &mut Context<Self>) {
        let message_id = message.id;
        let sent_preview = match &message.payload {
            MessagePayload::LinkPreview { preview } => Some(preview.url.clone()),
            _ => None,
        };

        self.store.insert_optimistic(message.to_local(Utc::now()));
        self.in_flight += 1;
        self.emit();

        let service = self.deps.messages.clone();
        let generation = self.generation;
        ctx.spawn(async move { service.send(message).await }.into_actor(self).map(
            move |res, act, _ctx| {
                if act.generation != generation {
                    return;
                }
                act.in_flight = act.in_flight.saturating_sub(1);
                match res {
                    Ok(_) => {
                        act.store.confirm(&message_id);
                        if let Some(url) = sent_preview {
                            act.preview.sent(&url);
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Send of {} failed: {}", message_id, e);
                        act.store.mark_failed(&message_id);
                        act.notify(NoticeKind::SendFailed, "Message could not be sent");
                    }
                }
                act.emit();
            },
        ));
    }

    /// Upload first; the message only exists once the attachment does.
    fn send_with_attachment(&mut self, draft: NewMessage, file: SelectedFile, ctx: &mut Context<Self>) {
        self.uploading = true;
        self.in_flight += 1;
        self.emit();

        let uploader = self.deps.uploader.clone();
        let generation = self.generation;
        let conversation_id = draft.conversation_id;

        ctx.spawn(async move { uploader.upload(conversation_id, &file).await }.into_actor(self).map(
            move |res, act, ctx| {
                if act.generation != generation {
                    if let Ok(attachment) = res {
                        let uploader = act.deps.uploader.clone();
                        actix::spawn(async move { uploader.discard(&attachment).await });
                    }
                    return;
                }

                act.uploading = false;
                act.in_flight = act.in_flight.saturating_sub(1);

                match res {
                    Ok(attachment) => {
                        act.file = None;
                        if act.draft.trim() == draft.content.as_deref().unwrap_or_default() {
                            act.draft.clear();
                            act.preview.clear();
                        }
                        let message = NewMessage {
                            kind: attachment.kind.message_kind(),
                            payload: MessagePayload::Attachments { attachments: vec![attachment] },
                            ..draft
                        };
                        act.dispatch(message, ctx);
                    }
                    Err(e) => {
                        tracing::warn!("Attachment upload for {} failed: {}", conversation_id, e);
                        act.notify(
                            NoticeKind::UploadFailed,
                            format!("Upload failed ({}). The file is still attached, try again.", e),
                        );
                        act.emit();
                    }
                }
            },
        ));
    }

    /// Assistant messages never leave the session.
    fn send_to_assistant(&mut self, draft: NewMessage, ctx: &mut Context<Self>) {
        if self.file.is_some() {
            self.notify(NoticeKind::InvalidInput, "Files cannot be sent to the assistant");
            self.emit();
            return;
        }
        if draft.content.is_none() {
            return;
        }

        let mut message = draft.to_local(Utc::now());
        message.status = DeliveryStatus::Confirmed;
        self.store.insert_confirmed(message);
        self.draft.clear();
        self.preview.clear();

        if let Some(sequencer) = self.assistant.as_mut() {
            let (beat, delay) = sequencer.on_user_message();
            self.arm(beat, delay, ctx);
        }
        self.emit();
    }

    fn arm(&mut self, beat: Beat, delay: std::time::Duration, ctx: &mut Context<Self>) {
        let timer_id = self.next_timer;
        self.next_timer += 1;
        let handle = ctx.run_later(delay, move |act, ctx| {
            act.timers.remove(&timer_id);
            act.assistant_beat(beat, ctx);
        });
        self.timers.insert(timer_id, handle);
    }

    fn assistant_beat(&mut self, beat: Beat, ctx: &mut Context<Self>) {
        let (Some(sequencer), Some(conversation_id)) = (self.assistant.as_mut(), self.conversation_id)
        else {
            return;
        };

        let (line, next) = sequencer.on_beat(beat);
        if let Some(text) = line {
            self.store.insert_confirmed(ChatMessage {
                id: Uuid::now_v7(),
                conversation_id,
                sender_id: ASSISTANT_SENDER_ID,
                kind: MessageKind::Text,
                content: Some(text),
                payload: MessagePayload::Text,
                created_at: Utc::now(),
                status: DeliveryStatus::Confirmed,
            });
        }
        if let Some((beat, delay)) = next {
            self.arm(beat, delay, ctx);
        }
        self.emit();
    }
}

impl Actor for ChatWindow {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::debug!("Chat window started for {}", self.user_id);
        self.emit();
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.channel.close();
        tracing::debug!("Chat window stopped for {}", self.user_id);
    }
}

impl Handler<ChannelEvent> for ChatWindow {
    type Result = ();

    fn handle(&mut self, event: ChannelEvent, _ctx: &mut Context<Self>) {
        if !self.channel.is_current(&event.channel_id) {
            tracing::trace!("Ignoring event from closed channel {}", event.channel_id);
            return;
        }

        match event.payload {
            ChannelPayload::Change(ChangeEvent::MessageInserted { message, .. }) => {
                if self.loading {
                    self.early.push(message);
                    return;
                }
                let outcome = self.store.insert_confirmed(message);
                tracing::trace!("Realtime delivery for {}: {:?}", self.user_id, outcome);
                if self.store.take_dirty() {
                    self.emit();
                }
            }
            ChannelPayload::Change(ChangeEvent::ConversationChanged { .. }) => {}
            ChannelPayload::Status { status: ChannelStatus::Error, reason } => {
                let reason = reason.unwrap_or_else(|| "unknown error".to_string());
                tracing::warn!("Conversation channel for {} failed: {}", self.user_id, reason);
                self.channel.close();
                self.notify(
                    NoticeKind::ConnectionError,
                    format!("Live updates for this conversation stopped: {}", reason),
                );
                self.emit();
            }
            ChannelPayload::Status { status, .. } => {
                tracing::debug!("Conversation channel for {} is {:?}", self.user_id, status);
            }
        }
    }
}

impl Handler<SelectConversation> for ChatWindow {
    type Result = ();

    fn handle(&mut self, msg: SelectConversation, ctx: &mut Context<Self>) {
        self.select(msg.conversation_id, ctx);
    }
}

impl Handler<LeaveConversation> for ChatWindow {
    type Result = ();

    fn handle(&mut self, _: LeaveConversation, ctx: &mut Context<Self>) {
        self.leave(ctx);
        self.emit();
    }
}

impl Handler<UpdateDraft> for ChatWindow {
    type Result = ();

    fn handle(&mut self, msg: UpdateDraft, ctx: &mut Context<Self>) {
        self.update_draft(msg.text, ctx);
    }
}

impl Handler<SelectFile> for ChatWindow {
    type Result = ();

    fn handle(&mut self, msg: SelectFile, _: &mut Context<Self>) {
        if self.conversation_id.is_none() {
            self.notify(NoticeKind::InvalidInput, "Open a conversation before attaching a file");
        } else if self.uploading {
            self.notify(NoticeKind::InvalidInput, "Wait for the current upload to finish");
        } else {
            self.file = Some(msg.file);
        }
        self.emit();
    }
}

impl Handler<ClearFile> for ChatWindow {
    type Result = ();

    fn handle(&mut self, _: ClearFile, _: &mut Context<Self>) {
        if !self.uploading {
            self.file = None;
        }
        self.emit();
    }
}

impl Handler<SendDraft> for ChatWindow {
    type Result = ();

    fn handle(&mut self, _: SendDraft, ctx: &mut Context<Self>) {
        self.send(ctx);
    }
}

impl Handler<DismissNotice> for ChatWindow {
    type Result = ();

    fn handle(&mut self, msg: DismissNotice, _: &mut Context<Self>) {
        self.notices.retain(|n| n.id != msg.notice_id);
        self.emit();
    }
}

impl Handler<GetSnapshot> for ChatWindow {
    type Result = MessageResult<GetSnapshot>;

    fn handle(&mut self, _: GetSnapshot, _: &mut Context<Self>) -> Self::Result {
        MessageResult(self.snapshot())
    }
}

impl Handler<Teardown> for ChatWindow {
    type Result = ();

    fn handle(&mut self, _: Teardown, ctx: &mut Context<Self>) {
        self.leave(ctx);
        ctx.stop();
    }
}
