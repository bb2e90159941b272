use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::modules::message::schema::{AttachmentKind, LinkPreview, Message};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Loading,
    Ready,
    Sending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NoticeKind {
    ConnectionError,
    SendFailed,
    UploadFailed,
    InvalidInput,
}

/// A dismissible, user-visible report. Failures never leave the session; they end up here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub id: Uuid,
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self { id: Uuid::now_v7(), kind, message: message.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub name: String,
    pub size: u64,
    pub kind: AttachmentKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftView {
    pub text: String,
    pub preview: Option<LinkPreview>,
    pub file: Option<FileSummary>,
    pub uploading: bool,
}

/// Everything the chat window renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSnapshot {
    pub state: SessionState,
    pub conversation_id: Option<Uuid>,
    pub messages: Vec<Message>,
    pub draft: DraftView,
    pub assistant_typing: bool,
    pub notices: Vec<Notice>,
}
