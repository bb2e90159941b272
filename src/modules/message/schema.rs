use serde::{Deserialize, Serialize};
use sqlx::prelude::Type;
use uuid::Uuid;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Type, Serialize, Deserialize)]
#[sqlx(type_name = "message_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    File,
}

/// Client-side delivery state. Never persisted; rows read from the backend are `Confirmed`.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    #[default]
    Confirmed,
    Failed,
}

/// Coarse file classification, decided once when the file is selected.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Video,
    File,
}

impl AttachmentKind {
    pub fn from_mime(mime: &str) -> Self {
        match mime.split('/').next() {
            Some("image") => AttachmentKind::Image,
            Some("video") => AttachmentKind::Video,
            _ => AttachmentKind::File,
        }
    }

    pub fn message_kind(self) -> MessageKind {
        match self {
            AttachmentKind::Image => MessageKind::Image,
            AttachmentKind::Video => MessageKind::Video,
            AttachmentKind::File => MessageKind::File,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub url: String,
    pub kind: AttachmentKind,
    pub size: u64,
    pub name: String,
    pub storage_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkPreview {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MessagePayload {
    #[default]
    Text,
    LinkPreview { preview: LinkPreview },
    Attachments { attachments: Vec<Attachment> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub kind: MessageKind,
    pub content: Option<String>,
    #[serde(default)]
    pub payload: MessagePayload,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub status: DeliveryStatus,
}

impl Message {
    pub fn attachments(&self) -> &[Attachment] {
        match &self.payload {
            MessagePayload::Attachments { attachments } => attachments,
            _ => &[],
        }
    }

    pub fn link_preview(&self) -> Option<&LinkPreview> {
        match &self.payload {
            MessagePayload::LinkPreview { preview } => Some(preview),
            _ => None,
        }
    }

    /// Text shown as the conversation's last-message preview.
    pub fn preview_text(&self) -> String {
        if let Some(content) = self.content.as_deref().filter(|c| !c.trim().is_empty()) {
            return content.to_string();
        }
        match self.attachments().first() {
            Some(attachment) => match attachment.kind {
                AttachmentKind::Image => "Sent an image".to_string(),
                AttachmentKind::Video => "Sent a video".to_string(),
                AttachmentKind::File => format!("Sent a file: {}", attachment.name),
            },
            None => String::new(),
        }
    }
}
