/// Chat Socket Protocol
///
/// JSON frames exchanged with the browser over `/ws`. Every frame carries a `type` tag.
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::modules::chat::model::{ChatSnapshot, Notice};
use crate::modules::conversation::model::ConversationSummary;

/// Client → server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    OpenConversation { conversation_id: Uuid },

    CloseConversation,

    #[serde(rename_all = "camelCase")]
    UpdateDraft { text: String },

    /// File bytes are base64 encoded.
    #[serde(rename_all = "camelCase")]
    SelectFile { file_name: String, content_type: Option<String>, data: String },

    ClearFile,

    Send,

    #[serde(rename_all = "camelCase")]
    DismissNotice { notice_id: Uuid },

    /// Drop the cached conversation list and end the session.
    Logout,

    Ping,
}

/// Server → client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Full render state of the chat window.
    #[serde(rename_all = "camelCase")]
    Window { snapshot: ChatSnapshot },

    #[serde(rename_all = "camelCase")]
    Conversations { conversations: Vec<ConversationSummary> },

    /// Notice raised outside the chat window (conversation list channel).
    #[serde(rename_all = "camelCase")]
    Notice { notice: Notice },

    Pong,

    #[serde(rename_all = "camelCase")]
    Error { message: String },
}

/// Outbound half of a socket: actors push serialized frames, the socket loop writes them.
#[derive(Debug, Clone, Default)]
pub struct ClientSink {
    tx: Option<mpsc::UnboundedSender<String>>,
}

impl ClientSink {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink that drops every frame.
    pub fn detached() -> Self {
        Self { tx: None }
    }

    pub fn send(&self, msg: &ServerMessage) {
        let Some(tx) = &self.tx else {
            return;
        };

        match serde_json::to_string(msg) {
            Ok(json) => {
                if tx.send(json).is_err() {
                    tracing::debug!("Client socket already closed, frame dropped");
                }
            }
            Err(e) => tracing::error!("Could not serialize server message: {}", e),
        }
    }

    pub fn send_error(&self, message: &str) {
        self.send(&ServerMessage::Error { message: message.to_string() });
    }
}
