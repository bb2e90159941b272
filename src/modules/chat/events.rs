/// Chat Window Events
///
/// Inputs to the chat window actor. The socket handler translates client frames into
/// these; tests drive the actor with them directly.
use actix::prelude::*;
use uuid::Uuid;

use crate::modules::chat::model::ChatSnapshot;
use crate::modules::file_upload::SelectedFile;

#[derive(Message)]
#[rtype(result = "()")]
pub struct SelectConversation {
    pub conversation_id: Uuid,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct LeaveConversation;

#[derive(Message)]
#[rtype(result = "()")]
pub struct UpdateDraft {
    pub text: String,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct SelectFile {
    pub file: SelectedFile,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct ClearFile;

#[derive(Message)]
#[rtype(result = "()")]
pub struct SendDraft;

#[derive(Message)]
#[rtype(result = "()")]
pub struct DismissNotice {
    pub notice_id: Uuid,
}

#[derive(Message)]
#[rtype(result = "ChatSnapshot")]
pub struct GetSnapshot;

/// Release channels and timers, then stop. Sent when the socket closes.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Teardown;
