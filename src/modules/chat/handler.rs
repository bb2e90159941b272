/// Chat Socket Handler
///
/// Upgrades `GET /ws` and bridges the socket to the per-connection actors:
/// - Inbound:  Client → WebSocket → parse ClientMessage → ChatWindow / ChatSidebar
/// - Outbound: actors → ClientSink (mpsc channel) → WebSocket → Client
use actix::{Actor, Addr};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_ws::Message;
use base64::Engine;
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::modules::chat::{
    events::*,
    message::{ClientMessage, ClientSink, ServerMessage},
    window::{ChatDeps, ChatWindow},
};
use crate::modules::conversation::sidebar::{ChatSidebar, Logout, SetActive, SidebarDeps};
use crate::modules::file_upload::SelectedFile;
use crate::ENV;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketQuery {
    pub user_id: Uuid,
}

/// Endpoint: GET /ws?userId=...
///
/// Flow:
/// 1. HTTP handshake → WebSocket connection
/// 2. Create the outbound channel and start both actors on it
/// 3. Spawn the task pumping frames in both directions
/// 4. On disconnect, tear both actors down
pub async fn chat_socket(
    req: HttpRequest,
    stream: web::Payload,
    query: web::Query<SocketQuery>,
    chat_deps: web::Data<ChatDeps>,
    sidebar_deps: web::Data<SidebarDeps>,
) -> Result<HttpResponse, Error> {
    let user_id = query.user_id;
    tracing::debug!("WebSocket upgrade request from {:?} for {}", req.peer_addr(), user_id);

    let (response, mut ws_session, msg_stream) = actix_ws::handle(&req, stream)?;
    // selectFile frames carry the whole file as base64
    let mut msg_stream = msg_stream.max_frame_size(ENV.max_upload_bytes / 3 * 4 + 64 * 1024);

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let sink = ClientSink::new(tx);

    let window =
        ChatWindow::new(user_id, chat_deps.get_ref().clone(), sink.clone()).start();
    let sidebar =
        ChatSidebar::new(user_id, sidebar_deps.get_ref().clone(), sink.clone()).start();

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                msg = msg_stream.recv() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<ClientMessage>(&text) {
                                Ok(client_msg) => {
                                    dispatch_client_message(client_msg, &window, &sidebar, &sink);
                                }
                                Err(e) => {
                                    tracing::warn!(
                                        "Could not parse client message: {} - raw: {}",
                                        e,
                                        text.chars().take(100).collect::<String>()
                                    );
                                    sink.send_error("Malformed message");
                                }
                            }
                        }

                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = ws_session.pong(&data).await {
                                tracing::error!("Could not send pong: {}", e);
                                break;
                            }
                        }

                        Some(Ok(Message::Pong(_))) => {}

                        Some(Ok(Message::Close(reason))) => {
                            tracing::info!("WebSocket close frame: {:?}", reason);
                            break;
                        }

                        Some(Ok(Message::Binary(_))) => {
                            tracing::warn!("Binary messages are not supported");
                        }

                        Some(Ok(Message::Continuation(_) | Message::Nop)) => {}

                        Some(Err(e)) => {
                            tracing::error!("WebSocket protocol error: {}", e);
                            break;
                        }

                        None => break,
                    }
                }

                Some(json) = rx.recv() => {
                    if ws_session.text(json).await.is_err() {
                        tracing::error!("Could not write frame to WebSocket client");
                        break;
                    }
                }
            }
        }

        window.do_send(Teardown);
        sidebar.do_send(Teardown);
        let _ = ws_session.close(None).await;
        tracing::debug!("WebSocket loop for {} finished", user_id);
    });

    tracing::info!("WebSocket connection established for {}", user_id);
    Ok(response)
}

fn dispatch_client_message(
    msg: ClientMessage,
    window: &Addr<ChatWindow>,
    sidebar: &Addr<ChatSidebar>,
    sink: &ClientSink,
) {
    match msg {
        ClientMessage::OpenConversation { conversation_id } => {
            window.do_send(SelectConversation { conversation_id });
            sidebar.do_send(SetActive { conversation_id: Some(conversation_id) });
        }
        ClientMessage::CloseConversation => {
            window.do_send(LeaveConversation);
            sidebar.do_send(SetActive { conversation_id: None });
        }
        ClientMessage::UpdateDraft { text } => window.do_send(UpdateDraft { text }),
        ClientMessage::SelectFile { file_name, content_type, data } => {
            match base64::engine::general_purpose::STANDARD.decode(data.as_bytes()) {
                Ok(bytes) => {
                    let file = SelectedFile::new(file_name, content_type, bytes);
                    window.do_send(SelectFile { file });
                }
                Err(e) => {
                    tracing::warn!("Rejected file {}: {}", file_name, e);
                    sink.send_error("File data is not valid base64");
                }
            }
        }
        ClientMessage::ClearFile => window.do_send(ClearFile),
        ClientMessage::Send => window.do_send(SendDraft),
        ClientMessage::DismissNotice { notice_id } => window.do_send(DismissNotice { notice_id }),
        ClientMessage::Logout => {
            window.do_send(Teardown);
            sidebar.do_send(Logout);
        }
        ClientMessage::Ping => sink.send(&ServerMessage::Pong),
    }
}
