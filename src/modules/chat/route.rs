use actix_web::web::{self, ServiceConfig};

use crate::modules::chat::handler::chat_socket;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.route("/ws", web::get().to(chat_socket));
}
