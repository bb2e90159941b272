use actix_web::web::ServiceConfig;

use crate::modules::conversation::handle::*;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(get_conversations).service(create_conversation).service(clear_chat_cache);
}
