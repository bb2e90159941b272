use actix_web::web::{scope, ServiceConfig};

use crate::modules::file_upload::handle::*;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(scope("/storage").service(get_object));
}
